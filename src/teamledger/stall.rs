//! Consecutive-stall bookkeeping shared by the inner and outer loops.

/// Number of consecutive stalled evaluations tolerated before a loop is cut.
/// A stall fires once the counter goes strictly above this value.
pub const DEFAULT_STALL_THRESHOLD: usize = 3;

/// Counts consecutive evaluations reporting "in a loop and not progressing".
///
/// Any evaluation that does not report that combination resets the count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopCounter {
    count: usize,
    threshold: usize,
}

impl LoopCounter {
    pub fn new(threshold: usize) -> Self {
        Self {
            count: 0,
            threshold,
        }
    }

    /// Record one evaluation and report whether the loop is now stalled.
    pub fn observe(&mut self, in_loop: bool, progress: bool) -> bool {
        let stuck = in_loop && !progress;
        if stuck {
            self.count += 1;
        } else {
            self.count = 0;
        }
        stuck && self.count > self.threshold
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

impl Default for LoopCounter {
    fn default() -> Self {
        Self::new(DEFAULT_STALL_THRESHOLD)
    }
}
