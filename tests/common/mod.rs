#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use teamledger::client_wrapper::{
    ClientWrapper, CompletionOptions, Message, OracleError, ToolCall,
};
use teamledger::event::{EventHandler, OrchestrationEvent, WorkerEvent};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// One recorded oracle call.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub json_output: bool,
    pub tool_names: Vec<String>,
}

impl RecordedCall {
    /// Content of the final message, which carries the prompt.
    pub fn prompt(&self) -> String {
        self.messages
            .last()
            .map(|m| m.content.to_string())
            .unwrap_or_default()
    }
}

/// Replays a fixed script of oracle responses and records every call.
/// Running past the end of the script is a transport error.
pub struct SequentialMockClient {
    responses: Vec<Result<Message, OracleError>>,
    call_count: AtomicUsize,
    calls: StdMutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl SequentialMockClient {
    pub fn new(responses: Vec<String>) -> Self {
        Self::with_messages(responses.into_iter().map(Message::assistant).collect())
    }

    pub fn with_messages(responses: Vec<Message>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(responses: Vec<Result<Message, OracleError>>) -> Self {
        Self {
            responses,
            call_count: AtomicUsize::new(0),
            calls: StdMutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Make every call take `delay`, like a slow model. Cancellation cuts
    /// the wait short.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClientWrapper for SequentialMockClient {
    async fn send_message(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
        cancel: &CancellationToken,
    ) -> Result<Message, OracleError> {
        if cancel.is_cancelled() {
            return Err(OracleError::Cancelled);
        }
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            json_output: options.json_output,
            tool_names: options.tools.iter().map(|t| t.name.clone()).collect(),
        });
        let index = self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(OracleError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        self.responses
            .get(index)
            .cloned()
            .unwrap_or_else(|| Err(OracleError::Transport("mock script exhausted".to_string())))
    }

    fn model_name(&self) -> &str {
        "mock-sequential"
    }
}

#[derive(Default)]
pub struct RecordingHandler {
    pub worker_events: Mutex<Vec<WorkerEvent>>,
    pub orchestration_events: Mutex<Vec<OrchestrationEvent>>,
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn on_worker_event(&self, event: &WorkerEvent) {
        self.worker_events.lock().await.push(event.clone());
    }

    async fn on_orchestration_event(&self, event: &OrchestrationEvent) {
        self.orchestration_events.lock().await.push(event.clone());
    }
}

pub fn verdict_json(satisfied: bool, in_loop: bool, progress: bool, instruction: &str) -> String {
    json!({
        "is_request_satisfied": {"reason": if satisfied { "all done" } else { "not done" }, "answer": satisfied},
        "is_in_loop": {"reason": if in_loop { "same failure repeats" } else { "no repetition" }, "answer": in_loop},
        "is_progress_being_made": {"reason": "judged from history", "answer": progress},
        "instruction_or_question": {"reason": "next step", "answer": instruction}
    })
    .to_string()
}

pub fn ledger_json(
    satisfied: bool,
    in_loop: bool,
    progress: bool,
    speaker: &str,
    instruction: &str,
) -> String {
    json!({
        "is_request_satisfied": {"reason": if satisfied { "everything requested is done" } else { "work remains" }, "answer": satisfied},
        "is_in_loop": {"reason": if in_loop { "same exchange again" } else { "fresh exchange" }, "answer": in_loop},
        "is_progress_being_made": {"reason": "judged from transcript", "answer": progress},
        "next_speaker": {"reason": "best fit", "answer": speaker},
        "instruction_or_question": {"reason": "single action", "answer": instruction}
    })
    .to_string()
}

pub fn tool_call_message(name: &str, arguments: &str) -> Message {
    Message::assistant("").with_tool_calls(vec![ToolCall {
        id: "call-1".to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }])
}
