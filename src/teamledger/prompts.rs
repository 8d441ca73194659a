//! Prompt templates for workers and the orchestrator.
//!
//! Every template exists in a plain and an "autoform" flavour. Autoform asks
//! the model to answer free-text fields in a structured notation (JSON, XML,
//! code) instead of prose. The JSON schemas themselves never change.

const AUTOFORM_NOTE: &str = "IMPORTANT:\n\
To remove the ambiguity of natural language, do not answer in prose. \
Use a structured and concise form such as structured data, JSON, XML or code, \
whichever best fits the information you need to convey.\n\
Be concise and accurate.";

const LEDGER_SCHEMA: &str = r#"{
    "is_request_satisfied": {"reason": string, "answer": boolean},
    "is_in_loop": {"reason": string, "answer": boolean},
    "is_progress_being_made": {"reason": string, "answer": boolean},
    "next_speaker": {"reason": string, "answer": string (one of: NAMES)},
    "instruction_or_question": {"reason": string, "answer": string}
}"#;

const VERDICT_SCHEMA: &str = r#"{
    "is_request_satisfied": {"reason": string, "answer": boolean},
    "is_in_loop": {"reason": string, "answer": boolean},
    "is_progress_being_made": {"reason": string, "answer": boolean},
    "instruction_or_question": {"reason": string, "answer": string}
}"#;

const JSON_ONLY: &str = "Answer with pure JSON following the schema below. The object must be \
parsable as-is. Output nothing except the JSON object and do not deviate from the schema:";

const LOOP_AND_PROGRESS_QUESTIONS: &str = "\
    - Are we in a loop, repeating the same requests or getting the same responses as before? \
Loops can span several turns.\n\
    - Are we making forward progress? (true when just starting or when recent messages add value; \
false when recent messages show a loop or a hard barrier to success)";

/// Renders prompts in plain or autoform wording.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Prompts {
    pub autoform: bool,
}

impl Prompts {
    pub fn new(autoform: bool) -> Self {
        Self { autoform }
    }

    fn finish(&self, body: String) -> String {
        if self.autoform {
            format!("{}\n\n{}", body.trim_end(), AUTOFORM_NOTE)
        } else {
            body
        }
    }

    // ---- worker ----

    pub fn completion_check_system(&self) -> String {
        self.finish("You are an AI assistant that decides whether a task is complete.".to_string())
    }

    /// Ask a worker's oracle whether the current task is done.
    pub fn completion_check(
        &self,
        agent: &str,
        chat_history: &str,
        task: &str,
        action_taken: &str,
        result: &str,
    ) -> String {
        self.finish(format!(
            "You are {agent} and you collaborate with other agents.\n\
The ongoing chat with the other agents is:\n{chat_history}\n\n\
It is your turn and you are working on this task:\n{task}\n\n\
You are in an inner dialogue with yourself to complete it. The dialogue so far:\n{action_taken}\n\n\
The result of your last action:\n{result}\n\n\
Try every reasonable action before giving up. If a message states that the task cannot be \
performed and suggests handing over to another agent, treat the task as complete.\n\n\
Is the task \"{task}\" fully completed? Decide:\n\
    - Is the request fully satisfied? (false until it is SUCCESSFULLY and FULLY addressed)\n\
{loop_q}\n\
    - What instruction or question would you give yourself next? (include any specific detail needed)\n\n\
{json_only}\n{schema}\n",
            agent = agent,
            chat_history = chat_history,
            task = task,
            action_taken = action_taken,
            result = result,
            loop_q = LOOP_AND_PROGRESS_QUESTIONS,
            json_only = JSON_ONLY,
            schema = VERDICT_SCHEMA,
        ))
    }

    pub fn summary_system(&self) -> String {
        self.finish(
            "You analyse and summarise multi-step task executions. Give a clear, structured \
account of the operations performed and their outcomes, in order, without dropping key facts."
                .to_string(),
        )
    }

    /// Summary request closing a worker's inner loop. `stall_note` is set
    /// when the loop was cut for lack of progress.
    pub fn summary(&self, task: &str, inner_responses: &str, stall_note: Option<&str>) -> String {
        let stall = match stall_note {
            Some(note) => format!(
                "\nThe work was stopped because it was stuck in a loop: {}. \
Say so explicitly in the summary.\n",
                note
            ),
            None => String::new(),
        };
        self.finish(format!(
            "You were assigned this task: {task}\n\
You performed the actions recorded below and must now report them, with their results, \
to the other agents.{stall}\n\
Give a complete summary of the operations and their results based on this history:\n{inner}\n",
            task = task,
            stall = stall,
            inner = inner_responses,
        ))
    }

    /// System message for the second call that turns raw tool output into prose.
    pub fn result_presentation_system(&self, capability: &str) -> String {
        self.finish(format!(
            "You present results obtained from {} to the user. Report what was done and what \
came back, accurately and without inventing data.",
            capability
        ))
    }

    pub fn result_presentation(&self, task: &str, tool_name: &str, output: &str) -> String {
        format!(
            "Request: {}\nTool `{}` returned:\n{}\nPresent this result.",
            task, tool_name, output
        )
    }

    // ---- orchestrator ----

    pub fn ledger(&self, task: &str, team: &str, names: &[String], advisory: Option<&str>) -> String {
        let names = names.join(", ");
        let advisory = match advisory {
            Some(note) => format!("\nNote: {}\n", note),
            None => String::new(),
        };
        self.finish(format!(
            "Recall we are working on the following request:\n\n{task}\n\n\
And we have assembled the following team:\n\n{team}\n{advisory}\n\
To make progress, answer these questions with your reasoning:\n\n\
    - Is the request fully satisfied? (false until the original request is SUCCESSFULLY and FULLY addressed)\n\
{loop_q}\n\
    - Who should speak next? (select from: {names})\n\
    - What SINGLE instruction or question would you give that team member? Address them directly, \
include what they need, and ask for one action only.\n\n\
{json_only}\n{schema}\n",
            task = task,
            team = team,
            advisory = advisory,
            loop_q = LOOP_AND_PROGRESS_QUESTIONS,
            names = names,
            json_only = JSON_ONLY,
            schema = LEDGER_SCHEMA.replace("NAMES", &names),
        ))
    }

    pub fn final_answer(&self, task: &str) -> String {
        self.finish(format!(
            "We were working on this task:\n{}\n\nThe task is complete. The messages above hold \
the conversation that completed it.\nUsing the information gathered, give the final answer to \
the original request, addressed to the user.",
            task
        ))
    }

    pub fn steps_summary_system(&self) -> String {
        "You summarise the steps taken in a conversation.".to_string()
    }

    pub fn steps_summary(&self, task: &str, conversation: &str) -> String {
        self.finish(format!(
            "Review the whole conversation and list every step taken so far towards the task. \
For each step give the action, its result, its status (COMPLETED / NOT COMPLETED) and the \
reason for that status. Use a numbered list.\n\nOriginal task: {}\nConversation:\n{}\n",
            task, conversation
        ))
    }

    pub fn completion_confirmation(&self, task: &str, steps_summary: &str) -> String {
        format!(
            "Read the steps taken and confirm whether the original request is completely \
satisfied. Answer with a JSON object holding two fields:\n\
1. request_satisfied: true or false\n\
2. reason: a short explanation\n\n\
Original request: {}\nSteps taken:\n{}\n\nRespond with the JSON only.",
            task, steps_summary
        )
    }

    pub fn completion_plan_system(&self) -> String {
        "You write precise plans for finishing partially completed tasks.".to_string()
    }

    pub fn completion_plan(&self, request: &str, reason: &str) -> String {
        self.finish(format!(
            "Initial request: {}\n\nWhy the task is not complete yet: {}\n\n\
Write a plan containing only the actions needed to close that gap. Do not repeat actions that \
already succeeded. Format:\nPLAN:\n- [action]\n- [action]\n",
            request, reason
        ))
    }

    pub fn closed_book(&self, task: &str) -> String {
        self.finish(format!(
            "Below is a request. Before addressing it, answer this pre-survey as well as you can.\n\n\
Request:\n\n{}\n\n\
1. List specific facts or figures GIVEN in the request (possibly none).\n\
2. List facts that must be looked up and WHERE they might be found.\n\
3. List facts that must be derived (deduction, computation).\n\
4. List facts recalled from memory, hunches and educated guesses.\n\n\
Use exactly these headings:\n\
    1. GIVEN OR VERIFIED FACTS\n    2. FACTS TO LOOK UP\n    3. FACTS TO DERIVE\n    4. EDUCATED GUESSES\n\n\
Do not add other sections and do not plan yet.",
            task
        ))
    }

    pub fn plan(&self, team: &str) -> String {
        self.finish(format!(
            "To address the request we have this team:\n\n{}\n\n\
Given the team and the known and unknown facts, write a short bullet-point plan. Not every \
member needs to be involved.",
            team
        ))
    }

    pub fn synthesize(&self, task: &str, team: &str, facts: &str, plan: &str) -> String {
        format!(
            "We are working on the following user request:\n\n{}\n\n\
The team is:\n\n{}\n\n\
Initial fact sheet:\n\n{}\n\n\
Plan to follow as closely as possible:\n\n{}\n",
            task, team, facts, plan
        )
    }

    pub fn update_facts(&self, task: &str, facts: &str) -> String {
        self.finish(format!(
            "As a reminder, we are working on this task:\n\n{}\n\n\
Progress has stalled, but we may have learned something. Rewrite the fact sheet below to \
include anything new, promoting guesses to verified facts where justified and adding at least \
one new educated guess with its reasoning.\n\nOld fact sheet:\n\n{}\n",
            task, facts
        ))
    }

    pub fn update_plan(&self, team: &str) -> String {
        self.finish(format!(
            "Briefly explain the root cause of what went wrong, then write a new concise \
bullet-point plan that avoids repeating the same mistakes. Only involve this team:\n\n{}\n",
            team
        ))
    }
}
