mod common;

use common::{tool_call_message, verdict_json, RecordingHandler, SequentialMockClient};
use std::sync::Arc;
use teamledger::bus::{Broadcast, TeamAgent};
use teamledger::client_wrapper::{Message, OracleError, Role};
use teamledger::event::WorkerEvent;
use teamledger::responders::{ChatResponder, ToolResponder};
use teamledger::tool_protocol::{ToolMetadata, ToolParameter, ToolParameterType, ToolResult, ToolTable};
use teamledger::{OrchestrationError, Worker, WorkerConfig};
use tokio_util::sync::CancellationToken;

fn failing_mail_tools() -> ToolTable {
    let mut table = ToolTable::new();
    table.register(
        ToolMetadata::new("send_mail", "Send an email").with_parameter(
            ToolParameter::new("to", ToolParameterType::String).required(),
        ),
        Arc::new(|_args: serde_json::Value| {
            Err::<ToolResult, Box<dyn std::error::Error + Send + Sync>>(
                "SMTP relay refused the connection".into(),
            )
        }),
    );
    table
}

fn working_mail_tools() -> ToolTable {
    let mut table = ToolTable::new();
    table.register(
        ToolMetadata::new("send_mail", "Send an email").with_parameter(
            ToolParameter::new("to", ToolParameterType::String).required(),
        ),
        Arc::new(|args: serde_json::Value| {
            Ok(ToolResult::success(serde_json::json!({ "sent_to": args["to"] })))
        }),
    );
    table
}

fn task(worker: &mut Worker, text: &str) {
    worker.push_message(Role::User, text, "Orchestrator");
}

#[tokio::test]
async fn test_empty_transcript_is_empty_task_error() {
    let client = Arc::new(SequentialMockClient::new(vec![]));
    let mut worker = Worker::new("ChatWorker", "chat", client.clone(), ChatResponder::new(client.clone()));

    let err = worker
        .handle_reply_request(&CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, OrchestrationError::EmptyTask("ChatWorker".to_string()));
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_single_step_mode_returns_responder_output_verbatim() {
    let client = Arc::new(SequentialMockClient::new(vec!["Paris".to_string()]));
    let mut worker = Worker::new("ChatWorker", "chat", client.clone(), ChatResponder::new(client.clone()))
        .with_multi_step(false);
    task(&mut worker, "What is the capital of France?");

    let reply = worker
        .handle_reply_request(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply.content, "Paris");
    assert!(!reply.request_halt);
    assert_eq!(client.call_count(), 1);
    // task + own reply
    assert_eq!(worker.transcript().len(), 2);
    assert_eq!(worker.transcript().last().unwrap().role, Role::Assistant);
}

#[tokio::test]
async fn test_satisfied_first_step_appends_three_entries_then_summarises() {
    let responder_client = Arc::new(SequentialMockClient::new(vec!["Drafted the note.".to_string()]));
    let oracle = Arc::new(SequentialMockClient::new(vec![
        verdict_json(true, false, true, "Nothing left to do"),
        "I drafted the thank-you note.".to_string(),
    ]));
    let mut worker = Worker::new(
        "ChatWorker",
        "chat",
        oracle.clone(),
        ChatResponder::new(responder_client.clone()),
    );
    task(&mut worker, "Draft a thank-you note");

    let reply = worker
        .handle_reply_request(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(reply.content, "I drafted the thank-you note.");

    let entries = worker.transcript().entries();
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[1].content, "Drafted the note.");
    assert_eq!(
        entries[2].content,
        "Task completion status: Complete\nReason: all done."
    );
    assert_eq!(entries[3].content, "Nothing left to do");
    assert_eq!(entries[4].content, "I drafted the thank-you note.");

    let calls = oracle.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].json_output);
    assert!(calls[0].prompt().contains("Draft a thank-you note"));
    // the raw result is embedded JSON-serialized
    assert!(calls[0].prompt().contains("\"Drafted the note.\""));
    assert!(!calls[1].json_output);
    assert!(calls[1].prompt().contains("Drafted the note."));
    assert!(!calls[1].prompt().contains("stuck in a loop"));
}

#[tokio::test]
async fn test_failing_tool_stalls_after_fourth_step() {
    let responder_client = Arc::new(SequentialMockClient::with_messages(vec![
        tool_call_message("send_mail", r#"{"to":"ana@example.com"}"#);
        4
    ]));
    let oracle = Arc::new(SequentialMockClient::new(vec![
        verdict_json(false, true, false, "Retry sending"),
        verdict_json(false, true, false, "Retry sending"),
        verdict_json(false, true, false, "Retry sending"),
        verdict_json(false, true, false, "Retry sending"),
        "Could not send the mail: the relay kept refusing. Stopped because the task was stuck in a loop.".to_string(),
    ]));
    let handler = Arc::new(RecordingHandler::default());
    let mut worker = Worker::new(
        "MailWorker",
        "mail",
        oracle.clone(),
        ToolResponder::new("the mail service", responder_client.clone(), failing_mail_tools()),
    )
    .with_event_handler(handler.clone());
    task(&mut worker, "Send the report to ana@example.com");

    let reply = worker
        .handle_reply_request(&CancellationToken::new())
        .await
        .unwrap();

    assert!(reply.content.contains("stuck in a loop"));
    assert_eq!(responder_client.call_count(), 4);
    assert_eq!(oracle.call_count(), 5);
    assert_eq!(worker.loop_counter().count(), 0);

    // task + 4 steps x 3 entries + reply
    let entries = worker.transcript().entries();
    assert_eq!(entries.len(), 14);
    assert!(entries[1].content.contains("could not run"));
    assert!(entries[1].content.contains("SMTP relay refused"));

    let calls = oracle.calls();
    let summary_prompt = calls[4].prompt();
    assert!(summary_prompt.contains("stuck in a loop: same failure repeats"));
    assert!(!summary_prompt.contains("Exiting."));
    // only the four step outputs are summarised
    assert_eq!(summary_prompt.matches("SMTP relay refused").count(), 4);
    assert!(summary_prompt.contains("Send the report to ana@example.com"));

    let events = handler.worker_events.lock().await;
    let stalls: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            WorkerEvent::StallDetected { step, .. } => Some(*step),
            _ => None,
        })
        .collect();
    assert_eq!(stalls, vec![4]);
    let failed_tools = events
        .iter()
        .filter(|e| matches!(e, WorkerEvent::ToolExecutionCompleted { success: false, .. }))
        .count();
    assert_eq!(failed_tools, 4);
}

#[tokio::test]
async fn test_progress_resets_loop_counter() {
    let responder_client = Arc::new(SequentialMockClient::new(vec!["tried".to_string(); 8]));
    let mut script = vec![
        verdict_json(false, true, false, "again"),
        verdict_json(false, true, false, "again"),
        verdict_json(false, true, false, "again"),
        verdict_json(false, true, true, "again"),
    ];
    script.extend(vec![verdict_json(false, true, false, "again"); 4]);
    script.push("summary".to_string());
    let oracle = Arc::new(SequentialMockClient::new(script));
    let handler = Arc::new(RecordingHandler::default());
    let mut worker = Worker::new(
        "ChatWorker",
        "chat",
        oracle.clone(),
        ChatResponder::new(responder_client.clone()),
    )
    .with_event_handler(handler.clone());
    task(&mut worker, "Find the meeting notes");

    worker
        .handle_reply_request(&CancellationToken::new())
        .await
        .unwrap();

    let counters: Vec<usize> = handler
        .worker_events
        .lock()
        .await
        .iter()
        .filter_map(|e| match e {
            WorkerEvent::VerdictReceived { loop_counter, .. } => Some(*loop_counter),
            _ => None,
        })
        .collect();
    assert_eq!(counters, vec![1, 2, 3, 0, 1, 2, 3, 4]);
    assert_eq!(responder_client.call_count(), 8);
}

#[tokio::test]
async fn test_instruction_becomes_next_task() {
    let responder_client = Arc::new(SequentialMockClient::new(vec![
        "Found two drafts.".to_string(),
        "Sent the newer draft.".to_string(),
    ]));
    let oracle = Arc::new(SequentialMockClient::new(vec![
        verdict_json(false, false, true, "Send the newer draft"),
        verdict_json(true, false, true, "Done"),
        "Sent the newer of two drafts.".to_string(),
    ]));
    let mut worker = Worker::new(
        "MailWorker",
        "mail",
        oracle.clone(),
        ChatResponder::new(responder_client.clone()),
    );
    task(&mut worker, "Send my draft to Bob");

    let reply = worker
        .handle_reply_request(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(reply.content, "Sent the newer of two drafts.");

    let calls = oracle.calls();
    assert!(calls[1].prompt().contains("working on this task:\nSend the newer draft"));
    // the summary refers to the original task
    assert!(calls[2].prompt().contains("Send my draft to Bob"));
    // the responder saw the instruction as the latest entry on its second step
    let second_step = &responder_client.calls()[1];
    assert_eq!(&*second_step.messages.last().unwrap().content, "Send the newer draft");
}

#[tokio::test]
async fn test_malformed_verdict_is_oracle_format_error_without_appends() {
    let responder_client = Arc::new(SequentialMockClient::new(vec!["did something".to_string()]));
    let oracle = Arc::new(SequentialMockClient::new(vec![
        "The task looks complete to me.".to_string(),
    ]));
    let mut worker = Worker::new(
        "ChatWorker",
        "chat",
        oracle.clone(),
        ChatResponder::new(responder_client),
    );
    task(&mut worker, "Summarise the thread");

    let err = worker
        .handle_reply_request(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_protocol_violation());
    assert!(matches!(err, OrchestrationError::OracleFormat { ref agent, .. } if agent == "ChatWorker"));
    // no retry, no partial step
    assert_eq!(oracle.call_count(), 1);
    assert_eq!(worker.transcript().len(), 1);
}

#[tokio::test]
async fn test_malformed_tool_arguments_become_step_result() {
    let responder_client = Arc::new(SequentialMockClient::with_messages(vec![tool_call_message(
        "send_mail",
        "{to: ana",
    )]));
    let oracle = Arc::new(SequentialMockClient::new(vec![
        verdict_json(true, false, true, "Report that the arguments were invalid"),
        "The mail could not be sent because the tool arguments were invalid.".to_string(),
    ]));
    let mut worker = Worker::new(
        "MailWorker",
        "mail",
        oracle.clone(),
        ToolResponder::new("the mail service", responder_client, working_mail_tools()),
    );
    task(&mut worker, "Mail Ana");

    let reply = worker
        .handle_reply_request(&CancellationToken::new())
        .await
        .unwrap();
    assert!(reply.content.contains("arguments were invalid"));
    assert!(worker.transcript().entries()[1]
        .content
        .contains("arguments are not valid JSON"));
    assert!(oracle.calls()[0].prompt().contains("not valid JSON"));
}

#[tokio::test]
async fn test_transport_error_propagates() {
    let responder_client = Arc::new(SequentialMockClient::new(vec!["ok".to_string()]));
    let oracle = Arc::new(SequentialMockClient::with_results(vec![Err(
        OracleError::Transport("connection reset".to_string()),
    )]));
    let mut worker = Worker::new(
        "ChatWorker",
        "chat",
        oracle,
        ChatResponder::new(responder_client),
    );
    task(&mut worker, "anything");

    let err = worker
        .handle_reply_request(&CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        OrchestrationError::Oracle(OracleError::Transport("connection reset".to_string()))
    );
    assert!(!err.is_protocol_violation());
    assert_eq!(worker.transcript().len(), 1);
}

#[tokio::test]
async fn test_cancelled_token_leaves_transcript_untouched() {
    let client = Arc::new(SequentialMockClient::new(vec!["unused".to_string()]));
    let mut worker = Worker::new("ChatWorker", "chat", client.clone(), ChatResponder::new(client.clone()));
    task(&mut worker, "anything");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = worker.handle_reply_request(&cancel).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(client.call_count(), 0);
    assert_eq!(worker.transcript().len(), 1);
}

#[tokio::test]
async fn test_broadcast_and_reset() {
    let client = Arc::new(SequentialMockClient::new(vec![]));
    let mut worker = Worker::new("ChatWorker", "chat", client.clone(), ChatResponder::new(client))
        .with_config(WorkerConfig {
            multi_step: true,
            autoform: true,
            stall_threshold: 5,
        });
    assert_eq!(worker.loop_counter().threshold(), 5);

    worker
        .handle_broadcast(&Broadcast::new("hello team", "user"))
        .await;
    assert_eq!(worker.transcript().len(), 1);
    assert_eq!(worker.transcript().entries()[0].source, "user");
    assert_eq!(worker.transcript().entries()[0].role, Role::User);

    worker.handle_reset().await;
    assert!(worker.transcript().is_empty());
}

#[tokio::test]
async fn test_autoform_changes_verdict_prompt() {
    let responder_client = Arc::new(SequentialMockClient::new(vec!["x".to_string()]));
    let oracle = Arc::new(SequentialMockClient::new(vec![
        verdict_json(true, false, true, "done"),
        "summary".to_string(),
    ]));
    let mut worker = Worker::new("ChatWorker", "chat", oracle.clone(), ChatResponder::new(responder_client))
        .with_autoform(true);
    task(&mut worker, "t");

    worker
        .handle_reply_request(&CancellationToken::new())
        .await
        .unwrap();
    let calls = oracle.calls();
    let system: &Message = &calls[0].messages[0];
    assert!(system.content.contains("do not answer in prose"));
    assert!(calls[0].prompt().contains("\"is_in_loop\""));
}
