//! Office Team
//!
//! A small office assistant team driven by the ledger orchestrator:
//!
//! - **MailWorker**: reads and sends mail from an in-memory mailbox
//! - **CalendarWorker**: finds free slots and books meetings in an in-memory calendar
//! - **ChatWorker**: drafts text and answers general questions
//! - **UserProxy**: the human at the terminal, asked when the team needs clarification
//!
//! Run with:
//!
//! ```text
//! OPENAI_API_KEY=sk-... RUST_LOG=info cargo run --example office_team -- "Invite Ana to a 30 minute sync on Friday"
//! ```
//!
//! Type `exit` when the user proxy asks a question to stop the run.

use serde_json::{json, Value as JsonValue};
use std::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use teamledger::clients::openai::OpenAIClient;
use teamledger::responders::{ChatResponder, ToolResponder, UserProxyResponder};
use teamledger::tool_protocol::{ToolMetadata, ToolParameter, ToolParameterType, ToolResult, ToolTable};
use teamledger::{ClientWrapper, LedgerOrchestrator, RunConfig, Worker};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

type HandlerError = Box<dyn Error + Send + Sync>;

#[derive(Clone, Debug)]
struct Mail {
    from: String,
    to: String,
    subject: String,
    body: String,
}

#[derive(Clone, Debug)]
struct Meeting {
    id: u64,
    day: String,
    start: String,
    title: String,
    attendees: Vec<String>,
}

fn lock_error<T>(_: T) -> HandlerError {
    "office state is unavailable".into()
}

fn mail_tools(mailbox: Arc<Mutex<Vec<Mail>>>) -> ToolTable {
    let mut table = ToolTable::new();

    let inbox = mailbox.clone();
    table.register(
        ToolMetadata::new("list_mails", "List mails in the inbox, newest first").with_parameter(
            ToolParameter::new("from", ToolParameterType::String)
                .with_description("Only mails from this address"),
        ),
        Arc::new(move |args: JsonValue| -> Result<ToolResult, HandlerError> {
            let mails = inbox.lock().map_err(lock_error)?;
            let from = args["from"].as_str();
            let listed: Vec<JsonValue> = mails
                .iter()
                .rev()
                .filter(|mail| from.map_or(true, |from| mail.from == from))
                .map(|mail| json!({ "from": mail.from, "subject": mail.subject, "body": mail.body }))
                .collect();
            Ok(ToolResult::success(json!({ "mails": listed })))
        }),
    );

    let outbox = mailbox;
    table.register(
        ToolMetadata::new("send_mail", "Send an email")
            .with_parameter(ToolParameter::new("to", ToolParameterType::String).required())
            .with_parameter(ToolParameter::new("subject", ToolParameterType::String).required())
            .with_parameter(ToolParameter::new("body", ToolParameterType::String).required()),
        Arc::new(move |args: JsonValue| -> Result<ToolResult, HandlerError> {
            let to = args["to"].as_str().unwrap_or_default();
            if !to.contains('@') {
                return Ok(ToolResult::failure(format!("'{}' is not an email address", to)));
            }
            let mail = Mail {
                from: "me@office.example".to_string(),
                to: to.to_string(),
                subject: args["subject"].as_str().unwrap_or_default().to_string(),
                body: args["body"].as_str().unwrap_or_default().to_string(),
            };
            log::info!("Mail sent to {}: {}", mail.to, mail.subject);
            outbox.lock().map_err(lock_error)?.push(mail);
            Ok(ToolResult::success(json!({ "status": "sent", "to": to })))
        }),
    );

    table
}

fn calendar_tools(calendar: Arc<Mutex<Vec<Meeting>>>) -> ToolTable {
    let mut table = ToolTable::new();

    let busy = calendar.clone();
    table.register_async(
        ToolMetadata::new("find_free_slot", "Find the first free hour on a day").with_parameter(
            ToolParameter::new("day", ToolParameterType::String)
                .with_description("Day as YYYY-MM-DD")
                .required(),
        ),
        Arc::new(move |args: JsonValue| {
            let busy = busy.clone();
            let lookup: Pin<Box<dyn Future<Output = Result<ToolResult, HandlerError>> + Send>> =
                Box::pin(async move {
                    // simulate a remote calendar service
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    let day = args["day"].as_str().unwrap_or_default().to_string();
                    let meetings = busy.lock().map_err(lock_error)?;
                    let taken: Vec<&str> = meetings
                        .iter()
                        .filter(|m| m.day == day)
                        .map(|m| m.start.as_str())
                        .collect();
                    let free = ["09:00", "10:00", "11:00", "14:00", "15:00", "16:00"]
                        .iter()
                        .copied()
                        .find(|slot| !taken.contains(slot));
                    Ok::<ToolResult, HandlerError>(match free {
                        Some(slot) => ToolResult::success(json!({ "day": day, "start": slot })),
                        None => ToolResult::failure(format!("no free slot on {}", day)),
                    })
                });
            lookup
        }),
    );

    let book = calendar;
    table.register(
        ToolMetadata::new("book_meeting", "Book a one hour meeting")
            .with_parameter(ToolParameter::new("day", ToolParameterType::String).required())
            .with_parameter(ToolParameter::new("start", ToolParameterType::String).required())
            .with_parameter(ToolParameter::new("title", ToolParameterType::String).required())
            .with_parameter(
                ToolParameter::new("attendees", ToolParameterType::Array)
                    .with_items(ToolParameterType::String)
                    .required(),
            ),
        Arc::new(move |args: JsonValue| -> Result<ToolResult, HandlerError> {
            let mut meetings = book.lock().map_err(lock_error)?;
            let day = args["day"].as_str().unwrap_or_default().to_string();
            let start = args["start"].as_str().unwrap_or_default().to_string();
            if meetings.iter().any(|m| m.day == day && m.start == start) {
                return Ok(ToolResult::failure(format!("{} {} is already taken", day, start)));
            }
            let meeting = Meeting {
                id: meetings.len() as u64 + 1,
                day,
                start,
                title: args["title"].as_str().unwrap_or_default().to_string(),
                attendees: args["attendees"]
                    .as_array()
                    .map(|list| {
                        list.iter()
                            .filter_map(|a| a.as_str().map(String::from))
                            .collect()
                    })
                    .unwrap_or_default(),
            };
            let booked = json!({
                "id": meeting.id,
                "day": meeting.day,
                "start": meeting.start,
                "title": meeting.title,
                "attendees": meeting.attendees,
            });
            meetings.push(meeting);
            Ok(ToolResult::success(booked))
        }),
    );

    table
}

/// Feed stdin lines to the user proxy and print its questions.
fn spawn_terminal(questions: mpsc::UnboundedReceiver<String>, answers: mpsc::Sender<String>) {
    let mut questions = questions;
    tokio::spawn(async move {
        while let Some(question) = questions.recv().await {
            println!("\n[team asks] {}\n> ", question);
        }
    });
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if answers.send(line).await.is_err() {
                break;
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    teamledger::init_logger();

    let request = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let request = if request.trim().is_empty() {
        "Check whether Ana wrote about the budget review and set up a meeting with her on 2024-05-03"
            .to_string()
    } else {
        request
    };

    let client: Arc<dyn ClientWrapper> = Arc::new(OpenAIClient::from_env()?);
    println!("Using model {}", client.model_name());

    let mailbox = Arc::new(Mutex::new(vec![Mail {
        from: "ana@office.example".to_string(),
        to: "me@office.example".to_string(),
        subject: "Budget review".to_string(),
        body: "Can we go through the Q3 budget together this week?".to_string(),
    }]));
    let calendar = Arc::new(Mutex::new(vec![Meeting {
        id: 1,
        day: "2024-05-03".to_string(),
        start: "09:00".to_string(),
        title: "Standup".to_string(),
        attendees: vec!["me@office.example".to_string()],
    }]));

    let config = RunConfig::default()
        .with_max_rounds(12)
        .with_max_time(Duration::from_secs(300))
        .with_final_check(true);
    let mut orchestrator = LedgerOrchestrator::new(client.clone(), config);

    orchestrator.add_agent(Worker::new(
        "MailWorker",
        "Reads the inbox and sends email on the user's behalf",
        client.clone(),
        ToolResponder::new("the mail service", client.clone(), mail_tools(mailbox.clone())),
    ))?;
    orchestrator.add_agent(Worker::new(
        "CalendarWorker",
        "Finds free time and books meetings in the user's calendar",
        client.clone(),
        ToolResponder::new("the calendar", client.clone(), calendar_tools(calendar.clone())),
    ))?;
    orchestrator.add_agent(Worker::new(
        "ChatWorker",
        "Drafts text and answers general questions",
        client.clone(),
        ChatResponder::new(client.clone()),
    ))?;

    let (answers, proxy) = UserProxyResponder::channel(8);
    let (questions_tx, questions_rx) = mpsc::unbounded_channel();
    spawn_terminal(questions_rx, answers);
    orchestrator.add_agent(
        Worker::new(
            "UserProxy",
            "The human who made the request; ask only when information is missing",
            client.clone(),
            proxy.with_outbox(questions_tx),
        )
        .with_multi_step(false),
    )?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    println!("Request: {}\nTeam: {}", request, orchestrator.roster().join(", "));
    let outcome = orchestrator.run(&request, &cancel).await?;

    println!("\n=== {} after {} rounds ===", outcome.reason, outcome.rounds);
    if let Some(answer) = &outcome.final_answer {
        println!("{}", answer);
    }

    let sent = mailbox.lock().map(|mails| mails.len()).unwrap_or(0);
    let booked = calendar.lock().map(|meetings| meetings.len()).unwrap_or(0);
    println!("\nMailbox now holds {} mails, calendar {} meetings", sent, booked);
    Ok(())
}
