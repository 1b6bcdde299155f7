//! Plays Quizzer on the terminal.
//!
//! Every stdin line is a chat line from someone:
//!
//! ```text
//! bob: !start science
//! admin!me@localhost: !admin stats
//! NickServ: alice Account: alice, alice is currently online.
//! /disconnect
//! /reconnect
//! ```
//!
//! Bot output goes to stdout, logs to stderr.
//!
//! Usage: `console-quiz [questions.json] [config.json]`

use std::sync::Arc;
use std::time::Duration;

use quizzer::prelude::*;
use quizzer::telemetry;
use tokio::io::{AsyncBufReadExt, BufReader};

const SAMPLE_QUESTIONS: &str = r#"[
  {"category": "Science", "question": "What is the chemical symbol for gold?",
   "answers": {"A": "Au", "B": "Ag", "C": "Gd"}, "correct": "A"},
  {"category": "Science", "question": "How many legs does a spider have?",
   "answers": {"A": "Six", "B": "Eight", "C": "Ten"}, "correct": "B"},
  {"category": "History", "question": "In which year did the Berlin Wall fall?",
   "answers": {"A": "1987", "B": "1991", "C": "1989"}, "correct": "C"},
  {"category": "Geography", "question": "What is the capital of Australia?",
   "answers": {"A": "Sydney", "B": "Canberra", "C": "Melbourne"}, "correct": "B"}
]"#;

const SAMPLE_CONFIG: &str = r##"{
  "channel": "#quiz",
  "verification_method": "hostmask",
  "round": { "questions_per_round": 3, "recruitment_window_secs": 15, "answer_deadline_secs": 20 },
  "admins": [ { "identity": "admin", "hostmasks": ["admin!*@localhost"] } ]
}"##;

const SESSION_SWEEP: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One parsed stdin line.
#[derive(Debug, PartialEq)]
enum Input {
    Chat {
        identity: Identity,
        hostmask: Option<Hostmask>,
        text: String,
    },
    /// Identity-service reply about `identity`.
    ServiceReply { identity: Identity, text: String },
    Disconnect,
    Reconnect,
}

fn parse_input(line: &str, service: &Identity) -> Option<Input> {
    let line = line.trim();
    match line {
        "" => return None,
        "/disconnect" => return Some(Input::Disconnect),
        "/reconnect" => return Some(Input::Reconnect),
        _ => {}
    }

    let (sender, text) = line.split_once(':')?;
    let text = text.trim();
    let (nick, hostmask) = match sender.split_once('!') {
        Some((nick, rest)) => {
            let (user, host) = rest.split_once('@')?;
            (nick, Some(Hostmask::new(nick, user, host)))
        }
        None => (sender, None),
    };
    let identity = Identity::new(nick).ok()?;

    if &identity == service {
        let (about, reply) = text.split_once(' ')?;
        return Some(Input::ServiceReply {
            identity: Identity::new(about).ok()?,
            text: reply.to_string(),
        });
    }
    Some(Input::Chat {
        identity,
        hostmask,
        text: text.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init("info,quizzer_round=debug")?;

    let mut args = std::env::args().skip(1);
    let bank = match args.next() {
        Some(path) => QuestionBank::load(path).await?,
        None => QuestionBank::from_json_str(SAMPLE_QUESTIONS)?,
    };
    let config = match args.next() {
        Some(path) => QuizzerConfig::load(path).await?,
        None => QuizzerConfig::from_json_str(SAMPLE_CONFIG)?,
    };
    let service = Identity::new(&config.registrar_service)?;

    let outbox = Arc::new(WriterOutbox::new(config.channel.clone(), tokio::io::stdout()));
    let controller = QuizzerBuilder::new()
        .config(config)
        .build_with_outbox_registrar(outbox, Arc::new(bank), Arc::new(MemoryScores::new()))
        .await?;

    eprintln!("console quiz ready; type `nick: !help` to begin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sweep = tokio::time::interval(SESSION_SWEEP);
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(input) = parse_input(&line, &service) else {
                    continue;
                };
                let result = match input {
                    Input::Chat { identity, hostmask, text } => {
                        controller.handle_line(&identity, hostmask.as_ref(), &text).await
                    }
                    Input::ServiceReply { identity, text } => {
                        let confirmed = info_reply_confirms(&identity, text.split(','));
                        controller.on_external_verification_result(&identity, confirmed).await
                    }
                    Input::Disconnect => {
                        controller.on_disconnect().await;
                        Ok(())
                    }
                    Input::Reconnect => {
                        controller.on_reconnect().await;
                        Ok(())
                    }
                };
                if let Err(e) = result {
                    tracing::debug!(error = %e, kind = ?e.kind(), "command failed");
                }
            }
            _ = sweep.tick() => {
                let expired = controller.expire_stale_sessions().await;
                if expired > 0 {
                    tracing::info!(expired, "stale admin sessions removed");
                }
            }
        }
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}
