//! `serialagent chat` — interactive REPL.
//!
//! Grounded on `crates/gateway/src/cli/chat.rs`'s rustyline loop: a history
//! file under the user's home directory, a handful of slash commands, and a
//! plain `println!` of the response (this core doesn't stream deltas — a
//! turn only produces one `ConversationResponse`, not a token stream).

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::bootstrap::App;
use crate::turn;

const PROMPT: &str = "you> ";

fn history_path() -> Option<std::path::PathBuf> {
    dirs::home_dir().map(|mut p| {
        p.push(".serialagent");
        p.push("chat_history.txt");
        p
    })
}

/// Runs the REPL until the user exits or stdin closes.
pub async fn chat(app: &App, session_key: String) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;
    let history = history_path();
    if let Some(path) = &history {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = editor.load_history(path);
    }

    println!("serialagent — type /help for commands, /exit to quit.");

    let mut session_id: Option<uuid::Uuid> = None;

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);

                if let Some(command) = line.strip_prefix('/') {
                    match command {
                        "exit" | "quit" => break,
                        "help" => print_help(),
                        "clear" => {
                            editor.clear_screen().ok();
                        }
                        "reset" => {
                            session_id = None;
                            println!("session reset.");
                        }
                        "session" => match session_id {
                            Some(id) => println!("session: {id}"),
                            None => println!("no active session yet — send a message first."),
                        },
                        "decisions" => print_recent_decisions(app),
                        other => println!("unknown command: /{other} (try /help)"),
                    }
                    continue;
                }

                match turn::run_turn(app, session_id, &session_key, line).await {
                    Ok(response) => {
                        session_id = Some(response.session_id);
                        println!("{}", response.response_text);
                        if let Some(question) = &response.next_question {
                            println!("{question}");
                        }
                    }
                    Err(e) => eprintln!("error: {e:#}"),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {e}");
                break;
            }
        }
    }

    if let Some(path) = &history {
        let _ = editor.save_history(path);
    }

    Ok(())
}

fn print_help() {
    println!(
        "commands:\n  \
         /session    show the current session id\n  \
         /decisions  show the last few classification/consensus decisions\n  \
         /reset      start a fresh session\n  \
         /clear      clear the screen\n  \
         /help       show this message\n  \
         /exit       leave the REPL (/quit also works)"
    );
}

fn print_recent_decisions(app: &App) {
    let recent = app.decisions.recent(10);
    if recent.is_empty() {
        println!("no decisions recorded yet.");
        return;
    }
    for d in recent {
        println!(
            "[{kind:?}] intent={intent} confidence={confidence:.2} method={method} fallback={fallback}",
            kind = d.kind,
            intent = d.intent,
            confidence = d.confidence,
            method = d.method,
            fallback = d.fallback_used,
        );
    }
}
