//! `serialagent run` — one-shot execution command.
//!
//! Sends a single utterance through the pipeline, prints the response, and
//! exits. Useful for scripting and quick checks.

use crate::bootstrap::App;
use crate::turn;

/// Runs one turn and prints either plain text or the full
/// `ConversationResponse` as JSON. Errors are propagated rather than printed
/// here so the caller can map them to the right exit code per spec §6.
pub async fn run(app: &App, message: String, session_key: String, json_output: bool) -> anyhow::Result<()> {
    // The session store is process-lifetime only (no cross-invocation
    // persistence), so each `run` call gets a fresh session; `session_key`
    // just becomes its user id.
    let response = turn::run_turn(app, None, &session_key, &message).await?;

    if json_output {
        let json = serde_json::to_string_pretty(&response)
            .map_err(|e| anyhow::anyhow!("serializing response: {e}"))?;
        println!("{json}");
    } else {
        println!("{}", response.response_text);
        if let Some(question) = &response.next_question {
            println!("{question}");
        }
    }
    Ok(())
}
