// src/cli/chat.rs — Interactive REPL

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::agent::AgentSession;
use crate::core::transcript::{render_turn, RenderOrder, Transcript};
use crate::core::Role;
use crate::extract::Extractor;
use crate::infra::config::Config;
use crate::infra::errors::ParleyError;
use crate::util::preview;

/// Session state owned by the REPL loop.
struct ChatState {
    transcript: Transcript,
    turns_sent: u32,
    failures: u32,
    interrupts: Interrupts,
}

#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    TurnCancelled,
    Idle,
}

/// Routes Ctrl-C for the whole REPL: it cancels the turn in flight, or ends
/// the session when nothing is in flight.
#[derive(Clone, Default)]
struct Interrupts {
    in_flight: Arc<Mutex<Option<CancellationToken>>>,
}

impl Interrupts {
    fn begin_turn(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.slot() = Some(token.clone());
        token
    }

    fn end_turn(&self) {
        *self.slot() = None;
    }

    fn interrupt(&self) -> Interrupt {
        match self.slot().take() {
            Some(token) => {
                token.cancel();
                Interrupt::TurnCancelled
            }
            None => Interrupt::Idle,
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Listen for Ctrl-C for the rest of the process.
    fn watch(&self) -> tokio::task::JoinHandle<()> {
        let interrupts = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if interrupts.interrupt() == Interrupt::Idle {
                    eprintln!();
                    std::process::exit(130);
                }
            }
        })
    }
}

/// Run the interactive chat REPL until EOF or /quit.
pub async fn run_chat(
    session: AgentSession,
    extractor: &Extractor,
    config: &Config,
    order: RenderOrder,
) -> anyhow::Result<()> {
    eprintln!(
        "parley v{} | {} | thread {}",
        env!("CARGO_PKG_VERSION"),
        session.assistant().display_name(),
        session.thread_id(),
    );
    eprintln!("Type a message, /help for commands, /quit to leave.\n");

    let mut state = ChatState {
        transcript: Transcript::new(order),
        turns_sent: 0,
        failures: 0,
        interrupts: Interrupts::default(),
    };
    let watcher = state.interrupts.watch();

    while let Some(input) = read_input() {
        let trimmed = input.trim();

        if trimmed == "quit" || trimmed == "exit" || trimmed == "/quit" {
            break;
        }

        if trimmed.starts_with('/') {
            handle_slash_command(trimmed, &mut state, &session, extractor).await;
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        send_turn(&session, &mut state, trimmed).await;
    }
    watcher.abort();

    if config.transcript.autosave && !state.transcript.is_empty() {
        let path = Transcript::default_export_path();
        match state.transcript.save_json(&path) {
            Ok(()) => eprintln!("Transcript saved to {}", path.display()),
            Err(e) => eprintln!("[warn] could not save transcript: {}", e),
        }
    }

    eprintln!(
        "\nSession total: {} message(s) sent, {} failed, {} turn(s) in transcript",
        state.turns_sent,
        state.failures,
        state.transcript.len(),
    );
    Ok(())
}

fn read_input() -> Option<String> {
    use std::io::{self, BufRead, Write};

    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    let mut line = String::new();
    match stdin.lock().read_line(&mut line) {
        Ok(0) => None, // EOF
        Ok(_) => Some(line),
        Err(_) => None,
    }
}

/// Submit one turn; Ctrl-C stops waiting for the reply.
async fn send_turn(session: &AgentSession, state: &mut ChatState, content: &str) {
    let cancel = state.interrupts.begin_turn();
    let result = session.submit_turn_cancellable(content, &cancel).await;
    state.interrupts.end_turn();

    match result {
        Ok(outcome) => {
            state.turns_sent += 1;
            let added = state.transcript.reconcile(&outcome.history);
            let mut printed = false;
            for turn in added.iter().filter(|t| t.role() == Role::Agent) {
                println!("{}\n", render_turn(turn));
                printed = true;
            }
            if !printed {
                if outcome.reply.content().is_empty() {
                    eprintln!("[warn] the assistant returned no text");
                } else {
                    // Reply text already recorded (the agent repeated itself).
                    println!("{}\n", render_turn(&outcome.reply));
                }
            }
            tracing::debug!(
                run_id = %outcome.run_id,
                checks = outcome.status_checks,
                "Turn complete"
            );
        }
        Err(ParleyError::JobFailed {
            run_id,
            status,
            reason,
            last_reply,
            history,
        }) => {
            state.turns_sent += 1;
            state.failures += 1;
            state.transcript.reconcile(&history);
            eprintln!("[error] the assistant could not answer ({status}): {reason}");
            tracing::warn!(run_id = %run_id, "Run did not complete");
            if let Some(reply) = last_reply {
                eprintln!("[last reply] {}", preview(&reply, 200));
            }
        }
        Err(e) if e.is_warning() => eprintln!("[warn] {}", e),
        Err(e) => {
            state.failures += 1;
            eprintln!("[error] {}", e);
        }
    }
}

async fn upload(
    path: &Path,
    session: &AgentSession,
    state: &mut ChatState,
    extractor: &Extractor,
) {
    match extractor.extract_file(path).await {
        Ok(text) => {
            eprintln!(
                "[upload] sending {} chars from {}: {}",
                text.chars().count(),
                path.display(),
                preview(&text, 60)
            );
            send_turn(session, state, &text).await;
        }
        Err(e) if e.is_warning() => eprintln!("[warn] {}", e),
        Err(e) => eprintln!("[error] {}", e),
    }
}

async fn handle_slash_command(
    input: &str,
    state: &mut ChatState,
    session: &AgentSession,
    extractor: &Extractor,
) {
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd {
        "/upload" => {
            if arg.is_empty() {
                eprintln!("  Usage: /upload <file.txt|file.pdf|image.png|image.jpg>");
            } else {
                upload(Path::new(arg), session, state, extractor).await;
            }
        }

        "/history" => {
            if state.transcript.is_empty() {
                eprintln!("  No messages yet.");
            } else {
                for turn in state.transcript.render_order() {
                    println!("{}", render_turn(turn));
                }
                println!();
            }
        }

        "/order" => match arg {
            "" => eprintln!("  Order: {:?}. Usage: /order <oldest|newest>", state.transcript.order()),
            "oldest" => {
                state.transcript.set_order(RenderOrder::OldestFirst);
                eprintln!("  History shows oldest first");
            }
            "newest" => {
                state.transcript.set_order(RenderOrder::NewestFirst);
                eprintln!("  History shows newest first");
            }
            other => eprintln!("  Unknown order '{}'. Use oldest or newest.", other),
        },

        "/save" => {
            let path = if arg.is_empty() {
                Transcript::default_export_path()
            } else {
                PathBuf::from(arg)
            };
            match state.transcript.save_json(&path) {
                Ok(()) => eprintln!("  Saved {} turn(s) to {}", state.transcript.len(), path.display()),
                Err(e) => eprintln!("  [error] {}", e),
            }
        }

        "/status" => {
            eprintln!("  Assistant: {}", session.assistant().display_name());
            eprintln!("  Thread: {}", session.thread_id());
            eprintln!("  Reply timeout: {}s", session.timeout().as_secs());
            eprintln!(
                "  Sent: {} | Failed: {} | Transcript: {} turn(s)",
                state.turns_sent,
                state.failures,
                state.transcript.len()
            );
            if session.has_pending_run().await {
                eprintln!("  An abandoned run may still be running; the next message waits for it.");
            }
        }

        "/help" => {
            eprintln!("Slash commands:");
            eprintln!("  /upload <file>     Send text extracted from a txt, pdf, png or jpg file");
            eprintln!("  /history           Show the conversation");
            eprintln!("  /order [oldest|newest]  Show or set history order");
            eprintln!("  /save [path]       Export the transcript as JSON");
            eprintln!("  /status            Show session status");
            eprintln!("  /help              Show this help");
            eprintln!("  /quit, quit, exit  End session");
            eprintln!();
            eprintln!("Everything else goes to the assistant verbatim, including phrases");
            eprintln!("like \"I'm done\" or \"another scenario\" that the assistant acts on.");
            eprintln!("Ctrl-C stops waiting for a reply, or leaves at the prompt; Ctrl-D ends the session.");
        }

        _ => {
            eprintln!("Unknown command: {}. Type /help for commands.", cmd);
        }
    }
}
