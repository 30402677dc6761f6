// src/cli/progress.rs — Terminal progress renderer for agent turns

use crate::agent::{RunStatus, TurnEvent};

/// Status checks between "still working" notices (about 5s at the default interval).
const STILL_WORKING_EVERY: u32 = 10;

/// Build a progress callback that writes to stderr, keeping stdout for replies.
pub fn terminal_progress() -> impl Fn(TurnEvent) + Send + Sync + 'static {
    move |event| {
        if let Some(line) = format_event(&event) {
            eprintln!("{line}");
        }
    }
}

fn format_event(event: &TurnEvent) -> Option<String> {
    match event {
        TurnEvent::WaitingOnPrevious { run_id } => Some(format!(
            "[agent] waiting for earlier run {run_id} to finish..."
        )),
        TurnEvent::MessageSent => None,
        TurnEvent::RunStarted { .. } => Some("[agent] thinking...".to_string()),
        TurnEvent::StatusCheck { check, status }
            if status.is_pending() && check % STILL_WORKING_EVERY == 0 =>
        {
            Some(format!("[agent] still working ({check} checks, {status})"))
        }
        TurnEvent::StatusCheck { .. } => None,
        TurnEvent::RunFinished { status, .. } if *status == RunStatus::Completed => None,
        TurnEvent::RunFinished { status, checks } => Some(format!(
            "[agent] run ended as {status} after {checks} check(s)"
        )),
        TurnEvent::Abandoned { run_id } => Some(format!("[agent] gave up on run {run_id}")),
    }
}
