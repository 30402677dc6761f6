// src/cli/ask.rs — One-shot question

use std::path::Path;

use crate::agent::AgentSession;
use crate::extract::Extractor;

/// Join the typed message and any file text into one turn.
pub fn compose_message(message: &[String], attachment: Option<&str>) -> String {
    let typed = message.join(" ");
    let typed = typed.trim();
    match attachment {
        Some(text) if typed.is_empty() => text.to_string(),
        Some(text) => format!("{typed}\n\n{text}"),
        None => typed.to_string(),
    }
}

/// Send one message and print the agent's reply to stdout.
pub async fn run_ask(
    session: &AgentSession,
    extractor: &Extractor,
    message: &[String],
    file: Option<&Path>,
) -> anyhow::Result<()> {
    let attachment = match file {
        Some(path) => Some(extractor.extract_file(path).await?),
        None => None,
    };
    let content = compose_message(message, attachment.as_deref());

    let outcome = session.submit_turn(&content).await?;
    println!("{}", outcome.reply.content());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_compose_message_only() {
        assert_eq!(compose_message(&words("what is on the menu"), None), "what is on the menu");
    }

    #[test]
    fn test_compose_attachment_only() {
        assert_eq!(compose_message(&[], Some("Large pepperoni")), "Large pepperoni");
    }

    #[test]
    fn test_compose_message_and_attachment() {
        assert_eq!(
            compose_message(&words("summarize this"), Some("Line 1\nLine 2")),
            "summarize this\n\nLine 1\nLine 2"
        );
    }

    #[test]
    fn test_compose_nothing_is_empty() {
        assert_eq!(compose_message(&[], None), "");
    }
}
