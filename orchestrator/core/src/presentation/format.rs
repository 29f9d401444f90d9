// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Text rendering of message lists returned to agents.

use std::fmt::Write;

use crate::domain::session::CoralAgentGraphSession;
use crate::domain::thread::{Message, ThreadId};

/// Escape the five XML special characters.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render messages grouped by thread, in order of first appearance, as an
/// XML-like block with each thread's status and participants.
pub fn format_messages(messages: &[Message], session: &CoralAgentGraphSession) -> String {
    let mut thread_order: Vec<ThreadId> = Vec::new();
    for message in messages {
        if !thread_order.contains(&message.thread_id) {
            thread_order.push(message.thread_id);
        }
    }

    // Writing into a String cannot fail.
    let mut out = String::from("<messages>\n");
    for thread_id in thread_order {
        let thread = session.get_thread(&thread_id);
        let name = thread.as_ref().map(|t| t.name.as_str()).unwrap_or("Unknown");
        let _ = writeln!(out, "  <thread id=\"{}\" name=\"{}\">", thread_id, escape(name));

        match &thread {
            Some(t) if t.is_closed => {
                out.push_str("    <status>closed</status>\n");
                let summary = t.summary.as_deref().unwrap_or("No summary provided");
                let _ = writeln!(out, "    <summary>{}</summary>", escape(summary));
            }
            _ => out.push_str("    <status>open</status>\n"),
        }

        out.push_str("    <participants>\n");
        if let Some(t) = &thread {
            for participant in t.participants() {
                let _ = writeln!(out, "      <participant id=\"{}\" />", escape(participant));
            }
        }
        out.push_str("    </participants>\n");

        out.push_str("    <messages>\n");
        for message in messages.iter().filter(|m| m.thread_id == thread_id) {
            let _ = writeln!(
                out,
                "      <message id=\"{}\" timestamp=\"{}\">",
                message.id, message.timestamp
            );
            let _ = writeln!(out, "        <sender id=\"{}\" />", escape(&message.sender_id));
            if !message.mentions.is_empty() {
                out.push_str("        <mentions>\n");
                for mention in &message.mentions {
                    let _ = writeln!(out, "          <mention id=\"{}\" />", escape(mention));
                }
                out.push_str("        </mentions>\n");
            }
            let _ = writeln!(out, "        <content>{}</content>", escape(&message.content));
            out.push_str("      </message>\n");
        }
        out.push_str("    </messages>\n");
        out.push_str("  </thread>\n");
    }
    out.push_str("</messages>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::Agent;

    #[test]
    fn test_escape() {
        assert_eq!(escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&apos;");
    }

    #[test]
    fn test_format_groups_by_thread_and_escapes_content() {
        let session = CoralAgentGraphSession::new("s", "app", "key", vec![]);
        session.register_agent(Agent::new("alice"));
        session.register_agent(Agent::new("bob"));
        let thread = session
            .create_thread("plan & build", "alice", &["bob".to_string()])
            .unwrap();
        let message = session
            .send_message(&thread.id, "alice", "1 < 2", &["bob".to_string()])
            .unwrap();

        let text = format_messages(&[message], &session);
        assert!(text.starts_with("<messages>\n"));
        assert!(text.contains("name=\"plan &amp; build\""));
        assert!(text.contains("<status>open</status>"));
        assert!(text.contains("<participant id=\"bob\" />"));
        assert!(text.contains("<mention id=\"bob\" />"));
        assert!(text.contains("<content>1 &lt; 2</content>"));
        assert!(text.ends_with("</messages>"));
    }

    #[test]
    fn test_format_closed_thread_shows_summary() {
        let session = CoralAgentGraphSession::new("s", "app", "key", vec![]);
        session.register_agent(Agent::new("alice"));
        let thread = session.create_thread("t", "alice", &[]).unwrap();
        session.close_thread(&thread.id, "all done");

        let messages = session.unread_messages_for_agent("alice");
        let text = format_messages(&messages, &session);
        assert!(text.contains("<status>closed</status>"));
        assert!(text.contains("<summary>all done</summary>"));
        assert!(text.contains("<sender id=\"system\" />"));
    }
}
