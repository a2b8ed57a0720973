//! Multi-model chat context.
//!
//! Replies in the history buffer may come from any of the installed models.
//! When composing a request for the selected model, replies written by a
//! *different* model are prefixed with `[name]: ` so the active model can tell
//! its own turns from someone else's.
//!
//! ```text
//! history (oldest → newest)          messages sent
//! ("hi", "Hello!", tinydolphin)  ─▶  user: hi
//!                                    assistant: [tinydolphin]: Hello!
//! ("and you?", "Fine.", llama3.2)─▶  user: and you?
//!                                    assistant: Fine.
//! transcript                     ─▶  user: <transcript>
//! ```

use crate::llm::chat::{ChatMessage, Role};
use crate::pipeline::HistoryEntry;

/// Name shown on the display and in prompts: the tag before `:`.
///
/// ```
/// use roverseer::llm::display_name;
///
/// assert_eq!(display_name("tinydolphin:1.1b"), "tinydolphin");
/// assert_eq!(display_name("phi"), "phi");
/// ```
pub fn display_name(model: &str) -> &str {
    model.split(':').next().unwrap_or(model)
}

/// System prompt telling `model` who it is and how foreign replies are marked.
pub fn system_prompt(model: &str) -> String {
    format!(
        "You are RoverSeer, a helpful voice assistant. Keep responses concise and conversational. \
         You are currently running as model '{}'. \
         Previous responses may be from different models, indicated by [model_name]: prefix. \
         You can reference what other models said if asked.",
        display_name(model)
    )
}

/// User/assistant turns for `history` followed by `transcript`.
///
/// No system message is included; see [`with_system_message`].
pub fn compose_messages(history: &[HistoryEntry], model: &str, transcript: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 1);

    for entry in history {
        messages.push(ChatMessage::user(entry.user_text.as_str()));
        let reply = if entry.model == model {
            entry.reply_text.clone()
        } else {
            format!("[{}]: {}", display_name(&entry.model), entry.reply_text)
        };
        messages.push(ChatMessage::assistant(reply));
    }

    messages.push(ChatMessage::user(transcript));
    messages
}

/// Put `system` first unless the caller already supplied a system message.
pub fn with_system_message(mut messages: Vec<ChatMessage>, system: Option<&str>) -> Vec<ChatMessage> {
    if let Some(system) = system {
        if !messages.iter().any(|m| m.role == Role::System) {
            messages.insert(0, ChatMessage::system(system));
        }
    }
    messages
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIVE: &str = "llama3.2:1b";

    #[test]
    fn empty_history_is_just_the_transcript() {
        let messages = compose_messages(&[], ACTIVE, "what time is it");
        assert_eq!(messages, vec![ChatMessage::user("what time is it")]);
    }

    #[test]
    fn own_replies_are_unprefixed() {
        let history = [HistoryEntry::new("hi", "Hello!", ACTIVE)];
        let messages = compose_messages(&history, ACTIVE, "again");
        assert_eq!(messages[1], ChatMessage::assistant("Hello!"));
    }

    #[test]
    fn foreign_replies_carry_model_prefix() {
        let history = [
            HistoryEntry::new("hi", "Hello!", "tinydolphin:1.1b"),
            HistoryEntry::new("and you?", "Fine.", ACTIVE),
        ];
        let messages = compose_messages(&history, ACTIVE, "who spoke first?");
        assert_eq!(
            messages,
            vec![
                ChatMessage::user("hi"),
                ChatMessage::assistant("[tinydolphin]: Hello!"),
                ChatMessage::user("and you?"),
                ChatMessage::assistant("Fine."),
                ChatMessage::user("who spoke first?"),
            ]
        );
    }

    #[test]
    fn same_base_different_tag_counts_as_foreign() {
        let history = [HistoryEntry::new("q", "a", "llama3.2:3b")];
        let messages = compose_messages(&history, ACTIVE, "t");
        assert_eq!(messages[1].content, "[llama3.2]: a");
    }

    #[test]
    fn system_prompt_names_the_model_without_tag() {
        let prompt = system_prompt("tinydolphin:1.1b");
        assert!(prompt.starts_with("You are RoverSeer"));
        assert!(prompt.contains("model 'tinydolphin'"));
        assert!(prompt.contains("[model_name]: prefix"));
    }

    #[test]
    fn system_message_is_inserted_first() {
        let messages = with_system_message(vec![ChatMessage::user("hi")], Some("be brief"));
        assert_eq!(messages[0], ChatMessage::system("be brief"));
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn existing_system_message_wins() {
        let messages = with_system_message(
            vec![ChatMessage::system("mine"), ChatMessage::user("hi")],
            Some("theirs"),
        );
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "mine");
    }

    #[test]
    fn no_system_message_leaves_list_untouched() {
        let original = vec![ChatMessage::user("hi")];
        assert_eq!(with_system_message(original.clone(), None), original);
    }
}
