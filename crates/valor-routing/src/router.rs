//! The respond decision for a single inbound message.

use regex::RegexBuilder;
use valor_models::{InboundMessage, ProjectConfig};

/// Greeting substituted when trigger stripping leaves nothing behind.
/// Callers use this instead of enqueueing empty work.
pub const DEFAULT_GREETING: &str = "Hi! How can I help?";

/// Outcome of routing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether this message deserves a response.
    pub respond: bool,
    /// Message text with trigger mentions stripped.
    pub cleaned_text: String,
}

impl Decision {
    fn reject() -> Self {
        Self {
            respond: false,
            cleaned_text: String::new(),
        }
    }

    /// The cleaned text, or the default greeting if stripping left
    /// nothing to work with.
    pub fn cleaned_or_greeting(&self) -> &str {
        if self.cleaned_text.is_empty() {
            DEFAULT_GREETING
        } else {
            &self.cleaned_text
        }
    }
}

/// Decides whether to respond to a message.
///
/// Rules, in order:
/// - our own outgoing messages are always rejected
/// - empty/whitespace-only text is always rejected
/// - DMs follow the global `respond_to_dms` default (project policy
///   does not override DM behavior)
/// - group messages need a resolved project; `respond_to_all`
///   short-circuits, otherwise `respond_to_mentions` requires a
///   trigger substring (case-insensitive)
///
/// Dedup is the caller's responsibility: consult the dedup store
/// before enqueueing, and record the id after.
pub fn route(
    msg: &InboundMessage,
    project: Option<&ProjectConfig>,
    respond_to_dms: bool,
) -> Decision {
    if msg.is_outgoing {
        return Decision::reject();
    }

    let text = msg.text.trim();
    if text.is_empty() {
        return Decision::reject();
    }

    if msg.is_dm {
        return Decision {
            respond: respond_to_dms,
            cleaned_text: text.to_string(),
        };
    }

    let Some(project) = project else {
        return Decision::reject();
    };

    let policy = &project.response_policy;
    let mentioned = policy.respond_to_mentions
        && policy
            .triggers
            .iter()
            .any(|t| contains_ignore_case(text, t));

    if !(policy.respond_to_all || mentioned) {
        return Decision::reject();
    }

    Decision {
        respond: true,
        cleaned_text: strip_triggers(text, &policy.triggers),
    }
}

/// Case-insensitive substring check.
fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Removes every occurrence of every trigger, case-insensitively,
/// along with the whitespace hugging it.
fn strip_triggers(text: &str, triggers: &[String]) -> String {
    let mut cleaned = text.to_string();

    for trigger in triggers {
        let trigger = trigger.trim();
        if trigger.is_empty() {
            continue;
        }
        let pattern = format!(r"\s*{}\s*", regex::escape(trigger));
        let re = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(re) => re,
            Err(_) => continue,
        };
        cleaned = re.replace_all(&cleaned, " ").into_owned();
    }

    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use valor_models::{ProjectConfig, ResponsePolicy};

    fn mention_project(triggers: &[&str]) -> ProjectConfig {
        let mut p = ProjectConfig::new("alpha", "/srv/alpha");
        p.response_policy = ResponsePolicy {
            respond_to_all: false,
            respond_to_mentions: true,
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
        };
        p
    }

    fn respond_all_project() -> ProjectConfig {
        let mut p = ProjectConfig::new("alpha", "/srv/alpha");
        p.response_policy.respond_to_all = true;
        p
    }

    #[test]
    fn test_outgoing_always_rejected() {
        let project = respond_all_project();
        let msg = InboundMessage::group(1, 1, "@bot do things").outgoing();
        assert!(!route(&msg, Some(&project), true).respond);

        let dm = InboundMessage::dm(1, 2, "hello").outgoing();
        assert!(!route(&dm, None, true).respond);
    }

    #[test]
    fn test_empty_text_rejected() {
        let project = respond_all_project();
        for text in ["", "   ", "\n\t"] {
            let msg = InboundMessage::group(1, 1, text);
            assert!(!route(&msg, Some(&project), true).respond);
        }
    }

    #[test]
    fn test_dm_follows_global_default() {
        let msg = InboundMessage::dm(1, 1, "hello");
        assert!(route(&msg, None, true).respond);
        assert!(!route(&msg, None, false).respond);
    }

    #[test]
    fn test_group_without_project_rejected() {
        let msg = InboundMessage::group(1, 1, "hello everyone");
        assert!(!route(&msg, None, true).respond);
    }

    #[test]
    fn test_respond_to_all_short_circuits() {
        let project = respond_all_project();
        let msg = InboundMessage::group(1, 1, "no trigger here");
        assert!(route(&msg, Some(&project), false).respond);
    }

    #[test]
    fn test_mention_required_when_configured() {
        let project = mention_project(&["@bot"]);

        let plain = InboundMessage::group(1, 1, "just chatting");
        assert!(!route(&plain, Some(&project), false).respond);

        let mentioned = InboundMessage::group(1, 2, "@bot please build X");
        let decision = route(&mentioned, Some(&project), false);
        assert!(decision.respond);
        assert_eq!(decision.cleaned_text, "please build X");
    }

    #[test]
    fn test_trigger_match_is_case_insensitive() {
        let project = mention_project(&["valor"]);
        let msg = InboundMessage::group(1, 1, "Hey Valor, ping");
        let decision = route(&msg, Some(&project), false);

        assert!(decision.respond);
        assert!(!decision.cleaned_text.to_lowercase().contains("valor"));
    }

    #[test]
    fn test_all_trigger_occurrences_stripped() {
        let project = mention_project(&["@bot"]);
        let msg = InboundMessage::group(1, 1, "@bot hello @BOT again @bot");
        let decision = route(&msg, Some(&project), false);

        assert!(decision.respond);
        assert!(!decision.cleaned_text.to_lowercase().contains("@bot"));
        assert!(decision.cleaned_text.contains("hello"));
        assert!(decision.cleaned_text.contains("again"));
    }

    #[test]
    fn test_trigger_only_message_yields_greeting() {
        let project = mention_project(&["@bot"]);
        let msg = InboundMessage::group(1, 1, "@bot");
        let decision = route(&msg, Some(&project), false);

        assert!(decision.respond);
        assert!(decision.cleaned_text.is_empty());
        assert_eq!(decision.cleaned_or_greeting(), DEFAULT_GREETING);
    }

    #[test]
    fn test_regex_metacharacters_in_triggers_are_literal() {
        let project = mention_project(&["c++bot"]);
        let msg = InboundMessage::group(1, 1, "c++bot review this");
        let decision = route(&msg, Some(&project), false);

        assert!(decision.respond);
        assert_eq!(decision.cleaned_text, "review this");
    }
}
