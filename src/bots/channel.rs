// ABOUTME: Channel-aware echo bot that only answers @-mentions carrying a trigger keyword
// ABOUTME: Includes mention detection and span-based mention stripping

use anyhow::Result;
use async_trait::async_trait;
use teambots_core::{channels, Activity, Bot, TurnContext};

use super::{echo_text, report_attachments};

pub const DEFAULT_MENTION_TEXT: &str = "echo";

/// Echoes direct messages; in multi-party channels replies only when
/// mentioned and the trigger keyword appears in the rest of the message.
pub struct EchoChannelBot {
    name: String,
    mention_text: String,
}

impl EchoChannelBot {
    pub fn new(name: impl Into<String>, mention_text: Option<String>) -> Self {
        let mention_text = mention_text.unwrap_or_else(|| DEFAULT_MENTION_TEXT.to_string());
        let name = name.into();
        tracing::info!(bot = %name, trigger = %mention_text, "Channel echo bot initialized");
        Self { name, mention_text }
    }

    pub fn mention_text(&self) -> &str {
        &self.mention_text
    }
}

#[async_trait]
impl Bot for EchoChannelBot {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_message_activity(&self, ctx: &mut TurnContext) -> Result<()> {
        if ctx.activity().is_channel_conversation() {
            tracing::debug!(bot = %self.name, text = %ctx.activity().text_or_empty(), "Received channel message");

            if was_bot_mentioned(ctx.activity(), &self.name) {
                let message = remove_mentions(ctx.activity());
                if contains_ignore_case(&message, &self.mention_text) {
                    ctx.send_activity(format!("Echo: {}", message)).await?;
                    tracing::debug!(bot = %self.name, "Sent echo response to channel message");
                }
            }
        } else {
            echo_text(ctx).await?;
        }

        report_attachments(ctx).await
    }
}

/// Whether the activity addresses the bot.
///
/// On Teams a mention entity whose account id is the recipient counts.
/// Otherwise, or when no such entity exists, the bot name appearing
/// anywhere in the text counts.
pub fn was_bot_mentioned(activity: &Activity, bot_name: &str) -> bool {
    if activity.channel_id == channels::MSTEAMS {
        let bot_id = activity.recipient.id.as_str();
        let mentioned = activity
            .mentions()
            .any(|m| m.mentioned.as_ref().is_some_and(|who| who.id == bot_id));
        if mentioned {
            return true;
        }
    }
    !bot_name.is_empty() && contains_ignore_case(activity.text_or_empty(), bot_name)
}

/// Message text with every mention removed, trimmed.
///
/// Mentions with a `[startIndex, endIndex)` character span are cut by
/// position, highest start first, so earlier offsets stay valid. Spans that
/// overlap an earlier span or fall outside the text are skipped.
/// Mentions without a span remove the first occurrence of their text.
pub fn remove_mentions(activity: &Activity) -> String {
    let text = activity.text_or_empty();
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = boundaries.len() - 1;

    let mut spans = Vec::new();
    let mut by_text = Vec::new();
    for mention in activity.mentions() {
        match (mention.start_index, mention.end_index) {
            (Some(start), Some(end)) if start < end && end <= char_len => {
                spans.push((boundaries[start], boundaries[end]));
            }
            (Some(start), Some(end)) => {
                tracing::debug!(start, end, char_len, "Skipping mention span outside message text");
            }
            _ => {
                if let Some(t) = mention.text.as_deref().filter(|t| !t.is_empty()) {
                    by_text.push(t);
                }
            }
        }
    }

    // Earliest start wins; for equal starts the longer span wins
    spans.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
    let mut kept: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
    for (start, end) in spans {
        if kept.last().is_some_and(|&(_, prev_end)| start < prev_end) {
            continue;
        }
        kept.push((start, end));
    }

    let mut result = text.to_string();
    for (start, end) in kept.into_iter().rev() {
        result.replace_range(start..end, "");
    }

    for mention_text in by_text {
        if let Some(pos) = result.find(mention_text) {
            result.replace_range(pos..pos + mention_text.len(), "");
        }
    }

    result.trim().to_string()
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use teambots_core::testing::{message_activity, teams_channel_activity, RecordingConnector};
    use teambots_core::{Attachment, ChannelAccount, Entity, TurnState};

    fn bot_account() -> ChannelAccount {
        ChannelAccount::with_name("bot-1", "Bot")
    }

    fn mentioned(text: &str, start: usize, end: usize) -> Activity {
        let mut activity = teams_channel_activity(text);
        let span: String = text.chars().skip(start).take(end - start).collect();
        activity.entities = vec![Entity::mention(bot_account(), span, start, end)];
        activity
    }

    async fn run(bot: &EchoChannelBot, activity: Activity) -> Vec<String> {
        let connector = RecordingConnector::new();
        let mut ctx = TurnContext::new(activity, Arc::new(connector.clone()), TurnState::default());
        bot.on_turn(&mut ctx).await.unwrap();
        connector.sent_texts()
    }

    #[test]
    fn test_remove_single_leading_mention() {
        let activity = mentioned("@Bot please echo this", 0, 4);
        assert_eq!(remove_mentions(&activity), "please echo this");
    }

    #[test]
    fn test_remove_mentions_out_of_order_entities() {
        let mut activity = teams_channel_activity("@Ann and @Bot echo");
        activity.entities = vec![
            Entity::mention(ChannelAccount::new("u-ann"), "@Ann", 0, 4),
            Entity::mention(bot_account(), "@Bot", 9, 13),
        ];
        assert_eq!(remove_mentions(&activity), "and  echo");

        activity.entities.reverse();
        assert_eq!(remove_mentions(&activity), "and  echo");
    }

    #[test]
    fn test_remove_mentions_skips_overlap_and_out_of_range() {
        let mut activity = teams_channel_activity("@Bot hi");
        activity.entities = vec![
            Entity::mention(bot_account(), "@Bot", 0, 4),
            Entity::mention(bot_account(), "Bo", 1, 3),
            Entity::mention(bot_account(), "??", 5, 40),
        ];
        assert_eq!(remove_mentions(&activity), "hi");
    }

    #[test]
    fn test_remove_mentions_uses_char_offsets() {
        let mut activity = teams_channel_activity("é @Bot echo");
        activity.entities = vec![Entity::mention(bot_account(), "@Bot", 2, 6)];
        assert_eq!(remove_mentions(&activity), "é  echo");
    }

    #[test]
    fn test_remove_mentions_without_span_falls_back_to_text() {
        let mut activity = teams_channel_activity("<at>Bot</at> echo me");
        let mut entity = Entity::mention(bot_account(), "<at>Bot</at>", 0, 0);
        entity.start_index = None;
        entity.end_index = None;
        activity.entities = vec![entity];
        assert_eq!(remove_mentions(&activity), "echo me");
    }

    #[test]
    fn test_mention_by_id_on_teams() {
        let activity = mentioned("@Helper echo", 0, 7);
        assert!(was_bot_mentioned(&activity, "Somebody"));
    }

    #[test]
    fn test_mention_by_name_fallback_is_case_insensitive() {
        let mut activity = message_activity("hey EDU, echo please");
        activity.channel_id = "slack".to_string();
        assert!(was_bot_mentioned(&activity, "edu"));
        assert!(!was_bot_mentioned(&activity, "other"));
    }

    #[test]
    fn test_mention_of_someone_else_on_teams() {
        let mut activity = teams_channel_activity("@Ann echo");
        activity.entities = vec![Entity::mention(ChannelAccount::new("u-ann"), "@Ann", 0, 4)];
        assert!(!was_bot_mentioned(&activity, "Bot"));
    }

    #[tokio::test]
    async fn test_channel_reply_requires_trigger() {
        let bot = EchoChannelBot::new("Bot", Some("echo".to_string()));

        let replies = run(&bot, mentioned("@Bot please say hi", 0, 4)).await;
        assert!(replies.is_empty());

        let replies = run(&bot, mentioned("@Bot please echo this", 0, 4)).await;
        assert_eq!(replies, vec!["Echo: please echo this".to_string()]);

        let replies = run(&bot, mentioned("@Bot please echo this back", 0, 4)).await;
        assert_eq!(replies, vec!["Echo: please echo this back".to_string()]);
    }

    #[tokio::test]
    async fn test_channel_trigger_is_case_insensitive() {
        let bot = EchoChannelBot::new("Bot", None);
        let replies = run(&bot, mentioned("@Bot ECHO", 0, 4)).await;
        assert_eq!(replies, vec!["Echo: ECHO".to_string()]);
    }

    #[tokio::test]
    async fn test_channel_without_mention_is_ignored() {
        let bot = EchoChannelBot::new("Helper", None);
        let replies = run(&bot, teams_channel_activity("please echo this")).await;
        assert!(replies.is_empty());
    }

    #[tokio::test]
    async fn test_direct_message_echoes() {
        let bot = EchoChannelBot::new("Bot", None);
        let replies = run(&bot, message_activity("hello")).await;
        assert_eq!(replies, vec!["You said: hello".to_string()]);
    }

    #[tokio::test]
    async fn test_attachments_reported_in_channel() {
        let bot = EchoChannelBot::new("Helper", None);
        let mut activity = teams_channel_activity("no mention here");
        activity.attachments = vec![Attachment::default()];
        let replies = run(&bot, activity).await;
        assert_eq!(replies, vec!["You sent 1 attachment(s).".to_string()]);
    }
}
