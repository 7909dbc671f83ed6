// ABOUTME: Teams channel listener that logs who posted what in which team and channel
// ABOUTME: Resolves the sender's member profile; lookup failures end the turn silently

use anyhow::Result;
use async_trait::async_trait;
use teambots_core::{channels, Bot, TurnContext};

use super::{echo_text, report_attachments};

pub const ACKNOWLEDGEMENT: &str = "Message received and processed.";

pub struct TeamsListenerBot {
    name: String,
}

impl TeamsListenerBot {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Bot for TeamsListenerBot {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_message_activity(&self, ctx: &mut TurnContext) -> Result<()> {
        let activity = ctx.activity();
        if activity.channel_id != channels::MSTEAMS || !activity.is_channel_conversation() {
            echo_text(ctx).await?;
            return report_attachments(ctx).await;
        }

        let sender_id = activity.from.id.clone();
        let sender = match ctx.get_member(&sender_id).await {
            Ok(sender) => sender,
            Err(e) => {
                tracing::error!(bot = %self.name, sender = %sender_id, error = %e, "Error getting user profile");
                return Ok(());
            }
        };

        let activity = ctx.activity();
        let team_name = activity
            .teams_team_info()
            .and_then(|team| team.name)
            .unwrap_or_default();
        let timestamp = activity
            .timestamp
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();

        tracing::info!(
            bot = %self.name,
            team = %team_name,
            channel_id = %activity.conversation.id,
            "Channel message"
        );
        tracing::info!(
            bot = %self.name,
            user_id = %sender.id,
            user_name = %sender.name.as_deref().unwrap_or_default(),
            timestamp = %timestamp,
            text = %activity.text_or_empty(),
            "Message from channel member"
        );

        ctx.send_activity(ACKNOWLEDGEMENT).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use teambots_core::testing::{message_activity, teams_channel_activity, RecordingConnector};
    use teambots_core::{Activity, TeamsChannelAccount, TurnState};

    async fn run(connector: &RecordingConnector, activity: Activity) {
        let mut ctx = TurnContext::new(activity, Arc::new(connector.clone()), TurnState::default());
        TeamsListenerBot::new("listener")
            .on_turn(&mut ctx)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_channel_message_acknowledged_after_lookup() {
        let connector = RecordingConnector::new().with_member(TeamsChannelAccount {
            id: "user-1".to_string(),
            name: Some("Ada Lovelace".to_string()),
            ..Default::default()
        });
        let mut activity = teams_channel_activity("status update");
        activity.channel_data = Some(serde_json::json!({ "team": { "id": "t1", "name": "Ops" } }));

        run(&connector, activity).await;

        assert_eq!(connector.sent_texts(), vec![ACKNOWLEDGEMENT.to_string()]);
    }

    #[tokio::test]
    async fn test_lookup_failure_sends_nothing() {
        let connector = RecordingConnector::new();
        run(&connector, teams_channel_activity("status update")).await;
        assert!(connector.sent().is_empty());
    }

    #[tokio::test]
    async fn test_direct_message_falls_back_to_echo() {
        let connector = RecordingConnector::new();
        run(&connector, message_activity("hi")).await;
        assert_eq!(connector.sent_texts(), vec!["You said: hi".to_string()]);
    }
}
