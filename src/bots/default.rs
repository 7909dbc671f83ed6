// ABOUTME: Generic bot mounted for names with no registered implementation
// ABOUTME: Echoes messages and greets members who join the conversation

use anyhow::Result;
use async_trait::async_trait;
use teambots_core::{Bot, ChannelAccount, TurnContext};

use super::{echo_text, report_attachments};

pub struct DefaultBot {
    name: String,
    welcome_message: Option<String>,
}

impl DefaultBot {
    pub fn new(name: impl Into<String>, welcome_message: Option<String>) -> Self {
        Self {
            name: name.into(),
            welcome_message,
        }
    }

    pub fn welcome_message(&self) -> Option<&str> {
        self.welcome_message.as_deref()
    }
}

#[async_trait]
impl Bot for DefaultBot {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_message_activity(&self, ctx: &mut TurnContext) -> Result<()> {
        echo_text(ctx).await?;
        report_attachments(ctx).await
    }

    async fn on_members_added(
        &self,
        members: &[ChannelAccount],
        ctx: &mut TurnContext,
    ) -> Result<()> {
        let Some(welcome) = self.welcome_message.as_deref() else {
            return Ok(());
        };
        for member in members {
            tracing::debug!(bot = %self.name, member = %member.id, "Welcoming new member");
            ctx.send_activity(welcome).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use teambots_core::activity_types;
    use teambots_core::testing::{message_activity, RecordingConnector};
    use teambots_core::TurnState;

    #[tokio::test]
    async fn test_welcomes_each_new_member() {
        let connector = RecordingConnector::new();
        let mut activity = message_activity("");
        activity.activity_type = activity_types::CONVERSATION_UPDATE.to_string();
        activity.members_added = vec![
            ChannelAccount::new("bot-1"),
            ChannelAccount::new("user-2"),
            ChannelAccount::new("user-3"),
        ];
        let mut ctx = TurnContext::new(activity, Arc::new(connector.clone()), TurnState::default());

        DefaultBot::new("edu", Some("Welcome to Edu Bot".to_string()))
            .on_turn(&mut ctx)
            .await
            .unwrap();

        assert_eq!(
            connector.sent_texts(),
            vec!["Welcome to Edu Bot".to_string(), "Welcome to Edu Bot".to_string()]
        );
    }

    #[tokio::test]
    async fn test_no_welcome_configured() {
        let connector = RecordingConnector::new();
        let mut activity = message_activity("");
        activity.activity_type = activity_types::CONVERSATION_UPDATE.to_string();
        activity.members_added = vec![ChannelAccount::new("user-2")];
        let mut ctx = TurnContext::new(activity, Arc::new(connector.clone()), TurnState::default());

        DefaultBot::new("edu", None).on_turn(&mut ctx).await.unwrap();

        assert!(connector.sent().is_empty());
    }

    #[tokio::test]
    async fn test_messages_echo() {
        let connector = RecordingConnector::new();
        let mut ctx = TurnContext::new(
            message_activity("hello"),
            Arc::new(connector.clone()),
            TurnState::default(),
        );

        DefaultBot::new("edu", None).on_turn(&mut ctx).await.unwrap();

        assert_eq!(connector.sent_texts(), vec!["You said: hello".to_string()]);
    }
}
