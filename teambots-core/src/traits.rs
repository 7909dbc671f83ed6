// ABOUTME: Capability traits at the seams: the Bot contract and the outbound channel connector
// ABOUTME: Bots are independent types implementing one trait; no base-class hierarchy

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::activity::{activity_types, Activity, ChannelAccount, ConversationReference, TeamsChannelAccount};
use crate::turn::TurnContext;

/// Identifier the channel assigns to an activity we sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceResponse {
    #[serde(default)]
    pub id: String,
}

/// Outbound side of the channel protocol.
///
/// Sends replies into a conversation and resolves member profiles. One
/// connector is built per bot since it carries that bot's credentials.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Deliver an already-addressed activity to its conversation
    async fn send_activity(&self, activity: &Activity) -> Result<ResourceResponse>;

    /// Fetch the full profile of a conversation member
    async fn get_member(
        &self,
        reference: &ConversationReference,
        member_id: &str,
    ) -> Result<TeamsChannelAccount>;
}

/// One bot: handles a single turn at a time.
///
/// `on_turn` routes by activity type; implementors normally override only
/// the hooks they care about.
#[async_trait]
pub trait Bot: Send + Sync {
    /// Display name, also used for name-based mention detection
    fn name(&self) -> &str;

    async fn on_turn(&self, ctx: &mut TurnContext) -> Result<()> {
        match ctx.activity().activity_type.as_str() {
            activity_types::MESSAGE => self.on_message_activity(ctx).await,
            activity_types::CONVERSATION_UPDATE => {
                let bot_id = ctx.activity().recipient.id.clone();
                let added: Vec<ChannelAccount> = ctx
                    .activity()
                    .members_added
                    .iter()
                    .filter(|m| m.id != bot_id)
                    .cloned()
                    .collect();
                if added.is_empty() {
                    return Ok(());
                }
                self.on_members_added(&added, ctx).await
            }
            _ => self.on_unrecognized_activity(ctx).await,
        }
    }

    async fn on_message_activity(&self, ctx: &mut TurnContext) -> Result<()>;

    /// Members other than the bot joined the conversation
    async fn on_members_added(
        &self,
        _members: &[ChannelAccount],
        _ctx: &mut TurnContext,
    ) -> Result<()> {
        Ok(())
    }

    async fn on_unrecognized_activity(&self, ctx: &mut TurnContext) -> Result<()> {
        tracing::debug!(
            bot = %self.name(),
            activity_type = %ctx.activity().activity_type,
            "Ignoring unhandled activity type"
        );
        Ok(())
    }
}
