// ABOUTME: Per-turn context handed to a bot: inbound activity, state, outbound sends
// ABOUTME: Replies are addressed back into the inbound conversation automatically

use anyhow::Result;
use std::sync::Arc;

use crate::activity::{Activity, ConversationReference, TeamsChannelAccount};
use crate::state::TurnState;
use crate::traits::{ChannelConnector, ResourceResponse};

/// HTTP status returned to the channel when the bot does not override it
pub const DEFAULT_TURN_STATUS: u16 = 200;

pub struct TurnContext {
    activity: Activity,
    reference: ConversationReference,
    connector: Arc<dyn ChannelConnector>,
    state: TurnState,
    status: u16,
    sent: Vec<ResourceResponse>,
}

impl std::fmt::Debug for TurnContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnContext")
            .field("activity_type", &self.activity.activity_type)
            .field("conversation", &self.activity.conversation.id)
            .field("connector", &"<ChannelConnector>")
            .field("status", &self.status)
            .field("sent", &self.sent.len())
            .finish()
    }
}

impl TurnContext {
    pub fn new(activity: Activity, connector: Arc<dyn ChannelConnector>, state: TurnState) -> Self {
        let reference = activity.conversation_reference();
        Self {
            activity,
            reference,
            connector,
            state,
            status: DEFAULT_TURN_STATUS,
            sent: Vec::new(),
        }
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    pub fn conversation_reference(&self) -> &ConversationReference {
        &self.reference
    }

    pub fn state(&self) -> &TurnState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut TurnState {
        &mut self.state
    }

    /// Send a reply into the inbound conversation
    pub async fn send_activity(&mut self, activity: impl Into<Activity>) -> Result<ResourceResponse> {
        let outbound = activity.into().apply_conversation_reference(&self.reference);
        let response = self.connector.send_activity(&outbound).await?;
        tracing::debug!(
            conversation = %self.reference.conversation.id,
            activity_type = %outbound.activity_type,
            "Sent activity"
        );
        self.sent.push(response.clone());
        Ok(response)
    }

    /// Look up a conversation member's full profile
    pub async fn get_member(&self, member_id: &str) -> Result<TeamsChannelAccount> {
        self.connector.get_member(&self.reference, member_id).await
    }

    /// Whether anything was sent during this turn
    pub fn responded(&self) -> bool {
        !self.sent.is_empty()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.len()
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Override the HTTP status acknowledged to the channel
    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }
}
