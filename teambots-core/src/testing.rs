// ABOUTME: Test doubles for the channel connector and activity fixtures.
// ABOUTME: RecordingConnector captures every outbound activity instead of calling a channel.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::activity::{
    activity_types, Activity, ChannelAccount, ConversationAccount, ConversationReference,
    TeamsChannelAccount,
};
use crate::traits::{ChannelConnector, ResourceResponse};

#[derive(Default)]
struct RecordingState {
    sent: Vec<Activity>,
    members: HashMap<String, TeamsChannelAccount>,
    fail_sends: bool,
}

/// Connector that records outbound activities and serves canned member profiles
#[derive(Clone, Default)]
pub struct RecordingConnector {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `get_member` succeed for this profile
    pub fn with_member(self, member: TeamsChannelAccount) -> Self {
        self.state
            .lock()
            .unwrap()
            .members
            .insert(member.id.clone(), member);
        self
    }

    /// Make every send fail, to exercise error paths
    pub fn failing_sends(self) -> Self {
        self.state.lock().unwrap().fail_sends = true;
        self
    }

    pub fn sent(&self) -> Vec<Activity> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Text of every sent message activity, in send order
    pub fn sent_texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|a| a.activity_type == activity_types::MESSAGE)
            .filter_map(|a| a.text)
            .collect()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().sent.clear();
    }
}

#[async_trait]
impl ChannelConnector for RecordingConnector {
    async fn send_activity(&self, activity: &Activity) -> Result<ResourceResponse> {
        let mut state = self.state.lock().unwrap();
        if state.fail_sends {
            return Err(anyhow!("channel unavailable"));
        }
        state.sent.push(activity.clone());
        Ok(ResourceResponse {
            id: format!("sent-{}", state.sent.len()),
        })
    }

    async fn get_member(
        &self,
        _reference: &ConversationReference,
        member_id: &str,
    ) -> Result<TeamsChannelAccount> {
        self.state
            .lock()
            .unwrap()
            .members
            .get(member_id)
            .cloned()
            .ok_or_else(|| anyhow!("member {} not found", member_id))
    }
}

/// Direct-message activity from `user-1` to `bot-1` in `conv-1`
pub fn message_activity(text: &str) -> Activity {
    Activity {
        activity_type: activity_types::MESSAGE.to_string(),
        id: Some("activity-1".to_string()),
        service_url: "https://channel.example.test/".to_string(),
        channel_id: "test".to_string(),
        from: ChannelAccount::with_name("user-1", "Ada"),
        recipient: ChannelAccount::with_name("bot-1", "Bot"),
        conversation: ConversationAccount {
            id: "conv-1".to_string(),
            conversation_type: Some("personal".to_string()),
            ..Default::default()
        },
        text: Some(text.to_string()),
        ..Default::default()
    }
}

/// Teams channel post, as the multi-party variant sees it
pub fn teams_channel_activity(text: &str) -> Activity {
    let mut activity = message_activity(text);
    activity.channel_id = crate::activity::channels::MSTEAMS.to_string();
    activity.conversation = ConversationAccount {
        id: "19:channel@thread.tacv2".to_string(),
        conversation_type: Some(crate::activity::CHANNEL_CONVERSATION.to_string()),
        is_group: Some(true),
        ..Default::default()
    };
    activity
}
