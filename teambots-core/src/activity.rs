// ABOUTME: Wire model for Bot Framework activities exchanged with channels
// ABOUTME: Deserializes inbound webhook payloads and builds replies, traces and references

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ActivityError;

/// Activity type names used by the channel protocol
pub mod activity_types {
    pub const MESSAGE: &str = "message";
    pub const CONVERSATION_UPDATE: &str = "conversationUpdate";
    pub const TYPING: &str = "typing";
    pub const TRACE: &str = "trace";
}

/// Channel ids with behaviour specific to them
pub mod channels {
    pub const MSTEAMS: &str = "msteams";
    pub const EMULATOR: &str = "emulator";
}

/// Conversation type reported by Teams for multi-party channel posts
pub const CHANNEL_CONVERSATION: &str = "channel";

/// Entity type marking an @-mention inside the message text
pub const MENTION_ENTITY: &str = "mention";

/// A user or bot identity on a channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad_object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_name(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_group: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default)]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Metadata entity attached to an activity.
///
/// Mentions carry the mentioned account, the mention text as it appears in
/// the message, and optionally the character span it occupies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(rename = "type", default)]
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentioned: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_index: Option<usize>,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl Entity {
    /// Mention entity covering `[start, end)` of the message text
    pub fn mention(mentioned: ChannelAccount, text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            entity_type: MENTION_ENTITY.to_string(),
            mentioned: Some(mentioned),
            text: Some(text.into()),
            start_index: Some(start),
            end_index: Some(end),
            properties: Map::new(),
        }
    }

    pub fn is_mention(&self) -> bool {
        self.entity_type == MENTION_ENTITY
    }
}

/// Team metadata Teams puts under `channelData.team`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad_group_id: Option<String>,
}

/// Full member profile returned by the Teams member directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamsChannelAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_principal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad_object_id: Option<String>,
}

/// Enough of an activity to address a reply to the same conversation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    pub user: ChannelAccount,
    pub bot: ChannelAccount,
    pub conversation: ConversationAccount,
    pub channel_id: String,
    pub service_url: String,
}

/// One inbound or outbound message unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type", default)]
    pub activity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub service_url: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub from: ChannelAccount,
    #[serde(default)]
    pub recipient: ChannelAccount,
    #[serde(default)]
    pub conversation: ConversationAccount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_added: Vec<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_removed: Vec<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
}

impl Activity {
    /// Parse a raw webhook body and check the fields routing depends on
    pub fn from_slice(body: &[u8]) -> Result<Self, ActivityError> {
        let activity: Activity =
            serde_json::from_slice(body).map_err(|e| ActivityError::Malformed(e.to_string()))?;
        activity.validate()?;
        Ok(activity)
    }

    pub fn validate(&self) -> Result<(), ActivityError> {
        if self.activity_type.trim().is_empty() {
            return Err(ActivityError::MissingField("type"));
        }
        if self.conversation.id.trim().is_empty() {
            return Err(ActivityError::MissingField("conversation.id"));
        }
        Ok(())
    }

    /// Outbound plain-text message; addressing is filled in when sent
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            activity_type: activity_types::MESSAGE.to_string(),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Trace activity carrying a raw value, shown by the emulator
    pub fn trace(
        name: impl Into<String>,
        label: impl Into<String>,
        value: Value,
        value_type: impl Into<String>,
    ) -> Self {
        Self {
            activity_type: activity_types::TRACE.to_string(),
            name: Some(name.into()),
            label: Some(label.into()),
            value: Some(value),
            value_type: Some(value_type.into()),
            timestamp: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn is_message(&self) -> bool {
        self.activity_type == activity_types::MESSAGE
    }

    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Whether the activity was posted in a multi-party Teams-style channel
    pub fn is_channel_conversation(&self) -> bool {
        self.conversation.conversation_type.as_deref() == Some(CHANNEL_CONVERSATION)
    }

    pub fn mentions(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|e| e.is_mention())
    }

    /// Team info from Teams channel data, if present
    pub fn teams_team_info(&self) -> Option<TeamInfo> {
        let team = self.channel_data.as_ref()?.get("team")?;
        serde_json::from_value(team.clone()).ok()
    }

    pub fn conversation_reference(&self) -> ConversationReference {
        ConversationReference {
            activity_id: self.id.clone(),
            user: self.from.clone(),
            bot: self.recipient.clone(),
            conversation: self.conversation.clone(),
            channel_id: self.channel_id.clone(),
            service_url: self.service_url.clone(),
        }
    }

    /// Address this activity as a reply within the referenced conversation
    pub fn apply_conversation_reference(mut self, reference: &ConversationReference) -> Self {
        self.channel_id = reference.channel_id.clone();
        self.service_url = reference.service_url.clone();
        self.conversation = reference.conversation.clone();
        self.from = reference.bot.clone();
        self.recipient = reference.user.clone();
        if self.reply_to_id.is_none() {
            self.reply_to_id = reference.activity_id.clone();
        }
        if self.id.is_none() {
            self.id = Some(uuid::Uuid::new_v4().to_string());
        }
        if self.timestamp.is_none() {
            self.timestamp = Some(Utc::now());
        }
        self
    }
}

impl From<&str> for Activity {
    fn from(text: &str) -> Self {
        Activity::message(text)
    }
}

impl From<String> for Activity {
    fn from(text: String) -> Self {
        Activity::message(text)
    }
}
