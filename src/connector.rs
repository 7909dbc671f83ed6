// ABOUTME: HTTP channel connector speaking the Bot Framework REST conversation routes
// ABOUTME: Posts replies to the activity's serviceUrl and fetches Teams member profiles

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use teambots_core::{
    Activity, BotConfig, ChannelConnector, ConversationReference, ResourceResponse,
    TeamsChannelAccount,
};

use crate::auth::issue_token;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TOKEN_TTL: Duration = Duration::from_secs(600);

/// Connector for one bot; signs outbound calls with that bot's credentials
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
    credentials: BotConfig,
}

impl HttpConnector {
    pub fn new(credentials: BotConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build channel HTTP client")?;
        Ok(Self {
            client,
            credentials,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.credentials.is_anonymous() {
            request
        } else {
            request.bearer_auth(issue_token(&self.credentials, TOKEN_TTL))
        }
    }
}

/// `{serviceUrl}/v3/conversations/{id}` with the service URL's trailing slash removed
pub fn conversation_url(service_url: &str, conversation_id: &str) -> String {
    format!(
        "{}/v3/conversations/{}",
        service_url.trim_end_matches('/'),
        conversation_id
    )
}

#[async_trait]
impl ChannelConnector for HttpConnector {
    async fn send_activity(&self, activity: &Activity) -> Result<ResourceResponse> {
        if activity.service_url.is_empty() {
            anyhow::bail!("activity has no serviceUrl to reply to");
        }
        let url = format!(
            "{}/activities",
            conversation_url(&activity.service_url, &activity.conversation.id)
        );

        let response = self
            .authorize(self.client.post(&url).json(activity))
            .send()
            .await
            .with_context(|| format!("Failed to send activity to {}", url))?
            .error_for_status()
            .with_context(|| format!("Channel rejected activity at {}", url))?;

        // Some channels answer 200/201 with an empty body
        let body = response.bytes().await.unwrap_or_default();
        Ok(serde_json::from_slice(&body).unwrap_or_default())
    }

    async fn get_member(
        &self,
        reference: &ConversationReference,
        member_id: &str,
    ) -> Result<TeamsChannelAccount> {
        let url = format!(
            "{}/members/{}",
            conversation_url(&reference.service_url, &reference.conversation.id),
            member_id
        );

        let member = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .with_context(|| format!("Failed to fetch member {}", member_id))?
            .error_for_status()
            .with_context(|| format!("Member lookup rejected for {}", member_id))?
            .json::<TeamsChannelAccount>()
            .await
            .context("Failed to parse member profile")?;
        Ok(member)
    }
}
