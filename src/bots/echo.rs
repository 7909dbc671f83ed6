// ABOUTME: Echo bot: repeats the user's message and counts attachments
// ABOUTME: Simplest Bot implementation, also the behaviour other bots fall back to

use anyhow::Result;
use async_trait::async_trait;
use teambots_core::{Bot, TurnContext};

use super::{echo_text, report_attachments};

pub struct EchoBot {
    name: String,
}

impl EchoBot {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Bot for EchoBot {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_message_activity(&self, ctx: &mut TurnContext) -> Result<()> {
        tracing::debug!(bot = %self.name, text = %ctx.activity().text_or_empty(), "Received message");
        echo_text(ctx).await?;
        report_attachments(ctx).await
    }
}
