// ABOUTME: Bot implementations shipped with the host and the replies they share
// ABOUTME: Echo, channel-aware echo, Teams channel listener, and the fallback default bot

pub mod channel;
pub mod default;
pub mod echo;
pub mod listener;

pub use channel::EchoChannelBot;
pub use default::DefaultBot;
pub use echo::EchoBot;
pub use listener::TeamsListenerBot;

use anyhow::Result;
use teambots_core::TurnContext;

/// Reply with the inbound text prefixed by "You said: "
pub(crate) async fn echo_text(ctx: &mut TurnContext) -> Result<()> {
    let text = ctx.activity().text_or_empty().to_string();
    ctx.send_activity(format!("You said: {}", text)).await?;
    Ok(())
}

/// Tell the user how many attachments arrived, if any
pub(crate) async fn report_attachments(ctx: &mut TurnContext) -> Result<()> {
    let count = ctx.activity().attachments.len();
    if count > 0 {
        ctx.send_activity(format!("You sent {} attachment(s).", count))
            .await?;
    }
    Ok(())
}
