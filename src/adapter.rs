// ABOUTME: Per-bot adapter: authenticates the call, runs one turn, persists or wipes state
// ABOUTME: All turn failures (errors and panics) go through a single TurnErrorPolicy

use anyhow::anyhow;
use async_trait::async_trait;
use axum::http::StatusCode;
use futures_util::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use teambots_core::state::conversation_key;
use teambots_core::{
    channels, Activity, Bot, BotConfig, ChannelConnector, StateStore, TurnContext, TurnState,
};
use tokio::sync::OwnedMutexGuard;

use crate::auth::{Authenticator, CredentialAuthenticator};
use crate::connector::HttpConnector;

pub const TURN_ERROR_MESSAGE: &str = "The bot encountered an error or bug.";
pub const TURN_ERROR_FIX_MESSAGE: &str =
    "To continue to run this bot, please fix the bot source code.";
pub const ERROR_VALUE_TYPE: &str = "https://www.botframework.com/schemas/error";

/// What happens when a turn fails.
///
/// Invoked with the failed turn's context and the error; must not fail itself.
#[async_trait]
pub trait TurnErrorPolicy: Send + Sync {
    async fn on_turn_error(&self, ctx: &mut TurnContext, error: &anyhow::Error);
}

/// Tells the user, traces to the emulator, and wipes the conversation state
pub struct DefaultErrorPolicy {
    conversation_state: Arc<dyn StateStore>,
}

impl DefaultErrorPolicy {
    pub fn new(conversation_state: Arc<dyn StateStore>) -> Self {
        Self { conversation_state }
    }
}

#[async_trait]
impl TurnErrorPolicy for DefaultErrorPolicy {
    async fn on_turn_error(&self, ctx: &mut TurnContext, error: &anyhow::Error) {
        tracing::error!(
            conversation = %ctx.activity().conversation.id,
            channel = %ctx.activity().channel_id,
            error = ?error,
            "Unhandled error during turn"
        );

        for text in [TURN_ERROR_MESSAGE, TURN_ERROR_FIX_MESSAGE] {
            if let Err(e) = ctx.send_activity(text).await {
                tracing::warn!(error = %e, "Failed to notify user of turn error");
            }
        }

        if ctx.activity().channel_id == channels::EMULATOR {
            let trace = Activity::trace(
                "on_turn_error Trace",
                "TurnError",
                serde_json::Value::String(format!("{error:#}")),
                ERROR_VALUE_TYPE,
            );
            if let Err(e) = ctx.send_activity(trace).await {
                tracing::warn!(error = %e, "Failed to send turn error trace");
            }
        }

        ctx.state_mut().clear_conversation();
        let key = conversation_key(ctx.activity());
        if let Err(e) = self.conversation_state.delete(&key).await {
            tracing::error!(error = %e, key = %key, "Failed to clear conversation state");
        }
    }
}

/// One async mutex per conversation key so turns in a conversation run in order
#[derive(Default)]
pub struct ConversationLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Locks nobody holds or waits on are only referenced by the map
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Authentication and error boundary around one bot
pub struct BotAdapter {
    bot: Arc<dyn Bot>,
    authenticator: Arc<dyn Authenticator>,
    connector: Arc<dyn ChannelConnector>,
    state_store: Arc<dyn StateStore>,
    error_policy: Arc<dyn TurnErrorPolicy>,
    locks: ConversationLocks,
}

impl std::fmt::Debug for BotAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotAdapter")
            .field("bot", &self.bot.name())
            .field("authenticator", &"<Authenticator>")
            .field("connector", &"<ChannelConnector>")
            .field("state_store", &"<StateStore>")
            .field("error_policy", &"<TurnErrorPolicy>")
            .finish()
    }
}

impl BotAdapter {
    /// Adapter with the default authenticator, HTTP connector and error policy
    pub fn new(
        bot: Arc<dyn Bot>,
        credentials: BotConfig,
        state_store: Arc<dyn StateStore>,
    ) -> anyhow::Result<Self> {
        let connector = HttpConnector::new(credentials.clone())?;
        Ok(Self {
            bot,
            authenticator: Arc::new(CredentialAuthenticator::new(credentials)),
            connector: Arc::new(connector),
            error_policy: Arc::new(DefaultErrorPolicy::new(Arc::clone(&state_store))),
            state_store,
            locks: ConversationLocks::new(),
        })
    }

    pub fn with_connector(mut self, connector: Arc<dyn ChannelConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn with_error_policy(mut self, error_policy: Arc<dyn TurnErrorPolicy>) -> Self {
        self.error_policy = error_policy;
        self
    }

    pub fn bot(&self) -> &Arc<dyn Bot> {
        &self.bot
    }

    /// Run one inbound call through authentication and the bot.
    ///
    /// Returns 401 when authentication fails and 400 for bodies that are not
    /// routable activities. Bot failures are handled by the error policy and
    /// still acknowledge with 200.
    pub async fn process(&self, auth_header: Option<&str>, body: &[u8]) -> StatusCode {
        let bot_name = self.bot.name();

        if let Err(e) = self.authenticator.authenticate(auth_header).await {
            tracing::warn!(bot = %bot_name, error = %e, "Rejected unauthenticated channel call");
            return StatusCode::UNAUTHORIZED;
        }

        let activity = match Activity::from_slice(body) {
            Ok(activity) => activity,
            Err(e) => {
                tracing::warn!(bot = %bot_name, error = %e, "Rejected malformed activity");
                return StatusCode::BAD_REQUEST;
            }
        };

        let key = conversation_key(&activity);
        let _guard = self.locks.acquire(&key).await;

        tracing::debug!(
            bot = %bot_name,
            activity_type = %activity.activity_type,
            conversation = %activity.conversation.id,
            channel = %activity.channel_id,
            "Processing turn"
        );

        let (state, load_error) =
            match TurnState::load(self.state_store.as_ref(), &activity).await {
                Ok(state) => (state, None),
                Err(e) => (
                    TurnState::default(),
                    Some(e.context("Failed to load turn state")),
                ),
            };

        let mut ctx = TurnContext::new(activity, Arc::clone(&self.connector), state);

        let result = match load_error {
            Some(e) => Err(e),
            None => self.run_bot(&mut ctx).await,
        };

        let result = match result {
            Ok(()) => {
                let activity = ctx.activity().clone();
                ctx.state_mut()
                    .save(self.state_store.as_ref(), &activity)
                    .await
                    .map_err(|e| e.context("Failed to save turn state"))
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                tracing::debug!(bot = %bot_name, replies = ctx.sent_count(), "Turn complete");
                StatusCode::from_u16(ctx.status()).unwrap_or(StatusCode::OK)
            }
            Err(e) => {
                self.error_policy.on_turn_error(&mut ctx, &e).await;
                StatusCode::OK
            }
        }
    }

    async fn run_bot(&self, ctx: &mut TurnContext) -> anyhow::Result<()> {
        match AssertUnwindSafe(self.bot.on_turn(ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(anyhow!(
                "bot {} panicked: {}",
                self.bot.name(),
                panic_message(&*panic)
            )),
        }
    }
}

/// Text of a caught panic payload
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
