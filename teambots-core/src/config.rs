// ABOUTME: Bot credential pair and the settings lookup used to resolve it by convention
// ABOUTME: Reads APP_ID/APP_PASSWORD and {NAME}_CLIENT_ID/{NAME}_CLIENT_SECRET keys

use std::collections::HashMap;

pub const APP_ID_KEY: &str = "APP_ID";
pub const APP_PASSWORD_KEY: &str = "APP_PASSWORD";

/// Key/value lookup for process-wide settings.
///
/// Production reads the process environment; tests hand in a map.
pub trait Settings: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Settings backed by environment variables
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSettings;

impl Settings for EnvSettings {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl Settings for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Credential pair a bot authenticates with
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BotConfig {
    pub app_id: String,
    pub app_secret: String,
}

// Custom Debug impl to redact the secret
impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("app_id", &self.app_id)
            .field(
                "app_secret",
                &if self.app_secret.is_empty() { "" } else { "[REDACTED]" },
            )
            .finish()
    }
}

impl BotConfig {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
        }
    }

    /// No app id configured: inbound calls are accepted unauthenticated
    pub fn is_anonymous(&self) -> bool {
        self.app_id.trim().is_empty()
    }

    /// Primary bot identity from `APP_ID` / `APP_PASSWORD`
    pub fn primary(settings: &dyn Settings) -> Self {
        Self {
            app_id: settings.get(APP_ID_KEY).unwrap_or_default(),
            app_secret: settings.get(APP_PASSWORD_KEY).unwrap_or_default(),
        }
    }

    /// Per-bot credentials from `{NAME}_CLIENT_ID` / `{NAME}_CLIENT_SECRET`
    pub fn for_bot(settings: &dyn Settings, bot_name: &str) -> Self {
        let (id_key, secret_key) = credential_keys(bot_name);
        Self {
            app_id: settings.get(&id_key).unwrap_or_default(),
            app_secret: settings.get(&secret_key).unwrap_or_default(),
        }
    }

    /// Per-bot credentials, or the primary identity when the bot has none
    pub fn for_bot_or_primary(settings: &dyn Settings, bot_name: &str) -> Self {
        let own = Self::for_bot(settings, bot_name);
        if own.is_anonymous() {
            Self::primary(settings)
        } else {
            own
        }
    }
}

/// Setting keys holding a bot's credentials. Dashes and spaces become underscores.
pub fn credential_keys(bot_name: &str) -> (String, String) {
    let prefix: String = bot_name
        .trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' | '.' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();
    (format!("{prefix}_CLIENT_ID"), format!("{prefix}_CLIENT_SECRET"))
}
