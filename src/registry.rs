// ABOUTME: Bot registry resolving names to implementations, routes and credentials
// ABOUTME: Unknown names fall back to the default bot; duplicate routes and names are rejected

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use teambots_core::{Bot, BotConfig, ChannelConnector, RegistryError, Settings, StateStore};

use crate::adapter::BotAdapter;
use crate::bots::{DefaultBot, EchoBot, EchoChannelBot, TeamsListenerBot};

pub const DEFAULT_KIND: &str = "default";
pub const HEALTH_ROUTE: &str = "/health";

/// Factory building a bot from its resolved profile
pub type BotFactory = Box<dyn Fn(&BotProfile) -> Result<Arc<dyn Bot>> + Send + Sync>;

/// Everything a factory gets to build one bot
#[derive(Debug, Clone)]
pub struct BotProfile {
    pub name: String,
    pub route: String,
    pub credentials: BotConfig,
    pub welcome_message: Option<String>,
    pub mention_text: Option<String>,
}

/// Optional overrides for a registration
#[derive(Debug, Clone, Default)]
pub struct BotOptions {
    /// Implementation to build; defaults to the bot name
    pub kind: Option<String>,
    pub route: Option<String>,
    pub credentials: Option<BotConfig>,
    pub welcome_message: Option<String>,
    pub mention_text: Option<String>,
}

/// A bot to register: a ready instance or a name to resolve
#[derive(Clone)]
pub enum BotRef {
    Instance {
        bot: Arc<dyn Bot>,
        options: BotOptions,
    },
    Named {
        name: String,
        options: BotOptions,
    },
}

impl BotRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            options: BotOptions::default(),
        }
    }

    pub fn named_with(name: impl Into<String>, options: BotOptions) -> Self {
        Self::Named {
            name: name.into(),
            options,
        }
    }

    pub fn instance(bot: Arc<dyn Bot>) -> Self {
        Self::Instance {
            bot,
            options: BotOptions::default(),
        }
    }

    pub fn instance_with(bot: Arc<dyn Bot>, options: BotOptions) -> Self {
        Self::Instance { bot, options }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Instance { bot, .. } => bot.name(),
            Self::Named { name, .. } => name,
        }
    }
}

impl std::fmt::Debug for BotRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Instance { bot, options } => f
                .debug_struct("Instance")
                .field("bot", &bot.name())
                .field("options", options)
                .finish(),
            Self::Named { name, options } => f
                .debug_struct("Named")
                .field("name", name)
                .field("options", options)
                .finish(),
        }
    }
}

/// A mounted bot
#[derive(Debug)]
pub struct BotEntry {
    pub name: String,
    pub route: String,
    /// Implementation actually built, `default` after a fallback
    pub kind: String,
    pub credentials: BotConfig,
    pub adapter: Arc<BotAdapter>,
}

impl BotEntry {
    pub fn instance(&self) -> &Arc<dyn Bot> {
        self.adapter.bot()
    }
}

/// `/api/v1/{name}/messages` with the name lowercased
pub fn default_route(name: &str) -> String {
    format!("/api/v1/{}/messages", name.to_lowercase())
}

/// Bot names become path segments and setting keys
pub fn is_valid_name(name: &str) -> bool {
    regex::Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_\-]*$")
        .map(|re| re.is_match(name))
        .unwrap_or(false)
}

pub fn is_valid_route(route: &str) -> bool {
    route != HEALTH_ROUTE
        && regex::Regex::new(r"^(/[A-Za-z0-9._~\-]+)+/?$")
            .map(|re| re.is_match(route))
            .unwrap_or(false)
}

/// Ordered set of mounted bots plus the factories used to build them
pub struct BotRegistry {
    factories: HashMap<String, BotFactory>,
    entries: Vec<BotEntry>,
    settings: Arc<dyn Settings>,
    state_store: Arc<dyn StateStore>,
    connector: Option<Arc<dyn ChannelConnector>>,
}

impl BotRegistry {
    /// Registry without any factories; every name falls back to the default bot
    pub fn empty(settings: Arc<dyn Settings>, state_store: Arc<dyn StateStore>) -> Self {
        Self {
            factories: HashMap::new(),
            entries: Vec::new(),
            settings,
            state_store,
            connector: None,
        }
    }

    /// Registry with the built-in bot kinds
    pub fn new(settings: Arc<dyn Settings>, state_store: Arc<dyn StateStore>) -> Self {
        Self::empty(settings, state_store)
            .register_factory("echo", |p| Ok(Arc::new(EchoBot::new(&p.name)) as Arc<dyn Bot>))
            .register_factory("echo_channel", |p| {
                Ok(Arc::new(EchoChannelBot::new(&p.name, p.mention_text.clone())) as Arc<dyn Bot>)
            })
            .register_factory("teams_listener", |p| {
                Ok(Arc::new(TeamsListenerBot::new(&p.name)) as Arc<dyn Bot>)
            })
            .register_factory(DEFAULT_KIND, |p| {
                Ok(Arc::new(DefaultBot::new(&p.name, p.welcome_message.clone())) as Arc<dyn Bot>)
            })
    }

    /// Register a factory under a case-insensitive kind
    pub fn register_factory<F>(mut self, kind: &str, factory: F) -> Self
    where
        F: Fn(&BotProfile) -> Result<Arc<dyn Bot>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.to_lowercase(), Box::new(factory));
        self
    }

    /// Send every adapter's replies through this connector instead of HTTP
    pub fn with_connector(mut self, connector: Arc<dyn ChannelConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Known kinds, sorted
    pub fn available_kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Resolve and mount one bot.
    ///
    /// Names must be path-safe. Routes and names must be unique; names
    /// compare case-insensitively. A kind with no factory, or whose factory
    /// fails, mounts the default bot instead.
    pub fn register(&mut self, bot_ref: BotRef) -> Result<&BotEntry, RegistryError> {
        let (name, options, instance) = match bot_ref {
            BotRef::Instance { bot, options } => (bot.name().to_string(), options, Some(bot)),
            BotRef::Named { name, options } => (name.trim().to_string(), options, None),
        };

        if !is_valid_name(&name) {
            return Err(RegistryError::InvalidInput(format!(
                "bot name {:?} is empty or not path-safe",
                name
            )));
        }
        let route = options.route.clone().unwrap_or_else(|| default_route(&name));
        if !is_valid_route(&route) {
            return Err(RegistryError::InvalidInput(format!(
                "route {:?} for bot {} is not a valid path",
                route, name
            )));
        }

        if self.get(&name).is_some() {
            return Err(RegistryError::DuplicateName(name));
        }
        if let Some(existing) = self.entries.iter().find(|e| e.route == route) {
            return Err(RegistryError::DuplicateRoute {
                route,
                existing: existing.name.clone(),
            });
        }

        let kind = options
            .kind
            .clone()
            .unwrap_or_else(|| name.clone())
            .to_lowercase();
        let known = instance.is_some() || self.factories.contains_key(&kind);

        // Unknown names only get their own credentials, never the primary identity
        let credentials = match options.credentials.clone() {
            Some(credentials) => credentials,
            None if known => BotConfig::for_bot_or_primary(self.settings.as_ref(), &name),
            None => BotConfig::for_bot(self.settings.as_ref(), &name),
        };

        let profile = BotProfile {
            name: name.clone(),
            route: route.clone(),
            credentials: credentials.clone(),
            welcome_message: options.welcome_message,
            mention_text: options.mention_text,
        };

        let (bot, kind) = match instance {
            Some(bot) => (bot, "instance".to_string()),
            None => self.build(&kind, &profile),
        };

        let mut adapter = BotAdapter::new(bot, credentials.clone(), Arc::clone(&self.state_store))
            .map_err(|e| RegistryError::AdapterSetup {
                name: name.clone(),
                reason: format!("{:#}", e),
            })?;
        if let Some(connector) = &self.connector {
            adapter = adapter.with_connector(Arc::clone(connector));
        }

        tracing::info!(
            bot = %name,
            kind = %kind,
            route = %route,
            authenticated = !credentials.is_anonymous(),
            "Bot registered"
        );

        self.entries.push(BotEntry {
            name,
            route,
            kind,
            credentials,
            adapter: Arc::new(adapter),
        });
        let last = self.entries.len() - 1;
        Ok(&self.entries[last])
    }

    fn build(&self, kind: &str, profile: &BotProfile) -> (Arc<dyn Bot>, String) {
        if let Some(factory) = self.factories.get(kind) {
            match factory(profile) {
                Ok(bot) => return (bot, kind.to_string()),
                Err(e) => {
                    tracing::warn!(bot = %profile.name, kind = %kind, error = %e, "Bot factory failed, mounting default bot");
                }
            }
        } else {
            tracing::warn!(bot = %profile.name, kind = %kind, "No bot implementation found, mounting default bot");
        }

        let bot = Arc::new(DefaultBot::new(&profile.name, profile.welcome_message.clone()));
        (bot, DEFAULT_KIND.to_string())
    }

    /// Unmount every bot registered after the first `len`
    pub fn truncate(&mut self, len: usize) {
        for entry in self.entries.drain(len.min(self.entries.len())..) {
            tracing::info!(bot = %entry.name, route = %entry.route, "Bot unregistered");
        }
    }

    /// Look up a bot by name, ignoring case
    pub fn get(&self, name: &str) -> Option<&BotEntry> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn by_route(&self, route: &str) -> Option<&BotEntry> {
        self.entries.iter().find(|e| e.route == route)
    }

    /// Mounted bots in registration order
    pub fn entries(&self) -> &[BotEntry] {
        &self.entries
    }

    pub fn routes(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.route.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
