// ABOUTME: Tests for bot resolution through the public registry API
// ABOUTME: Covers caller-supplied factories, credential conventions and explicit credentials

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use teambots::registry::{BotOptions, BotProfile, BotRef, BotRegistry, DEFAULT_KIND};
use teambots_core::testing::RecordingConnector;
use teambots_core::{Bot, BotConfig, MemoryStorage, Settings, TurnContext};

struct GreeterBot {
    name: String,
    greeting: String,
}

#[async_trait]
impl Bot for GreeterBot {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_message_activity(&self, ctx: &mut TurnContext) -> Result<()> {
        ctx.send_activity(self.greeting.as_str()).await?;
        Ok(())
    }
}

fn registry(pairs: &[(&str, &str)]) -> BotRegistry {
    let settings: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let settings: Arc<dyn Settings> = Arc::new(settings);
    BotRegistry::new(settings, Arc::new(MemoryStorage::new()))
        .with_connector(Arc::new(RecordingConnector::new()))
}

#[test]
fn test_caller_factory_is_resolved_by_name() {
    let mut registry = registry(&[]).register_factory("Greeter", |profile: &BotProfile| {
        Ok(Arc::new(GreeterBot {
            name: profile.name.clone(),
            greeting: profile
                .welcome_message
                .clone()
                .unwrap_or_else(|| "hello".to_string()),
        }) as Arc<dyn Bot>)
    });

    let entry = registry.register(BotRef::named("greeter")).unwrap();

    assert_eq!(entry.kind, "greeter");
    assert_eq!(entry.instance().name(), "greeter");
    assert!(registry.available_kinds().contains(&"greeter"));
}

#[test]
fn test_factory_receives_resolved_profile() {
    let seen = Arc::new(std::sync::Mutex::new(None::<BotProfile>));
    let captured = Arc::clone(&seen);
    let mut registry = registry(&[
        ("HELPDESK_CLIENT_ID", "helpdesk-app"),
        ("HELPDESK_CLIENT_SECRET", "helpdesk-secret"),
    ])
    .register_factory("greeter", move |profile: &BotProfile| {
        *captured.lock().unwrap() = Some(profile.clone());
        Ok(Arc::new(GreeterBot {
            name: profile.name.clone(),
            greeting: "hi".to_string(),
        }) as Arc<dyn Bot>)
    });

    registry
        .register(BotRef::named_with(
            "HelpDesk",
            BotOptions {
                kind: Some("greeter".to_string()),
                welcome_message: Some("Welcome".to_string()),
                ..Default::default()
            },
        ))
        .unwrap();

    let profile = seen.lock().unwrap().clone().unwrap();
    assert_eq!(profile.name, "HelpDesk");
    assert_eq!(profile.route, "/api/v1/helpdesk/messages");
    assert_eq!(profile.credentials, BotConfig::new("helpdesk-app", "helpdesk-secret"));
    assert_eq!(profile.welcome_message.as_deref(), Some("Welcome"));
}

#[test]
fn test_explicit_credentials_override_settings() {
    let mut registry = registry(&[("APP_ID", "primary"), ("APP_PASSWORD", "primary-secret")]);

    let entry = registry
        .register(BotRef::named_with(
            "echo",
            BotOptions {
                credentials: Some(BotConfig::new("explicit", "explicit-secret")),
                ..Default::default()
            },
        ))
        .unwrap();

    assert_eq!(entry.credentials, BotConfig::new("explicit", "explicit-secret"));
}

#[test]
fn test_unknown_kind_falls_back_with_requested_name() {
    let mut registry = registry(&[]);

    let entry = registry
        .register(BotRef::named_with(
            "badge",
            BotOptions {
                kind: Some("badge_printer".to_string()),
                ..Default::default()
            },
        ))
        .unwrap();

    assert_eq!(entry.kind, DEFAULT_KIND);
    assert_eq!(entry.name, "badge");
    assert_eq!(entry.route, "/api/v1/badge/messages");
}
