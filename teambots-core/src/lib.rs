// ABOUTME: Protocol-level building blocks shared by every bot host
// ABOUTME: Activity model, Bot trait, turn context, state store and credentials

pub mod activity;
pub mod config;
pub mod error;
pub mod state;
pub mod testing;
pub mod traits;
pub mod turn;

pub use activity::{
    activity_types, channels, Activity, Attachment, ChannelAccount, ConversationAccount,
    ConversationReference, Entity, TeamInfo, TeamsChannelAccount,
};
pub use config::{BotConfig, EnvSettings, Settings};
pub use error::{ActivityError, AuthError, RegistryError};
pub use state::{MemoryStorage, StateBag, StateStore, TurnState};
pub use traits::{Bot, ChannelConnector, ResourceResponse};
pub use turn::TurnContext;
