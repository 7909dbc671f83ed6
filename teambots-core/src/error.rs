// ABOUTME: Typed error taxonomy for authentication, payload parsing and bot registration
// ABOUTME: Turn-processing failures stay anyhow::Error and are handled by the error policy

use thiserror::Error;

/// The inbound call could not be authenticated; the bot never sees it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,

    #[error("Authorization header is not a bearer token")]
    NotBearer,

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("token signature does not match the bot credentials")]
    BadSignature,

    #[error("token audience {found:?} does not match app id")]
    AudienceMismatch { found: Option<String> },

    #[error("token expired")]
    Expired,
}

/// The webhook body is not a routable activity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActivityError {
    #[error("malformed activity: {0}")]
    Malformed(String),

    #[error("activity is missing required field `{0}`")]
    MissingField(&'static str),
}

/// A registration the registry refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Neither a usable bot name nor a bot instance
    #[error("invalid bot registration: {0}")]
    InvalidInput(String),

    #[error("route {route} is already bound to bot {existing}")]
    DuplicateRoute { route: String, existing: String },

    #[error("a bot named {0} is already registered")]
    DuplicateName(String),

    #[error("failed to set up adapter for bot {name}: {reason}")]
    AdapterSetup { name: String, reason: String },
}
