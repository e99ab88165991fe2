pub mod http_client;
pub mod std_types;

/// The prefix of a bearer token sent to the validator client HTTP API.
pub const BEARER_PREFIX: &str = "Bearer ";
