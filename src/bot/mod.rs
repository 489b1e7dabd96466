//! Bot Framework channel binding: inbound webhook, token validation,
//! and the outbound connector.

pub mod auth;
pub mod connector;
pub mod routes;

pub use auth::TokenValidator;
pub use connector::ConnectorClient;
pub use routes::{router, AppState};
