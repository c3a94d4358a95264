pub mod catalog;
pub mod config;
pub mod constants;
pub mod gateway;
pub mod session;
pub mod sessions;
pub mod web_server;

pub use catalog::{default_catalog, Catalog, Profile};
pub use gateway::{CompletionGateway, GatewayError, GatewayErrorKind, GroqGateway};
pub use session::{ConversationTurn, MatchOutcome, Role, Session, TransitionError, View};
