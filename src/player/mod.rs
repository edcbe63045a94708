//! A single AI player: its decision service, HTTP server, and game types.

pub mod decision;
pub mod server;
pub mod types;

pub use decision::{DecisionService, LlmDecisionService};
pub use types::{GameState, PlayerContext, RoleContext};
