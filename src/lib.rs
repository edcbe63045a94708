//! wolfpack: an orchestrator for AI werewolf player servers.
//!
//! The manager process exposes an HTTP API for starting, inspecting, and
//! stopping player instances. Each instance is a spawned child process
//! running this same binary's `player` subcommand, serving its own
//! decision endpoints for a game master to call.

pub mod api;
pub mod config;
pub mod errors;
pub mod orchestrator;
pub mod player;
