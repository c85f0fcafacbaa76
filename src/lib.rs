//! Quest progression and NPC dialogue server.
//!
//! Quests and dialogue are loaded from TOML content; each player's progress
//! is driven by game events and dialogue choices through an HTTP API.

pub mod config;
pub mod content;
pub mod dialogue;
pub mod error;
pub mod player;
pub mod protocol;
pub mod quest;
pub mod routes;
pub mod service;
