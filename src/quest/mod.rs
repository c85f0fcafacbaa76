//! Quest System Module
//!
//! Data-driven quests loaded from TOML: stages of concurrently active
//! objectives, per-player progress, and trigger dispatch from game events.

pub mod api;
pub mod definition;
pub mod engine;
pub mod events;
pub mod registry;
pub mod state;

pub use api::{
    ExperienceGain, InventoryQuery, PlayerStats, RewardOutcome, RewardSink,
    UnknownRequirementPolicy,
};
pub use definition::{Difficulty, Objective, ObjectiveType, Quest, Requirement, Reward, Stage};
pub use engine::{ObjectiveView, QuestEngine, StageAdvance};
pub use events::{QuestEvent, QuestEventResult, TriggerAction};
pub use registry::QuestRegistry;
pub use state::{PlayerQuestState, QuestProgress, QuestStatus};
