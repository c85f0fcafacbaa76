//! Dialogue System Module
//!
//! NPC conversation trees conditioned on quest status. Choosing an option
//! can start, advance or complete quests through the quest engine.

pub mod definition;
pub mod engine;
pub mod registry;

pub use definition::{
    DialogueAction, DialogueChain, DialogueNode, DialogueOption, NpcDialogue, OptionRequirement,
    END_DIALOGUE,
};
pub use engine::{
    DialogueEffect, DialogueEngine, DialogueNavigation, DialogueOutcome, OptionRequirementPolicy,
};
pub use registry::DialogueRegistry;
