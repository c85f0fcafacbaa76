//! Collaborator contracts
//!
//! The quest engine never touches inventory, skills or coins directly. It
//! asks questions through `PlayerStats` and `InventoryQuery`, and hands
//! rewards to a caller-supplied `RewardSink`.

use serde::{Deserialize, Serialize};

use super::definition::Reward;

/// Read access to a player's skill levels
pub trait PlayerStats {
    /// Current level of `skill`, or `None` if the player has no such skill
    fn skill_level(&self, skill: &str) -> Option<i32>;
}

/// Read access to a player's inventory
pub trait InventoryQuery {
    fn has_item(&self, item_id: &str, quantity: u32) -> bool;
}

/// Outcome of granting experience
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExperienceGain {
    /// Set when the grant raised the skill's level
    pub new_level: Option<i32>,
}

/// Receives reward effects when a completed quest's rewards are applied
pub trait RewardSink {
    /// Returns false if the items could not be stored (inventory full)
    fn grant_item(&mut self, item_id: &str, quantity: u32) -> bool;

    fn add_experience(&mut self, skill: &str, amount: i64) -> ExperienceGain;

    fn add_money(&mut self, amount: i64);

    fn unlock_access(&mut self, unlock_id: &str);
}

/// What a single reward did when applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewardOutcome {
    pub reward: Reward,
    pub applied: bool,
    pub new_level: Option<i32>,
}

impl RewardOutcome {
    pub(crate) fn apply(reward: &Reward, sink: &mut dyn RewardSink) -> Self {
        let mut new_level = None;
        let applied = match reward {
            Reward::Experience { skill, amount } => {
                new_level = sink.add_experience(skill, *amount).new_level;
                true
            }
            Reward::Money { amount } => {
                sink.add_money(*amount);
                true
            }
            Reward::Item { item_id, quantity } => sink.grant_item(item_id, *quantity),
            Reward::Access { unlock_id } => {
                sink.unlock_access(unlock_id);
                true
            }
        };

        Self {
            reward: reward.clone(),
            applied,
            new_level,
        }
    }
}

/// How requirement kinds the engine doesn't understand are evaluated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownRequirementPolicy {
    /// Lenient: unknown kinds never block a quest
    #[default]
    AlwaysSatisfied,
    /// Strict: unknown kinds always block a quest
    NeverSatisfied,
}

impl UnknownRequirementPolicy {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, UnknownRequirementPolicy::AlwaysSatisfied)
    }
}
