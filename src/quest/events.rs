//! Quest Event Types
//!
//! Game actions that can trigger quest objective progress, and the report
//! produced when they do.

use serde::{Deserialize, Serialize};

use super::definition::ObjectiveType;

/// Action verb used by generic trigger dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerAction {
    Talk,
    Kill,
    Collect,
    Deliver,
    Use,
    Visit,
    Craft,
}

impl TriggerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerAction::Talk => "talk",
            TriggerAction::Kill => "kill",
            TriggerAction::Collect => "collect",
            TriggerAction::Deliver => "deliver",
            TriggerAction::Use => "use",
            TriggerAction::Visit => "visit",
            TriggerAction::Craft => "craft",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "talk" => Some(TriggerAction::Talk),
            "kill" => Some(TriggerAction::Kill),
            "collect" => Some(TriggerAction::Collect),
            "deliver" => Some(TriggerAction::Deliver),
            "use" => Some(TriggerAction::Use),
            "visit" => Some(TriggerAction::Visit),
            "craft" => Some(TriggerAction::Craft),
            _ => None,
        }
    }

    /// The objective type an action advances
    pub fn objective_type(&self) -> ObjectiveType {
        match self {
            TriggerAction::Talk => ObjectiveType::Talk,
            TriggerAction::Kill => ObjectiveType::Kill,
            TriggerAction::Collect => ObjectiveType::Collect,
            TriggerAction::Deliver => ObjectiveType::Deliver,
            TriggerAction::Use => ObjectiveType::Use,
            TriggerAction::Visit => ObjectiveType::Visit,
            TriggerAction::Craft => ObjectiveType::Craft,
        }
    }
}

/// Events emitted by other game systems
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestEvent {
    /// Player killed a monster
    MonsterKilled { entity_type: String },

    /// Player picked up or received items
    ItemCollected { item_id: String, count: u32 },

    /// Player talked to an NPC
    NpcInteraction { npc_id: String },

    /// Player handed items to an NPC
    ItemsDelivered { npc_id: String },

    /// Player used an item or object
    ItemUsed { target_id: String },

    /// Player reached a location
    LocationReached { location_id: String },

    /// Player crafted items
    ItemCrafted { item_id: String, count: u32 },
}

impl QuestEvent {
    /// Reduce the event to the `(action, target, quantity)` used by dispatch
    pub fn trigger(&self) -> (TriggerAction, &str, u32) {
        match self {
            QuestEvent::MonsterKilled { entity_type } => {
                (TriggerAction::Kill, entity_type.as_str(), 1)
            }
            QuestEvent::ItemCollected { item_id, count } => {
                (TriggerAction::Collect, item_id.as_str(), *count)
            }
            QuestEvent::NpcInteraction { npc_id } => (TriggerAction::Talk, npc_id.as_str(), 1),
            QuestEvent::ItemsDelivered { npc_id } => (TriggerAction::Deliver, npc_id.as_str(), 1),
            QuestEvent::ItemUsed { target_id } => (TriggerAction::Use, target_id.as_str(), 1),
            QuestEvent::LocationReached { location_id } => {
                (TriggerAction::Visit, location_id.as_str(), 1)
            }
            QuestEvent::ItemCrafted { item_id, count } => {
                (TriggerAction::Craft, item_id.as_str(), *count)
            }
        }
    }

    /// Get event type as string (for logging/debugging)
    pub fn event_type(&self) -> &'static str {
        match self {
            QuestEvent::MonsterKilled { .. } => "monster_killed",
            QuestEvent::ItemCollected { .. } => "item_collected",
            QuestEvent::NpcInteraction { .. } => "npc_interaction",
            QuestEvent::ItemsDelivered { .. } => "items_delivered",
            QuestEvent::ItemUsed { .. } => "item_used",
            QuestEvent::LocationReached { .. } => "location_reached",
            QuestEvent::ItemCrafted { .. } => "item_crafted",
        }
    }
}

/// Result of advancing one objective
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestEventResult {
    pub quest_id: String,
    pub objective_id: String,
    pub new_progress: u32,
    pub target: u32,
    /// The objective crossed its required quantity on this update
    pub objective_completed: bool,
    /// Stages finished by the cascade, in order
    pub stages_completed: Vec<String>,
    /// Current stage after the update
    pub current_stage: String,
    pub quest_completed: bool,
}

impl QuestEventResult {
    pub fn objective_updated(
        quest_id: &str,
        objective_id: &str,
        new_progress: u32,
        target: u32,
        current_stage: &str,
    ) -> Self {
        Self {
            quest_id: quest_id.to_string(),
            objective_id: objective_id.to_string(),
            new_progress,
            target,
            objective_completed: false,
            stages_completed: Vec::new(),
            current_stage: current_stage.to_string(),
            quest_completed: false,
        }
    }
}
