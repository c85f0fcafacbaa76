//! JSON request and response bodies for the HTTP API.

use serde::{Deserialize, Serialize};

use crate::dialogue::{DialogueEffect, DialogueEngine, DialogueNode, NpcDialogue};
use crate::player::PlayerProfile;
use crate::quest::{
    Difficulty, ObjectiveView, PlayerQuestState, Quest, QuestEngine, QuestEvent, QuestEventResult,
    QuestProgress, QuestStatus, RewardOutcome, Stage, TriggerAction,
};

// ============================================================================
// Requests
// ============================================================================

/// Either a typed game event or a raw `(action, target, quantity)` trigger
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TriggerRequest {
    Event(QuestEvent),
    Action {
        action: TriggerAction,
        target: String,
        #[serde(default = "default_quantity")]
        quantity: u32,
    },
}

fn default_quantity() -> u32 {
    1
}

impl TriggerRequest {
    pub fn trigger(&self) -> (TriggerAction, &str, u32) {
        match self {
            TriggerRequest::Event(event) => event.trigger(),
            TriggerRequest::Action {
                action,
                target,
                quantity,
            } => (*action, target.as_str(), *quantity),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectOptionRequest {
    pub option_id: String,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub quest_points: u32,
    pub category: String,
    pub start_npc: String,
}

impl From<&Quest> for QuestSummary {
    fn from(quest: &Quest) -> Self {
        Self {
            id: quest.id.clone(),
            name: quest.name.clone(),
            description: quest.description.clone(),
            difficulty: quest.difficulty,
            quest_points: quest.quest_points,
            category: quest.category.clone(),
            start_npc: quest.start_npc.clone(),
        }
    }
}

/// One line of the quest journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub quest_id: String,
    pub name: String,
    pub status: QuestStatus,
    pub current_stage: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageView {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Journal text shown while the stage is current
    pub text: Option<String>,
}

impl From<&Stage> for StageView {
    fn from(stage: &Stage) -> Self {
        Self {
            id: stage.id.clone(),
            name: stage.name.clone(),
            description: stage.description.clone(),
            text: stage.dialogue.as_ref().and_then(|d| d.before.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestDetails {
    pub quest: QuestSummary,
    pub status: QuestStatus,
    pub progress: Option<QuestProgress>,
    pub current_stage: Option<StageView>,
    pub objectives: Vec<ObjectiveView>,
}

impl QuestDetails {
    pub fn build(quest: &Quest, engine: &QuestEngine) -> Self {
        Self {
            quest: QuestSummary::from(quest),
            status: engine.quest_status(&quest.id),
            progress: engine.quest_progress(&quest.id).cloned(),
            current_stage: engine.current_stage(&quest.id).map(StageView::from),
            objectives: engine.active_objectives(&quest.id),
        }
    }
}

/// Rewards applied for one quest
#[derive(Debug, Clone, Serialize)]
pub struct ClaimedRewards {
    pub quest_id: String,
    pub outcomes: Vec<RewardOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerResponse {
    pub results: Vec<QuestEventResult>,
    /// Rewards for quests the trigger finished
    pub rewards: Vec<ClaimedRewards>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceView {
    pub id: String,
    pub text: String,
    pub available: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueView {
    pub npc_id: String,
    pub speaker: String,
    pub node_id: String,
    pub text: String,
    pub choices: Vec<ChoiceView>,
}

impl DialogueView {
    pub fn build(
        npc: &NpcDialogue,
        node: &DialogueNode,
        dialogue: &DialogueEngine,
        quests: &QuestEngine,
        profile: &PlayerProfile,
    ) -> Self {
        let choices = node
            .options
            .iter()
            .map(|option| {
                let reason = dialogue.unmet_requirement(option, quests, profile);
                ChoiceView {
                    id: option.id.clone(),
                    text: option.text.clone(),
                    available: reason.is_none(),
                    reason,
                }
            })
            .collect();

        Self {
            npc_id: npc.npc_id.clone(),
            speaker: npc.speaker.clone(),
            node_id: node.id.clone(),
            text: node.text.clone(),
            choices,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionResponse {
    pub effect: Option<DialogueEffect>,
    /// `None` when the conversation ended
    pub next: Option<DialogueView>,
    pub rewards: Vec<ClaimedRewards>,
}

/// Everything stored for a player; restoring it resumes where they left off
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub quests: PlayerQuestState,
    pub profile: PlayerProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_request_accepts_both_shapes() {
        let event: TriggerRequest = serde_json::from_str(
            r#"{"type": "item_collected", "item_id": "egg", "count": 2}"#,
        )
        .unwrap();
        assert_eq!(event.trigger(), (TriggerAction::Collect, "egg", 2));

        let action: TriggerRequest =
            serde_json::from_str(r#"{"action": "deliver", "target": "cook"}"#).unwrap();
        assert_eq!(action.trigger(), (TriggerAction::Deliver, "cook", 1));
    }
}
