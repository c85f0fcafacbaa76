//! Quest State Tracking
//!
//! The per-player progress store. A quest with no record is not started;
//! a record is either in progress or completed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::QuestError;

/// Status of a quest for a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    /// No progress record exists
    NotStarted,
    InProgress,
    Completed,
}

impl QuestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestStatus::NotStarted => "not_started",
            QuestStatus::InProgress => "in_progress",
            QuestStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(QuestStatus::NotStarted),
            "in_progress" => Some(QuestStatus::InProgress),
            "completed" => Some(QuestStatus::Completed),
            _ => None,
        }
    }
}

/// One player's progress on one quest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestProgress {
    pub quest_id: String,
    /// `InProgress` or `Completed`; never `NotStarted`
    pub status: QuestStatus,
    /// Keeps its last value once the quest is completed
    pub current_stage: String,
    pub completed_stages: IndexSet<String>,
    pub completed_objectives: IndexSet<String>,
    /// Progress counts keyed by objective id
    pub objective_progress: HashMap<String, u32>,
    /// Hidden objectives that have been made visible
    #[serde(default)]
    pub revealed_objectives: IndexSet<String>,
    #[serde(default)]
    pub rewards_claimed: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl QuestProgress {
    pub fn new(quest_id: &str, first_stage: &str) -> Self {
        Self {
            quest_id: quest_id.to_string(),
            status: QuestStatus::InProgress,
            current_stage: first_stage.to_string(),
            completed_stages: IndexSet::new(),
            completed_objectives: IndexSet::new(),
            objective_progress: HashMap::new(),
            revealed_objectives: IndexSet::new(),
            rewards_claimed: false,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == QuestStatus::InProgress
    }

    pub fn is_completed(&self) -> bool {
        self.status == QuestStatus::Completed
    }

    pub fn progress_of(&self, objective_id: &str) -> u32 {
        self.objective_progress.get(objective_id).copied().unwrap_or(0)
    }

    /// Add to an objective's counter and return the new value (not capped)
    pub fn add_progress(&mut self, objective_id: &str, amount: u32) -> u32 {
        let current = self
            .objective_progress
            .entry(objective_id.to_string())
            .or_insert(0);
        *current = current.saturating_add(amount);
        *current
    }

    pub fn is_objective_completed(&self, objective_id: &str) -> bool {
        self.completed_objectives.contains(objective_id)
    }

    /// Record an objective as complete; returns true only the first time
    pub fn mark_objective_completed(&mut self, objective_id: &str) -> bool {
        self.completed_objectives.insert(objective_id.to_string())
    }

    pub fn is_revealed(&self, objective_id: &str) -> bool {
        self.revealed_objectives.contains(objective_id)
    }

    pub fn reveal(&mut self, objective_id: &str) -> bool {
        self.revealed_objectives.insert(objective_id.to_string())
    }

    /// Mark quest as completed
    pub fn complete(&mut self) {
        self.status = QuestStatus::Completed;
        self.completed_at = Some(Utc::now());
    }
}

/// All quest progress for a single player
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerQuestState {
    quests: HashMap<String, QuestProgress>,
}

impl PlayerQuestState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, quest_id: &str) -> Option<&QuestProgress> {
        self.quests.get(quest_id)
    }

    pub fn get_mut(&mut self, quest_id: &str) -> Option<&mut QuestProgress> {
        self.quests.get_mut(quest_id)
    }

    pub fn contains(&self, quest_id: &str) -> bool {
        self.quests.contains_key(quest_id)
    }

    pub(crate) fn insert(&mut self, progress: QuestProgress) {
        self.quests.insert(progress.quest_id.clone(), progress);
    }

    pub(crate) fn remove(&mut self, quest_id: &str) -> Option<QuestProgress> {
        self.quests.remove(quest_id)
    }

    /// Status of a quest, with absence meaning not started
    pub fn status(&self, quest_id: &str) -> QuestStatus {
        self.quests
            .get(quest_id)
            .map(|p| p.status)
            .unwrap_or(QuestStatus::NotStarted)
    }

    pub fn is_in_progress(&self, quest_id: &str) -> bool {
        self.status(quest_id) == QuestStatus::InProgress
    }

    pub fn is_completed(&self, quest_id: &str) -> bool {
        self.status(quest_id) == QuestStatus::Completed
    }

    pub fn records(&self) -> impl Iterator<Item = &QuestProgress> {
        self.quests.values()
    }

    pub fn completed_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .quests
            .values()
            .filter(|p| p.is_completed())
            .map(|p| p.quest_id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.quests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }

    /// Check that every record is keyed by its own quest id and is either in
    /// progress or completed. Deserialized stores can break both.
    pub fn validate(&self) -> Result<(), QuestError> {
        for (key, progress) in &self.quests {
            let reason = if *key != progress.quest_id {
                format!("stored under key '{}'", key)
            } else if progress.status == QuestStatus::NotStarted {
                "status is not_started; absent quests have no record".to_string()
            } else {
                continue;
            };
            return Err(QuestError::InvalidProgress {
                quest_id: progress.quest_id.clone(),
                reason,
            });
        }
        Ok(())
    }

    /// Serialize the store for saving
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Restore a store from a saved snapshot
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objective_progress_is_uncapped() {
        let mut progress = QuestProgress::new("cooks_assistant", "collect_ingredients");
        assert_eq!(progress.progress_of("get_milk"), 0);

        assert_eq!(progress.add_progress("get_milk", 1), 1);
        assert_eq!(progress.add_progress("get_milk", 4), 5);
        assert_eq!(progress.progress_of("get_milk"), 5);
    }

    #[test]
    fn test_completed_objectives_are_a_set() {
        let mut progress = QuestProgress::new("cooks_assistant", "collect_ingredients");
        assert!(progress.mark_objective_completed("get_egg"));
        assert!(!progress.mark_objective_completed("get_egg"));
        assert_eq!(progress.completed_objectives.len(), 1);
    }

    #[test]
    fn test_absence_means_not_started() {
        let mut state = PlayerQuestState::new();
        assert_eq!(state.status("cooks_assistant"), QuestStatus::NotStarted);

        state.insert(QuestProgress::new("cooks_assistant", "collect_ingredients"));
        assert!(state.is_in_progress("cooks_assistant"));

        state.get_mut("cooks_assistant").unwrap().complete();
        assert!(state.is_completed("cooks_assistant"));
        assert_eq!(state.completed_ids(), vec!["cooks_assistant".to_string()]);
    }

    #[test]
    fn test_snapshot_restores_progress() {
        let mut state = PlayerQuestState::new();
        let mut progress = QuestProgress::new("cooks_assistant", "collect_ingredients");
        progress.add_progress("get_milk", 1);
        progress.mark_objective_completed("get_milk");
        state.insert(progress);

        let json = state.to_json().unwrap();
        let restored = PlayerQuestState::from_json(&json).unwrap();

        let record = restored.get("cooks_assistant").unwrap();
        assert_eq!(record.current_stage, "collect_ingredients");
        assert_eq!(record.progress_of("get_milk"), 1);
        assert!(record.is_objective_completed("get_milk"));
        assert!(restored.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_not_started_record() {
        let json = r#"{"quests": {"cooks_assistant": {
            "quest_id": "cooks_assistant",
            "status": "not_started",
            "current_stage": "collect_ingredients",
            "completed_stages": [],
            "completed_objectives": [],
            "objective_progress": {},
            "started_at": "2024-01-01T00:00:00Z",
            "completed_at": null
        }}}"#;
        let state = PlayerQuestState::from_json(json).unwrap();
        assert!(matches!(
            state.validate(),
            Err(QuestError::InvalidProgress { ref quest_id, .. }) if quest_id == "cooks_assistant"
        ));
    }

    #[test]
    fn test_validate_rejects_mismatched_key() {
        let mut state = PlayerQuestState::new();
        state.insert(QuestProgress::new("cooks_assistant", "collect_ingredients"));
        let json = state.to_json().unwrap().replace(
            r#"{"quests":{"cooks_assistant""#,
            r#"{"quests":{"sheep_shearer""#,
        );
        let state = PlayerQuestState::from_json(&json).unwrap();

        assert_eq!(state.status("sheep_shearer"), QuestStatus::InProgress);
        assert!(matches!(state.validate(), Err(QuestError::InvalidProgress { .. })));
    }
}
