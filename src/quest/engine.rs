//! Quest Engine
//!
//! The quest state machine: one engine per player, owning that player's
//! progress store and sharing the read-only quest catalog.
//!
//! Two paths mutate progress: direct calls (`start_quest`,
//! `update_objective_progress`, `complete_quest`) and generic trigger
//! dispatch (`check_quest_trigger`). Both go through the same store, so
//! views stay consistent whichever path a game action took.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::api::{
    InventoryQuery, PlayerStats, RewardOutcome, RewardSink, UnknownRequirementPolicy,
};
use super::definition::{Objective, ObjectiveType, Quest, Requirement, Stage};
use super::events::{QuestEvent, QuestEventResult, TriggerAction};
use super::registry::QuestRegistry;
use super::state::{PlayerQuestState, QuestProgress, QuestStatus};
use crate::error::QuestError;

/// An objective template joined with the player's progress on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectiveView {
    pub id: String,
    pub description: String,
    pub objective_type: ObjectiveType,
    pub target_id: Option<String>,
    pub target_name: Option<String>,
    pub current: u32,
    pub quantity: u32,
    pub completed: bool,
}

/// What `confirm_stage` did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageAdvance {
    pub stages_completed: Vec<String>,
    pub current_stage: String,
    pub quest_completed: bool,
}

pub struct QuestEngine {
    catalog: Arc<QuestRegistry>,
    store: PlayerQuestState,
    unknown_requirements: UnknownRequirementPolicy,
}

impl QuestEngine {
    pub fn new(catalog: Arc<QuestRegistry>) -> Self {
        Self::with_store(catalog, PlayerQuestState::new())
    }

    /// Build an engine around previously saved progress
    pub fn with_store(catalog: Arc<QuestRegistry>, store: PlayerQuestState) -> Self {
        Self {
            catalog,
            store,
            unknown_requirements: UnknownRequirementPolicy::default(),
        }
    }

    /// Build an engine around a deserialized store, rejecting records that
    /// break the store's invariants or point at stages the catalog lacks.
    /// Records for quests missing from the catalog are kept as-is.
    pub fn restore(
        catalog: Arc<QuestRegistry>,
        store: PlayerQuestState,
    ) -> Result<Self, QuestError> {
        store.validate()?;

        for progress in store.records().filter(|p| p.is_in_progress()) {
            let Some(quest) = catalog.get(&progress.quest_id) else {
                continue;
            };
            if quest.stage(&progress.current_stage).is_none() {
                return Err(QuestError::InvalidProgress {
                    quest_id: progress.quest_id.clone(),
                    reason: format!("unknown current stage '{}'", progress.current_stage),
                });
            }
        }

        Ok(Self::with_store(catalog, store))
    }

    pub fn with_unknown_requirement_policy(mut self, policy: UnknownRequirementPolicy) -> Self {
        self.unknown_requirements = policy;
        self
    }

    pub fn catalog(&self) -> &Arc<QuestRegistry> {
        &self.catalog
    }

    /// Swap in a reloaded catalog; progress is kept as-is
    pub fn set_catalog(&mut self, catalog: Arc<QuestRegistry>) {
        self.catalog = catalog;
    }

    pub fn store(&self) -> &PlayerQuestState {
        &self.store
    }

    /// Register a quest in this engine's catalog, overwriting any quest with
    /// the same id. Other engines sharing the catalog don't see the change.
    pub fn register_quest(&mut self, quest: Quest) {
        debug!("Registering quest '{}'", quest.id);
        Arc::make_mut(&mut self.catalog).register(quest);
    }

    pub fn all_quests(&self) -> impl Iterator<Item = &Arc<Quest>> {
        self.catalog.all()
    }

    /// Quests the player could start right now: not in `completed_ids`,
    /// not started in this store, and with every requirement met
    pub fn available_quests(
        &self,
        stats: &dyn PlayerStats,
        inventory: &dyn InventoryQuery,
        completed_ids: &[String],
    ) -> Vec<&Arc<Quest>> {
        self.catalog
            .all()
            .filter(|q| !completed_ids.contains(&q.id))
            .filter(|q| !self.store.contains(&q.id))
            .filter(|q| self.check_requirements(q, stats, inventory, completed_ids))
            .collect()
    }

    /// Every requirement must hold. A quest requirement is met by either the
    /// supplied completed list or a completed record in this store.
    pub fn check_requirements(
        &self,
        quest: &Quest,
        stats: &dyn PlayerStats,
        inventory: &dyn InventoryQuery,
        completed_ids: &[String],
    ) -> bool {
        quest.requirements.iter().all(|requirement| match requirement {
            Requirement::Level { skill, level } => stats
                .skill_level(skill)
                .is_some_and(|current| current >= *level),
            Requirement::Quest { quest_id } => {
                completed_ids.contains(quest_id) || self.store.is_completed(quest_id)
            }
            Requirement::Item { item_id, quantity } => inventory.has_item(item_id, *quantity),
            Requirement::Location { .. } => true,
            Requirement::Unknown { kind } => {
                debug!(
                    "Quest '{}' has unknown requirement kind '{}' ({:?})",
                    quest.id, kind, self.unknown_requirements
                );
                self.unknown_requirements.is_satisfied()
            }
        })
    }

    /// Start a quest. Requirements are not checked here; callers decide
    /// policy with `available_quests` first. Any existing record, including a
    /// completed one, blocks a start.
    pub fn start_quest(&mut self, quest_id: &str) -> Result<(), QuestError> {
        let quest = self
            .catalog
            .get(quest_id)
            .ok_or_else(|| QuestError::QuestNotFound(quest_id.to_string()))?;

        if let Some(progress) = self.store.get(quest_id) {
            return Err(if progress.is_completed() {
                QuestError::AlreadyCompleted(quest_id.to_string())
            } else {
                QuestError::AlreadyStarted(quest_id.to_string())
            });
        }

        let first_stage = quest
            .first_stage()
            .ok_or_else(|| QuestError::NoStages(quest_id.to_string()))?;

        self.store.insert(QuestProgress::new(quest_id, &first_stage.id));
        info!("Started quest '{}' at stage '{}'", quest_id, first_stage.id);
        Ok(())
    }

    /// Add `delta` to an objective of the quest's current stage. Objectives in
    /// other stages can't be reached through this call.
    pub fn update_objective_progress(
        &mut self,
        quest_id: &str,
        objective_id: &str,
        delta: u32,
    ) -> Result<QuestEventResult, QuestError> {
        let progress = self
            .store
            .get_mut(quest_id)
            .filter(|p| p.is_in_progress())
            .ok_or_else(|| QuestError::NotInProgress(quest_id.to_string()))?;

        let quest = self
            .catalog
            .get(quest_id)
            .ok_or_else(|| QuestError::QuestNotFound(quest_id.to_string()))?;

        let objective = quest
            .stage(&progress.current_stage)
            .and_then(|stage| stage.objective(objective_id))
            .ok_or_else(|| {
                if quest.objective(objective_id).is_some() {
                    QuestError::ObjectiveNotActive {
                        quest_id: quest_id.to_string(),
                        objective_id: objective_id.to_string(),
                    }
                } else {
                    QuestError::ObjectiveNotFound {
                        quest_id: quest_id.to_string(),
                        objective_id: objective_id.to_string(),
                    }
                }
            })?;

        let current = progress.add_progress(objective_id, delta);
        let mut result = QuestEventResult::objective_updated(
            quest_id,
            objective_id,
            current,
            objective.quantity,
            &progress.current_stage,
        );

        debug!(
            "Quest '{}' objective '{}': {}/{}",
            quest_id, objective_id, current, objective.quantity
        );

        if current >= objective.quantity {
            result.objective_completed = progress.mark_objective_completed(objective_id);
            result.stages_completed = run_stage_cascade(quest, progress);
            result.current_stage = progress.current_stage.clone();
            result.quest_completed = progress.is_completed();
        }

        Ok(result)
    }

    /// Confirm a stage whose objectives are finished but which doesn't
    /// advance on its own (`auto_complete = false`)
    pub fn confirm_stage(&mut self, quest_id: &str) -> Result<StageAdvance, QuestError> {
        let progress = self
            .store
            .get_mut(quest_id)
            .filter(|p| p.is_in_progress())
            .ok_or_else(|| QuestError::NotInProgress(quest_id.to_string()))?;

        let quest = self
            .catalog
            .get(quest_id)
            .ok_or_else(|| QuestError::QuestNotFound(quest_id.to_string()))?;

        let stage = quest.stage(&progress.current_stage).ok_or_else(|| {
            QuestError::StageNotFound {
                quest_id: quest_id.to_string(),
                stage_id: progress.current_stage.clone(),
            }
        })?;

        if !stage_objectives_done(stage, progress) {
            return Err(QuestError::StageIncomplete {
                quest_id: quest_id.to_string(),
                stage_id: stage.id.clone(),
            });
        }

        let mut stages_completed = vec![advance_stage(quest, progress)];
        if progress.is_in_progress() {
            stages_completed.extend(run_stage_cascade(quest, progress));
        }

        Ok(StageAdvance {
            stages_completed,
            current_stage: progress.current_stage.clone(),
            quest_completed: progress.is_completed(),
        })
    }

    /// Mark a quest completed. Not gated on stage completion: dialogue uses
    /// this to finish quests whose last step is a conversation. Callers are
    /// responsible for only doing so when the quest's story allows it.
    pub fn complete_quest(&mut self, quest_id: &str) -> Result<(), QuestError> {
        let progress = self
            .store
            .get_mut(quest_id)
            .ok_or_else(|| QuestError::NotInProgress(quest_id.to_string()))?;

        if progress.is_completed() {
            return Err(QuestError::AlreadyCompleted(quest_id.to_string()));
        }

        progress.complete();
        info!("Completed quest '{}'", quest_id);
        Ok(())
    }

    /// Drop an in-progress quest so it can be started again
    pub fn abandon_quest(&mut self, quest_id: &str) -> Result<(), QuestError> {
        match self.store.get(quest_id) {
            None => Err(QuestError::NotInProgress(quest_id.to_string())),
            Some(progress) if progress.is_completed() => {
                Err(QuestError::AlreadyCompleted(quest_id.to_string()))
            }
            Some(_) => {
                self.store.remove(quest_id);
                info!("Abandoned quest '{}'", quest_id);
                Ok(())
            }
        }
    }

    /// Make a hidden objective visible to dispatch and the journal
    pub fn reveal_objective(
        &mut self,
        quest_id: &str,
        objective_id: &str,
    ) -> Result<bool, QuestError> {
        let quest = self
            .catalog
            .get(quest_id)
            .ok_or_else(|| QuestError::QuestNotFound(quest_id.to_string()))?;

        if quest.objective(objective_id).is_none() {
            return Err(QuestError::ObjectiveNotFound {
                quest_id: quest_id.to_string(),
                objective_id: objective_id.to_string(),
            });
        }

        let progress = self
            .store
            .get_mut(quest_id)
            .filter(|p| p.is_in_progress())
            .ok_or_else(|| QuestError::NotInProgress(quest_id.to_string()))?;

        Ok(progress.reveal(objective_id))
    }

    /// Generic dispatch: advance every active objective, across all quests in
    /// progress, whose type matches `action` and whose target id or name is
    /// `target`
    pub fn check_quest_trigger(
        &mut self,
        action: TriggerAction,
        target: &str,
        quantity: u32,
    ) -> Vec<QuestEventResult> {
        let objective_type = action.objective_type();

        let mut matches = Vec::new();
        for quest in self.catalog.all() {
            let Some(progress) = self.store.get(&quest.id).filter(|p| p.is_in_progress()) else {
                continue;
            };
            let Some(stage) = quest.stage(&progress.current_stage) else {
                continue;
            };
            for objective in &stage.objectives {
                if objective.objective_type == objective_type
                    && objective.matches_target(target)
                    && is_active(objective, progress)
                {
                    matches.push((quest.id.clone(), objective.id.clone()));
                }
            }
        }

        let mut results = Vec::new();
        for (quest_id, objective_id) in matches {
            // An earlier match may have finished the stage this one was in
            match self.update_objective_progress(&quest_id, &objective_id, quantity) {
                Ok(result) => results.push(result),
                Err(e) => debug!("Skipped trigger match: {}", e),
            }
        }

        if results.is_empty() {
            debug!("Trigger {} '{}' matched no active objectives", action.as_str(), target);
        }
        results
    }

    /// Dispatch a typed game event
    pub fn process_event(&mut self, event: &QuestEvent) -> Vec<QuestEventResult> {
        let (action, target, quantity) = event.trigger();
        debug!("Processing quest event {}", event.event_type());
        self.check_quest_trigger(action, target, quantity)
    }

    pub fn quest_status(&self, quest_id: &str) -> QuestStatus {
        self.store.status(quest_id)
    }

    pub fn quest_progress(&self, quest_id: &str) -> Option<&QuestProgress> {
        self.store.get(quest_id)
    }

    /// The stage the player is working on; `None` unless the quest is in progress
    pub fn current_stage(&self, quest_id: &str) -> Option<&Stage> {
        let progress = self.store.get(quest_id).filter(|p| p.is_in_progress())?;
        self.catalog.get(quest_id)?.stage(&progress.current_stage)
    }

    /// Incomplete, visible objectives of the current stage
    pub fn active_objectives(&self, quest_id: &str) -> Vec<ObjectiveView> {
        let Some(progress) = self.store.get(quest_id).filter(|p| p.is_in_progress()) else {
            return Vec::new();
        };
        let Some(stage) = self.current_stage(quest_id) else {
            return Vec::new();
        };

        stage
            .objectives
            .iter()
            .filter(|o| is_active(o, progress))
            .map(|o| ObjectiveView {
                id: o.id.clone(),
                description: o.description.clone(),
                objective_type: o.objective_type,
                target_id: o.target_id.clone(),
                target_name: o.target_name.clone(),
                current: progress.progress_of(&o.id),
                quantity: o.quantity,
                completed: false,
            })
            .collect()
    }

    /// The current stage is finished but waits for `confirm_stage`
    pub fn awaiting_confirmation(&self, quest_id: &str) -> bool {
        let Some(progress) = self.store.get(quest_id).filter(|p| p.is_in_progress()) else {
            return false;
        };
        self.current_stage(quest_id)
            .is_some_and(|stage| !stage.auto_complete && stage_objectives_done(stage, progress))
    }

    pub fn is_objective_completed(&self, quest_id: &str, objective_id: &str) -> bool {
        self.store
            .get(quest_id)
            .is_some_and(|p| p.is_objective_completed(objective_id))
    }

    /// Sum of quest points over completed quests still in the catalog
    pub fn quest_points(&self) -> u32 {
        self.store
            .records()
            .filter(|p| p.is_completed())
            .filter_map(|p| self.catalog.get(&p.quest_id))
            .map(|q| q.quest_points)
            .sum()
    }

    /// Completed quests whose rewards haven't been applied yet
    pub fn unclaimed_reward_quests(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .store
            .records()
            .filter(|p| p.is_completed() && !p.rewards_claimed)
            .map(|p| p.quest_id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Hand each of a completed quest's rewards to `sink`, in declaration
    /// order. Rewards can be claimed once per completion.
    pub fn apply_quest_rewards(
        &mut self,
        quest_id: &str,
        sink: &mut dyn RewardSink,
    ) -> Result<Vec<RewardOutcome>, QuestError> {
        let progress = self
            .store
            .get_mut(quest_id)
            .filter(|p| p.is_completed())
            .ok_or_else(|| QuestError::NotCompleted(quest_id.to_string()))?;

        if progress.rewards_claimed {
            return Err(QuestError::RewardsAlreadyClaimed(quest_id.to_string()));
        }

        let quest = self
            .catalog
            .get(quest_id)
            .ok_or_else(|| QuestError::QuestNotFound(quest_id.to_string()))?;

        let outcomes: Vec<RewardOutcome> = quest
            .rewards
            .iter()
            .map(|reward| RewardOutcome::apply(reward, sink))
            .collect();

        progress.rewards_claimed = true;
        info!("Applied {} rewards for quest '{}'", outcomes.len(), quest_id);
        Ok(outcomes)
    }
}

/// Not completed, and either visible or revealed
fn is_active(objective: &Objective, progress: &QuestProgress) -> bool {
    !progress.is_objective_completed(&objective.id)
        && (!objective.hidden || progress.is_revealed(&objective.id))
}

fn stage_objectives_done(stage: &Stage, progress: &QuestProgress) -> bool {
    stage
        .objectives
        .iter()
        .all(|o| progress.progress_of(&o.id) >= o.quantity)
}

/// Finish the current stage and move to the next, completing the quest when
/// there is none. Returns the finished stage id.
fn advance_stage(quest: &Quest, progress: &mut QuestProgress) -> String {
    let finished = progress.current_stage.clone();
    progress.completed_stages.insert(finished.clone());

    match quest.next_stage(&finished) {
        Some(next) => {
            info!("Quest '{}' advanced to stage '{}'", quest.id, next.id);
            progress.current_stage = next.id.clone();
        }
        None => {
            progress.complete();
            info!("Completed quest '{}'", quest.id);
        }
    }
    finished
}

/// Advance through every auto-completing stage whose objectives are all met.
/// Terminates because each step consumes one stage.
fn run_stage_cascade(quest: &Quest, progress: &mut QuestProgress) -> Vec<String> {
    let mut finished = Vec::new();

    while progress.is_in_progress() {
        let Some(stage) = quest.stage(&progress.current_stage) else {
            break;
        };
        if !stage.auto_complete || !stage_objectives_done(stage, progress) {
            break;
        }
        for objective in &stage.objectives {
            progress.mark_objective_completed(&objective.id);
        }
        finished.push(advance_stage(quest, progress));
    }

    finished
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlayerProfile;
    use crate::quest::definition::Reward;

    fn cooks_assistant() -> Quest {
        let source = include_str!("../../data/quests/cooks_assistant.toml");
        Quest::from_toml(source, "cooks_assistant.toml").unwrap()
    }

    fn sheep_shearer() -> Quest {
        Quest::from_toml(include_str!("../../data/quests/sheep_shearer.toml"), "sheep_shearer.toml")
            .unwrap()
    }

    fn engine() -> QuestEngine {
        let mut registry = QuestRegistry::new();
        registry.register(cooks_assistant());
        registry.register(sheep_shearer());
        QuestEngine::new(Arc::new(registry))
    }

    #[test]
    fn test_start_twice_keeps_first_progress() {
        let mut engine = engine();
        assert!(engine.start_quest("cooks_assistant").is_ok());
        engine
            .update_objective_progress("cooks_assistant", "get_milk", 1)
            .unwrap();
        let started_at = engine.quest_progress("cooks_assistant").unwrap().started_at;

        assert_eq!(
            engine.start_quest("cooks_assistant"),
            Err(QuestError::AlreadyStarted("cooks_assistant".to_string()))
        );

        let progress = engine.quest_progress("cooks_assistant").unwrap();
        assert_eq!(progress.started_at, started_at);
        assert_eq!(progress.progress_of("get_milk"), 1);
    }

    #[test]
    fn test_start_unknown_quest_fails() {
        let mut engine = engine();
        assert_eq!(
            engine.start_quest("dragon_slayer"),
            Err(QuestError::QuestNotFound("dragon_slayer".to_string()))
        );
        assert_eq!(engine.quest_status("dragon_slayer"), QuestStatus::NotStarted);
    }

    #[test]
    fn test_objective_completes_once_and_set_stays_unique() {
        let mut registry = QuestRegistry::new();
        registry.register(
            Quest::new("rats", "Rats", "innkeeper")
                .with_stage(
                    Stage::new("cellar", "Cellar")
                        .with_objective(
                            Objective::new("kill_rats", ObjectiveType::Kill, "rat", "Kill rats")
                                .with_quantity(3),
                        )
                        .with_objective(Objective::new(
                            "find_key",
                            ObjectiveType::Collect,
                            "key",
                            "Find the key",
                        )),
                ),
        );
        let mut engine = QuestEngine::new(Arc::new(registry));
        engine.start_quest("rats").unwrap();

        let first = engine.update_objective_progress("rats", "kill_rats", 2).unwrap();
        assert!(!first.objective_completed);

        let second = engine.update_objective_progress("rats", "kill_rats", 2).unwrap();
        assert!(second.objective_completed);
        assert_eq!(second.new_progress, 4);

        let third = engine.update_objective_progress("rats", "kill_rats", 1).unwrap();
        assert!(!third.objective_completed);

        let progress = engine.quest_progress("rats").unwrap();
        assert_eq!(progress.progress_of("kill_rats"), 5);
        assert_eq!(
            progress.completed_objectives.iter().filter(|id| *id == "kill_rats").count(),
            1
        );
        assert_eq!(progress.current_stage, "cellar");
    }

    #[test]
    fn test_objectives_are_scoped_to_current_stage() {
        let mut engine = engine();
        engine.start_quest("cooks_assistant").unwrap();

        let err = engine
            .update_objective_progress("cooks_assistant", "deliver_ingredients", 1)
            .unwrap_err();
        assert!(matches!(err, QuestError::ObjectiveNotActive { .. }));

        let err = engine
            .update_objective_progress("cooks_assistant", "bake_cake", 1)
            .unwrap_err();
        assert!(matches!(err, QuestError::ObjectiveNotFound { .. }));

        let err = engine
            .update_objective_progress("sheep_shearer", "shear_sheep", 1)
            .unwrap_err();
        assert_eq!(err, QuestError::NotInProgress("sheep_shearer".to_string()));
    }

    #[test]
    fn test_stage_advances_in_declaration_order() {
        let mut engine = engine();
        engine.start_quest("cooks_assistant").unwrap();

        for objective in ["get_milk", "get_egg"] {
            let result = engine
                .update_objective_progress("cooks_assistant", objective, 1)
                .unwrap();
            assert!(result.stages_completed.is_empty());
        }

        let result = engine
            .update_objective_progress("cooks_assistant", "get_flour", 1)
            .unwrap();
        assert_eq!(result.stages_completed, vec!["collect_ingredients".to_string()]);
        assert_eq!(result.current_stage, "return_to_cook");
        assert!(!result.quest_completed);
        assert_eq!(engine.current_stage("cooks_assistant").unwrap().id, "return_to_cook");

        let result = engine
            .update_objective_progress("cooks_assistant", "deliver_ingredients", 1)
            .unwrap();
        assert!(result.quest_completed);
        assert_eq!(engine.quest_status("cooks_assistant"), QuestStatus::Completed);

        let progress = engine.quest_progress("cooks_assistant").unwrap();
        assert_eq!(progress.current_stage, "return_to_cook");
        assert!(progress.completed_at.is_some());
        assert!(engine.current_stage("cooks_assistant").is_none());
    }

    #[test]
    fn test_trigger_increments_only_matching_objective() {
        let mut engine = engine();
        engine.start_quest("cooks_assistant").unwrap();

        let results = engine.check_quest_trigger(TriggerAction::Collect, "bucket_of_milk", 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].objective_id, "get_milk");

        let progress = engine.quest_progress("cooks_assistant").unwrap();
        assert_eq!(progress.progress_of("get_milk"), 1);
        assert_eq!(progress.progress_of("get_egg"), 0);
        assert_eq!(progress.progress_of("get_flour"), 0);
        assert_eq!(progress.progress_of("deliver_ingredients"), 0);
    }

    #[test]
    fn test_trigger_matches_display_name() {
        let mut engine = engine();
        engine.start_quest("cooks_assistant").unwrap();

        let results = engine.check_quest_trigger(TriggerAction::Collect, "Pot of flour", 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].objective_id, "get_flour");
    }

    #[test]
    fn test_cooks_assistant_scenario() {
        let mut engine = engine();
        assert!(engine.start_quest("cooks_assistant").is_ok());

        assert!(engine.check_quest_trigger(TriggerAction::Talk, "cook", 1).is_empty());
        assert!(engine.quest_progress("cooks_assistant").unwrap().objective_progress.is_empty());

        for item in ["bucket_of_milk", "egg", "pot_of_flour"] {
            let results = engine.check_quest_trigger(TriggerAction::Collect, item, 1);
            assert_eq!(results.len(), 1);
        }
        assert_eq!(
            engine.quest_progress("cooks_assistant").unwrap().current_stage,
            "return_to_cook"
        );

        let results = engine.check_quest_trigger(TriggerAction::Deliver, "cook", 1);
        assert_eq!(results.len(), 1);
        assert!(results[0].quest_completed);
        assert_eq!(engine.quest_status("cooks_assistant"), QuestStatus::Completed);
    }

    #[test]
    fn test_trigger_spans_concurrent_quests() {
        let mut registry = QuestRegistry::new();
        for id in ["first", "second"] {
            registry.register(
                Quest::new(id, id, "npc").with_stage(
                    Stage::new("hunt", "Hunt").with_objective(
                        Objective::new(
                            &format!("{id}_goblins"),
                            ObjectiveType::Kill,
                            "goblin",
                            "Kill goblins",
                        )
                        .with_quantity(2),
                    ),
                ),
            );
        }
        let mut engine = QuestEngine::new(Arc::new(registry));
        engine.start_quest("first").unwrap();
        engine.start_quest("second").unwrap();

        let results = engine.process_event(&QuestEvent::MonsterKilled {
            entity_type: "goblin".to_string(),
        });
        let quests: Vec<&str> = results.iter().map(|r| r.quest_id.as_str()).collect();
        assert_eq!(quests, vec!["first", "second"]);
    }

    #[test]
    fn test_hidden_objective_waits_for_reveal() {
        let mut engine = engine();
        engine.start_quest("sheep_shearer").unwrap();

        let active: Vec<String> = engine
            .active_objectives("sheep_shearer")
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(active, vec!["shear_sheep", "spin_wool"]);

        assert!(engine.check_quest_trigger(TriggerAction::Visit, "fred_back_field", 1).is_empty());

        assert!(engine.reveal_objective("sheep_shearer", "find_lost_sheep").unwrap());
        assert_eq!(engine.active_objectives("sheep_shearer").len(), 3);

        let results = engine.check_quest_trigger(TriggerAction::Visit, "fred_back_field", 1);
        assert_eq!(results.len(), 1);
        assert!(results[0].objective_completed);
    }

    #[test]
    fn test_manual_stage_waits_for_confirmation() {
        let mut engine = engine();
        engine.start_quest("sheep_shearer").unwrap();
        engine.reveal_objective("sheep_shearer", "find_lost_sheep").unwrap();
        engine.check_quest_trigger(TriggerAction::Use, "sheep", 20);
        engine.check_quest_trigger(TriggerAction::Craft, "ball_of_wool", 20);
        engine.check_quest_trigger(TriggerAction::Visit, "fred_back_field", 1);
        assert_eq!(engine.current_stage("sheep_shearer").unwrap().id, "hand_in_wool");

        assert!(matches!(
            engine.confirm_stage("sheep_shearer"),
            Err(QuestError::StageIncomplete { .. })
        ));

        let results = engine.check_quest_trigger(TriggerAction::Deliver, "fred", 1);
        assert!(results[0].objective_completed);
        assert!(results[0].stages_completed.is_empty());
        assert_eq!(engine.quest_status("sheep_shearer"), QuestStatus::InProgress);

        let advance = engine.confirm_stage("sheep_shearer").unwrap();
        assert_eq!(advance.stages_completed, vec!["hand_in_wool".to_string()]);
        assert!(advance.quest_completed);
        assert_eq!(engine.quest_status("sheep_shearer"), QuestStatus::Completed);
    }

    #[test]
    fn test_complete_quest_is_not_gated_on_stages() {
        let mut engine = engine();
        assert_eq!(
            engine.complete_quest("cooks_assistant"),
            Err(QuestError::NotInProgress("cooks_assistant".to_string()))
        );

        engine.start_quest("cooks_assistant").unwrap();
        engine.complete_quest("cooks_assistant").unwrap();
        assert_eq!(engine.quest_status("cooks_assistant"), QuestStatus::Completed);
        assert!(engine.quest_progress("cooks_assistant").unwrap().completed_stages.is_empty());

        assert_eq!(
            engine.start_quest("cooks_assistant"),
            Err(QuestError::AlreadyCompleted("cooks_assistant".to_string()))
        );
        assert_eq!(
            engine.complete_quest("cooks_assistant"),
            Err(QuestError::AlreadyCompleted("cooks_assistant".to_string()))
        );
    }

    #[test]
    fn test_abandon_returns_quest_to_not_started() {
        let mut engine = engine();
        engine.start_quest("cooks_assistant").unwrap();
        engine.abandon_quest("cooks_assistant").unwrap();
        assert_eq!(engine.quest_status("cooks_assistant"), QuestStatus::NotStarted);
        assert!(engine.start_quest("cooks_assistant").is_ok());
    }

    #[test]
    fn test_available_quests_respects_completed_list_and_requirements() {
        let engine = engine();
        let mut profile = PlayerProfile::new(28);

        let ids = |quests: Vec<&Arc<Quest>>| -> Vec<String> {
            quests.iter().map(|q| q.id.clone()).collect()
        };

        assert_eq!(ids(engine.available_quests(&profile, &profile, &[])), vec!["cooks_assistant"]);

        let completed = vec!["cooks_assistant".to_string()];
        assert_eq!(
            ids(engine.available_quests(&profile, &profile, &completed)),
            vec!["sheep_shearer"]
        );

        profile.set_skill_level("crafting", 0);
        assert!(engine.available_quests(&profile, &profile, &completed).is_empty());
    }

    #[test]
    fn test_available_quests_excludes_in_progress() {
        let mut engine = engine();
        let profile = PlayerProfile::new(28);
        engine.start_quest("cooks_assistant").unwrap();
        assert!(engine.available_quests(&profile, &profile, &[]).is_empty());
    }

    #[test]
    fn test_unknown_requirement_policy() {
        let quest = Quest::new("odd", "Odd", "npc")
            .with_requirement(Requirement::Unknown { kind: "reputation".to_string() });
        let profile = PlayerProfile::new(28);

        let lenient = engine();
        assert!(lenient.check_requirements(&quest, &profile, &profile, &[]));

        let strict =
            engine().with_unknown_requirement_policy(UnknownRequirementPolicy::NeverSatisfied);
        assert!(!strict.check_requirements(&quest, &profile, &profile, &[]));
    }

    #[test]
    fn test_item_requirement_checks_inventory() {
        let quest = Quest::new("gate", "Gate", "guard").with_requirement(Requirement::Item {
            item_id: "coins".to_string(),
            quantity: 10,
        });
        let engine = engine();
        let mut profile = PlayerProfile::new(28);
        assert!(!engine.check_requirements(&quest, &profile, &profile, &[]));

        profile.inventory.add_item("coins", 10);
        assert!(engine.check_requirements(&quest, &profile, &profile, &[]));
    }

    #[test]
    fn test_rewards_apply_once_in_order() {
        let mut engine = engine();
        let mut profile = PlayerProfile::new(28);
        engine.start_quest("cooks_assistant").unwrap();

        assert_eq!(
            engine.apply_quest_rewards("cooks_assistant", &mut profile),
            Err(QuestError::NotCompleted("cooks_assistant".to_string()))
        );

        engine.complete_quest("cooks_assistant").unwrap();
        assert_eq!(engine.unclaimed_reward_quests(), vec!["cooks_assistant".to_string()]);

        let outcomes = engine.apply_quest_rewards("cooks_assistant", &mut profile).unwrap();
        assert_eq!(outcomes.len(), 4);
        assert!(matches!(outcomes[0].reward, Reward::Experience { .. }));
        assert_eq!(outcomes[0].new_level, Some(4));
        assert!(outcomes.iter().all(|o| o.applied));

        assert_eq!(profile.coins, 500);
        assert!(profile.inventory.has("sardine", 20));
        assert!(profile.unlocks.contains("lumbridge_castle_range"));
        assert_eq!(engine.quest_points(), 1);

        assert_eq!(
            engine.apply_quest_rewards("cooks_assistant", &mut profile),
            Err(QuestError::RewardsAlreadyClaimed("cooks_assistant".to_string()))
        );
        assert!(engine.unclaimed_reward_quests().is_empty());
    }

    #[test]
    fn test_item_reward_reports_full_inventory() {
        let mut engine = engine();
        let mut profile = PlayerProfile::new(1);
        profile.inventory.add_item("bronze_axe", 1);

        engine.start_quest("cooks_assistant").unwrap();
        engine.complete_quest("cooks_assistant").unwrap();
        let outcomes = engine.apply_quest_rewards("cooks_assistant", &mut profile).unwrap();

        let item = outcomes
            .iter()
            .find(|o| matches!(o.reward, Reward::Item { .. }))
            .unwrap();
        assert!(!item.applied);
        assert!(!profile.inventory.has("sardine", 1));
    }

    #[test]
    fn test_register_quest_is_copy_on_write() {
        let shared = Arc::new(QuestRegistry::new());
        let mut first = QuestEngine::new(shared.clone());
        let second = QuestEngine::new(shared);

        first.register_quest(cooks_assistant());
        assert_eq!(first.all_quests().count(), 1);
        assert_eq!(second.all_quests().count(), 0);
    }

    #[test]
    fn test_restored_store_continues() {
        let mut engine = engine();
        engine.start_quest("cooks_assistant").unwrap();
        engine.check_quest_trigger(TriggerAction::Collect, "egg", 1);

        let json = engine.store().to_json().unwrap();
        let store = PlayerQuestState::from_json(&json).unwrap();
        let mut restored = QuestEngine::with_store(engine.catalog().clone(), store);

        let ids: Vec<String> = restored
            .active_objectives("cooks_assistant")
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec!["get_milk", "get_flour"]);

        restored.check_quest_trigger(TriggerAction::Collect, "bucket_of_milk", 1);
        restored.check_quest_trigger(TriggerAction::Collect, "pot_of_flour", 1);
        assert_eq!(restored.current_stage("cooks_assistant").unwrap().id, "return_to_cook");
    }

    fn saved_store(status: &str, current_stage: &str) -> PlayerQuestState {
        let json = format!(
            r#"{{"quests": {{"cooks_assistant": {{
                "quest_id": "cooks_assistant",
                "status": "{status}",
                "current_stage": "{current_stage}",
                "completed_stages": [],
                "completed_objectives": [],
                "objective_progress": {{}},
                "started_at": "2024-01-01T00:00:00Z",
                "completed_at": null
            }}}}}}"#
        );
        PlayerQuestState::from_json(&json).unwrap()
    }

    #[test]
    fn test_restore_rejects_not_started_record() {
        let catalog = engine().catalog().clone();
        let err = QuestEngine::restore(catalog, saved_store("not_started", "collect_ingredients"))
            .err()
            .unwrap();
        assert!(matches!(err, QuestError::InvalidProgress { .. }));
    }

    #[test]
    fn test_restore_rejects_unknown_stage() {
        let catalog = engine().catalog().clone();
        let err = QuestEngine::restore(catalog, saved_store("in_progress", "no_such_stage"))
            .err()
            .unwrap();
        assert_eq!(
            err,
            QuestError::InvalidProgress {
                quest_id: "cooks_assistant".to_string(),
                reason: "unknown current stage 'no_such_stage'".to_string(),
            }
        );
    }

    #[test]
    fn test_restore_accepts_valid_store() {
        let catalog = engine().catalog().clone();
        let store = saved_store("in_progress", "collect_ingredients");
        let mut restored = QuestEngine::restore(catalog, store).unwrap();
        assert_eq!(restored.check_quest_trigger(TriggerAction::Collect, "egg", 1).len(), 1);
    }

    #[test]
    fn test_confirm_reports_missing_stage() {
        // Content reloaded without the stage the player was on
        let catalog = engine().catalog().clone();
        let store = saved_store("in_progress", "retired_stage");
        let mut engine = QuestEngine::with_store(catalog, store);
        assert_eq!(
            engine.confirm_stage("cooks_assistant"),
            Err(QuestError::StageNotFound {
                quest_id: "cooks_assistant".to_string(),
                stage_id: "retired_stage".to_string(),
            })
        );
    }

    #[test]
    fn test_awaiting_confirmation_tracks_manual_stage() {
        let mut engine = engine();
        engine.start_quest("sheep_shearer").unwrap();
        engine.reveal_objective("sheep_shearer", "find_lost_sheep").unwrap();
        engine.check_quest_trigger(TriggerAction::Use, "sheep", 20);
        engine.check_quest_trigger(TriggerAction::Craft, "ball_of_wool", 20);
        engine.check_quest_trigger(TriggerAction::Visit, "fred_back_field", 1);
        assert!(!engine.awaiting_confirmation("sheep_shearer"));
        assert!(!engine.is_objective_completed("sheep_shearer", "deliver_wool"));

        engine.check_quest_trigger(TriggerAction::Deliver, "fred", 1);
        assert!(engine.awaiting_confirmation("sheep_shearer"));
        assert!(engine.is_objective_completed("sheep_shearer", "deliver_wool"));

        engine.confirm_stage("sheep_shearer").unwrap();
        assert!(!engine.awaiting_confirmation("sheep_shearer"));
    }
}
