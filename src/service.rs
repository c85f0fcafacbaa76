//! Per-player quest sessions.
//!
//! Each player gets a `QuestEngine` and a `PlayerProfile` behind one async
//! mutex; every call holds that lock for its whole duration, so stage
//! cascades and trigger dispatch are atomic per player. Catalogs are shared
//! snapshots that hot reload can swap out.
//!
//! Only calls that change progress create a session. Reads for a player
//! with no session are answered from a fresh one that is not kept. Sessions
//! live in memory until `evict_idle` drops them; callers persist progress
//! through `snapshot` and `restore`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::EngineSettings;
use crate::content::Catalogs;
use crate::dialogue::DialogueEngine;
use crate::error::{DialogueError, QuestError};
use crate::player::PlayerProfile;
use crate::protocol::{
    ClaimedRewards, DialogueView, JournalEntry, PlayerSnapshot, QuestDetails, QuestSummary,
    SelectionResponse, TriggerResponse,
};
use crate::quest::{QuestEngine, QuestRegistry, RewardOutcome, StageAdvance, TriggerAction};

pub struct PlayerSession {
    pub quests: QuestEngine,
    pub profile: PlayerProfile,
}

impl PlayerSession {
    fn new(catalog: Arc<QuestRegistry>, settings: &EngineSettings) -> Self {
        Self {
            quests: QuestEngine::new(catalog)
                .with_unknown_requirement_policy(settings.unknown_requirements),
            profile: PlayerProfile::new(settings.inventory_size),
        }
    }

    /// Apply rewards for every completed quest that hasn't paid out yet
    fn claim_pending_rewards(&mut self) -> Vec<ClaimedRewards> {
        let mut claimed = Vec::new();
        for quest_id in self.quests.unclaimed_reward_quests() {
            match self.quests.apply_quest_rewards(&quest_id, &mut self.profile) {
                Ok(outcomes) => claimed.push(ClaimedRewards { quest_id, outcomes }),
                Err(e) => warn!("Failed to apply rewards for '{}': {}", quest_id, e),
            }
        }
        claimed
    }
}

struct SessionSlot {
    session: Arc<Mutex<PlayerSession>>,
    last_seen: Instant,
}

pub struct QuestService {
    catalogs: RwLock<Catalogs>,
    sessions: DashMap<String, SessionSlot>,
    settings: EngineSettings,
}

impl QuestService {
    pub fn new(catalogs: Catalogs, settings: EngineSettings) -> Self {
        Self {
            catalogs: RwLock::new(catalogs),
            sessions: DashMap::new(),
            settings,
        }
    }

    pub async fn catalogs(&self) -> Catalogs {
        self.catalogs.read().await.clone()
    }

    /// Swap in reloaded content; progress in live sessions is kept
    pub async fn replace_catalogs(&self, catalogs: Catalogs) {
        info!(
            "Replacing catalogs: {} quests, {} NPCs",
            catalogs.quests.len(),
            catalogs.dialogue.len()
        );
        *self.catalogs.write().await = catalogs;
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drop sessions nothing has touched for `max_idle` and no call is
    /// holding. Returns how many were dropped.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut evicted = 0;
        self.sessions.retain(|player_id, slot| {
            let keep = slot.last_seen.elapsed() < max_idle || Arc::strong_count(&slot.session) > 1;
            if !keep {
                debug!("Evicting idle session for player '{}'", player_id);
                evicted += 1;
            }
            keep
        });
        evicted
    }

    fn existing_session(&self, player_id: &str) -> Option<Arc<Mutex<PlayerSession>>> {
        self.sessions.get_mut(player_id).map(|mut slot| {
            slot.last_seen = Instant::now();
            slot.session.clone()
        })
    }

    fn session_or_insert(&self, player_id: &str, catalogs: &Catalogs) -> Arc<Mutex<PlayerSession>> {
        let mut slot = self
            .sessions
            .entry(player_id.to_string())
            .or_insert_with(|| {
                debug!("Creating session for player '{}'", player_id);
                SessionSlot {
                    session: Arc::new(Mutex::new(PlayerSession::new(
                        catalogs.quests.clone(),
                        &self.settings,
                    ))),
                    last_seen: Instant::now(),
                }
            });
        slot.last_seen = Instant::now();
        slot.session.clone()
    }

    /// Run `f` with the player's session locked and engines on the current
    /// catalogs. With `create` unset, an unknown player gets a scratch
    /// session that is dropped afterwards.
    async fn run_session<R>(
        &self,
        player_id: &str,
        create: bool,
        f: impl FnOnce(&mut PlayerSession, &DialogueEngine) -> R,
    ) -> R {
        let catalogs = self.catalogs().await;
        let session = if create {
            Some(self.session_or_insert(player_id, &catalogs))
        } else {
            self.existing_session(player_id)
        };

        let dialogue = DialogueEngine::new(catalogs.dialogue.clone())
            .with_navigation(self.settings.navigation)
            .with_option_requirements(self.settings.option_requirements);

        match session {
            Some(session) => {
                let mut session = session.lock().await;
                session.quests.set_catalog(catalogs.quests.clone());
                f(&mut *session, &dialogue)
            }
            None => {
                let mut scratch = PlayerSession::new(catalogs.quests.clone(), &self.settings);
                f(&mut scratch, &dialogue)
            }
        }
    }

    /// Session for a call that changes progress; created on first use
    async fn with_session<R>(
        &self,
        player_id: &str,
        f: impl FnOnce(&mut PlayerSession, &DialogueEngine) -> R,
    ) -> R {
        self.run_session(player_id, true, f).await
    }

    /// Session for a read, or for a change that needs existing progress
    async fn with_known_session<R>(
        &self,
        player_id: &str,
        f: impl FnOnce(&mut PlayerSession, &DialogueEngine) -> R,
    ) -> R {
        self.run_session(player_id, false, f).await
    }

    pub async fn list_quests(&self) -> Vec<QuestSummary> {
        let catalogs = self.catalogs().await;
        catalogs.quests.all().map(|q| QuestSummary::from(&**q)).collect()
    }

    /// Status of every quest in the catalog for this player
    pub async fn journal(&self, player_id: &str) -> Vec<JournalEntry> {
        self.with_known_session(player_id, |session, _| {
            session
                .quests
                .all_quests()
                .map(|quest| JournalEntry {
                    quest_id: quest.id.clone(),
                    name: quest.name.clone(),
                    status: session.quests.quest_status(&quest.id),
                    current_stage: session.quests.current_stage(&quest.id).map(|s| s.id.clone()),
                })
                .collect()
        })
        .await
    }

    pub async fn available_quests(&self, player_id: &str) -> Vec<QuestSummary> {
        self.with_known_session(player_id, |session, _| {
            let completed = session.quests.store().completed_ids();
            session
                .quests
                .available_quests(&session.profile, &session.profile, &completed)
                .into_iter()
                .map(|q| QuestSummary::from(&**q))
                .collect()
        })
        .await
    }

    pub async fn quest_details(
        &self,
        player_id: &str,
        quest_id: &str,
    ) -> Result<QuestDetails, QuestError> {
        self.with_known_session(player_id, |session, _| -> Result<QuestDetails, QuestError> {
            let quest = session
                .quests
                .catalog()
                .get(quest_id)
                .cloned()
                .ok_or_else(|| QuestError::QuestNotFound(quest_id.to_string()))?;
            Ok(QuestDetails::build(&quest, &session.quests))
        })
        .await
    }

    pub async fn start_quest(
        &self,
        player_id: &str,
        quest_id: &str,
    ) -> Result<QuestDetails, QuestError> {
        self.with_session(player_id, |session, _| -> Result<QuestDetails, QuestError> {
            session.quests.start_quest(quest_id)?;
            let quest = session
                .quests
                .catalog()
                .get(quest_id)
                .cloned()
                .ok_or_else(|| QuestError::QuestNotFound(quest_id.to_string()))?;
            Ok(QuestDetails::build(&quest, &session.quests))
        })
        .await
    }

    /// Complete a quest and pay out its rewards
    pub async fn complete_quest(
        &self,
        player_id: &str,
        quest_id: &str,
    ) -> Result<Vec<RewardOutcome>, QuestError> {
        self.with_known_session(player_id, |session, _| -> Result<_, QuestError> {
            session.quests.complete_quest(quest_id)?;
            session.quests.apply_quest_rewards(quest_id, &mut session.profile)
        })
        .await
    }

    pub async fn confirm_stage(
        &self,
        player_id: &str,
        quest_id: &str,
    ) -> Result<(StageAdvance, Vec<ClaimedRewards>), QuestError> {
        self.with_known_session(player_id, |session, _| -> Result<_, QuestError> {
            let advance = session.quests.confirm_stage(quest_id)?;
            Ok((advance, session.claim_pending_rewards()))
        })
        .await
    }

    pub async fn abandon_quest(&self, player_id: &str, quest_id: &str) -> Result<(), QuestError> {
        self.with_known_session(player_id, |session, _| session.quests.abandon_quest(quest_id))
            .await
    }

    pub async fn reveal_objective(
        &self,
        player_id: &str,
        quest_id: &str,
        objective_id: &str,
    ) -> Result<bool, QuestError> {
        self.with_known_session(player_id, |session, _| {
            session.quests.reveal_objective(quest_id, objective_id)
        })
        .await
    }

    /// Dispatch a game action. Collected and crafted items also land in the
    /// player's inventory.
    pub async fn trigger(
        &self,
        player_id: &str,
        action: TriggerAction,
        target: &str,
        quantity: u32,
    ) -> TriggerResponse {
        self.with_session(player_id, |session, _| {
            if matches!(action, TriggerAction::Collect | TriggerAction::Craft)
                && !session.profile.inventory.add_item(target, quantity)
            {
                warn!(
                    "Inventory full for player '{}', dropped {} x {}",
                    player_id, quantity, target
                );
            }

            let results = session.quests.check_quest_trigger(action, target, quantity);
            TriggerResponse {
                results,
                rewards: session.claim_pending_rewards(),
            }
        })
        .await
    }

    pub async fn dialogue(
        &self,
        player_id: &str,
        npc_id: &str,
    ) -> Result<DialogueView, DialogueError> {
        self.with_known_session(player_id, |session, dialogue| -> Result<_, DialogueError> {
            let npc = dialogue
                .npc(npc_id)
                .ok_or_else(|| DialogueError::NpcNotFound(npc_id.to_string()))?;
            let node = dialogue
                .get_dialogue(npc_id, &session.quests)
                .ok_or_else(|| DialogueError::NpcNotFound(npc_id.to_string()))?;
            Ok(DialogueView::build(npc, node, dialogue, &session.quests, &session.profile))
        })
        .await
    }

    pub async fn select_option(
        &self,
        player_id: &str,
        npc_id: &str,
        option_id: &str,
    ) -> Result<SelectionResponse, DialogueError> {
        self.with_session(player_id, |session, dialogue| -> Result<_, DialogueError> {
            let outcome = dialogue.select_option(
                npc_id,
                option_id,
                &mut session.quests,
                &session.profile,
            )?;
            let rewards = session.claim_pending_rewards();

            let next = match (&outcome.next, dialogue.npc(npc_id)) {
                (Some(node), Some(npc)) => Some(DialogueView::build(
                    npc,
                    node,
                    dialogue,
                    &session.quests,
                    &session.profile,
                )),
                _ => None,
            };

            Ok(SelectionResponse {
                effect: outcome.effect,
                next,
                rewards,
            })
        })
        .await
    }

    pub async fn snapshot(&self, player_id: &str) -> PlayerSnapshot {
        self.with_known_session(player_id, |session, _| PlayerSnapshot {
            quests: session.quests.store().clone(),
            profile: session.profile.clone(),
        })
        .await
    }

    /// Replace a player's progress and profile with a saved snapshot. The
    /// snapshot is checked against the current catalog first; a rejected one
    /// leaves the player untouched.
    pub async fn restore(
        &self,
        player_id: &str,
        snapshot: PlayerSnapshot,
    ) -> Result<(), QuestError> {
        let catalogs = self.catalogs().await;
        let quests = QuestEngine::restore(catalogs.quests, snapshot.quests)?
            .with_unknown_requirement_policy(self.settings.unknown_requirements);
        let profile = snapshot.profile;

        self.with_session(player_id, |session, _| {
            session.quests = quests;
            session.profile = profile;
        })
        .await;
        info!("Restored snapshot for player '{}'", player_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::load_catalogs;
    use crate::dialogue::DialogueEffect;
    use crate::quest::{PlayerQuestState, QuestStatus};
    use std::path::Path;

    fn service() -> QuestService {
        let catalogs = load_catalogs(&Path::new(env!("CARGO_MANIFEST_DIR")).join("data")).unwrap();
        QuestService::new(catalogs, EngineSettings::default())
    }

    #[tokio::test]
    async fn test_players_are_isolated() {
        let service = service();
        service.start_quest("alice", "cooks_assistant").await.unwrap();

        let alice = service.journal("alice").await;
        let bob = service.journal("bob").await;
        let status = |journal: &[JournalEntry]| {
            journal
                .iter()
                .find(|e| e.quest_id == "cooks_assistant")
                .map(|e| e.status)
        };

        assert_eq!(status(&alice), Some(QuestStatus::InProgress));
        assert_eq!(status(&bob), Some(QuestStatus::NotStarted));
        assert_eq!(service.session_count(), 1);
    }

    #[tokio::test]
    async fn test_reads_do_not_create_sessions() {
        let service = service();
        for i in 0..50 {
            let player = format!("visitor_{i}");
            service.journal(&player).await;
            service.available_quests(&player).await;
            service.snapshot(&player).await;
            service.dialogue(&player, "cook").await.unwrap();
            assert!(service.abandon_quest(&player, "cooks_assistant").await.is_err());
        }
        assert_eq!(service.session_count(), 0);

        service.start_quest("alice", "cooks_assistant").await.unwrap();
        assert_eq!(service.session_count(), 1);
    }

    #[tokio::test]
    async fn test_evict_idle_sessions() {
        let service = service();
        service.start_quest("alice", "cooks_assistant").await.unwrap();

        assert_eq!(service.evict_idle(Duration::from_secs(3600)), 0);
        assert_eq!(service.session_count(), 1);

        assert_eq!(service.evict_idle(Duration::ZERO), 1);
        assert_eq!(service.session_count(), 0);
        let journal = service.journal("alice").await;
        assert!(journal.iter().all(|e| e.status == QuestStatus::NotStarted));
    }

    #[tokio::test]
    async fn test_cooks_assistant_through_dialogue() {
        let service = service();

        let view = service.dialogue("alice", "cook").await.unwrap();
        assert_eq!(view.node_id, "cook_quest_start");

        let selection = service.select_option("alice", "cook", "offer_help").await.unwrap();
        assert!(matches!(selection.effect, Some(DialogueEffect::QuestStarted { .. })));
        let next = selection.next.unwrap();
        assert_eq!(next.node_id, "cook_quest_progress");
        let hand_over = next.choices.iter().find(|c| c.id == "hand_over").unwrap();
        assert!(!hand_over.available);

        for item in ["bucket_of_milk", "egg", "pot_of_flour"] {
            let response = service.trigger("alice", TriggerAction::Collect, item, 1).await;
            assert_eq!(response.results.len(), 1);
        }

        let selection = service.select_option("alice", "cook", "hand_over").await.unwrap();
        assert_eq!(selection.rewards.len(), 1);
        assert_eq!(selection.rewards[0].quest_id, "cooks_assistant");

        let snapshot = service.snapshot("alice").await;
        assert!(snapshot.quests.is_completed("cooks_assistant"));
        assert_eq!(snapshot.profile.coins, 500);
        assert!(snapshot.profile.inventory.has("sardine", 20));
    }

    #[tokio::test]
    async fn test_trigger_completion_pays_rewards_once() {
        let service = service();
        service.start_quest("alice", "cooks_assistant").await.unwrap();
        for item in ["bucket_of_milk", "egg", "pot_of_flour"] {
            service.trigger("alice", TriggerAction::Collect, item, 1).await;
        }

        let response = service.trigger("alice", TriggerAction::Deliver, "cook", 1).await;
        assert!(response.results[0].quest_completed);
        assert_eq!(response.rewards.len(), 1);

        let response = service.trigger("alice", TriggerAction::Deliver, "cook", 1).await;
        assert!(response.results.is_empty());
        assert!(response.rewards.is_empty());
    }

    #[tokio::test]
    async fn test_complete_quest_requires_start() {
        let service = service();
        let err = service.complete_quest("alice", "cooks_assistant").await.unwrap_err();
        assert_eq!(err, QuestError::NotInProgress("cooks_assistant".to_string()));
    }

    #[tokio::test]
    async fn test_restore_snapshot() {
        let service = service();
        service.start_quest("alice", "cooks_assistant").await.unwrap();
        service.trigger("alice", TriggerAction::Collect, "egg", 1).await;
        let snapshot = service.snapshot("alice").await;

        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: PlayerSnapshot = serde_json::from_str(&json).unwrap();
        service.restore("carol", restored).await.unwrap();

        let details = service.quest_details("carol", "cooks_assistant").await.unwrap();
        assert_eq!(details.status, QuestStatus::InProgress);
        assert_eq!(details.objectives.len(), 2);
        assert!(service.snapshot("carol").await.profile.inventory.has("egg", 1));
    }

    #[tokio::test]
    async fn test_restore_rejects_invalid_progress() {
        let service = service();
        service.start_quest("alice", "cooks_assistant").await.unwrap();
        let mut snapshot = service.snapshot("alice").await;
        let json = snapshot
            .quests
            .to_json()
            .unwrap()
            .replace(r#""status":"in_progress""#, r#""status":"not_started""#);
        snapshot.quests = PlayerQuestState::from_json(&json).unwrap();

        let err = service.restore("carol", snapshot).await.unwrap_err();
        assert!(matches!(err, QuestError::InvalidProgress { .. }));
        assert_eq!(service.session_count(), 1);

        service.start_quest("carol", "cooks_assistant").await.unwrap();
        let view = service.dialogue("carol", "cook").await.unwrap();
        assert_eq!(view.node_id, "cook_quest_progress");
    }

    #[tokio::test]
    async fn test_hand_in_wool_through_dialogue_pays_rewards() {
        let service = service();
        let selection = service.select_option("alice", "fred", "accept_shearing").await.unwrap();
        assert_eq!(selection.next.unwrap().node_id, "fred_waiting");

        service
            .reveal_objective("alice", "sheep_shearer", "find_lost_sheep")
            .await
            .unwrap();
        service.trigger("alice", TriggerAction::Use, "sheep", 20).await;
        service.trigger("alice", TriggerAction::Craft, "ball_of_wool", 20).await;
        service.trigger("alice", TriggerAction::Visit, "fred_back_field", 1).await;

        let selection = service.select_option("alice", "fred", "hand_in_wool").await.unwrap();
        assert_eq!(selection.next.unwrap().node_id, "fred_thanks");
        assert_eq!(selection.rewards.len(), 1);
        assert_eq!(selection.rewards[0].quest_id, "sheep_shearer");
    }

    #[tokio::test]
    async fn test_replaced_catalog_reaches_live_sessions() {
        let service = service();
        service.start_quest("alice", "cooks_assistant").await.unwrap();

        service.replace_catalogs(Catalogs::default()).await;
        assert!(service.list_quests().await.is_empty());

        let err = service.quest_details("alice", "cooks_assistant").await.unwrap_err();
        assert_eq!(err, QuestError::QuestNotFound("cooks_assistant".to_string()));
    }
}
