//! Dialogue Engine
//!
//! Picks the node an NPC shows from the player's quest status, and resolves
//! option selection into quest actions. Holds no conversation cursor: what
//! an NPC says is a function of quest progress alone.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::definition::{
    DialogueAction, DialogueNode, DialogueOption, NpcDialogue, OptionRequirement, END_DIALOGUE,
};
use super::registry::DialogueRegistry;
use crate::error::DialogueError;
use crate::quest::api::InventoryQuery;
use crate::quest::engine::{QuestEngine, StageAdvance};
use crate::quest::events::QuestEventResult;

/// How an option's `next` id is followed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueNavigation {
    /// Ignore the named node and re-resolve from current quest status
    #[default]
    ReGround,
    /// Jump to the named node; re-resolve only if it doesn't exist
    Literal,
}

/// Whether `select_option` checks option requirements itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionRequirementPolicy {
    #[default]
    Enforce,
    /// Requirements are only reported; the caller must check them before
    /// selecting
    CallerChecked,
}

/// Effect of the selected option's action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogueEffect {
    QuestStarted { quest_id: String },
    QuestCompleted { quest_id: String },
    ObjectiveAdvanced { result: QuestEventResult },
    StageConfirmed { quest_id: String, advance: StageAdvance },
    /// Shop and teleport are left to the caller
    OpenShop { shop_id: Option<String> },
    Teleport { destination: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogueOutcome {
    pub npc_id: String,
    pub option_id: String,
    pub effect: Option<DialogueEffect>,
    /// `None` when the conversation ended
    pub next: Option<DialogueNode>,
}

pub struct DialogueEngine {
    catalog: Arc<DialogueRegistry>,
    navigation: DialogueNavigation,
    option_requirements: OptionRequirementPolicy,
}

impl DialogueEngine {
    pub fn new(catalog: Arc<DialogueRegistry>) -> Self {
        Self {
            catalog,
            navigation: DialogueNavigation::default(),
            option_requirements: OptionRequirementPolicy::default(),
        }
    }

    pub fn with_navigation(mut self, navigation: DialogueNavigation) -> Self {
        self.navigation = navigation;
        self
    }

    pub fn with_option_requirements(mut self, policy: OptionRequirementPolicy) -> Self {
        self.option_requirements = policy;
        self
    }

    pub fn catalog(&self) -> &Arc<DialogueRegistry> {
        &self.catalog
    }

    /// Add or replace an NPC in this engine's catalog
    pub fn register_npc(&mut self, npc: NpcDialogue) {
        debug!("Registering dialogue for NPC '{}'", npc.npc_id);
        Arc::make_mut(&mut self.catalog).register(npc);
    }

    pub fn npc(&self, npc_id: &str) -> Option<&Arc<NpcDialogue>> {
        self.catalog.get(npc_id)
    }

    /// The node an NPC shows right now, or `None` for an unknown NPC
    pub fn get_dialogue(&self, npc_id: &str, quests: &QuestEngine) -> Option<&DialogueNode> {
        let npc = self.catalog.get(npc_id)?;
        Some(resolve_node(npc, quests))
    }

    /// Why an option can't be chosen, or `None` if it can
    pub fn unmet_requirement(
        &self,
        option: &DialogueOption,
        quests: &QuestEngine,
        inventory: &dyn InventoryQuery,
    ) -> Option<String> {
        option.requirements.iter().find_map(|requirement| match requirement {
            OptionRequirement::QuestStatus { quest_id, status } => {
                let current = quests.quest_status(quest_id);
                (current != *status).then(|| {
                    format!(
                        "quest '{}' is {}, needs {}",
                        quest_id,
                        current.as_str(),
                        status.as_str()
                    )
                })
            }
            OptionRequirement::HasItem { item_id, quantity } => {
                (!inventory.has_item(item_id, *quantity))
                    .then(|| format!("needs {} x {}", quantity, item_id))
            }
            OptionRequirement::Objective {
                quest_id,
                objective_id,
                completed,
            } => {
                let current = quests.is_objective_completed(quest_id, objective_id);
                (current != *completed).then(|| {
                    let state = if *completed { "complete" } else { "incomplete" };
                    format!("objective '{}' of '{}' must be {}", objective_id, quest_id, state)
                })
            }
        })
    }

    /// Choose an option: check requirements, run its action, then work out
    /// the next node. A failed action aborts the selection with no effect.
    pub fn select_option(
        &self,
        npc_id: &str,
        option_id: &str,
        quests: &mut QuestEngine,
        inventory: &dyn InventoryQuery,
    ) -> Result<DialogueOutcome, DialogueError> {
        let npc = self
            .catalog
            .get(npc_id)
            .ok_or_else(|| DialogueError::NpcNotFound(npc_id.to_string()))?;

        let option = npc.find_option(option_id).ok_or_else(|| DialogueError::OptionNotFound {
            npc_id: npc_id.to_string(),
            option_id: option_id.to_string(),
        })?;

        if self.option_requirements == OptionRequirementPolicy::Enforce {
            if let Some(reason) = self.unmet_requirement(option, quests, inventory) {
                return Err(DialogueError::RequirementNotMet {
                    option_id: option_id.to_string(),
                    reason,
                });
            }
        }

        let effect = match option.action {
            Some(action) => Some(run_action(action, option, quests)?),
            None => None,
        };

        let next = if option.ends_conversation() {
            None
        } else {
            let node = match (self.navigation, option.next.as_deref()) {
                (DialogueNavigation::Literal, Some(next_id)) => {
                    npc.node(next_id).unwrap_or_else(|| resolve_node(npc, quests))
                }
                _ => resolve_node(npc, quests),
            };
            Some(node.clone())
        };

        debug!(
            "NPC '{}' option '{}' -> {}",
            npc_id,
            option_id,
            next.as_ref().map(|n| n.id.as_str()).unwrap_or(END_DIALOGUE)
        );

        Ok(DialogueOutcome {
            npc_id: npc_id.to_string(),
            option_id: option_id.to_string(),
            effect,
            next,
        })
    }
}

/// First chain with a node for its quest's current status, else the default
fn resolve_node<'a>(npc: &'a NpcDialogue, quests: &QuestEngine) -> &'a DialogueNode {
    npc.chains
        .iter()
        .find_map(|chain| chain.node_for(quests.quest_status(&chain.quest_id)))
        .unwrap_or(&npc.default_node)
}

fn run_action(
    action: DialogueAction,
    option: &DialogueOption,
    quests: &mut QuestEngine,
) -> Result<DialogueEffect, DialogueError> {
    let quest_id = || {
        option
            .quest_id
            .clone()
            .ok_or_else(|| DialogueError::MissingQuestId(option.id.clone()))
    };

    match action {
        DialogueAction::StartQuest => {
            let quest_id = quest_id()?;
            quests.start_quest(&quest_id)?;
            info!("Dialogue option '{}' started quest '{}'", option.id, quest_id);
            Ok(DialogueEffect::QuestStarted { quest_id })
        }
        DialogueAction::CompleteQuest => {
            let quest_id = quest_id()?;
            quests.complete_quest(&quest_id)?;
            info!("Dialogue option '{}' completed quest '{}'", option.id, quest_id);
            Ok(DialogueEffect::QuestCompleted { quest_id })
        }
        DialogueAction::ContinueQuest => {
            let quest_id = quest_id()?;
            let objective_id = option
                .objective_id
                .as_deref()
                .ok_or_else(|| DialogueError::MissingObjectiveId(option.id.clone()))?;
            let mut result = quests.update_objective_progress(&quest_id, objective_id, 1)?;

            // Handing something in confirms the stage it finishes
            if quests.awaiting_confirmation(&quest_id) {
                let advance = quests.confirm_stage(&quest_id)?;
                info!("Dialogue option '{}' confirmed stage of quest '{}'", option.id, quest_id);
                result.stages_completed.extend(advance.stages_completed);
                result.current_stage = advance.current_stage;
                result.quest_completed = advance.quest_completed;
            }
            Ok(DialogueEffect::ObjectiveAdvanced { result })
        }
        DialogueAction::ConfirmStage => {
            let quest_id = quest_id()?;
            let advance = quests.confirm_stage(&quest_id)?;
            info!("Dialogue option '{}' confirmed stage of quest '{}'", option.id, quest_id);
            Ok(DialogueEffect::StageConfirmed { quest_id, advance })
        }
        DialogueAction::Shop => Ok(DialogueEffect::OpenShop {
            shop_id: option.target.clone(),
        }),
        DialogueAction::Teleport => Ok(DialogueEffect::Teleport {
            destination: option.target.clone(),
        }),
    }
}
