//! Dialogue Definition Structures
//!
//! Per-NPC dialogue trees: one default node plus, for each quest the NPC
//! takes part in, a chain of nodes keyed by quest status.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ContentError;
use crate::quest::QuestStatus;

/// `next` value that ends the conversation
pub const END_DIALOGUE: &str = "end";

// ============================================================================
// Raw TOML structures
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RawNpcDialogue {
    pub npc_id: String,
    pub speaker: Option<String>,
    pub default: RawNode,
    #[serde(default)]
    pub chains: Vec<RawChain>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawChain {
    pub quest_id: String,
    #[serde(default)]
    pub nodes: Vec<RawNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawNode {
    pub id: String,
    pub text: String,
    /// Quest status this node is shown for; inferred from the id if absent
    pub status: Option<String>,
    #[serde(default)]
    pub options: Vec<RawOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOption {
    pub id: String,
    pub text: String,
    pub action: Option<String>,
    pub quest_id: Option<String>,
    pub objective_id: Option<String>,
    /// Shop id or teleport destination
    pub target: Option<String>,
    pub next: Option<String>,
    #[serde(default)]
    pub requirements: Vec<RawOptionRequirement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOptionRequirement {
    #[serde(rename = "type")]
    pub kind: String,
    pub quest: Option<String>,
    pub status: Option<String>,
    pub item: Option<String>,
    pub quantity: Option<u32>,
    pub objective: Option<String>,
    pub completed: Option<bool>,
}

// ============================================================================
// Resolved structures
// ============================================================================

/// Side effect of choosing an option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueAction {
    StartQuest,
    ContinueQuest,
    /// Advance a finished stage that waits for confirmation
    ConfirmStage,
    CompleteQuest,
    Shop,
    Teleport,
}

impl DialogueAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogueAction::StartQuest => "start_quest",
            DialogueAction::ContinueQuest => "continue_quest",
            DialogueAction::ConfirmStage => "confirm_stage",
            DialogueAction::CompleteQuest => "complete_quest",
            DialogueAction::Shop => "shop",
            DialogueAction::Teleport => "teleport",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "start_quest" => Some(DialogueAction::StartQuest),
            "continue_quest" => Some(DialogueAction::ContinueQuest),
            "confirm_stage" => Some(DialogueAction::ConfirmStage),
            "complete_quest" => Some(DialogueAction::CompleteQuest),
            "shop" => Some(DialogueAction::Shop),
            "teleport" => Some(DialogueAction::Teleport),
            _ => None,
        }
    }
}

/// Predicate gating an option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptionRequirement {
    QuestStatus { quest_id: String, status: QuestStatus },
    HasItem { item_id: String, quantity: u32 },
    /// Objective has (or hasn't) been completed
    Objective {
        quest_id: String,
        objective_id: String,
        completed: bool,
    },
}

impl OptionRequirement {
    fn from_raw(raw: &RawOptionRequirement) -> Result<Self, String> {
        let missing =
            |field: &str| format!("Option requirement '{}' is missing '{}'", raw.kind, field);

        match raw.kind.to_lowercase().as_str() {
            "quest_status" | "quest" => {
                let status = raw.status.as_deref().ok_or_else(|| missing("status"))?;
                Ok(OptionRequirement::QuestStatus {
                    quest_id: raw.quest.clone().ok_or_else(|| missing("quest"))?,
                    status: QuestStatus::from_str(status)
                        .ok_or_else(|| format!("Invalid quest status '{}'", status))?,
                })
            }
            "has_item" | "item" => Ok(OptionRequirement::HasItem {
                item_id: raw.item.clone().ok_or_else(|| missing("item"))?,
                quantity: raw.quantity.unwrap_or(1),
            }),
            "objective" => Ok(OptionRequirement::Objective {
                quest_id: raw.quest.clone().ok_or_else(|| missing("quest"))?,
                objective_id: raw.objective.clone().ok_or_else(|| missing("objective"))?,
                completed: raw.completed.unwrap_or(true),
            }),
            other => Err(format!("Unknown option requirement type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogueOption {
    pub id: String,
    pub text: String,
    pub action: Option<DialogueAction>,
    pub quest_id: Option<String>,
    pub objective_id: Option<String>,
    pub target: Option<String>,
    /// Next node id, or `END_DIALOGUE`
    pub next: Option<String>,
    pub requirements: Vec<OptionRequirement>,
}

impl DialogueOption {
    pub fn new(id: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            action: None,
            quest_id: None,
            objective_id: None,
            target: None,
            next: None,
            requirements: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: DialogueAction, quest_id: &str) -> Self {
        self.action = Some(action);
        self.quest_id = Some(quest_id.to_string());
        self
    }

    pub fn with_objective(mut self, objective_id: &str) -> Self {
        self.objective_id = Some(objective_id.to_string());
        self
    }

    pub fn with_next(mut self, next: &str) -> Self {
        self.next = Some(next.to_string());
        self
    }

    pub fn with_requirement(mut self, requirement: OptionRequirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn ends_conversation(&self) -> bool {
        self.next.as_deref() == Some(END_DIALOGUE)
    }

    fn from_raw(raw: &RawOption) -> Result<Self, String> {
        let action = match &raw.action {
            Some(name) => Some(
                DialogueAction::from_str(name)
                    .ok_or_else(|| format!("Invalid action '{}' on option '{}'", name, raw.id))?,
            ),
            None => None,
        };

        Ok(Self {
            id: raw.id.clone(),
            text: raw.text.clone(),
            action,
            quest_id: raw.quest_id.clone(),
            objective_id: raw.objective_id.clone(),
            target: raw.target.clone(),
            next: raw.next.clone(),
            requirements: raw
                .requirements
                .iter()
                .map(OptionRequirement::from_raw)
                .collect::<Result<Vec<_>, _>>()?,
        })
    }
}

/// One screen of NPC text plus the player's choices
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogueNode {
    pub id: String,
    pub npc_id: String,
    pub text: String,
    pub options: Vec<DialogueOption>,
}

impl DialogueNode {
    pub fn new(id: &str, npc_id: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            npc_id: npc_id.to_string(),
            text: text.to_string(),
            options: Vec::new(),
        }
    }

    pub fn with_option(mut self, option: DialogueOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn option(&self, option_id: &str) -> Option<&DialogueOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    fn from_raw(raw: &RawNode, npc_id: &str) -> Result<Self, String> {
        Ok(Self {
            id: raw.id.clone(),
            npc_id: npc_id.to_string(),
            text: raw.text.clone(),
            options: raw
                .options
                .iter()
                .map(DialogueOption::from_raw)
                .collect::<Result<Vec<_>, _>>()?,
        })
    }
}

/// Legacy id marker for each status, used when content gives no explicit slot
fn status_marker(status: QuestStatus) -> &'static str {
    match status {
        QuestStatus::NotStarted => "start",
        QuestStatus::InProgress => "progress",
        QuestStatus::Completed => "completed",
    }
}

const ALL_STATUSES: [QuestStatus; 3] = [
    QuestStatus::NotStarted,
    QuestStatus::InProgress,
    QuestStatus::Completed,
];

/// An NPC's nodes for one quest, with an explicit node per quest status
#[derive(Debug, Clone, Serialize)]
pub struct DialogueChain {
    pub quest_id: String,
    pub nodes: Vec<DialogueNode>,
    /// Status to node id
    slots: HashMap<QuestStatus, String>,
}

impl DialogueChain {
    pub fn new(quest_id: &str) -> Self {
        Self {
            quest_id: quest_id.to_string(),
            nodes: Vec::new(),
            slots: HashMap::new(),
        }
    }

    /// Add a node shown while the quest has `status`
    pub fn with_node(mut self, status: QuestStatus, node: DialogueNode) -> Self {
        self.slots.insert(status, node.id.clone());
        self.nodes.push(node);
        self
    }

    /// Add a node reachable only by literal navigation
    pub fn with_extra_node(mut self, node: DialogueNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn node(&self, node_id: &str) -> Option<&DialogueNode> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// The node to show for a quest status, if the chain has one
    pub fn node_for(&self, status: QuestStatus) -> Option<&DialogueNode> {
        self.slots.get(&status).and_then(|id| self.node(id))
    }

    /// Fill empty slots from the first node whose id contains the status
    /// marker (`start`, `progress`, `completed`)
    pub fn infer_slots_from_markers(&mut self) {
        for status in ALL_STATUSES {
            if self.slots.contains_key(&status) {
                continue;
            }
            let marker = status_marker(status);
            if let Some(node) = self.nodes.iter().find(|n| n.id.contains(marker)) {
                self.slots.insert(status, node.id.clone());
            }
        }
    }

    fn from_raw(raw: &RawChain, npc_id: &str) -> Result<Self, String> {
        let mut chain = DialogueChain::new(&raw.quest_id);

        for raw_node in &raw.nodes {
            let node = DialogueNode::from_raw(raw_node, npc_id)?;
            match &raw_node.status {
                Some(name) => {
                    let status = QuestStatus::from_str(name).ok_or_else(|| {
                        format!("Invalid status '{}' on node '{}'", name, raw_node.id)
                    })?;
                    if chain.slots.contains_key(&status) {
                        return Err(format!(
                            "Chain for quest '{}' has two nodes for status '{}'",
                            raw.quest_id, name
                        ));
                    }
                    chain = chain.with_node(status, node);
                }
                None => chain = chain.with_extra_node(node),
            }
        }

        chain.infer_slots_from_markers();
        Ok(chain)
    }
}

fn find_duplicate_node(npc: &NpcDialogue) -> Option<String> {
    let mut seen = std::collections::HashSet::new();
    npc.nodes()
        .find(|node| !seen.insert(node.id.as_str()))
        .map(|node| node.id.clone())
}

/// Everything an NPC can say
#[derive(Debug, Clone, Serialize)]
pub struct NpcDialogue {
    pub npc_id: String,
    /// Display name; falls back to the npc id
    pub speaker: String,
    pub default_node: DialogueNode,
    /// Checked in order; the first chain with a node for its quest's status wins
    pub chains: Vec<DialogueChain>,
}

impl NpcDialogue {
    pub fn new(npc_id: &str, speaker: &str, default_node: DialogueNode) -> Self {
        Self {
            npc_id: npc_id.to_string(),
            speaker: speaker.to_string(),
            default_node,
            chains: Vec::new(),
        }
    }

    pub fn with_chain(mut self, chain: DialogueChain) -> Self {
        self.chains.push(chain);
        self
    }

    /// Default node first, then every chain node in order
    pub fn nodes(&self) -> impl Iterator<Item = &DialogueNode> {
        std::iter::once(&self.default_node).chain(self.chains.iter().flat_map(|c| c.nodes.iter()))
    }

    pub fn node(&self, node_id: &str) -> Option<&DialogueNode> {
        self.nodes().find(|n| n.id == node_id)
    }

    /// First option with this id, searching default node then chains
    pub fn find_option(&self, option_id: &str) -> Option<&DialogueOption> {
        self.nodes().find_map(|n| n.option(option_id))
    }

    pub fn from_raw(raw: &RawNpcDialogue) -> Result<Self, String> {
        let default_node = DialogueNode::from_raw(&raw.default, &raw.npc_id)?;
        let chains = raw
            .chains
            .iter()
            .map(|c| DialogueChain::from_raw(c, &raw.npc_id))
            .collect::<Result<Vec<_>, _>>()?;

        let npc = Self {
            npc_id: raw.npc_id.clone(),
            speaker: raw.speaker.clone().unwrap_or_else(|| raw.npc_id.clone()),
            default_node,
            chains,
        };

        if let Some(duplicate) = find_duplicate_node(&npc) {
            return Err(format!("NPC '{}' has duplicate node '{}'", npc.npc_id, duplicate));
        }

        Ok(npc)
    }

    /// Parse a single NPC dialogue file
    pub fn from_toml(source: &str, origin: &str) -> Result<Self, ContentError> {
        let raw: RawNpcDialogue =
            toml::from_str(source).map_err(|e| ContentError::parse(origin, e))?;
        NpcDialogue::from_raw(&raw).map_err(ContentError::Invalid)
    }
}
