//! Quest Definition Structures
//!
//! Quests are deserialized from TOML into `Raw*` structures, then resolved
//! into read-only templates. Per-player progress never lives here.

use serde::{Deserialize, Serialize};

use crate::error::ContentError;

/// A quest definition file
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuestFile {
    pub quest: RawQuest,
}

/// Raw quest data as it appears in TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    #[serde(default)]
    pub quest_points: u32,
    #[serde(default)]
    pub category: String,
    pub start_npc: String,
    #[serde(default)]
    pub stages: Vec<RawStage>,
    #[serde(default)]
    pub requirements: Vec<RawRequirement>,
    #[serde(default)]
    pub rewards: Vec<RawReward>,
}

fn default_difficulty() -> String {
    "beginner".to_string()
}

/// Raw stage as it appears in TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawStage {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub objectives: Vec<RawObjective>,
    #[serde(default)]
    pub dialogue: Option<StageDialogue>,
    #[serde(default = "default_true")]
    pub auto_complete: bool,
}

fn default_true() -> bool {
    true
}

/// Raw objective as it appears in TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawObjective {
    pub id: String,
    #[serde(rename = "type")]
    pub objective_type: String,
    pub target: Option<String>,
    pub target_name: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub description: String,
    #[serde(default)]
    pub hidden: bool,
}

fn default_quantity() -> u32 {
    1
}

/// Raw requirement; which fields are needed depends on `type`
#[derive(Debug, Clone, Deserialize)]
pub struct RawRequirement {
    #[serde(rename = "type")]
    pub kind: String,
    pub skill: Option<String>,
    pub level: Option<i32>,
    pub quest: Option<String>,
    pub item: Option<String>,
    pub quantity: Option<u32>,
    pub location: Option<String>,
}

/// Raw reward; which fields are needed depends on `type`
#[derive(Debug, Clone, Deserialize)]
pub struct RawReward {
    #[serde(rename = "type")]
    pub kind: String,
    pub skill: Option<String>,
    pub amount: Option<i64>,
    pub item: Option<String>,
    pub quantity: Option<u32>,
    pub unlock: Option<String>,
}

// ============================================================================
// Resolved Quest Structures (after parsing)
// ============================================================================

/// Quest difficulty, ordered from easiest to hardest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Experienced,
    Master,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Experienced => "experienced",
            Difficulty::Master => "master",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "beginner" | "novice" => Some(Difficulty::Beginner),
            "intermediate" => Some(Difficulty::Intermediate),
            "experienced" => Some(Difficulty::Experienced),
            "master" => Some(Difficulty::Master),
            _ => None,
        }
    }
}

/// Objective types supported by the quest system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveType {
    /// Talk to a specific NPC
    Talk,
    /// Kill X monsters of type Y
    Kill,
    /// Collect X items of type Y
    Collect,
    /// Hand items over to an NPC
    Deliver,
    /// Use an item or object
    Use,
    /// Reach a specific location
    Visit,
    /// Craft X items of type Y
    Craft,
}

impl ObjectiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectiveType::Talk => "talk",
            ObjectiveType::Kill => "kill",
            ObjectiveType::Collect => "collect",
            ObjectiveType::Deliver => "deliver",
            ObjectiveType::Use => "use",
            ObjectiveType::Visit => "visit",
            ObjectiveType::Craft => "craft",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "talk" | "talk_to" => Some(ObjectiveType::Talk),
            "kill" | "kill_monster" => Some(ObjectiveType::Kill),
            "collect" | "collect_item" => Some(ObjectiveType::Collect),
            "deliver" => Some(ObjectiveType::Deliver),
            "use" => Some(ObjectiveType::Use),
            "visit" | "reach_location" => Some(ObjectiveType::Visit),
            "craft" => Some(ObjectiveType::Craft),
            _ => None,
        }
    }
}

/// A quest objective template
#[derive(Debug, Clone, Serialize)]
pub struct Objective {
    /// Unique within the whole quest, not just the stage
    pub id: String,
    pub description: String,
    pub objective_type: ObjectiveType,
    /// Target entity/item/npc/location ID
    pub target_id: Option<String>,
    /// Display name of the target; triggers may match on it too
    pub target_name: Option<String>,
    pub quantity: u32,
    /// Hidden objectives are not active until revealed
    pub hidden: bool,
}

impl Objective {
    pub fn new(
        id: &str,
        objective_type: ObjectiveType,
        target_id: &str,
        description: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            objective_type,
            target_id: Some(target_id.to_string()),
            target_name: None,
            quantity: 1,
            hidden: false,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// True if `target` names this objective's target by id or display name
    pub fn matches_target(&self, target: &str) -> bool {
        self.target_id.as_deref() == Some(target) || self.target_name.as_deref() == Some(target)
    }

    fn from_raw(raw: &RawObjective) -> Result<Self, String> {
        let objective_type = ObjectiveType::from_str(&raw.objective_type)
            .ok_or_else(|| {
                format!("Invalid objective type '{}' for '{}'", raw.objective_type, raw.id)
            })?;

        if raw.target.is_none() && raw.target_name.is_none() {
            return Err(format!("Objective '{}' has no target", raw.id));
        }

        Ok(Self {
            id: raw.id.clone(),
            description: raw.description.clone(),
            objective_type,
            target_id: raw.target.clone(),
            target_name: raw.target_name.clone(),
            quantity: raw.quantity,
            hidden: raw.hidden,
        })
    }
}

/// Text shown by the journal before and after a stage is finished
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageDialogue {
    pub before: Option<String>,
    pub after: Option<String>,
}

/// A sequential phase of a quest; all of its objectives are active at once
#[derive(Debug, Clone, Serialize)]
pub struct Stage {
    pub id: String,
    pub name: String,
    pub description: String,
    pub objectives: Vec<Objective>,
    pub dialogue: Option<StageDialogue>,
    /// When false, finishing the objectives waits for `confirm_stage`
    pub auto_complete: bool,
}

impl Stage {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            objectives: Vec::new(),
            dialogue: None,
            auto_complete: true,
        }
    }

    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objectives.push(objective);
        self
    }

    pub fn manual(mut self) -> Self {
        self.auto_complete = false;
        self
    }

    pub fn objective(&self, id: &str) -> Option<&Objective> {
        self.objectives.iter().find(|o| o.id == id)
    }

    fn from_raw(raw: &RawStage) -> Result<Self, String> {
        let objectives = raw
            .objectives
            .iter()
            .map(Objective::from_raw)
            .collect::<Result<Vec<_>, _>>()?;

        if objectives.is_empty() {
            return Err(format!("Stage '{}' has no objectives", raw.id));
        }

        Ok(Self {
            id: raw.id.clone(),
            name: raw.name.clone(),
            description: raw.description.clone(),
            objectives,
            dialogue: raw.dialogue.clone(),
            auto_complete: raw.auto_complete,
        })
    }
}

/// Gate on starting a quest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Requirement {
    Level { skill: String, level: i32 },
    Quest { quest_id: String },
    Item { item_id: String, quantity: u32 },
    /// Location gating is resolved by the world, so it always passes here
    Location { location_id: String },
    /// A kind this build doesn't understand; see `UnknownRequirementPolicy`
    Unknown { kind: String },
}

impl Requirement {
    fn from_raw(raw: &RawRequirement) -> Result<Self, String> {
        let missing = |field: &str| format!("Requirement '{}' is missing '{}'", raw.kind, field);

        match raw.kind.to_lowercase().as_str() {
            "level" | "skill" => Ok(Requirement::Level {
                skill: raw.skill.clone().ok_or_else(|| missing("skill"))?,
                level: raw.level.ok_or_else(|| missing("level"))?,
            }),
            "quest" => Ok(Requirement::Quest {
                quest_id: raw.quest.clone().ok_or_else(|| missing("quest"))?,
            }),
            "item" => Ok(Requirement::Item {
                item_id: raw.item.clone().ok_or_else(|| missing("item"))?,
                quantity: raw.quantity.unwrap_or(1),
            }),
            "location" => Ok(Requirement::Location {
                location_id: raw.location.clone().unwrap_or_default(),
            }),
            other => Ok(Requirement::Unknown {
                kind: other.to_string(),
            }),
        }
    }
}

/// A reward granted once a quest is completed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reward {
    Experience { skill: String, amount: i64 },
    Money { amount: i64 },
    Item { item_id: String, quantity: u32 },
    /// Opaque feature or area unlock
    Access { unlock_id: String },
}

impl Reward {
    fn from_raw(raw: &RawReward) -> Result<Self, String> {
        let missing = |field: &str| format!("Reward '{}' is missing '{}'", raw.kind, field);
        let amount = || match raw.amount {
            Some(amount) if amount < 0 => {
                Err(format!("Reward '{}' has negative amount {}", raw.kind, amount))
            }
            Some(amount) => Ok(amount),
            None => Err(missing("amount")),
        };

        match raw.kind.to_lowercase().as_str() {
            "experience" | "xp" => Ok(Reward::Experience {
                skill: raw.skill.clone().ok_or_else(|| missing("skill"))?,
                amount: amount()?,
            }),
            "money" | "coins" | "gold" => Ok(Reward::Money { amount: amount()? }),
            "item" => Ok(Reward::Item {
                item_id: raw.item.clone().ok_or_else(|| missing("item"))?,
                quantity: raw.quantity.unwrap_or(1),
            }),
            "access" | "unlock" => Ok(Reward::Access {
                unlock_id: raw.unlock.clone().ok_or_else(|| missing("unlock"))?,
            }),
            other => Err(format!("Unknown reward type '{}'", other)),
        }
    }
}

/// A fully resolved quest definition
#[derive(Debug, Clone, Serialize)]
pub struct Quest {
    pub id: String,
    pub name: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub quest_points: u32,
    pub category: String,
    /// NPC that offers this quest
    pub start_npc: String,
    /// Advancement order; never empty for loaded content
    pub stages: Vec<Stage>,
    pub requirements: Vec<Requirement>,
    pub rewards: Vec<Reward>,
}

impl Quest {
    pub fn new(id: &str, name: &str, start_npc: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            difficulty: Difficulty::Beginner,
            quest_points: 0,
            category: String::new(),
            start_npc: start_npc.to_string(),
            stages: Vec::new(),
            requirements: Vec::new(),
            rewards: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Create a Quest from raw TOML data
    pub fn from_raw(raw: &RawQuest) -> Result<Self, String> {
        let difficulty = Difficulty::from_str(&raw.difficulty)
            .ok_or_else(|| {
                format!("Invalid difficulty '{}' for quest '{}'", raw.difficulty, raw.id)
            })?;

        let stages = raw
            .stages
            .iter()
            .map(Stage::from_raw)
            .collect::<Result<Vec<_>, _>>()?;

        if stages.is_empty() {
            return Err(format!("Quest '{}' has no stages", raw.id));
        }

        let mut seen_stages = std::collections::HashSet::new();
        let mut seen_objectives = std::collections::HashSet::new();
        for stage in &stages {
            if !seen_stages.insert(stage.id.as_str()) {
                return Err(format!("Quest '{}' has duplicate stage '{}'", raw.id, stage.id));
            }
            for objective in &stage.objectives {
                if !seen_objectives.insert(objective.id.as_str()) {
                    return Err(format!(
                        "Quest '{}' has duplicate objective '{}'",
                        raw.id, objective.id
                    ));
                }
            }
        }

        Ok(Self {
            id: raw.id.clone(),
            name: raw.name.clone(),
            description: raw.description.clone(),
            difficulty,
            quest_points: raw.quest_points,
            category: raw.category.clone(),
            start_npc: raw.start_npc.clone(),
            stages,
            requirements: raw
                .requirements
                .iter()
                .map(Requirement::from_raw)
                .collect::<Result<Vec<_>, _>>()?,
            rewards: raw
                .rewards
                .iter()
                .map(Reward::from_raw)
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    /// Parse a single quest file
    pub fn from_toml(source: &str, origin: &str) -> Result<Self, ContentError> {
        let raw: RawQuestFile =
            toml::from_str(source).map_err(|e| ContentError::parse(origin, e))?;
        Quest::from_raw(&raw.quest).map_err(ContentError::Invalid)
    }

    pub fn first_stage(&self) -> Option<&Stage> {
        self.stages.first()
    }

    pub fn stage(&self, id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == id)
    }

    /// The stage after `id` in declaration order
    pub fn next_stage(&self, id: &str) -> Option<&Stage> {
        let index = self.stages.iter().position(|s| s.id == id)?;
        self.stages.get(index + 1)
    }

    /// Find an objective in any stage
    pub fn objective(&self, id: &str) -> Option<&Objective> {
        self.stages.iter().find_map(|s| s.objective(id))
    }
}
