//! Error types for the quest and dialogue engines.
//!
//! Every engine failure is non-fatal: callers get the variant back and can
//! show its `Display` text to the player.

use thiserror::Error;

/// Failures from quest engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestError {
    #[error("quest '{0}' not found")]
    QuestNotFound(String),

    #[error("quest '{0}' has no stages")]
    NoStages(String),

    #[error("stage '{stage_id}' not found in quest '{quest_id}'")]
    StageNotFound { quest_id: String, stage_id: String },

    #[error("objective '{objective_id}' not found in quest '{quest_id}'")]
    ObjectiveNotFound {
        quest_id: String,
        objective_id: String,
    },

    /// The objective exists but belongs to a stage that is not current.
    #[error("objective '{objective_id}' is not part of the current stage of quest '{quest_id}'")]
    ObjectiveNotActive {
        quest_id: String,
        objective_id: String,
    },

    #[error("quest '{0}' has already been started")]
    AlreadyStarted(String),

    #[error("quest '{0}' is already completed")]
    AlreadyCompleted(String),

    #[error("quest '{0}' is not in progress")]
    NotInProgress(String),

    #[error("quest '{0}' has not been completed")]
    NotCompleted(String),

    #[error("stage '{stage_id}' of quest '{quest_id}' still has incomplete objectives")]
    StageIncomplete { quest_id: String, stage_id: String },

    #[error("rewards for quest '{0}' have already been claimed")]
    RewardsAlreadyClaimed(String),

    /// A saved progress record that can't be installed as-is
    #[error("invalid progress record for quest '{quest_id}': {reason}")]
    InvalidProgress { quest_id: String, reason: String },
}

/// Failures from dialogue engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialogueError {
    #[error("no dialogue registered for npc '{0}'")]
    NpcNotFound(String),

    #[error("option '{option_id}' not found for npc '{npc_id}'")]
    OptionNotFound { npc_id: String, option_id: String },

    #[error("option '{0}' has a quest action but no quest id")]
    MissingQuestId(String),

    #[error("option '{0}' continues a quest but names no objective")]
    MissingObjectiveId(String),

    #[error("requirement not met for option '{option_id}': {reason}")]
    RequirementNotMet { option_id: String, reason: String },

    #[error(transparent)]
    Quest(#[from] QuestError),
}

/// Failures while loading quest or dialogue content from disk.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid content: {0}")]
    Invalid(String),
}

impl ContentError {
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        ContentError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn parse(path: &str, source: toml::de::Error) -> Self {
        ContentError::Parse {
            path: path.to_string(),
            source,
        }
    }
}
