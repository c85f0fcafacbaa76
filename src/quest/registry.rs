//! Quest Registry
//!
//! The quest catalog: loads and caches quest definitions from TOML files.
//! Read-only once built; engines share it behind an `Arc`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{info, warn};

use super::definition::Quest;
use crate::error::ContentError;

/// Registry for all quest definitions, in registration order
#[derive(Debug, Clone, Default)]
pub struct QuestRegistry {
    quests: IndexMap<String, Arc<Quest>>,
}

impl QuestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a quest, silently replacing any quest with the same id
    pub fn register(&mut self, quest: Quest) {
        self.quests.insert(quest.id.clone(), Arc::new(quest));
    }

    /// Load all quest definitions under `quests_dir`, recursively.
    /// Files that fail to parse are logged and skipped.
    pub fn load_from_directory(&mut self, quests_dir: &Path) -> Result<usize, ContentError> {
        info!("Loading quests from {:?}", quests_dir);

        if !quests_dir.exists() {
            warn!("Quest directory does not exist: {:?}", quests_dir);
            return Ok(0);
        }

        let mut paths = Vec::new();
        collect_toml_files(quests_dir, &mut paths)?;
        paths.sort();

        let mut count = 0;
        for path in paths {
            match self.load_quest_file(&path) {
                Ok(()) => count += 1,
                Err(e) => warn!("Failed to load quest {:?}: {}", path, e),
            }
        }

        info!("Loaded {} quest definitions", count);
        self.validate_references();
        Ok(count)
    }

    fn load_quest_file(&mut self, path: &Path) -> Result<(), ContentError> {
        let content = std::fs::read_to_string(path).map_err(|e| ContentError::io(path, e))?;
        let quest = Quest::from_toml(&content, &path.display().to_string())?;

        if self.quests.contains_key(&quest.id) {
            warn!("Duplicate quest ID '{}' in {:?}, overwriting", quest.id, path);
        }
        info!("Loaded quest: {} ({})", quest.name, quest.id);

        self.register(quest);
        Ok(())
    }

    /// Warn about quest requirements that point at unknown quests
    fn validate_references(&self) {
        for quest in self.quests.values() {
            for requirement in &quest.requirements {
                if let super::definition::Requirement::Quest { quest_id } = requirement {
                    if !self.quests.contains_key(quest_id) {
                        warn!(
                            "Quest '{}' requires non-existent quest '{}'",
                            quest.id, quest_id
                        );
                    }
                }
            }
        }
    }

    /// Get a quest by ID
    pub fn get(&self, quest_id: &str) -> Option<&Arc<Quest>> {
        self.quests.get(quest_id)
    }

    /// Iterate quests in registration order
    pub fn all(&self) -> impl Iterator<Item = &Arc<Quest>> {
        self.quests.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.quests.keys()
    }

    /// Quests offered by a specific NPC
    pub fn quests_for_npc(&self, npc_id: &str) -> Vec<&Arc<Quest>> {
        self.quests
            .values()
            .filter(|q| q.start_npc == npc_id)
            .collect()
    }

    pub fn contains(&self, quest_id: &str) -> bool {
        self.quests.contains_key(quest_id)
    }

    pub fn len(&self) -> usize {
        self.quests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }
}

/// Recursively collect `.toml` files
pub(crate) fn collect_toml_files(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<(), ContentError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ContentError::io(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| ContentError::io(dir, e))?;
        let path = entry.path();

        if path.is_dir() {
            collect_toml_files(&path, paths)?;
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            paths.push(path);
        }
    }

    Ok(())
}
