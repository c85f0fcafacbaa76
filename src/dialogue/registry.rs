//! Dialogue Registry
//!
//! Loads per-NPC dialogue trees from TOML, one NPC per file.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{info, warn};

use super::definition::NpcDialogue;
use crate::error::ContentError;
use crate::quest::registry::collect_toml_files;

#[derive(Debug, Clone, Default)]
pub struct DialogueRegistry {
    npcs: IndexMap<String, Arc<NpcDialogue>>,
}

impl DialogueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an NPC's dialogue, replacing any previous definition
    pub fn register(&mut self, npc: NpcDialogue) {
        self.npcs.insert(npc.npc_id.clone(), Arc::new(npc));
    }

    pub fn load_from_directory(&mut self, dialogue_dir: &Path) -> Result<usize, ContentError> {
        info!("Loading dialogue from {:?}", dialogue_dir);

        if !dialogue_dir.exists() {
            warn!("Dialogue directory does not exist: {:?}", dialogue_dir);
            return Ok(0);
        }

        let mut paths = Vec::new();
        collect_toml_files(dialogue_dir, &mut paths)?;
        paths.sort();

        let mut count = 0;
        for path in paths {
            let loaded = std::fs::read_to_string(&path)
                .map_err(|e| ContentError::io(&path, e))
                .and_then(|content| NpcDialogue::from_toml(&content, &path.display().to_string()));

            match loaded {
                Ok(npc) => {
                    if self.npcs.contains_key(&npc.npc_id) {
                        warn!(
                            "Duplicate dialogue for NPC '{}' in {:?}, overwriting",
                            npc.npc_id, path
                        );
                    }
                    info!("Loaded dialogue for {} ({} quest chains)", npc.npc_id, npc.chains.len());
                    self.register(npc);
                    count += 1;
                }
                Err(e) => warn!("Failed to load dialogue {:?}: {}", path, e),
            }
        }

        info!("Loaded {} NPC dialogue trees", count);
        Ok(count)
    }

    pub fn get(&self, npc_id: &str) -> Option<&Arc<NpcDialogue>> {
        self.npcs.get(npc_id)
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<NpcDialogue>> {
        self.npcs.values()
    }

    pub fn len(&self) -> usize {
        self.npcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.npcs.is_empty()
    }
}
