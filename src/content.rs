//! Content loading and hot reload.
//!
//! Quests live under `<data_dir>/quests`, NPC dialogue under
//! `<data_dir>/dialogue`. A reload builds fresh catalogs; sessions pick the
//! new snapshot up on their next call.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::dialogue::DialogueRegistry;
use crate::error::ContentError;
use crate::quest::QuestRegistry;

/// The read-only catalogs shared by every session
#[derive(Debug, Clone, Default)]
pub struct Catalogs {
    pub quests: Arc<QuestRegistry>,
    pub dialogue: Arc<DialogueRegistry>,
}

/// Load every quest and dialogue file under `data_dir`
pub fn load_catalogs(data_dir: &Path) -> Result<Catalogs, ContentError> {
    let mut quests = QuestRegistry::new();
    quests.load_from_directory(&data_dir.join("quests"))?;

    let mut dialogue = DialogueRegistry::new();
    dialogue.load_from_directory(&data_dir.join("dialogue"))?;

    for npc in dialogue.all() {
        for chain in &npc.chains {
            if !quests.contains(&chain.quest_id) {
                warn!(
                    "Dialogue for NPC '{}' references non-existent quest '{}'",
                    npc.npc_id,
                    chain.quest_id
                );
            }
        }
    }

    Ok(Catalogs {
        quests: Arc::new(quests),
        dialogue: Arc::new(dialogue),
    })
}

/// Events from the hot-reload watcher
#[derive(Debug, Clone)]
pub enum HotReloadEvent {
    /// Content was reloaded after a change to `path`
    Reloaded { path: String, catalogs: Catalogs },
    /// Reload failed; the previous catalogs stay in use
    Error(String),
}

/// Watch `data_dir` and reload all content whenever a `.toml` file changes
pub fn start_file_watcher(data_dir: PathBuf) -> Result<mpsc::Receiver<HotReloadEvent>, String> {
    use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

    let (tx, rx) = mpsc::channel(32);
    let (notify_tx, notify_rx) = std::sync::mpsc::channel();

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = notify_tx.send(event);
            }
        },
        Config::default().with_poll_interval(Duration::from_secs(1)),
    )
    .map_err(|e| format!("Failed to create file watcher: {}", e))?;

    watcher
        .watch(&data_dir, RecursiveMode::Recursive)
        .map_err(|e| format!("Failed to watch {:?}: {}", data_dir, e))?;

    info!("Content hot-reload watcher started for {:?}", data_dir);

    std::thread::spawn(move || {
        // Dropping the watcher stops notifications
        let _watcher = watcher;

        while let Ok(event) = notify_rx.recv() {
            if !matches!(
                event.kind,
                EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
            ) {
                continue;
            }
            let Some(path) = event
                .paths
                .iter()
                .find(|p| p.extension().is_some_and(|ext| ext == "toml"))
            else {
                continue;
            };

            info!("Detected change in {:?}, triggering reload", path);
            let reload = match load_catalogs(&data_dir) {
                Ok(catalogs) => HotReloadEvent::Reloaded {
                    path: path.to_string_lossy().to_string(),
                    catalogs,
                },
                Err(e) => {
                    error!("Hot-reload failed: {}", e);
                    HotReloadEvent::Error(e.to_string())
                }
            };

            if tx.blocking_send(reload).is_err() {
                break;
            }
        }
    });

    Ok(rx)
}
