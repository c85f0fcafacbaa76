use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use quest_dialogue_server::config::ServerConfig;
use quest_dialogue_server::content::{self, HotReloadEvent};
use quest_dialogue_server::routes;
use quest_dialogue_server::service::QuestService;

#[tokio::main]
async fn main() {
    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "quest_dialogue_server=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env();

    // Load quest and dialogue catalogs from TOML files
    let catalogs = match content::load_catalogs(&config.data_dir) {
        Ok(catalogs) => catalogs,
        Err(e) => {
            error!("Failed to load content from {:?}: {}", config.data_dir, e);
            content::Catalogs::default()
        }
    };
    info!(
        "Loaded {} quests and {} NPC dialogue trees",
        catalogs.quests.len(),
        catalogs.dialogue.len()
    );

    let service = Arc::new(QuestService::new(catalogs, config.engine.clone()));

    if config.hot_reload {
        match content::start_file_watcher(config.data_dir.clone()) {
            Ok(mut rx) => {
                let reload_service = service.clone();
                tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        match event {
                            HotReloadEvent::Reloaded { path, catalogs } => {
                                info!("Content hot-reload: {}", path);
                                reload_service.replace_catalogs(catalogs).await;
                            }
                            HotReloadEvent::Error(e) => {
                                error!("Content hot-reload error: {}", e);
                            }
                        }
                    }
                });
                info!("Content hot-reload enabled");
            }
            Err(e) => {
                warn!("Failed to start content hot-reload: {}", e);
            }
        }
    }

    if config.session_idle_secs > 0 {
        let max_idle = Duration::from_secs(config.session_idle_secs);
        let sweep_service = service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let evicted = sweep_service.evict_idle(max_idle);
                if evicted > 0 {
                    info!("Evicted {} idle player sessions", evicted);
                }
            }
        });
    }

    let app = routes::router(service);

    let addr: SocketAddr = match config.bind_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid bind address '{}': {}", config.bind_addr, e);
            return;
        }
    };
    info!("Quest server listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
}
