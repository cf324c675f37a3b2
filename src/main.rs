use anyhow::{anyhow, Result};
use mocha::bridge::{EventBridge, DEFAULT_CAPACITY};
use mocha::config::ConfigHandle;
use mocha::llm::{HttpLlmClient, LlmClient, LlmWorker};
use mocha::memory::MemoryStore;
use mocha::speech::{HttpRecognizer, SpeechRecognizer};
use mocha::turn::TurnCoordinator;
use mocha::ui::{AppState, MochaApp};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mocha=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mocha desktop companion");

    let config_path = mocha::config::resolve_path();
    let config = mocha::config::load_or_init(&config_path)?;
    let handle = ConfigHandle::new(config);
    let snapshot = handle.snapshot();

    let memory = MemoryStore::load(Path::new(&snapshot.memory.path), &snapshot);
    let (bridge, bridge_tx) = EventBridge::new(DEFAULT_CAPACITY);

    let client: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::from_config(&snapshot)?);
    let (_llm_worker, request_tx) = LlmWorker::spawn(client, bridge_tx.clone());
    let coordinator = TurnCoordinator::new(request_tx, bridge_tx.clone());

    let recognizer: Option<Arc<dyn SpeechRecognizer>> = if snapshot.speech.enabled {
        Some(Arc::new(HttpRecognizer::from_config(&snapshot)?))
    } else {
        None
    };

    let state = AppState::new(
        handle,
        config_path,
        memory,
        coordinator,
        bridge,
        bridge_tx,
        recognizer,
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([420.0, 640.0])
            .with_min_inner_size([320.0, 420.0])
            .with_title("Mocha"),
        ..Default::default()
    };

    // The only fatal condition: the consuming thread's event loop cannot start.
    eframe::run_native(
        "Mocha",
        options,
        Box::new(move |cc| Ok(Box::new(MochaApp::new(cc, state)))),
    )
    .map_err(|e| anyhow!("failed to start event loop: {e}"))
}
