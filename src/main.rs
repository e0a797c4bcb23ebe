use std::sync::Arc;

use tracing::{error, info, warn};

use php_embed_bridge::config::Config;
use php_embed_bridge::executor::{EngineExecutor, ScriptExecutor};
use php_embed_bridge::php::{detect_entry_point, detect_framework, select_version, ExtensionManager};
use php_embed_bridge::sapi::{bridge_for_mode, Engine};
use php_embed_bridge::server::{Server, Site};
use php_embed_bridge::{logging, VERSION};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> Result<(), BoxError> {
    let config = Config::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        e
    })?;

    logging::init(&config.logging)?;

    info!("Starting php_embed_bridge {}", VERSION);
    config.log_summary();

    // Single-threaded Tokio runtime - PHP workers handle blocking work
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: Config) -> Result<(), BoxError> {
    let root = config.server.document_root.as_path();

    let version = select_version(root, config.engine.php_version.as_deref().unwrap_or("auto"));
    let entry_point = detect_entry_point(root, config.server.entry_point.as_deref().unwrap_or("auto"));
    let framework = detect_framework(root);
    info!(
        version = %version,
        entry_point = %entry_point,
        framework = %framework,
        "Project detected"
    );

    let mut engine = Engine::new(&version, bridge_for_mode(config.engine.mode)?)?;
    if !config.engine.extensions.is_empty() {
        let mut manager = ExtensionManager::new(&version, config.engine.extensions.clone());
        if let Some(ref dir) = config.engine.extension_dir {
            manager = manager.with_extension_dir(dir.clone());
        }
        engine = engine.with_extensions(manager);
    }

    engine.startup().map_err(|e| {
        error!("Engine startup failed: {}", e);
        e
    })?;

    let executor = Arc::new(EngineExecutor::new(
        Arc::new(engine),
        config.executor.worker_count(),
        config.executor.queue_capacity(),
        config.executor.request_timeout,
    )?);
    info!(
        "Executor ready ({} workers, mode: {})",
        executor.worker_count(),
        executor.mode()
    );

    let server = Server::bind(
        config.server.listen_addr,
        Site::new(root, &entry_point),
        Arc::clone(&executor),
    )
    .await?
    .with_drain_timeout(config.server.drain_timeout)
    .with_static_cache_control(config.server.static_cache_control.as_deref());

    // Handle shutdown gracefully
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutting down...");
        }
    }

    server.trigger_shutdown();
    if !server.wait_for_drain(server.drain_timeout()).await {
        warn!("Closing with {} connections still open", server.active_connections());
    }

    // Joining workers blocks
    tokio::task::spawn_blocking(move || executor.shutdown()).await?;
    info!("Shutdown complete");

    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("Cannot install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
