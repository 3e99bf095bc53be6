use crate::config::AppConfig;
use crate::server;

pub async fn execute(config: &AppConfig) -> Result<(), String> {
    let registry = server::default_registry(&config.disabled_rpcs).map_err(|e| e.to_string())?;
    tracing::info!("📈 Registered {} RPC(s), logging mode {}", registry.len(), config.logging_mode);

    server::serve(config, registry)
        .await
        .map_err(|e| format!("Server error: {}", e))
}
