//src/main.rs

use backoffice_sync::config::{AppConfig, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Inicializa o logger (RUST_LOG sobrescreve o nível padrão)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = AppConfig::from_env()?;
    let app_state = AppState::new(config).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let coordinator = app_state.sync_coordinator.clone();

    // `--once`: um ciclo só, relatório em JSON na saída padrão
    if std::env::args().any(|arg| arg == "--once") {
        let outcome = coordinator.run_cycle().await;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        app_state.db_pool.close().await;
        return Ok(());
    }

    let periodic = if coordinator.is_online() {
        let interval = app_state.config.sync.interval;
        tracing::info!("🚀 Sync periódico a cada {}s", interval.as_secs());
        Some(coordinator.clone().spawn_periodic(interval))
    } else {
        tracing::info!("🔌 SYNC_API_URL não definida: rodando em modo standalone");
        None
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Encerrando...");

    if let Some(handle) = periodic {
        handle.abort();
    }
    app_state.db_pool.close().await;
    Ok(())
}
