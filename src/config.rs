// src/config.rs

use std::{env, path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

use crate::{
    services::{AttachmentService, InventoryService, PurchaseService, StockLedger},
    sync::SyncCoordinator,
};

const DEFAULT_BATCH_SIZE: i64 = 20;
const DEFAULT_INTERVAL_SECS: u64 = 300;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Tenant/filial/gerente desta instalação. Toda leitura e escrita é
/// filtrada por `company_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantScope {
    pub company_id: i64,
    pub branch_id: i64,
    pub manager_id: i64,
}

/// Configuração do sync, entregue a cada componente na construção.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    // Sem URL = modo standalone (nenhuma chamada de rede)
    pub api_url: Option<String>,
    pub company_id: i64,
    pub batch_size: i64,
    pub interval: Duration,
    pub http_timeout: Duration,
    pub assets_root: PathBuf,
}

impl SyncConfig {
    pub fn offline(company_id: i64, assets_root: impl Into<PathBuf>) -> Self {
        Self {
            api_url: None,
            company_id,
            batch_size: DEFAULT_BATCH_SIZE,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            assets_root: assets_root.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub scope: TenantScope,
    pub sync: SyncConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let scope = TenantScope {
            company_id: required("COMPANY_ID")?,
            branch_id: required("BRANCH_ID")?,
            manager_id: required("MANAGER_ID")?,
        };

        let api_url = env::var("SYNC_API_URL")
            .ok()
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        let sync = SyncConfig {
            api_url,
            company_id: scope.company_id,
            batch_size: optional("SYNC_BATCH_SIZE", DEFAULT_BATCH_SIZE)?.max(1),
            interval: optional_secs("SYNC_INTERVAL_SECS", DEFAULT_INTERVAL_SECS)?,
            http_timeout: optional_secs("SYNC_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
            assets_root: env::var("ASSETS_ROOT").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(".")),
        };

        Ok(Self { database_url, scope, sync })
    }
}

fn required<T>(key: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(key)
        .with_context(|| format!("{} deve ser definido", key))?
        .trim()
        .parse()
        .with_context(|| format!("{} inválido", key))
}

fn optional<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => {
            value.trim().parse().with_context(|| format!("{} inválido", key))
        }
        _ => Ok(default),
    }
}

// Zero vira 1s: intervalo zero trava o ticker e timeout zero derruba toda requisição
fn optional_secs(key: &str, default: u64) -> anyhow::Result<Duration> {
    Ok(Duration::from_secs(optional(key, default)?.max(1)))
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: AppConfig,
    pub inventory_service: Arc<InventoryService>,
    pub purchase_service: PurchaseService,
    pub sync_coordinator: Arc<SyncCoordinator>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        // Conecta ao banco local da filial
        let db_pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(options)
            .await?;

        tracing::info!("✅ Conexão com o banco local estabelecida com sucesso!");

        let attachments = AttachmentService::new(config.sync.assets_root.clone());
        attachments.ensure_layout().await?;

        // --- Monta o gráfico de dependências ---
        let inventory_service = Arc::new(InventoryService::new(db_pool.clone(), config.scope));
        let purchase_service = PurchaseService::new(
            db_pool.clone(),
            inventory_service.clone() as Arc<dyn StockLedger>,
            attachments,
            config.scope,
        );
        let sync_coordinator = Arc::new(SyncCoordinator::new(db_pool.clone(), config.sync.clone())?);

        Ok(Self {
            db_pool,
            config,
            inventory_service,
            purchase_service,
            sync_coordinator,
        })
    }
}
