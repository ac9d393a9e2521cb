// src/sync/coordinator.rs

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::{
    common::{db_utils::now_unix, error::AppError},
    config::SyncConfig,
    models::sync::{SyncModule, SyncOutcome, SyncReport, SyncTable, TableReport},
    sync::{
        pull::PullPipeline,
        push::PushPipeline,
        transport::{HttpTransport, SyncTransport},
    },
};

struct Pipelines {
    push: PushPipeline,
    pull: PullPipeline,
}

/// Orquestra os ciclos: push depois pull, tabela por tabela, na ordem de
/// dependência. Falha de uma tabela vira linha no relatório.
pub struct SyncCoordinator {
    // `None` = sem servidor configurado
    pipelines: Option<Pipelines>,
    running: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(pool: SqlitePool, config: SyncConfig) -> Result<Self, AppError> {
        match config.api_url.clone() {
            Some(api_url) => {
                let transport = Arc::new(HttpTransport::new(&api_url, config.http_timeout)?);
                Ok(Self::with_transport(pool, config, transport))
            }
            None => Ok(Self::offline()),
        }
    }

    pub fn with_transport(pool: SqlitePool, config: SyncConfig, transport: Arc<dyn SyncTransport>) -> Self {
        let pipelines = Pipelines {
            push: PushPipeline::new(pool.clone(), transport.clone(), config.clone()),
            pull: PullPipeline::new(pool, transport, config),
        };
        Self { pipelines: Some(pipelines), running: Mutex::new(()) }
    }

    pub fn offline() -> Self {
        Self { pipelines: None, running: Mutex::new(()) }
    }

    pub fn is_online(&self) -> bool {
        self.pipelines.is_some()
    }

    /// Ciclo completo: estoque e depois compras.
    pub async fn run_cycle(&self) -> SyncOutcome {
        let tables: Vec<SyncTable> = SyncModule::ALL
            .iter()
            .flat_map(|module| module.tables().iter().copied())
            .collect();
        self.run_tables(&tables).await
    }

    pub async fn run_module(&self, module: SyncModule) -> SyncOutcome {
        self.run_tables(module.tables()).await
    }

    async fn run_tables(&self, tables: &[SyncTable]) -> SyncOutcome {
        let Some(pipelines) = &self.pipelines else {
            tracing::debug!("Sync desativado: nenhum servidor central configurado");
            return SyncOutcome::Offline;
        };

        let Ok(_guard) = self.running.try_lock() else {
            tracing::warn!("Já existe um ciclo de sync em andamento; ignorando");
            return SyncOutcome::Busy;
        };

        let mut report = SyncReport { started_at: now_unix(), ..Default::default() };

        // Estritamente em sequência: o pull de uma tabela termina antes da próxima
        for table in tables {
            let mut table_report = TableReport::for_table(*table);

            match pipelines.push.push(*table).await {
                Ok(pushed) => table_report.pushed = pushed,
                Err(e) => {
                    log_failure("Push", *table, &e);
                    table_report.push_error = Some(e.to_string());
                }
            }

            match pipelines.pull.pull(*table).await {
                Ok(pulled) => table_report.pulled = pulled,
                Err(e) => {
                    log_failure("Pull", *table, &e);
                    table_report.pull_error = Some(e.to_string());
                }
            }

            report.tables.push(table_report);
        }

        report.finished_at = now_unix();

        let failed = report.failed_tables();
        if failed.is_empty() {
            tracing::info!("✅ Ciclo de sync concluído ({} tabela(s))", report.tables.len());
        } else {
            tracing::warn!("Ciclo de sync concluído com falhas em {:?}", failed);
        }

        SyncOutcome::Completed(report)
    }

    /// Dispara `run_cycle` a cada `interval` numa task própria.
    pub fn spawn_periodic(self: Arc<Self>, interval: std::time::Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let SyncOutcome::Offline = self.run_cycle().await {
                    tracing::info!("Modo standalone: sync periódico encerrado");
                    break;
                }
            }
        })
    }
}

// Rede fora é rotina (o próximo ciclo tenta de novo); erro local não é.
fn log_failure(step: &str, table: SyncTable, error: &AppError) {
    if error.is_transient() {
        tracing::warn!("❌ {} de {} falhou: {}", step, table.table_name(), error);
    } else {
        tracing::error!("❌ {} de {} falhou: {}", step, table.table_name(), error);
    }
}
