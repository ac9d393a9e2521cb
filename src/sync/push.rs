// src/sync/push.rs

use std::sync::Arc;

use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::SyncConfig,
    db::SyncRepository,
    models::sync::{PushBatch, PushFile, RecordMap, SyncTable},
    sync::{assets::resolve_asset_path, transport::SyncTransport},
};

/// Envia as alterações locais pendentes de uma tabela, um lote por chamada.
#[derive(Clone)]
pub struct PushPipeline {
    pool: SqlitePool,
    sync_repo: SyncRepository,
    transport: Arc<dyn SyncTransport>,
    config: SyncConfig,
}

impl PushPipeline {
    pub fn new(pool: SqlitePool, transport: Arc<dyn SyncTransport>, config: SyncConfig) -> Self {
        Self {
            sync_repo: SyncRepository::new(pool.clone()),
            pool,
            transport,
            config,
        }
    }

    /// Um lote: tudo ou nada. Devolve quantos registros o servidor confirmou
    /// (0 quando não havia nada pendente).
    pub async fn push(&self, table: SyncTable) -> Result<usize, AppError> {
        let company_id = self.config.company_id;
        let fresh_key = Uuid::new_v4().to_string();

        // Reserva + leitura numa transação curta; a conexão é liberada antes da rede
        let (batch, records) = {
            let mut tx = self.pool.begin().await?;
            let Some(batch) = self
                .sync_repo
                .claim_batch(&mut tx, table, company_id, self.config.batch_size, &fresh_key)
                .await?
            else {
                return Ok(0);
            };
            let records = self
                .sync_repo
                .load_records(&mut tx, table, company_id, &batch.record_ids)
                .await?;
            tx.commit().await?;
            (batch, records)
        };

        if batch.key != fresh_key {
            tracing::info!("🔁 {}: reenviando lote pendente {}", table.table_name(), batch.key);
        }

        let files = self.collect_files(table, &records).await;
        let payload = PushBatch {
            company_id,
            idempotency_key: batch.key.clone(),
            records,
            files,
        };

        let response = self.transport.push(table.endpoint(), &payload).await?;
        if !response.status {
            return Err(AppError::RemoteRejected(response.message));
        }

        let mut tx = self.pool.begin().await?;
        self.sync_repo.complete_batch(&mut tx, table, company_id, &batch).await?;
        tx.commit().await?;

        tracing::info!("⬆️ {}: {} registro(s) enviados", table.table_name(), payload.records.len());
        Ok(payload.records.len())
    }

    /// Anexa o arquivo de cada registro que tem um e que existe no disco.
    async fn collect_files(&self, table: SyncTable, records: &[RecordMap]) -> Vec<PushFile> {
        let Some(column) = table.attachment_column() else {
            return Vec::new();
        };

        let mut files = Vec::new();
        for (index, record) in records.iter().enumerate() {
            let Some(Value::String(path)) = record.get(column) else {
                continue;
            };
            let Some(local) = resolve_asset_path(&self.config.assets_root, path) else {
                continue;
            };
            if !tokio::fs::try_exists(&local).await.unwrap_or(false) {
                continue;
            }

            match tokio::fs::read(&local).await {
                Ok(bytes) => files.push(PushFile { index, path: path.clone(), bytes }),
                Err(e) => tracing::warn!("Não foi possível ler o anexo {}: {}", path, e),
            }
        }
        files
    }
}
