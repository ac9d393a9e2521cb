// src/sync/pull.rs

use std::{collections::HashSet, sync::Arc};

use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use sqlx::{Acquire, SqlitePool};

use crate::{
    common::error::AppError,
    config::SyncConfig,
    db::SyncRepository,
    models::{
        inventory::{DayOfWeek, ProductType},
        purchase::PaymentStatus,
        sync::{PullRequest, RecordMap, SyncTable},
    },
    sync::{assets::AssetReplicator, transport::SyncTransport},
};

/// Traz do servidor central o que mudou desde o último watermark da tabela e
/// aplica localmente (o remoto sempre vence).
#[derive(Clone)]
pub struct PullPipeline {
    pool: SqlitePool,
    sync_repo: SyncRepository,
    transport: Arc<dyn SyncTransport>,
    assets: AssetReplicator,
    config: SyncConfig,
}

impl PullPipeline {
    pub fn new(pool: SqlitePool, transport: Arc<dyn SyncTransport>, config: SyncConfig) -> Self {
        Self {
            sync_repo: SyncRepository::new(pool.clone()),
            assets: AssetReplicator::new(transport.clone(), config.assets_root.clone()),
            pool,
            transport,
            config,
        }
    }

    /// Devolve quantos registros foram aplicados. Um registro que o banco
    /// recusa é pulado (savepoint próprio); o watermark avança só pelos
    /// aplicados.
    pub async fn pull(&self, table: SyncTable) -> Result<usize, AppError> {
        let company_id = self.config.company_id;
        let last_sync = self.sync_repo.watermark(&self.pool, table, company_id).await?;

        let response = self
            .transport
            .pull(table.endpoint(), &PullRequest { company_id, last_sync })
            .await?;
        if !response.status {
            return Err(AppError::RemoteRejected(response.message));
        }

        let received = response.data.len();
        let records: Vec<RecordMap> = response
            .data
            .into_iter()
            .filter_map(|record| self.accept(table, record))
            .collect();

        if records.len() < received {
            tracing::warn!(
                "{}: {} registro(s) remotos descartados",
                table.table_name(),
                received - records.len()
            );
        }
        if records.is_empty() {
            return Ok(0);
        }

        // Arquivos antes das linhas (melhor esforço, um download por caminho)
        if let Some(column) = table.attachment_column() {
            let mut seen = HashSet::new();
            for record in &records {
                if let Some(Value::String(path)) = record.get(column) {
                    if seen.insert(path.clone()) {
                        self.assets.ensure(path).await;
                    }
                }
            }
        }

        let mut tx = self.pool.begin().await?;
        let columns = self.sync_repo.table_columns(&mut *tx, table).await?;

        let mut applied = 0;
        let mut high_water = last_sync;
        for record in &records {
            let mut savepoint = tx.begin().await?;
            match self.sync_repo.upsert_remote(&mut savepoint, table, &columns, record).await {
                Ok(_) => {
                    savepoint.commit().await?;
                    applied += 1;
                    if let Some(updated_at) = record.get("updated_at").and_then(Value::as_i64) {
                        high_water = high_water.max(updated_at);
                    }
                }
                Err(e) => {
                    savepoint.rollback().await?;
                    tracing::warn!(
                        "{}: registro remoto {} ignorado: {}",
                        table.table_name(),
                        record.get("id").cloned().unwrap_or(serde_json::Value::Null),
                        e
                    );
                }
            }
        }

        self.sync_repo.set_watermark(&mut *tx, table, company_id, high_water).await?;
        tx.commit().await?;

        tracing::info!("⬇️ {}: {} registro(s) aplicados", table.table_name(), applied);
        Ok(applied)
    }

    /// Filtra e normaliza um registro remoto. Descarta os de outro tenant e
    /// os sem `id` inteiro; `company_id` ausente vira o nosso.
    fn accept(&self, table: SyncTable, mut record: RecordMap) -> Option<RecordMap> {
        let company_id = self.config.company_id;

        let Some(id) = record.get("id").and_then(as_integer) else {
            tracing::warn!("{}: registro remoto sem id inteiro descartado", table.table_name());
            return None;
        };
        record.insert("id".into(), Value::from(id));

        match record.get("company_id") {
            None | Some(Value::Null) => {
                record.insert("company_id".into(), Value::from(company_id));
            }
            Some(value) => match as_integer(value) {
                Some(owner) if owner == company_id => {
                    record.insert("company_id".into(), Value::from(owner));
                }
                _ => {
                    tracing::warn!("{}: registro {} de outro tenant descartado", table.table_name(), id);
                    return None;
                }
            },
        }

        if let Some(updated_at) = record.get("updated_at").and_then(as_integer) {
            record.insert("updated_at".into(), Value::from(updated_at));
        }

        if let Err(reason) = normalize_columns(table, &mut record) {
            tracing::warn!("{}: registro {} descartado: {}", table.table_name(), id, reason);
            return None;
        }

        Some(record)
    }
}

/// Leva as colunas tipadas para a forma que os models decodificam. Valor
/// gravado sem passar por aqui quebraria toda leitura da tabela depois.
fn normalize_columns(table: SyncTable, record: &mut RecordMap) -> Result<(), String> {
    match table {
        SyncTable::PriceRules => {
            normalize_day(record, "day_of_week")?;
            normalize_time(record, "start_time")?;
            normalize_time(record, "end_time")?;
            normalize_decimal(record, "special_price")
        }
        SyncTable::Products => {
            normalize_enum::<ProductType>(record, "product_type")?;
            normalize_decimal(record, "buying_price")?;
            normalize_decimal(record, "selling_price")
        }
        SyncTable::PurchaseInvoices => normalize_enum::<PaymentStatus>(record, "payment_status"),
        _ => Ok(()),
    }
}

// Coluna ausente fica como está: no update vale o valor local, no insert o
// banco decide (default ou NOT NULL).
fn normalize_day(record: &mut RecordMap, column: &str) -> Result<(), String> {
    let day = match record.get(column) {
        None => return Ok(()),
        Some(Value::String(s)) => s.parse::<DayOfWeek>()?,
        Some(other) => return Err(format!("{column} inválido: {other}")),
    };
    record.insert(column.into(), Value::from(day.as_str()));
    Ok(())
}

fn normalize_time(record: &mut RecordMap, column: &str) -> Result<(), String> {
    let time = match record.get(column) {
        None => return Ok(()),
        Some(Value::String(s)) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M"))
            .map_err(|_| format!("{column} inválido: {s:?}"))?,
        Some(other) => return Err(format!("{column} inválido: {other}")),
    };
    record.insert(column.into(), Value::from(time.format("%H:%M:%S%.f").to_string()));
    Ok(())
}

fn normalize_decimal(record: &mut RecordMap, column: &str) -> Result<(), String> {
    let value: Decimal = match record.get(column) {
        None | Some(Value::Number(_)) => return Ok(()),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| format!("{column} inválido: {s:?}"))?,
        Some(other) => return Err(format!("{column} inválido: {other}")),
    };
    record.insert(column.into(), Value::from(value.to_string()));
    Ok(())
}

// Enums gravados em SCREAMING_SNAKE_CASE; aceita qualquer caixa na entrada.
fn normalize_enum<T: DeserializeOwned + Serialize>(record: &mut RecordMap, column: &str) -> Result<(), String> {
    let value: T = match record.get(column) {
        None => return Ok(()),
        Some(Value::String(s)) => serde_json::from_value(Value::from(s.trim().to_ascii_uppercase()))
            .map_err(|_| format!("{column} inválido: {s:?}"))?,
        Some(other) => return Err(format!("{column} inválido: {other}")),
    };
    let canonical = serde_json::to_value(&value).map_err(|e| e.to_string())?;
    record.insert(column.into(), canonical);
    Ok(())
}

// Servidores que leem direto do banco mandam inteiros como texto ("12").
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
