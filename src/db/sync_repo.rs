// src/db/sync_repo.rs

use serde_json::{Number, Value};
use sqlx::{
    Column, Executor, QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool, TypeInfo, ValueRef,
    sqlite::SqliteRow,
};

use crate::{
    common::error::AppError,
    models::sync::{OutboxBatch, RecordMap, SyncStatus, SyncTable},
};

// Repositório da replicação: outbox, marca de sujo, watermarks e a
// leitura/escrita "genérica" de linhas como JSON.
#[derive(Clone)]
pub struct SyncRepository {
    pool: SqlitePool,
}

impl SyncRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ---
    // Marca de sujo
    // ---

    /// O único caminho que marca uma linha local como pendente de envio:
    /// carimba `updated_at`, põe `DIRTY` e enfileira no outbox.
    pub async fn mark_dirty(
        &self,
        conn: &mut SqliteConnection,
        table: SyncTable,
        company_id: i64,
        record_id: i64,
        now: i64,
    ) -> Result<bool, AppError> {
        let sql = format!(
            "UPDATE {} SET sync_status = ?, updated_at = ? WHERE id = ? AND company_id = ?",
            table.table_name()
        );
        let result = sqlx::query(&sql)
            .bind(SyncStatus::Dirty)
            .bind(now)
            .bind(record_id)
            .bind(company_id)
            .execute(&mut *conn)
            .await?;

        // Linha de outro tenant (ou inexistente): nada a enfileirar
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO sync_outbox (company_id, table_name, record_id, enqueued_at) VALUES (?, ?, ?, ?)",
        )
            .bind(company_id)
            .bind(table.table_name())
            .bind(record_id)
            .bind(now)
            .execute(&mut *conn)
            .await?;

        Ok(true)
    }

    pub async fn dirty_count(&self, table: SyncTable, company_id: i64) -> Result<i64, AppError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE company_id = ? AND sync_status = ?",
            table.table_name()
        );
        let count = sqlx::query_scalar(&sql)
            .bind(company_id)
            .bind(SyncStatus::Dirty)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn outbox_len(&self, table: SyncTable, company_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sync_outbox WHERE company_id = ? AND table_name = ?",
        )
            .bind(company_id)
            .bind(table.table_name())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ---
    // Outbox / lotes de push
    // ---

    /// Reserva o próximo lote de push.
    ///
    /// Se um lote anterior falhou, ele continua reservado (com a mesma chave)
    /// e é devolvido de novo, intacto. Senão, reserva até `limit` registros
    /// distintos na ordem do outbox e grava `fresh_key` neles.
    pub async fn claim_batch(
        &self,
        conn: &mut SqliteConnection,
        table: SyncTable,
        company_id: i64,
        limit: i64,
        fresh_key: &str,
    ) -> Result<Option<OutboxBatch>, AppError> {
        let pending_key: Option<String> = sqlx::query_scalar(
            r#"
            SELECT batch_key FROM sync_outbox
            WHERE company_id = ? AND table_name = ? AND batch_key IS NOT NULL
            ORDER BY seq ASC
            LIMIT 1
            "#,
        )
            .bind(company_id)
            .bind(table.table_name())
            .fetch_optional(&mut *conn)
            .await?;

        if let Some(key) = pending_key {
            let record_ids: Vec<i64> = sqlx::query_scalar(
                r#"
                SELECT record_id FROM sync_outbox
                WHERE batch_key = ?
                GROUP BY record_id
                ORDER BY MIN(seq) ASC
                "#,
            )
                .bind(&key)
                .fetch_all(&mut *conn)
                .await?;

            tracing::debug!("♻️ Reenviando lote pendente {} de {}", key, table.table_name());
            return Ok(Some(OutboxBatch { key, record_ids }));
        }

        let record_ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT record_id FROM sync_outbox
            WHERE company_id = ? AND table_name = ? AND batch_key IS NULL
            GROUP BY record_id
            ORDER BY MIN(seq) ASC
            LIMIT ?
            "#,
        )
            .bind(company_id)
            .bind(table.table_name())
            .bind(limit)
            .fetch_all(&mut *conn)
            .await?;

        if record_ids.is_empty() {
            return Ok(None);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE sync_outbox SET batch_key = ");
        builder
            .push_bind(fresh_key)
            .push(" WHERE company_id = ")
            .push_bind(company_id)
            .push(" AND table_name = ")
            .push_bind(table.table_name())
            .push(" AND batch_key IS NULL AND record_id IN (");
        let mut ids = builder.separated(", ");
        for id in &record_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");
        builder.build().execute(&mut *conn).await?;

        Ok(Some(OutboxBatch { key: fresh_key.to_string(), record_ids }))
    }

    /// Confirma um lote aceito pelo servidor. Só volta para `CLEAN` quem não
    /// ganhou entrada nova no outbox enquanto o lote estava em voo.
    pub async fn complete_batch(
        &self,
        conn: &mut SqliteConnection,
        table: SyncTable,
        company_id: i64,
        batch: &OutboxBatch,
    ) -> Result<u64, AppError> {
        sqlx::query("DELETE FROM sync_outbox WHERE batch_key = ?")
            .bind(&batch.key)
            .execute(&mut *conn)
            .await?;

        if batch.record_ids.is_empty() {
            return Ok(0);
        }

        let name = table.table_name();
        let mut builder = QueryBuilder::<Sqlite>::new(format!("UPDATE {name} SET sync_status = "));
        builder
            .push_bind(SyncStatus::Clean)
            .push(" WHERE company_id = ")
            .push_bind(company_id)
            .push(format!(
                " AND NOT EXISTS (SELECT 1 FROM sync_outbox o WHERE o.table_name = '{name}' AND o.record_id = {name}.id)"
            ))
            .push(" AND id IN (");
        let mut ids = builder.separated(", ");
        for id in &batch.record_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");

        let result = builder.build().execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    // ---
    // Linhas como JSON
    // ---

    /// Carrega as linhas (todas as colunas) na mesma ordem de `ids`.
    pub async fn load_records(
        &self,
        conn: &mut SqliteConnection,
        table: SyncTable,
        company_id: i64,
        ids: &[i64],
    ) -> Result<Vec<RecordMap>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT * FROM {} WHERE company_id = ", table.table_name()));
        builder.push_bind(company_id).push(" AND id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows = builder.build().fetch_all(&mut *conn).await?;

        let mut records = rows.iter().map(row_to_record).collect::<Result<Vec<_>, _>>()?;
        records.sort_by_key(|r| {
            let id = r.get("id").and_then(Value::as_i64).unwrap_or_default();
            ids.iter().position(|x| *x == id).unwrap_or(usize::MAX)
        });
        Ok(records)
    }

    /// Colunas reais da tabela, para nunca interpolar nome vindo do servidor.
    pub async fn table_columns<'e, E>(&self, executor: E, table: SyncTable) -> Result<Vec<String>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let columns = sqlx::query_scalar("SELECT name FROM pragma_table_info(?) ORDER BY cid")
            .bind(table.table_name())
            .fetch_all(executor)
            .await?;
        Ok(columns)
    }

    /// Aplica um registro remoto: insere ou sobrescreve pelo `id` (o remoto
    /// sempre vence) e marca `CLEAN`. Alterações locais ainda na fila para
    /// esse registro são descartadas junto.
    pub async fn upsert_remote(
        &self,
        conn: &mut SqliteConnection,
        table: SyncTable,
        columns: &[String],
        record: &RecordMap,
    ) -> Result<i64, AppError> {
        let id = record
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| AppError::InvalidRemoteRecord(format!("{} sem id", table.table_name())))?;

        if let Some(key) = table.natural_key() {
            self.evict_natural_key_clash(&mut *conn, table, key, id, record).await?;
        }

        let present: Vec<&String> = columns
            .iter()
            .filter(|c| c.as_str() != "sync_status" && record.contains_key(c.as_str()))
            .collect();

        let mut builder = QueryBuilder::<Sqlite>::new(format!("INSERT INTO {} (", table.table_name()));
        for column in &present {
            builder.push(format!("{column}, "));
        }
        builder.push("sync_status) VALUES (");
        for value in present.iter().filter_map(|c| record.get(c.as_str())) {
            push_json_bind(&mut builder, value);
            builder.push(", ");
        }
        builder.push_bind(SyncStatus::Clean).push(") ON CONFLICT(id) DO UPDATE SET ");
        for column in present.iter().filter(|c| c.as_str() != "id") {
            builder.push(format!("{column} = excluded.{column}, "));
        }
        builder.push("sync_status = excluded.sync_status");

        builder.build().execute(&mut *conn).await?;

        sqlx::query("DELETE FROM sync_outbox WHERE table_name = ? AND record_id = ?")
            .bind(table.table_name())
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(id)
    }

    // O remoto vence também na chave natural: a linha local com o mesmo
    // produto + dia e outro `id` sai, junto com o que estava na fila para ela.
    async fn evict_natural_key_clash(
        &self,
        conn: &mut SqliteConnection,
        table: SyncTable,
        key: &[&str],
        id: i64,
        record: &RecordMap,
    ) -> Result<(), AppError> {
        let mut values = Vec::with_capacity(key.len());
        for column in key {
            match record.get(*column) {
                Some(value) if !value.is_null() => values.push(value),
                // Sem a chave completa não há com o que conflitar
                _ => return Ok(()),
            }
        }

        let mut builder = QueryBuilder::<Sqlite>::new(format!("DELETE FROM {} WHERE id <> ", table.table_name()));
        builder.push_bind(id);
        for (column, value) in key.iter().zip(values) {
            builder.push(format!(" AND {column} = "));
            push_json_bind(&mut builder, value);
        }
        builder.push(" RETURNING id");

        let evicted: Vec<i64> = builder.build_query_scalar().fetch_all(&mut *conn).await?;
        for local_id in evicted {
            tracing::info!(
                "{}: linha local {} substituída pelo registro remoto {}",
                table.table_name(),
                local_id,
                id
            );
            sqlx::query("DELETE FROM sync_outbox WHERE table_name = ? AND record_id = ?")
                .bind(table.table_name())
                .bind(local_id)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    // ---
    // Watermarks
    // ---

    pub async fn watermark<'e, E>(&self, executor: E, table: SyncTable, company_id: i64) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let last_sync: Option<i64> = sqlx::query_scalar(
            "SELECT last_sync FROM sync_watermarks WHERE company_id = ? AND table_name = ?",
        )
            .bind(company_id)
            .bind(table.table_name())
            .fetch_optional(executor)
            .await?;
        Ok(last_sync.unwrap_or(0))
    }

    /// Avança o watermark; nunca volta para trás.
    pub async fn set_watermark<'e, E>(
        &self,
        executor: E,
        table: SyncTable,
        company_id: i64,
        last_sync: i64,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO sync_watermarks (company_id, table_name, last_sync)
            VALUES (?, ?, ?)
            ON CONFLICT (company_id, table_name)
            DO UPDATE SET last_sync = MAX(sync_watermarks.last_sync, excluded.last_sync)
            "#,
        )
            .bind(company_id)
            .bind(table.table_name())
            .bind(last_sync)
            .execute(executor)
            .await?;
        Ok(())
    }
}

fn push_json_bind(builder: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Null => {
            builder.push_bind(None::<String>);
        }
        Value::Bool(b) => {
            builder.push_bind(*b);
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                builder.push_bind(i);
            } else {
                builder.push_bind(n.as_f64().unwrap_or_default());
            }
        }
        Value::String(s) => {
            builder.push_bind(s.clone());
        }
        other => {
            builder.push_bind(other.to_string());
        }
    }
}

/// Converte uma linha SQLite em objeto JSON pela classe de armazenamento de
/// cada valor (INTEGER, REAL, TEXT, BLOB, NULL).
pub fn row_to_record(row: &SqliteRow) -> Result<RecordMap, AppError> {
    let mut record = RecordMap::new();

    for column in row.columns() {
        let index = column.ordinal();
        let (is_null, storage) = {
            let raw = row.try_get_raw(index)?;
            (raw.is_null(), raw.type_info().name().to_string())
        };

        let value = if is_null {
            Value::Null
        } else {
            match storage.as_str() {
                "INTEGER" | "BOOLEAN" => Value::from(row.try_get_unchecked::<i64, _>(index)?),
                "REAL" | "NUMERIC" => Number::from_f64(row.try_get_unchecked::<f64, _>(index)?)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                // Nenhuma tabela sincronizada guarda BLOB; arquivos vão por caminho
                "BLOB" => Value::Null,
                _ => Value::String(row.try_get_unchecked::<String, _>(index)?),
            }
        };

        record.insert(column.name().to_string(), value);
    }

    Ok(record)
}
