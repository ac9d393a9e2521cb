// src/common/db_utils.rs

use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::{
    Decode, Sqlite, Type,
    error::BoxDynError,
    sqlite::{SqlitePool, SqlitePoolOptions, SqliteTypeInfo, SqliteValueRef},
};

/// Timestamp unix (segundos) usado em `updated_at` / `created_at`.
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

// ---
// Decimal <-> SQLite
// ---
// O SQLite não tem tipo decimal. Guardamos dinheiro como TEXT e lemos aqui.
// Os models usam `#[sqlx(try_from = "DecimalText")]` nos campos Decimal.
#[derive(Debug, Clone, Copy)]
pub struct DecimalText(pub Decimal);

impl From<DecimalText> for Decimal {
    fn from(value: DecimalText) -> Self {
        value.0
    }
}

impl Type<Sqlite> for DecimalText {
    fn type_info() -> SqliteTypeInfo {
        <String as Type<Sqlite>>::type_info()
    }

    // Linhas vindas do pull podem ter gravado REAL/INTEGER na coluna.
    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <String as Type<Sqlite>>::compatible(ty)
            || <f64 as Type<Sqlite>>::compatible(ty)
            || <i64 as Type<Sqlite>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Sqlite> for DecimalText {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
        let text = <String as Decode<Sqlite>>::decode(value)?;
        let parsed = Decimal::from_str(text.trim())
            .or_else(|_| Decimal::from_scientific(text.trim()))?;
        Ok(DecimalText(parsed))
    }
}

/// Pool SQLite em memória com o schema aplicado (uso em testes).
/// Uma única conexão: cada conexão `:memory:` é um banco diferente.
pub async fn memory_pool() -> Result<SqlitePool, crate::common::error::AppError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!().run(&pool).await?;
    Ok(pool)
}
