// src/models/inventory.rs

use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

use crate::common::db_utils::DecimalText;
use crate::models::sync::SyncStatus;

pub const DEFAULT_PRODUCT_PHOTO: &str = "assets/img/products/default.png";
pub const DEFAULT_CATEGORY_PHOTO: &str = "assets/img/categories/default.png";

pub(crate) fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

// --- 1. Categorias ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub company_id: i64,
    pub category_name: String,
    pub category_photo: Option<String>,
    pub is_deleted: bool,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    // Sem id = nova categoria
    pub id: Option<i64>,

    #[validate(length(min = 1, message = "O nome da categoria é obrigatório."))]
    pub category_name: String,

    pub category_photo: Option<String>,

    #[serde(default)]
    pub is_deleted: bool,
}

// --- 2. Produtos ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductType {
    Stockable, // Vira "STOCKABLE"
    Service,   // Vira "SERVICE"
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub company_id: i64,
    pub branch_id: i64,
    pub category_id: Option<i64>,
    pub sku: String,
    pub product_name: String,
    pub product_type: ProductType,
    #[sqlx(try_from = "DecimalText")]
    pub buying_price: Decimal,
    #[sqlx(try_from = "DecimalText")]
    pub selling_price: Decimal,
    pub product_photo: Option<String>,
    pub stock_qty: i64,
    pub min_stock_level: i64,
    pub is_active: bool,
    pub is_deleted: bool,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub id: Option<i64>,

    pub category_id: Option<i64>,

    #[validate(length(min = 1, message = "O SKU é obrigatório."))]
    pub sku: String,

    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    pub product_name: String,

    pub product_type: ProductType,

    #[validate(custom(function = "validate_not_negative"))]
    pub buying_price: Decimal,

    #[validate(custom(function = "validate_not_negative"))]
    pub selling_price: Decimal,

    pub product_photo: Option<String>,

    #[serde(default)]
    pub min_stock_level: i64,

    pub is_active: bool,

    #[serde(default)]
    pub is_deleted: bool,

    #[validate(nested)]
    #[serde(default)]
    pub price_rules: Vec<PriceRuleInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category_id: Option<i64>,
}

/// Produto pronto para o balcão: categoria + preço promocional vigente.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListing {
    #[serde(flatten)]
    pub product: Product,
    pub category_name: Option<String>,
    pub active_rule: Option<PriceRule>,
    pub effective_price: Decimal,
}

// --- 3. Regras de Preço ---
// Gravado por extenso (`Monday`), como o DAYNAME() do servidor central.
// Abreviações (`Mon`) são aceitas na entrada e no pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum DayOfWeek {
    #[serde(alias = "Mon")]
    Monday,
    #[serde(alias = "Tue")]
    Tuesday,
    #[serde(alias = "Wed")]
    Wednesday,
    #[serde(alias = "Thu")]
    Thursday,
    #[serde(alias = "Fri")]
    Friday,
    #[serde(alias = "Sat")]
    Saturday,
    #[serde(alias = "Sun")]
    Sunday,
    All, // Vale para qualquer dia
}

impl DayOfWeek {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
            DayOfWeek::All => "All",
        }
    }

    pub fn matches(&self, day: Weekday) -> bool {
        match self {
            DayOfWeek::All => true,
            DayOfWeek::Monday => day == Weekday::Mon,
            DayOfWeek::Tuesday => day == Weekday::Tue,
            DayOfWeek::Wednesday => day == Weekday::Wed,
            DayOfWeek::Thursday => day == Weekday::Thu,
            DayOfWeek::Friday => day == Weekday::Fri,
            DayOfWeek::Saturday => day == Weekday::Sat,
            DayOfWeek::Sunday => day == Weekday::Sun,
        }
    }
}

impl FromStr for DayOfWeek {
    type Err = String;

    /// Nome completo ou abreviado, sem diferenciar maiúsculas.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let day = match value.trim().to_ascii_lowercase().as_str() {
            "all" => DayOfWeek::All,
            "mon" | "monday" => DayOfWeek::Monday,
            "tue" | "tues" | "tuesday" => DayOfWeek::Tuesday,
            "wed" | "wednesday" => DayOfWeek::Wednesday,
            "thu" | "thur" | "thurs" | "thursday" => DayOfWeek::Thursday,
            "fri" | "friday" => DayOfWeek::Friday,
            "sat" | "saturday" => DayOfWeek::Saturday,
            "sun" | "sunday" => DayOfWeek::Sunday,
            _ => return Err(format!("dia da semana inválido: {:?}", value)),
        };
        Ok(day)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PriceRule {
    pub id: i64,
    pub company_id: i64,
    pub branch_id: i64,
    pub product_id: i64,
    pub day_of_week: DayOfWeek,
    #[sqlx(try_from = "DecimalText")]
    pub special_price: Decimal,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: bool,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
}

impl PriceRule {
    /// Janela inclusiva nas duas pontas (mesmo comportamento de BETWEEN).
    pub fn is_active_at(&self, now: NaiveDateTime) -> bool {
        let time = now.time();
        self.is_active
            && self.day_of_week.matches(now.weekday())
            && self.start_time <= time
            && time <= self.end_time
    }
}

/// Entre várias regras vigentes, vale o menor preço.
pub fn active_price_rule(rules: &[PriceRule], now: NaiveDateTime) -> Option<&PriceRule> {
    rules
        .iter()
        .filter(|r| r.is_active_at(now))
        .min_by(|a, b| a.special_price.cmp(&b.special_price))
}

fn validate_time_window(rule: &PriceRuleInput) -> Result<(), ValidationError> {
    if rule.start_time > rule.end_time {
        let mut err = ValidationError::new("time_window");
        err.message = Some("O horário inicial deve ser anterior ao final.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_time_window"))]
#[serde(rename_all = "camelCase")]
pub struct PriceRuleInput {
    pub day_of_week: DayOfWeek,

    #[validate(custom(function = "validate_not_negative"))]
    pub special_price: Decimal,

    pub start_time: NaiveTime,
    pub end_time: NaiveTime,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

// --- 4. Livro-razão de estoque ---

/// Um delta assinado de estoque (positivo = entrada, negativo = saída).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustment {
    pub product_id: i64,
    pub delta: i64,
    pub reason: String,
}

impl StockAdjustment {
    pub fn new(product_id: i64, delta: i64, reason: impl Into<String>) -> Self {
        Self { product_id, delta, reason: reason.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    StockChange, // Vira "STOCK_CHANGE"
    InfoUpdate,  // Vira "INFO_UPDATE"
}

// Histórico imutável (triggers no banco bloqueiam UPDATE/DELETE)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: i64,
    pub company_id: i64,
    pub branch_id: i64,
    pub product_id: i64,
    pub action_type: AuditAction,
    pub field_changed: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub change_reason: String,
    pub actor_id: i64,
    pub created_at: i64,
}

// Valor calculado em Decimal no Rust (SUM no SQLite viraria REAL)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    pub items: i64,
    pub value: Decimal,
}
