// src/models/sync.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Estado de sincronização de cada linha local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Dirty, // Alterado localmente, ainda não confirmado pelo servidor
    Clean, // Confirmado (push aceito ou veio do pull)
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Dirty => "DIRTY",
            SyncStatus::Clean => "CLEAN",
        }
    }
}

/// Módulos de negócio donos das tabelas sincronizadas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncModule {
    Inventory,
    Purchasing,
}

impl SyncModule {
    /// Ordem do ciclo completo: compras depende dos produtos do estoque.
    pub const ALL: [SyncModule; 2] = [SyncModule::Inventory, SyncModule::Purchasing];

    /// Tabelas de referência antes das dependentes.
    pub fn tables(&self) -> &'static [SyncTable] {
        match self {
            SyncModule::Inventory => &[
                SyncTable::Categories,
                SyncTable::Products,
                SyncTable::PriceRules,
            ],
            SyncModule::Purchasing => &[
                SyncTable::Suppliers,
                SyncTable::PurchaseInvoices,
                SyncTable::PurchaseInvoiceItems,
                SyncTable::SupplierPayments,
                SyncTable::PurchaseReturns,
                SyncTable::InventoryDamages,
            ],
        }
    }
}

/// Tabelas locais que participam da replicação.
///
/// O nome da tabela só sai daqui, nunca de entrada externa, então é seguro
/// interpolá-lo no SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTable {
    Categories,
    Products,
    PriceRules,
    Suppliers,
    PurchaseInvoices,
    PurchaseInvoiceItems,
    SupplierPayments,
    PurchaseReturns,
    InventoryDamages,
}

impl SyncTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            SyncTable::Categories => "categories",
            SyncTable::Products => "products",
            SyncTable::PriceRules => "price_rules",
            SyncTable::Suppliers => "suppliers",
            SyncTable::PurchaseInvoices => "purchase_invoices",
            SyncTable::PurchaseInvoiceItems => "purchase_invoice_items",
            SyncTable::SupplierPayments => "supplier_payments",
            SyncTable::PurchaseReturns => "purchase_returns",
            SyncTable::InventoryDamages => "inventory_damages",
        }
    }

    /// Prefixo da rota no servidor central (`{endpoint}/push`, `{endpoint}/pull`).
    pub fn endpoint(&self) -> &'static str {
        match self {
            SyncTable::Categories => "/sync_categories",
            SyncTable::Products => "/sync_products",
            SyncTable::PriceRules => "/sync_pricing",
            SyncTable::Suppliers => "/sync_suppliers",
            SyncTable::PurchaseInvoices => "/sync_purchases",
            SyncTable::PurchaseInvoiceItems => "/sync_purchase_items",
            SyncTable::SupplierPayments => "/sync_payments",
            SyncTable::PurchaseReturns => "/sync_returns",
            SyncTable::InventoryDamages => "/sync_damages",
        }
    }

    /// Coluna com caminho de arquivo (foto/documento), se houver.
    pub fn attachment_column(&self) -> Option<&'static str> {
        match self {
            SyncTable::Categories => Some("category_photo"),
            SyncTable::Products => Some("product_photo"),
            SyncTable::PurchaseInvoices
            | SyncTable::PurchaseReturns
            | SyncTable::InventoryDamages => Some("attachment_path"),
            SyncTable::SupplierPayments => Some("receipt_path"),
            SyncTable::PriceRules | SyncTable::Suppliers | SyncTable::PurchaseInvoiceItems => None,
        }
    }

    /// Chave única além do `id`. Os dois lados podem criar a mesma regra
    /// (produto + dia) com ids diferentes.
    pub fn natural_key(&self) -> Option<&'static [&'static str]> {
        match self {
            SyncTable::PriceRules => Some(&["product_id", "day_of_week"]),
            _ => None,
        }
    }
}

/// Um registro na forma de linha JSON (todas as colunas).
pub type RecordMap = Map<String, Value>;

/// Lote reservado no outbox para um push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxBatch {
    pub key: String,
    pub record_ids: Vec<i64>,
}

// ---
// Contrato HTTP com o servidor central
// ---

/// Arquivo anexado a um registro do lote (parte multipart `file_{index}`).
#[derive(Debug, Clone)]
pub struct PushFile {
    pub index: usize,
    pub path: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct PushBatch {
    pub company_id: i64,
    pub idempotency_key: String,
    pub records: Vec<RecordMap>,
    pub files: Vec<PushFile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushResponse {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub company_id: i64,
    pub last_sync: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullResponse {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Vec<RecordMap>,
}

// ---
// Resultado de um ciclo
// ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReport {
    pub table: SyncTable,
    pub pushed: usize,
    pub pulled: usize,
    pub push_error: Option<String>,
    pub pull_error: Option<String>,
}

impl TableReport {
    pub fn for_table(table: SyncTable) -> Self {
        Self { table, pushed: 0, pulled: 0, push_error: None, pull_error: None }
    }

    pub fn is_ok(&self) -> bool {
        self.push_error.is_none() && self.pull_error.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub started_at: i64,
    pub finished_at: i64,
    pub tables: Vec<TableReport>,
}

impl SyncReport {
    pub fn failed_tables(&self) -> Vec<SyncTable> {
        self.tables.iter().filter(|t| !t.is_ok()).map(|t| t.table).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum SyncOutcome {
    /// Sem servidor configurado: modo standalone, nada a fazer.
    Offline,
    /// Já existe um ciclo rodando neste processo.
    Busy,
    Completed(SyncReport),
}
