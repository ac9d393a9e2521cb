// src/db/purchase_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};

use crate::{
    common::{db_utils::DecimalText, error::AppError},
    models::purchase::{
        DamageInput, InventoryDamage, PaymentStatus, PurchaseInvoice, PurchaseInvoiceInput,
        PurchaseInvoiceItem, PurchaseItemInput, PurchaseReturn, Supplier, SupplierInput,
        SupplierPayment,
    },
};

#[derive(Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  FORNECEDORES
    // =========================================================================

    pub async fn list_suppliers(&self, company_id: i64, search: Option<&str>) -> Result<Vec<Supplier>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM suppliers WHERE is_deleted = 0 AND company_id = ");
        builder.push_bind(company_id);

        if let Some(search) = search.filter(|s| !s.is_empty()) {
            let term = format!("%{}%", search);
            builder
                .push(" AND (supplier_name LIKE ")
                .push_bind(term.clone())
                .push(" OR contact_person LIKE ")
                .push_bind(term)
                .push(")");
        }
        builder.push(" ORDER BY supplier_name ASC");

        let suppliers = builder.build_query_as::<Supplier>().fetch_all(&self.pool).await?;
        Ok(suppliers)
    }

    pub async fn find_supplier<'e, E>(&self, executor: E, company_id: i64, supplier_id: i64) -> Result<Option<Supplier>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let supplier = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = ? AND company_id = ?")
            .bind(supplier_id)
            .bind(company_id)
            .fetch_optional(executor)
            .await?;
        Ok(supplier)
    }

    pub async fn insert_supplier<'e, E>(
        &self,
        executor: E,
        company_id: i64,
        input: &SupplierInput,
        now: i64,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id = sqlx::query_scalar(
            r#"
            INSERT INTO suppliers (company_id, supplier_name, contact_person, phone, email, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
            .bind(company_id)
            .bind(&input.supplier_name)
            .bind(&input.contact_person)
            .bind(&input.phone)
            .bind(&input.email)
            .bind(now)
            .fetch_one(executor)
            .await?;
        Ok(id)
    }

    pub async fn update_supplier<'e, E>(
        &self,
        executor: E,
        company_id: i64,
        supplier_id: i64,
        input: &SupplierInput,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE suppliers SET supplier_name = ?, contact_person = ?, phone = ?, email = ?
            WHERE id = ? AND company_id = ?
            "#,
        )
            .bind(&input.supplier_name)
            .bind(&input.contact_person)
            .bind(&input.phone)
            .bind(&input.email)
            .bind(supplier_id)
            .bind(company_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Grava o novo saldo (a conta em Decimal é feita pelo serviço).
    pub async fn set_supplier_balance<'e, E>(
        &self,
        executor: E,
        company_id: i64,
        supplier_id: i64,
        balance: Decimal,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("UPDATE suppliers SET total_balance = ? WHERE id = ? AND company_id = ?")
            .bind(balance.to_string())
            .bind(supplier_id)
            .bind(company_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn supplier_balance<'e, E>(&self, executor: E, company_id: i64, supplier_id: i64) -> Result<Option<Decimal>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let balance: Option<DecimalText> =
            sqlx::query_scalar("SELECT total_balance FROM suppliers WHERE id = ? AND company_id = ?")
                .bind(supplier_id)
                .bind(company_id)
                .fetch_optional(executor)
                .await?;
        Ok(balance.map(Decimal::from))
    }

    // =========================================================================
    //  NOTAS DE COMPRA
    // =========================================================================

    pub async fn insert_invoice<'e, E>(
        &self,
        executor: E,
        header: InvoiceHeader<'_>,
        input: &PurchaseInvoiceInput,
    ) -> Result<PurchaseInvoice, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let invoice = sqlx::query_as::<_, PurchaseInvoice>(
            r#"
            INSERT INTO purchase_invoices (
                company_id, branch_id, manager_id, supplier_id, invoice_no,
                total_amount, paid_amount, due_amount, payment_status,
                attachment_path, notes, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
            .bind(header.company_id)
            .bind(header.branch_id)
            .bind(header.manager_id)
            .bind(input.supplier_id)
            .bind(&input.invoice_no)
            .bind(header.total_amount.to_string())
            .bind(input.paid_amount.to_string())
            .bind(header.due_amount.to_string())
            .bind(header.status)
            .bind(header.attachment_path)
            .bind(&input.notes)
            .bind(header.now)
            .bind(header.now)
            .fetch_one(executor)
            .await?;
        Ok(invoice)
    }

    pub async fn insert_invoice_item<'e, E>(
        &self,
        executor: E,
        company_id: i64,
        purchase_id: i64,
        item: &PurchaseItemInput,
        now: i64,
    ) -> Result<PurchaseInvoiceItem, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let line = sqlx::query_as::<_, PurchaseInvoiceItem>(
            r#"
            INSERT INTO purchase_invoice_items (company_id, purchase_id, product_id, qty, buying_price, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
            .bind(company_id)
            .bind(purchase_id)
            .bind(item.product_id)
            .bind(item.qty)
            .bind(item.buying_price.to_string())
            .bind(now)
            .fetch_one(executor)
            .await?;
        Ok(line)
    }

    pub async fn find_invoice<'e, E>(&self, executor: E, company_id: i64, purchase_id: i64) -> Result<Option<PurchaseInvoice>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let invoice = sqlx::query_as::<_, PurchaseInvoice>(
            "SELECT * FROM purchase_invoices WHERE id = ? AND company_id = ?",
        )
            .bind(purchase_id)
            .bind(company_id)
            .fetch_optional(executor)
            .await?;
        Ok(invoice)
    }

    pub async fn list_invoices(&self, company_id: i64, supplier_id: Option<i64>) -> Result<Vec<PurchaseInvoice>, AppError> {
        let invoices = sqlx::query_as::<_, PurchaseInvoice>(
            r#"
            SELECT * FROM purchase_invoices
            WHERE company_id = ? AND (? IS NULL OR supplier_id = ?)
            ORDER BY created_at DESC, id DESC
            "#,
        )
            .bind(company_id)
            .bind(supplier_id)
            .bind(supplier_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(invoices)
    }

    pub async fn list_invoice_items<'e, E>(&self, executor: E, company_id: i64, purchase_id: i64) -> Result<Vec<PurchaseInvoiceItem>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let items = sqlx::query_as::<_, PurchaseInvoiceItem>(
            "SELECT * FROM purchase_invoice_items WHERE company_id = ? AND purchase_id = ? ORDER BY id ASC",
        )
            .bind(company_id)
            .bind(purchase_id)
            .fetch_all(executor)
            .await?;
        Ok(items)
    }

    pub async fn update_invoice_payment<'e, E>(
        &self,
        executor: E,
        company_id: i64,
        purchase_id: i64,
        paid_amount: Decimal,
        due_amount: Decimal,
        status: PaymentStatus,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE purchase_invoices SET paid_amount = ?, due_amount = ?, payment_status = ?
            WHERE id = ? AND company_id = ?
            "#,
        )
            .bind(paid_amount.to_string())
            .bind(due_amount.to_string())
            .bind(status)
            .bind(purchase_id)
            .bind(company_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    //  PAGAMENTOS, DEVOLUÇÕES E AVARIAS
    // =========================================================================

    pub async fn insert_payment<'e, E>(
        &self,
        executor: E,
        header: MovementHeader<'_>,
        supplier_id: i64,
        purchase_id: Option<i64>,
        amount: Decimal,
        notes: Option<&str>,
    ) -> Result<SupplierPayment, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let payment = sqlx::query_as::<_, SupplierPayment>(
            r#"
            INSERT INTO supplier_payments (
                company_id, branch_id, manager_id, supplier_id, purchase_id,
                amount, receipt_path, notes, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
            .bind(header.company_id)
            .bind(header.branch_id)
            .bind(header.manager_id)
            .bind(supplier_id)
            .bind(purchase_id)
            .bind(amount.to_string())
            .bind(header.attachment_path)
            .bind(notes)
            .bind(header.now)
            .bind(header.now)
            .fetch_one(executor)
            .await?;
        Ok(payment)
    }

    pub async fn insert_return<'e, E>(
        &self,
        executor: E,
        header: MovementHeader<'_>,
        supplier_id: i64,
        refund: Decimal,
        reason: Option<&str>,
    ) -> Result<PurchaseReturn, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let ret = sqlx::query_as::<_, PurchaseReturn>(
            r#"
            INSERT INTO purchase_returns (
                company_id, branch_id, manager_id, supplier_id, total_refunded_amount,
                attachment_path, reason, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
            .bind(header.company_id)
            .bind(header.branch_id)
            .bind(header.manager_id)
            .bind(supplier_id)
            .bind(refund.to_string())
            .bind(header.attachment_path)
            .bind(reason)
            .bind(header.now)
            .bind(header.now)
            .fetch_one(executor)
            .await?;
        Ok(ret)
    }

    pub async fn insert_damage<'e, E>(
        &self,
        executor: E,
        header: MovementHeader<'_>,
        input: &DamageInput,
    ) -> Result<InventoryDamage, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let damage = sqlx::query_as::<_, InventoryDamage>(
            r#"
            INSERT INTO inventory_damages (
                company_id, branch_id, manager_id, product_id, qty, reason, notes,
                attachment_path, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
            .bind(header.company_id)
            .bind(header.branch_id)
            .bind(header.manager_id)
            .bind(input.product_id)
            .bind(input.qty)
            .bind(&input.reason)
            .bind(&input.notes)
            .bind(header.attachment_path)
            .bind(header.now)
            .bind(header.now)
            .fetch_one(executor)
            .await?;
        Ok(damage)
    }

    pub async fn list_payments(&self, company_id: i64, supplier_id: i64) -> Result<Vec<SupplierPayment>, AppError> {
        let payments = sqlx::query_as::<_, SupplierPayment>(
            "SELECT * FROM supplier_payments WHERE company_id = ? AND supplier_id = ? ORDER BY created_at DESC, id DESC",
        )
            .bind(company_id)
            .bind(supplier_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(payments)
    }
}

/// Quem/onde/quando de um lançamento de compras.
#[derive(Debug, Clone, Copy)]
pub struct MovementHeader<'a> {
    pub company_id: i64,
    pub branch_id: i64,
    pub manager_id: i64,
    pub attachment_path: Option<&'a str>,
    pub now: i64,
}

/// Cabeçalho de nota já com os totais derivados.
#[derive(Debug, Clone, Copy)]
pub struct InvoiceHeader<'a> {
    pub company_id: i64,
    pub branch_id: i64,
    pub manager_id: i64,
    pub total_amount: Decimal,
    pub due_amount: Decimal,
    pub status: PaymentStatus,
    pub attachment_path: Option<&'a str>,
    pub now: i64,
}
