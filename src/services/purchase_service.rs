// src/services/purchase_service.rs

use std::{path::Path, sync::Arc};

use rust_decimal::Decimal;
use sqlx::{SqliteConnection, SqlitePool};
use validator::Validate;

use crate::{
    common::{db_utils::now_unix, error::AppError},
    config::TenantScope,
    db::{
        PurchaseRepository, SyncRepository,
        purchase_repo::{InvoiceHeader, MovementHeader},
    },
    models::{
        inventory::StockAdjustment,
        purchase::{
            DamageInput, InventoryDamage, PaymentStatus, PurchaseInvoice, PurchaseInvoiceDetail,
            PurchaseInvoiceInput, PurchaseReturn, PurchaseReturnInput, Supplier, SupplierInput,
            SupplierPayment, SupplierPaymentInput,
        },
        sync::SyncTable,
    },
    services::{
        attachment_service::{AttachmentKind, AttachmentService},
        inventory_service::StockLedger,
    },
};

#[derive(Clone)]
pub struct PurchaseService {
    pool: SqlitePool,
    purchase_repo: PurchaseRepository,
    sync_repo: SyncRepository,
    // Só a capacidade de mexer no estoque, não o serviço de estoque inteiro
    ledger: Arc<dyn StockLedger>,
    attachments: AttachmentService,
    scope: TenantScope,
}

impl PurchaseService {
    pub fn new(
        pool: SqlitePool,
        ledger: Arc<dyn StockLedger>,
        attachments: AttachmentService,
        scope: TenantScope,
    ) -> Self {
        Self {
            purchase_repo: PurchaseRepository::new(pool.clone()),
            sync_repo: SyncRepository::new(pool.clone()),
            pool,
            ledger,
            attachments,
            scope,
        }
    }

    fn header<'a>(&self, attachment_path: Option<&'a str>, now: i64) -> MovementHeader<'a> {
        MovementHeader {
            company_id: self.scope.company_id,
            branch_id: self.scope.branch_id,
            manager_id: self.scope.manager_id,
            attachment_path,
            now,
        }
    }

    // =========================================================================
    //  FORNECEDORES
    // =========================================================================

    pub async fn list_suppliers(&self, search: Option<&str>) -> Result<Vec<Supplier>, AppError> {
        self.purchase_repo.list_suppliers(self.scope.company_id, search).await
    }

    pub async fn save_supplier(&self, input: &SupplierInput) -> Result<i64, AppError> {
        input.validate()?;

        let company_id = self.scope.company_id;
        let now = now_unix();
        let mut tx = self.pool.begin().await?;

        let supplier_id = match input.id {
            Some(id) => {
                if self.purchase_repo.update_supplier(&mut *tx, company_id, id, input).await? == 0 {
                    return Err(AppError::SupplierNotFound(id));
                }
                id
            }
            None => self.purchase_repo.insert_supplier(&mut *tx, company_id, input, now).await?,
        };

        self.sync_repo
            .mark_dirty(&mut tx, SyncTable::Suppliers, company_id, supplier_id, now)
            .await?;

        tx.commit().await?;
        Ok(supplier_id)
    }

    // =========================================================================
    //  NOTAS DE COMPRA (ENTRADA DE ESTOQUE)
    // =========================================================================

    pub async fn create_purchase_invoice(&self, input: &PurchaseInvoiceInput) -> Result<PurchaseInvoiceDetail, AppError> {
        input.validate()?;

        let document = self.store_document(input.document.as_deref(), "INV").await?;
        let result = self.insert_invoice(input, document.as_deref()).await;
        self.discard_on_error(&result, document.as_deref()).await;

        if let Ok(detail) = &result {
            tracing::info!(
                "✅ Nota {} lançada (total {}, status {:?})",
                detail.invoice.invoice_no,
                detail.invoice.total_amount,
                detail.invoice.payment_status
            );
        }
        result
    }

    async fn insert_invoice(&self, input: &PurchaseInvoiceInput, document: Option<&str>) -> Result<PurchaseInvoiceDetail, AppError> {
        let company_id = self.scope.company_id;
        let now = now_unix();
        let total_amount = input.total_amount();
        let (due_amount, status) = PaymentStatus::derive(total_amount, input.paid_amount);

        let mut tx = self.pool.begin().await?;
        self.ensure_supplier(&mut tx, input.supplier_id).await?;

        let invoice = self
            .purchase_repo
            .insert_invoice(
                &mut *tx,
                InvoiceHeader {
                    company_id,
                    branch_id: self.scope.branch_id,
                    manager_id: self.scope.manager_id,
                    total_amount,
                    due_amount,
                    status,
                    attachment_path: document,
                    now,
                },
                input,
            )
            .await?;
        self.sync_repo
            .mark_dirty(&mut tx, SyncTable::PurchaseInvoices, company_id, invoice.id, now)
            .await?;

        let mut items = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let line = self
                .purchase_repo
                .insert_invoice_item(&mut *tx, company_id, invoice.id, item, now)
                .await?;
            self.sync_repo
                .mark_dirty(&mut tx, SyncTable::PurchaseInvoiceItems, company_id, line.id, now)
                .await?;
            items.push(line);
        }

        self.shift_balance(&mut tx, input.supplier_id, due_amount, now).await?;

        let reason = format!("PURCHASE_INV: {} (Manager: {})", input.invoice_no, self.scope.manager_id);
        let adjustments: Vec<StockAdjustment> = input
            .items
            .iter()
            .map(|i| StockAdjustment::new(i.product_id, i.qty, reason.clone()))
            .collect();
        self.ledger.apply(&mut tx, &adjustments).await?;

        tx.commit().await?;
        Ok(PurchaseInvoiceDetail { invoice, items })
    }

    pub async fn get_purchase_invoice(&self, purchase_id: i64) -> Result<PurchaseInvoiceDetail, AppError> {
        let company_id = self.scope.company_id;
        let mut conn = self.pool.acquire().await?;

        let invoice = self
            .purchase_repo
            .find_invoice(&mut *conn, company_id, purchase_id)
            .await?
            .ok_or(AppError::PurchaseInvoiceNotFound(purchase_id))?;
        let items = self
            .purchase_repo
            .list_invoice_items(&mut *conn, company_id, purchase_id)
            .await?;

        Ok(PurchaseInvoiceDetail { invoice, items })
    }

    pub async fn list_invoices(&self, supplier_id: Option<i64>) -> Result<Vec<PurchaseInvoice>, AppError> {
        self.purchase_repo.list_invoices(self.scope.company_id, supplier_id).await
    }

    // =========================================================================
    //  PAGAMENTOS
    // =========================================================================

    pub async fn record_supplier_payment(&self, input: &SupplierPaymentInput) -> Result<SupplierPayment, AppError> {
        input.validate()?;

        let receipt = self.store_document(input.receipt.as_deref(), "PAY").await?;
        let result = self.insert_payment(input, receipt.as_deref()).await;
        self.discard_on_error(&result, receipt.as_deref()).await;
        result
    }

    async fn insert_payment(&self, input: &SupplierPaymentInput, receipt: Option<&str>) -> Result<SupplierPayment, AppError> {
        let company_id = self.scope.company_id;
        let now = now_unix();

        let mut tx = self.pool.begin().await?;
        self.ensure_supplier(&mut tx, input.supplier_id).await?;

        // Pagamento de uma nota específica: recalcula pago/saldo/status dela
        if let Some(purchase_id) = input.purchase_id {
            let invoice = self
                .purchase_repo
                .find_invoice(&mut *tx, company_id, purchase_id)
                .await?
                .ok_or(AppError::PurchaseInvoiceNotFound(purchase_id))?;

            if invoice.supplier_id != input.supplier_id {
                return Err(AppError::BusinessRule(format!(
                    "A nota {} não pertence ao fornecedor {}",
                    invoice.invoice_no, input.supplier_id
                )));
            }

            let paid_amount = invoice.paid_amount + input.amount;
            let (due_amount, status) = PaymentStatus::derive(invoice.total_amount, paid_amount);
            self.purchase_repo
                .update_invoice_payment(&mut *tx, company_id, purchase_id, paid_amount, due_amount, status)
                .await?;
            self.sync_repo
                .mark_dirty(&mut tx, SyncTable::PurchaseInvoices, company_id, purchase_id, now)
                .await?;
        }

        let payment = self
            .purchase_repo
            .insert_payment(
                &mut *tx,
                self.header(receipt, now),
                input.supplier_id,
                input.purchase_id,
                input.amount,
                input.notes.as_deref(),
            )
            .await?;
        self.sync_repo
            .mark_dirty(&mut tx, SyncTable::SupplierPayments, company_id, payment.id, now)
            .await?;

        self.shift_balance(&mut tx, input.supplier_id, -input.amount, now).await?;

        tx.commit().await?;
        tracing::info!("✅ Pagamento de {} ao fornecedor {} registrado", payment.amount, payment.supplier_id);
        Ok(payment)
    }

    pub async fn list_payments(&self, supplier_id: i64) -> Result<Vec<SupplierPayment>, AppError> {
        self.purchase_repo.list_payments(self.scope.company_id, supplier_id).await
    }

    // =========================================================================
    //  DEVOLUÇÕES E AVARIAS
    // =========================================================================

    pub async fn create_return(&self, input: &PurchaseReturnInput) -> Result<PurchaseReturn, AppError> {
        input.validate()?;

        let document = self.store_document(input.document.as_deref(), "RET").await?;
        let result = self.insert_return(input, document.as_deref()).await;
        self.discard_on_error(&result, document.as_deref()).await;
        result
    }

    async fn insert_return(&self, input: &PurchaseReturnInput, document: Option<&str>) -> Result<PurchaseReturn, AppError> {
        let company_id = self.scope.company_id;
        let now = now_unix();

        let mut tx = self.pool.begin().await?;
        self.ensure_supplier(&mut tx, input.supplier_id).await?;

        let ret = self
            .purchase_repo
            .insert_return(
                &mut *tx,
                self.header(document, now),
                input.supplier_id,
                input.refund,
                input.reason.as_deref(),
            )
            .await?;
        self.sync_repo
            .mark_dirty(&mut tx, SyncTable::PurchaseReturns, company_id, ret.id, now)
            .await?;

        if input.refund > Decimal::ZERO {
            self.shift_balance(&mut tx, input.supplier_id, -input.refund, now).await?;
        }

        let reason = format!("RETURN_TO_SUPPLIER (Manager: {})", self.scope.manager_id);
        let adjustments: Vec<StockAdjustment> = input
            .items
            .iter()
            .map(|i| StockAdjustment::new(i.product_id, -i.qty, reason.clone()))
            .collect();
        self.ledger.apply(&mut tx, &adjustments).await?;

        tx.commit().await?;
        tracing::info!("✅ Devolução {} ao fornecedor {} concluída", ret.id, ret.supplier_id);
        Ok(ret)
    }

    pub async fn record_damage(&self, input: &DamageInput) -> Result<InventoryDamage, AppError> {
        input.validate()?;

        let document = self.store_document(input.document.as_deref(), "DMG").await?;
        let result = self.insert_damage(input, document.as_deref()).await;
        self.discard_on_error(&result, document.as_deref()).await;
        result
    }

    async fn insert_damage(&self, input: &DamageInput, document: Option<&str>) -> Result<InventoryDamage, AppError> {
        let company_id = self.scope.company_id;
        let now = now_unix();

        let mut tx = self.pool.begin().await?;

        let damage = self
            .purchase_repo
            .insert_damage(&mut *tx, self.header(document, now), input)
            .await?;
        self.sync_repo
            .mark_dirty(&mut tx, SyncTable::InventoryDamages, company_id, damage.id, now)
            .await?;

        let adjustment = StockAdjustment::new(input.product_id, -input.qty, format!("DAMAGE: {}", input.reason));
        self.ledger.apply(&mut tx, &[adjustment]).await?;

        tx.commit().await?;
        tracing::info!("✅ Avaria registrada para o produto {}", damage.product_id);
        Ok(damage)
    }

    // =========================================================================
    //  AUXILIARES
    // =========================================================================

    async fn ensure_supplier(&self, conn: &mut SqliteConnection, supplier_id: i64) -> Result<(), AppError> {
        self.purchase_repo
            .find_supplier(&mut *conn, self.scope.company_id, supplier_id)
            .await?
            .ok_or(AppError::SupplierNotFound(supplier_id))?;
        Ok(())
    }

    /// Soma `delta` ao saldo do fornecedor (conta em Decimal, não no SQL).
    async fn shift_balance(
        &self,
        conn: &mut SqliteConnection,
        supplier_id: i64,
        delta: Decimal,
        now: i64,
    ) -> Result<Decimal, AppError> {
        let company_id = self.scope.company_id;
        let current = self
            .purchase_repo
            .supplier_balance(&mut *conn, company_id, supplier_id)
            .await?
            .ok_or(AppError::SupplierNotFound(supplier_id))?;

        let balance = current + delta;
        self.purchase_repo
            .set_supplier_balance(&mut *conn, company_id, supplier_id, balance)
            .await?;
        self.sync_repo
            .mark_dirty(conn, SyncTable::Suppliers, company_id, supplier_id, now)
            .await?;

        Ok(balance)
    }

    // O arquivo é copiado antes da transação; se ela falhar, é apagado.
    async fn store_document(&self, source: Option<&Path>, prefix: &str) -> Result<Option<String>, AppError> {
        match source {
            Some(path) => Ok(Some(self.attachments.store(AttachmentKind::PurchaseDocument, path, prefix).await?)),
            None => Ok(None),
        }
    }

    async fn discard_on_error<T>(&self, result: &Result<T, AppError>, document: Option<&str>) {
        if let (Err(e), Some(path)) = (result, document) {
            tracing::warn!("Operação de compras falhou ({}); descartando anexo {}", e, path);
            self.attachments.discard(path).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::db_utils::memory_pool,
        models::{
            inventory::{AuditEntry, ProductInput, ProductType},
            purchase::{PurchaseItemInput, ReturnItemInput},
        },
        services::inventory_service::InventoryService,
    };
    use async_trait::async_trait;

    struct Fixture {
        pool: SqlitePool,
        inventory: Arc<InventoryService>,
        purchases: PurchaseService,
        assets: tempfile::TempDir,
        supplier_id: i64,
        products: Vec<i64>,
    }

    fn scope() -> TenantScope {
        TenantScope { company_id: 1, branch_id: 10, manager_id: 7 }
    }

    fn product(sku: &str) -> ProductInput {
        ProductInput {
            id: None,
            category_id: None,
            sku: sku.into(),
            product_name: sku.into(),
            product_type: ProductType::Stockable,
            buying_price: Decimal::new(10, 0),
            selling_price: Decimal::new(15, 0),
            product_photo: None,
            min_stock_level: 0,
            is_active: true,
            is_deleted: false,
            price_rules: vec![],
        }
    }

    async fn fixture_with_ledger(ledger: Option<Arc<dyn StockLedger>>) -> Fixture {
        let pool = memory_pool().await.unwrap();
        let assets = tempfile::tempdir().unwrap();
        let inventory = Arc::new(InventoryService::new(pool.clone(), scope()));
        let ledger = ledger.unwrap_or_else(|| inventory.clone() as Arc<dyn StockLedger>);
        let purchases = PurchaseService::new(pool.clone(), ledger, AttachmentService::new(assets.path()), scope());

        let products = inventory.save_products(&[product("P1"), product("P2")]).await.unwrap();
        let supplier_id = purchases
            .save_supplier(&SupplierInput {
                id: None,
                supplier_name: "Distribuidora Sul".into(),
                contact_person: Some("Ana".into()),
                phone: None,
                email: Some("compras@sul.com".into()),
            })
            .await
            .unwrap();

        Fixture { pool, inventory, purchases, assets, supplier_id, products }
    }

    async fn fixture() -> Fixture {
        fixture_with_ledger(None).await
    }

    fn invoice_input(f: &Fixture, paid: i64) -> PurchaseInvoiceInput {
        PurchaseInvoiceInput {
            supplier_id: f.supplier_id,
            invoice_no: "NF-1".into(),
            items: vec![
                PurchaseItemInput { product_id: f.products[0], qty: 10, buying_price: Decimal::new(10, 0) },
                PurchaseItemInput { product_id: f.products[1], qty: 5, buying_price: Decimal::new(10, 0) },
            ],
            paid_amount: Decimal::new(paid, 0),
            document: None,
            notes: None,
        }
    }

    async fn stock_of(pool: &SqlitePool, id: i64) -> i64 {
        sqlx::query_scalar("SELECT stock_qty FROM products WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn balance_of(f: &Fixture) -> Decimal {
        f.purchases.list_suppliers(None).await.unwrap()[0].total_balance
    }

    struct FailingLedger;

    #[async_trait]
    impl StockLedger for FailingLedger {
        async fn apply(
            &self,
            _conn: &mut SqliteConnection,
            _adjustments: &[StockAdjustment],
        ) -> Result<Vec<AuditEntry>, AppError> {
            Err(AppError::BusinessRule("livro-razão indisponível".into()))
        }
    }

    #[tokio::test]
    async fn invoice_derives_status_raises_balance_and_stock() {
        let f = fixture().await;

        let detail = f.purchases.create_purchase_invoice(&invoice_input(&f, 50)).await.unwrap();

        assert_eq!(detail.invoice.total_amount, Decimal::new(150, 0));
        assert_eq!(detail.invoice.due_amount, Decimal::new(100, 0));
        assert_eq!(detail.invoice.payment_status, PaymentStatus::Partial);
        assert_eq!(detail.items.len(), 2);
        assert!(detail.items.iter().all(|i| i.company_id == 1 && i.purchase_id == detail.invoice.id));

        assert_eq!(balance_of(&f).await, Decimal::new(100, 0));
        assert_eq!(stock_of(&f.pool, f.products[0]).await, 10);
        assert_eq!(stock_of(&f.pool, f.products[1]).await, 5);

        let audits = f.inventory.list_audits(f.products[0]).await.unwrap();
        assert_eq!(audits.last().unwrap().change_reason, "PURCHASE_INV: NF-1 (Manager: 7)");

        let sync_repo = SyncRepository::new(f.pool.clone());
        assert_eq!(sync_repo.dirty_count(SyncTable::PurchaseInvoices, 1).await.unwrap(), 1);
        assert_eq!(sync_repo.dirty_count(SyncTable::PurchaseInvoiceItems, 1).await.unwrap(), 2);

        let reloaded = f.purchases.get_purchase_invoice(detail.invoice.id).await.unwrap();
        assert_eq!(reloaded.items.len(), 2);
    }

    #[tokio::test]
    async fn fully_paid_and_unpaid_invoices() {
        let f = fixture().await;

        let paid = f.purchases.create_purchase_invoice(&invoice_input(&f, 150)).await.unwrap();
        assert_eq!(paid.invoice.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.invoice.due_amount, Decimal::ZERO);

        let due = f.purchases.create_purchase_invoice(&invoice_input(&f, 0)).await.unwrap();
        assert_eq!(due.invoice.payment_status, PaymentStatus::Due);
        assert_eq!(balance_of(&f).await, Decimal::new(150, 0));
    }

    #[tokio::test]
    async fn ledger_failure_rolls_back_invoice_and_balance() {
        let f = fixture_with_ledger(Some(Arc::new(FailingLedger))).await;

        let source = f.assets.path().join("nota.pdf");
        tokio::fs::write(&source, b"%PDF").await.unwrap();
        let mut input = invoice_input(&f, 0);
        input.document = Some(source);

        let result = f.purchases.create_purchase_invoice(&input).await;
        assert!(matches!(result, Err(AppError::BusinessRule(_))));

        let invoices: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM purchase_invoices")
            .fetch_one(&f.pool)
            .await
            .unwrap();
        let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM purchase_invoice_items")
            .fetch_one(&f.pool)
            .await
            .unwrap();
        assert_eq!((invoices, items), (0, 0));
        assert_eq!(balance_of(&f).await, Decimal::ZERO);

        // O documento copiado foi descartado
        let docs = f.assets.path().join(AttachmentKind::PurchaseDocument.dir());
        let mut entries = tokio::fs::read_dir(&docs).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_product_rolls_back_invoice() {
        let f = fixture().await;
        let mut input = invoice_input(&f, 0);
        input.items[1].product_id = 999;

        let result = f.purchases.create_purchase_invoice(&input).await;
        assert!(matches!(result, Err(AppError::ProductNotFound(999))));
        assert_eq!(stock_of(&f.pool, f.products[0]).await, 0);
        assert!(f.purchases.list_invoices(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invoice_keeps_document_path() {
        let f = fixture().await;
        let source = f.assets.path().join("nota.pdf");
        tokio::fs::write(&source, b"%PDF").await.unwrap();

        let mut input = invoice_input(&f, 0);
        input.document = Some(source);
        let detail = f.purchases.create_purchase_invoice(&input).await.unwrap();

        let path = detail.invoice.attachment_path.unwrap();
        assert!(path.starts_with("assets/docs/purchases/INV_"));
        assert!(path.ends_with(".pdf"));
        assert!(f.assets.path().join(&path).exists());
    }

    #[tokio::test]
    async fn payment_settles_invoice_and_lowers_balance() {
        let f = fixture().await;
        let detail = f.purchases.create_purchase_invoice(&invoice_input(&f, 50)).await.unwrap();

        let payment = f
            .purchases
            .record_supplier_payment(&SupplierPaymentInput {
                supplier_id: f.supplier_id,
                purchase_id: Some(detail.invoice.id),
                amount: Decimal::new(100, 0),
                receipt: None,
                notes: Some("PIX".into()),
            })
            .await
            .unwrap();
        assert_eq!(payment.amount, Decimal::new(100, 0));

        let invoice = f.purchases.get_purchase_invoice(detail.invoice.id).await.unwrap().invoice;
        assert_eq!(invoice.paid_amount, Decimal::new(150, 0));
        assert_eq!(invoice.due_amount, Decimal::ZERO);
        assert_eq!(invoice.payment_status, PaymentStatus::Paid);
        assert_eq!(balance_of(&f).await, Decimal::ZERO);
        assert_eq!(f.purchases.list_payments(f.supplier_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn payment_for_missing_invoice_changes_nothing() {
        let f = fixture().await;

        let result = f
            .purchases
            .record_supplier_payment(&SupplierPaymentInput {
                supplier_id: f.supplier_id,
                purchase_id: Some(404),
                amount: Decimal::new(10, 0),
                receipt: None,
                notes: None,
            })
            .await;

        assert!(matches!(result, Err(AppError::PurchaseInvoiceNotFound(404))));
        assert!(f.purchases.list_payments(f.supplier_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn return_lowers_stock_and_balance() {
        let f = fixture().await;
        f.purchases.create_purchase_invoice(&invoice_input(&f, 0)).await.unwrap();

        let ret = f
            .purchases
            .create_return(&PurchaseReturnInput {
                supplier_id: f.supplier_id,
                items: vec![ReturnItemInput { product_id: f.products[0], qty: 2 }],
                refund: Decimal::new(20, 0),
                document: None,
                reason: Some("Vencido".into()),
            })
            .await
            .unwrap();

        assert_eq!(ret.total_refunded_amount, Decimal::new(20, 0));
        assert_eq!(stock_of(&f.pool, f.products[0]).await, 8);
        assert_eq!(balance_of(&f).await, Decimal::new(130, 0));

        let audits = f.inventory.list_audits(f.products[0]).await.unwrap();
        assert_eq!(audits.last().unwrap().change_reason, "RETURN_TO_SUPPLIER (Manager: 7)");
    }

    #[tokio::test]
    async fn damage_lowers_stock() {
        let f = fixture().await;

        let damage = f
            .purchases
            .record_damage(&DamageInput {
                product_id: f.products[1],
                qty: 3,
                reason: "Quebra".into(),
                notes: None,
                document: None,
            })
            .await
            .unwrap();

        assert_eq!(damage.qty, 3);
        assert_eq!(stock_of(&f.pool, f.products[1]).await, -3);
        let audits = f.inventory.list_audits(f.products[1]).await.unwrap();
        assert_eq!(audits.last().unwrap().change_reason, "DAMAGE: Quebra");
    }

    #[tokio::test]
    async fn supplier_search_and_update() {
        let f = fixture().await;

        assert_eq!(f.purchases.list_suppliers(Some("Ana")).await.unwrap().len(), 1);
        assert!(f.purchases.list_suppliers(Some("Norte")).await.unwrap().is_empty());

        let missing = f
            .purchases
            .save_supplier(&SupplierInput {
                id: Some(77),
                supplier_name: "X".into(),
                contact_person: None,
                phone: None,
                email: None,
            })
            .await;
        assert!(matches!(missing, Err(AppError::SupplierNotFound(77))));

        let invalid = f
            .purchases
            .save_supplier(&SupplierInput {
                id: None,
                supplier_name: "Y".into(),
                contact_person: None,
                phone: None,
                email: Some("não-é-email".into()),
            })
            .await;
        assert!(matches!(invalid, Err(AppError::ValidationError(_))));
    }
}
