// src/services/inventory_service.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::{SqliteConnection, SqlitePool};
use validator::Validate;

use crate::{
    common::{db_utils::now_unix, error::AppError},
    config::TenantScope,
    db::{InventoryRepository, SyncRepository, inventory_repo::NewAuditEntry},
    models::{
        inventory::{
            AuditAction, AuditEntry, Category, CategoryInput, DEFAULT_CATEGORY_PHOTO,
            DEFAULT_PRODUCT_PHOTO, InventorySummary, PriceRule, PriceRuleInput, Product,
            ProductFilter, ProductInput, ProductListing, StockAdjustment, active_price_rule,
        },
        sync::SyncTable,
    },
};

const MANUAL_UPDATE_REASON: &str = "Manual Update";

/// Capacidade mínima que outros módulos precisam do estoque: aplicar deltas
/// dentro da transação de quem chama.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Aplica os deltas em ordem. Qualquer erro deve abortar a transação
    /// inteira de quem chamou (produto desconhecido incluído).
    async fn apply(
        &self,
        conn: &mut SqliteConnection,
        adjustments: &[StockAdjustment],
    ) -> Result<Vec<AuditEntry>, AppError>;
}

#[derive(Clone)]
pub struct InventoryService {
    pool: SqlitePool,
    inventory_repo: InventoryRepository,
    sync_repo: SyncRepository,
    scope: TenantScope,
}

impl InventoryService {
    pub fn new(pool: SqlitePool, scope: TenantScope) -> Self {
        Self {
            inventory_repo: InventoryRepository::new(pool.clone()),
            sync_repo: SyncRepository::new(pool.clone()),
            pool,
            scope,
        }
    }

    // =========================================================================
    //  PRODUTOS
    // =========================================================================

    /// Lista para o balcão: já resolve categoria e preço promocional vigente.
    pub async fn list_products(&self, filter: &ProductFilter, now: NaiveDateTime) -> Result<Vec<ProductListing>, AppError> {
        let products = self.inventory_repo.list_products(self.scope.company_id, filter).await?;
        let rules = self.inventory_repo.list_price_rules(self.scope.company_id).await?;

        let mut rules_by_product: HashMap<i64, Vec<PriceRule>> = HashMap::new();
        for rule in rules {
            rules_by_product.entry(rule.product_id).or_default().push(rule);
        }

        let listings = products
            .into_iter()
            .map(|(product, category_name)| {
                let active_rule = rules_by_product
                    .get(&product.id)
                    .and_then(|r| active_price_rule(r, now))
                    .cloned();
                let effective_price = active_rule
                    .as_ref()
                    .map(|r| r.special_price)
                    .unwrap_or(product.selling_price);

                ProductListing { product, category_name, active_rule, effective_price }
            })
            .collect();

        Ok(listings)
    }

    /// Insere/atualiza vários produtos numa transação só. Atualizações geram
    /// auditoria por campo alterado.
    pub async fn save_products(&self, inputs: &[ProductInput]) -> Result<Vec<i64>, AppError> {
        for input in inputs {
            input.validate()?;
        }

        let company_id = self.scope.company_id;
        let now = now_unix();
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(inputs.len());

        for input in inputs {
            let product_id = match input.id {
                Some(id) => {
                    let existing = self
                        .inventory_repo
                        .find_product(&mut *tx, company_id, id)
                        .await?
                        .ok_or(AppError::ProductNotFound(id))?;

                    let photo = input
                        .product_photo
                        .clone()
                        .or_else(|| existing.product_photo.clone())
                        .unwrap_or_else(|| DEFAULT_PRODUCT_PHOTO.to_string());

                    self.inventory_repo
                        .update_product(&mut *tx, company_id, id, input, &photo)
                        .await?;

                    for (field, old_value, new_value) in changed_fields(&existing, input) {
                        self.inventory_repo
                            .record_audit(
                                &mut *tx,
                                NewAuditEntry {
                                    company_id,
                                    branch_id: self.scope.branch_id,
                                    product_id: id,
                                    action: AuditAction::InfoUpdate,
                                    field,
                                    old_value,
                                    new_value,
                                    reason: MANUAL_UPDATE_REASON,
                                    actor_id: self.scope.manager_id,
                                    created_at: now,
                                },
                            )
                            .await?;
                    }
                    id
                }
                None => {
                    let photo = input.product_photo.as_deref().unwrap_or(DEFAULT_PRODUCT_PHOTO);
                    self.inventory_repo
                        .insert_product(&mut *tx, company_id, self.scope.branch_id, input, photo, now)
                        .await?
                }
            };

            self.sync_repo
                .mark_dirty(&mut tx, SyncTable::Products, company_id, product_id, now)
                .await?;

            self.upsert_rules(&mut tx, product_id, &input.price_rules, now).await?;
            ids.push(product_id);
        }

        tx.commit().await?;
        tracing::info!("✅ {} produto(s) salvos", ids.len());
        Ok(ids)
    }

    pub async fn delete_products(&self, ids: &[i64]) -> Result<u64, AppError> {
        let company_id = self.scope.company_id;
        let now = now_unix();
        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;

        for id in ids {
            if self.inventory_repo.soft_delete_product(&mut *tx, company_id, *id).await? > 0 {
                self.sync_repo.mark_dirty(&mut tx, SyncTable::Products, company_id, *id, now).await?;
                deleted += 1;
            }
        }

        tx.commit().await?;
        Ok(deleted)
    }

    // =========================================================================
    //  CATEGORIAS
    // =========================================================================

    pub async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        self.inventory_repo.list_categories(self.scope.company_id).await
    }

    pub async fn save_categories(&self, inputs: &[CategoryInput]) -> Result<Vec<i64>, AppError> {
        for input in inputs {
            input.validate()?;
        }

        let company_id = self.scope.company_id;
        let now = now_unix();
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(inputs.len());

        for input in inputs {
            let photo = input.category_photo.as_deref().unwrap_or(DEFAULT_CATEGORY_PHOTO);
            let category_id = match input.id {
                Some(id) => {
                    let affected = self
                        .inventory_repo
                        .update_category(&mut *tx, company_id, id, input, photo)
                        .await?;
                    if affected == 0 {
                        return Err(AppError::BusinessRule(format!("Categoria {} não encontrada", id)));
                    }
                    id
                }
                None => self.inventory_repo.insert_category(&mut *tx, company_id, input, photo, now).await?,
            };

            self.sync_repo
                .mark_dirty(&mut tx, SyncTable::Categories, company_id, category_id, now)
                .await?;
            ids.push(category_id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    pub async fn delete_categories(&self, ids: &[i64]) -> Result<u64, AppError> {
        let company_id = self.scope.company_id;
        let now = now_unix();
        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;

        for id in ids {
            if self.inventory_repo.soft_delete_category(&mut *tx, company_id, *id).await? > 0 {
                self.sync_repo.mark_dirty(&mut tx, SyncTable::Categories, company_id, *id, now).await?;
                deleted += 1;
            }
        }

        tx.commit().await?;
        Ok(deleted)
    }

    // =========================================================================
    //  REGRAS DE PREÇO
    // =========================================================================

    pub async fn save_price_rules(&self, product_id: i64, rules: &[PriceRuleInput]) -> Result<Vec<i64>, AppError> {
        for rule in rules {
            rule.validate()?;
        }

        let now = now_unix();
        let mut tx = self.pool.begin().await?;

        self.inventory_repo
            .find_product(&mut *tx, self.scope.company_id, product_id)
            .await?
            .ok_or(AppError::ProductNotFound(product_id))?;

        let ids = self.upsert_rules(&mut tx, product_id, rules, now).await?;

        tx.commit().await?;
        Ok(ids)
    }

    async fn upsert_rules(
        &self,
        conn: &mut SqliteConnection,
        product_id: i64,
        rules: &[PriceRuleInput],
        now: i64,
    ) -> Result<Vec<i64>, AppError> {
        let company_id = self.scope.company_id;
        let mut ids = Vec::with_capacity(rules.len());

        for rule in rules {
            let rule_id = self
                .inventory_repo
                .upsert_price_rule(&mut *conn, company_id, self.scope.branch_id, product_id, rule, now)
                .await?;
            self.sync_repo
                .mark_dirty(conn, SyncTable::PriceRules, company_id, rule_id, now)
                .await?;
            ids.push(rule_id);
        }
        Ok(ids)
    }

    // =========================================================================
    //  RELATÓRIOS
    // =========================================================================

    pub async fn stock_alerts(&self) -> Result<Vec<Product>, AppError> {
        self.inventory_repo.stock_alerts(self.scope.company_id).await
    }

    pub async fn inventory_summary(&self) -> Result<InventorySummary, AppError> {
        let rows = self.inventory_repo.stock_valuation_rows(self.scope.company_id).await?;

        let value = rows
            .iter()
            .map(|(qty, cost)| Decimal::from(*qty) * *cost)
            .sum();

        Ok(InventorySummary { items: rows.len() as i64, value })
    }

    pub async fn list_audits(&self, product_id: i64) -> Result<Vec<AuditEntry>, AppError> {
        self.inventory_repo.list_audits(self.scope.company_id, product_id).await
    }

    // =========================================================================
    //  LIVRO-RAZÃO
    // =========================================================================

    /// Aplica os deltas numa transação própria. Se um falhar, nenhum fica.
    pub async fn adjust_stock(&self, adjustments: &[StockAdjustment]) -> Result<Vec<AuditEntry>, AppError> {
        let mut tx = self.pool.begin().await?;
        let audits = self.apply(&mut tx, adjustments).await?;
        tx.commit().await?;

        tracing::info!("✅ Estoque ajustado ({} lançamento(s))", audits.len());
        Ok(audits)
    }
}

#[async_trait]
impl StockLedger for InventoryService {
    async fn apply(
        &self,
        conn: &mut SqliteConnection,
        adjustments: &[StockAdjustment],
    ) -> Result<Vec<AuditEntry>, AppError> {
        let company_id = self.scope.company_id;
        let now = now_unix();
        let mut audits = Vec::with_capacity(adjustments.len());

        for adjustment in adjustments {
            let old_qty = self
                .inventory_repo
                .get_stock_qty(&mut *conn, company_id, adjustment.product_id)
                .await?
                .ok_or(AppError::ProductNotFound(adjustment.product_id))?;

            // Sem trava em zero: estoque negativo é permitido
            let new_qty = old_qty + adjustment.delta;

            self.inventory_repo
                .set_stock_qty(&mut *conn, company_id, adjustment.product_id, new_qty)
                .await?;
            self.sync_repo
                .mark_dirty(conn, SyncTable::Products, company_id, adjustment.product_id, now)
                .await?;

            let audit = self
                .inventory_repo
                .record_audit(
                    &mut *conn,
                    NewAuditEntry {
                        company_id,
                        branch_id: self.scope.branch_id,
                        product_id: adjustment.product_id,
                        action: AuditAction::StockChange,
                        field: "stock_qty",
                        old_value: Some(old_qty.to_string()),
                        new_value: Some(new_qty.to_string()),
                        reason: &adjustment.reason,
                        actor_id: self.scope.manager_id,
                        created_at: now,
                    },
                )
                .await?;
            audits.push(audit);
        }

        Ok(audits)
    }
}

/// (campo, valor antigo, valor novo) dos campos auditados que mudaram.
fn changed_fields(old: &Product, new: &ProductInput) -> Vec<(&'static str, Option<String>, Option<String>)> {
    let mut changes = Vec::new();

    if old.selling_price != new.selling_price {
        changes.push(("selling_price", Some(old.selling_price.to_string()), Some(new.selling_price.to_string())));
    }
    if old.buying_price != new.buying_price {
        changes.push(("buying_price", Some(old.buying_price.to_string()), Some(new.buying_price.to_string())));
    }
    if old.product_name != new.product_name {
        changes.push(("product_name", Some(old.product_name.clone()), Some(new.product_name.clone())));
    }
    if old.is_active != new.is_active {
        changes.push(("is_active", Some(old.is_active.to_string()), Some(new.is_active.to_string())));
    }
    if old.category_id != new.category_id {
        changes.push((
            "category_id",
            old.category_id.map(|c| c.to_string()),
            new.category_id.map(|c| c.to_string()),
        ));
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::db_utils::memory_pool,
        models::inventory::{DayOfWeek, ProductType},
    };
    use chrono::{NaiveDate, NaiveTime};

    fn scope() -> TenantScope {
        TenantScope { company_id: 1, branch_id: 10, manager_id: 7 }
    }

    fn product_input(sku: &str, name: &str, price: i64) -> ProductInput {
        ProductInput {
            id: None,
            category_id: None,
            sku: sku.into(),
            product_name: name.into(),
            product_type: ProductType::Stockable,
            buying_price: Decimal::new(price / 2, 0),
            selling_price: Decimal::new(price, 0),
            product_photo: None,
            min_stock_level: 5,
            is_active: true,
            is_deleted: false,
            price_rules: vec![],
        }
    }

    async fn seed_product(pool: &SqlitePool, service: &InventoryService, qty: i64) -> i64 {
        let ids = service.save_products(&[product_input("SKU-1", "Arroz", 10)]).await.unwrap();
        sqlx::query("UPDATE products SET stock_qty = ? WHERE id = ?")
            .bind(qty)
            .bind(ids[0])
            .execute(pool)
            .await
            .unwrap();
        ids[0]
    }

    async fn stock_of(pool: &SqlitePool, id: i64) -> i64 {
        sqlx::query_scalar("SELECT stock_qty FROM products WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn adjust_applies_deltas_in_order_and_audits_each() {
        let pool = memory_pool().await.unwrap();
        let service = InventoryService::new(pool.clone(), scope());
        let id = seed_product(&pool, &service, 10).await;

        let audits = service
            .adjust_stock(&[
                StockAdjustment::new(id, 5, "Entrada"),
                StockAdjustment::new(id, -3, "Saída"),
            ])
            .await
            .unwrap();

        assert_eq!(stock_of(&pool, id).await, 12);
        assert_eq!(audits.len(), 2);
        assert_eq!(audits[0].old_value.as_deref(), Some("10"));
        assert_eq!(audits[0].new_value.as_deref(), Some("15"));
        assert_eq!(audits[1].old_value.as_deref(), Some("15"));
        assert_eq!(audits[1].new_value.as_deref(), Some("12"));
        assert_eq!(audits[1].change_reason, "Saída");
        assert_eq!(audits[1].actor_id, 7);
        assert_eq!(audits[1].action_type, AuditAction::StockChange);
    }

    #[tokio::test]
    async fn stock_may_go_negative() {
        let pool = memory_pool().await.unwrap();
        let service = InventoryService::new(pool.clone(), scope());
        let id = seed_product(&pool, &service, 2).await;

        service.adjust_stock(&[StockAdjustment::new(id, -5, "Venda")]).await.unwrap();
        assert_eq!(stock_of(&pool, id).await, -3);
    }

    #[tokio::test]
    async fn unknown_product_rolls_back_whole_batch() {
        let pool = memory_pool().await.unwrap();
        let service = InventoryService::new(pool.clone(), scope());
        let id = seed_product(&pool, &service, 10).await;

        let result = service
            .adjust_stock(&[
                StockAdjustment::new(id, 5, "Entrada"),
                StockAdjustment::new(999, -1, "Fantasma"),
            ])
            .await;

        assert!(matches!(result, Err(AppError::ProductNotFound(999))));
        assert_eq!(stock_of(&pool, id).await, 10);
        assert!(service.list_audits(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn audit_rows_are_append_only() {
        let pool = memory_pool().await.unwrap();
        let service = InventoryService::new(pool.clone(), scope());
        let id = seed_product(&pool, &service, 10).await;
        let audits = service.adjust_stock(&[StockAdjustment::new(id, 1, "Entrada")]).await.unwrap();

        let update = sqlx::query("UPDATE inventory_audits SET new_value = '0' WHERE id = ?")
            .bind(audits[0].id)
            .execute(&pool)
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM inventory_audits WHERE id = ?")
            .bind(audits[0].id)
            .execute(&pool)
            .await;
        assert!(delete.is_err());

        assert_eq!(service.list_audits(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn every_mutation_marks_the_product_dirty() {
        let pool = memory_pool().await.unwrap();
        let service = InventoryService::new(pool.clone(), scope());
        let sync_repo = SyncRepository::new(pool.clone());

        let id = seed_product(&pool, &service, 10).await;
        assert_eq!(sync_repo.dirty_count(SyncTable::Products, 1).await.unwrap(), 1);
        assert_eq!(sync_repo.outbox_len(SyncTable::Products, 1).await.unwrap(), 1);

        // Simula um push confirmado
        sqlx::query("UPDATE products SET sync_status = 'CLEAN'").execute(&pool).await.unwrap();
        sqlx::query("DELETE FROM sync_outbox").execute(&pool).await.unwrap();

        service.adjust_stock(&[StockAdjustment::new(id, 1, "Entrada")]).await.unwrap();
        assert_eq!(sync_repo.dirty_count(SyncTable::Products, 1).await.unwrap(), 1);
        assert_eq!(sync_repo.outbox_len(SyncTable::Products, 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_audits_changed_fields_only() {
        let pool = memory_pool().await.unwrap();
        let service = InventoryService::new(pool.clone(), scope());
        let id = seed_product(&pool, &service, 0).await;

        let mut input = product_input("SKU-1", "Arroz Tipo 1", 12);
        input.id = Some(id);
        input.buying_price = Decimal::new(5, 0); // igual ao anterior
        service.save_products(&[input]).await.unwrap();

        let audits = service.list_audits(id).await.unwrap();
        let fields: Vec<&str> = audits.iter().map(|a| a.field_changed.as_str()).collect();
        assert_eq!(fields, vec!["selling_price", "product_name"]);
        assert!(audits.iter().all(|a| a.action_type == AuditAction::InfoUpdate));
        assert!(audits.iter().all(|a| a.change_reason == MANUAL_UPDATE_REASON));
        assert_eq!(audits[0].old_value.as_deref(), Some("10"));
        assert_eq!(audits[0].new_value.as_deref(), Some("12"));
    }

    #[tokio::test]
    async fn updating_unknown_product_fails() {
        let pool = memory_pool().await.unwrap();
        let service = InventoryService::new(pool.clone(), scope());

        let mut input = product_input("SKU-X", "X", 1);
        input.id = Some(42);
        let result = service.save_products(&[input]).await;
        assert!(matches!(result, Err(AppError::ProductNotFound(42))));
    }

    #[tokio::test]
    async fn listing_applies_active_price_rule_and_hides_deleted() {
        let pool = memory_pool().await.unwrap();
        let service = InventoryService::new(pool.clone(), scope());

        let category = service
            .save_categories(&[CategoryInput {
                id: None,
                category_name: "Grãos".into(),
                category_photo: None,
                is_deleted: false,
            }])
            .await
            .unwrap()[0];

        let mut with_rule = product_input("SKU-1", "Arroz", 10);
        with_rule.category_id = Some(category);
        with_rule.price_rules = vec![PriceRuleInput {
            day_of_week: DayOfWeek::All,
            special_price: Decimal::new(7, 0),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            is_active: true,
        }];
        let ids = service
            .save_products(&[with_rule, product_input("SKU-2", "Feijão", 8)])
            .await
            .unwrap();

        let noon = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let listing = service.list_products(&ProductFilter::default(), noon).await.unwrap();
        assert_eq!(listing.len(), 2);

        let arroz = listing.iter().find(|l| l.product.id == ids[0]).unwrap();
        assert_eq!(arroz.effective_price, Decimal::new(7, 0));
        assert_eq!(arroz.category_name.as_deref(), Some("Grãos"));
        assert_eq!(arroz.product.product_photo.as_deref(), Some(DEFAULT_PRODUCT_PHOTO));

        let evening = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap().and_hms_opt(20, 0, 0).unwrap();
        let later = service.list_products(&ProductFilter::default(), evening).await.unwrap();
        let arroz = later.iter().find(|l| l.product.id == ids[0]).unwrap();
        assert!(arroz.active_rule.is_none());
        assert_eq!(arroz.effective_price, Decimal::new(10, 0));

        let search = ProductFilter { search: Some("Fei".into()), category_id: None };
        assert_eq!(service.list_products(&search, noon).await.unwrap().len(), 1);

        assert_eq!(service.delete_products(&[ids[1]]).await.unwrap(), 1);
        assert_eq!(service.list_products(&ProductFilter::default(), noon).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn saving_same_day_rule_updates_it() {
        let pool = memory_pool().await.unwrap();
        let service = InventoryService::new(pool.clone(), scope());
        let id = seed_product(&pool, &service, 0).await;

        let rule = |price: i64| PriceRuleInput {
            day_of_week: DayOfWeek::Friday,
            special_price: Decimal::new(price, 0),
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            is_active: true,
        };

        let first = service.save_price_rules(id, &[rule(9)]).await.unwrap();
        let second = service.save_price_rules(id, &[rule(6)]).await.unwrap();
        assert_eq!(first, second);

        let rules: Vec<(i64, String)> = sqlx::query_as("SELECT id, special_price FROM price_rules")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(rules, vec![(first[0], "6".to_string())]);

        assert!(matches!(
            service.save_price_rules(999, &[rule(1)]).await,
            Err(AppError::ProductNotFound(999))
        ));
    }

    #[tokio::test]
    async fn alerts_and_summary() {
        let pool = memory_pool().await.unwrap();
        let service = InventoryService::new(pool.clone(), scope());

        // min_stock_level = 5 nos dois; buying_price = 5 e 4
        let ids = service
            .save_products(&[product_input("A", "Baixo", 10), product_input("B", "Cheio", 8)])
            .await
            .unwrap();
        service
            .adjust_stock(&[StockAdjustment::new(ids[0], 3, "Inicial"), StockAdjustment::new(ids[1], 20, "Inicial")])
            .await
            .unwrap();

        let alerts = service.stock_alerts().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, ids[0]);

        let summary = service.inventory_summary().await.unwrap();
        assert_eq!(summary, InventorySummary { items: 2, value: Decimal::new(3 * 5 + 20 * 4, 0) });
    }
}
