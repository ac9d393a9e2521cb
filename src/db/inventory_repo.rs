// src/db/inventory_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, FromRow, QueryBuilder, Row, Sqlite, SqlitePool};

use crate::{
    common::{db_utils::DecimalText, error::AppError},
    models::inventory::{
        AuditAction, AuditEntry, Category, CategoryInput, PriceRule, PriceRuleInput, Product,
        ProductFilter, ProductInput,
    },
};

#[derive(Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ---
    // Funções de "Leitura" (Getters)
    // ---
    // Funções de leitura são simples e podem usar a pool principal.

    /// Produtos não excluídos do tenant + nome da categoria.
    pub async fn list_products(
        &self,
        company_id: i64,
        filter: &ProductFilter,
    ) -> Result<Vec<(Product, Option<String>)>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT p.*, c.category_name
            FROM products p
            LEFT JOIN categories c ON p.category_id = c.id
            WHERE p.is_deleted = 0 AND p.company_id = "#,
        );
        builder.push_bind(company_id);

        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            let term = format!("%{}%", search);
            builder
                .push(" AND (p.product_name LIKE ")
                .push_bind(term.clone())
                .push(" OR p.sku LIKE ")
                .push_bind(term)
                .push(")");
        }
        if let Some(category_id) = filter.category_id {
            builder.push(" AND p.category_id = ").push_bind(category_id);
        }
        builder.push(" ORDER BY p.product_name ASC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<_, AppError> {
                let product = Product::from_row(row)?;
                let category_name: Option<String> = row.try_get("category_name")?;
                Ok((product, category_name))
            })
            .collect()
    }

    pub async fn list_categories(&self, company_id: i64) -> Result<Vec<Category>, AppError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE company_id = ? AND is_deleted = 0 ORDER BY category_name ASC",
        )
            .bind(company_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    pub async fn list_price_rules(&self, company_id: i64) -> Result<Vec<PriceRule>, AppError> {
        let rules = sqlx::query_as::<_, PriceRule>("SELECT * FROM price_rules WHERE company_id = ?")
            .bind(company_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rules)
    }

    /// Itens estocáveis no (ou abaixo do) estoque mínimo.
    pub async fn stock_alerts(&self, company_id: i64) -> Result<Vec<Product>, AppError> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE company_id = ?
              AND product_type = 'STOCKABLE'
              AND stock_qty <= min_stock_level
              AND is_deleted = 0
            ORDER BY stock_qty ASC
            "#,
        )
            .bind(company_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// (quantidade, custo) de cada produto ativo, para o resumo do estoque.
    pub async fn stock_valuation_rows(&self, company_id: i64) -> Result<Vec<(i64, Decimal)>, AppError> {
        let rows = sqlx::query("SELECT stock_qty, buying_price FROM products WHERE company_id = ? AND is_deleted = 0")
            .bind(company_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<_, AppError> {
                let qty: i64 = row.try_get("stock_qty")?;
                let cost: DecimalText = row.try_get("buying_price")?;
                Ok((qty, cost.0))
            })
            .collect()
    }

    pub async fn list_audits(&self, company_id: i64, product_id: i64) -> Result<Vec<AuditEntry>, AppError> {
        let audits = sqlx::query_as::<_, AuditEntry>(
            "SELECT * FROM inventory_audits WHERE company_id = ? AND product_id = ? ORDER BY id ASC",
        )
            .bind(company_id)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(audits)
    }

    // ---
    // Funções de "Escrita" (Transacionais)
    // ---
    // Estas usam o padrão genérico 'Executor' para rodar dentro de uma transação.

    pub async fn find_product<'e, E>(
        &self,
        executor: E,
        company_id: i64,
        product_id: i64,
    ) -> Result<Option<Product>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ? AND company_id = ?")
            .bind(product_id)
            .bind(company_id)
            .fetch_optional(executor)
            .await?;
        Ok(product)
    }

    pub async fn insert_product<'e, E>(
        &self,
        executor: E,
        company_id: i64,
        branch_id: i64,
        input: &ProductInput,
        photo: &str,
        now: i64,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id = sqlx::query_scalar(
            r#"
            INSERT INTO products (
                company_id, branch_id, category_id, sku, product_name, product_type,
                buying_price, selling_price, product_photo, min_stock_level,
                is_active, is_deleted, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
            RETURNING id
            "#,
        )
            .bind(company_id)
            .bind(branch_id)
            .bind(input.category_id)
            .bind(&input.sku)
            .bind(&input.product_name)
            .bind(input.product_type)
            .bind(input.buying_price.to_string())
            .bind(input.selling_price.to_string())
            .bind(photo)
            .bind(input.min_stock_level)
            .bind(input.is_active)
            .bind(now)
            .fetch_one(executor)
            .await?;
        Ok(id)
    }

    pub async fn update_product<'e, E>(
        &self,
        executor: E,
        company_id: i64,
        product_id: i64,
        input: &ProductInput,
        photo: &str,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                category_id = ?, sku = ?, product_name = ?, product_type = ?,
                buying_price = ?, selling_price = ?, product_photo = ?,
                min_stock_level = ?, is_active = ?, is_deleted = ?
            WHERE id = ? AND company_id = ?
            "#,
        )
            .bind(input.category_id)
            .bind(&input.sku)
            .bind(&input.product_name)
            .bind(input.product_type)
            .bind(input.buying_price.to_string())
            .bind(input.selling_price.to_string())
            .bind(photo)
            .bind(input.min_stock_level)
            .bind(input.is_active)
            .bind(input.is_deleted)
            .bind(product_id)
            .bind(company_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn soft_delete_product<'e, E>(&self, executor: E, company_id: i64, product_id: i64) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("UPDATE products SET is_deleted = 1 WHERE id = ? AND company_id = ?")
            .bind(product_id)
            .bind(company_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn get_stock_qty<'e, E>(&self, executor: E, company_id: i64, product_id: i64) -> Result<Option<i64>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let qty = sqlx::query_scalar("SELECT stock_qty FROM products WHERE id = ? AND company_id = ?")
            .bind(product_id)
            .bind(company_id)
            .fetch_optional(executor)
            .await?;
        Ok(qty)
    }

    pub async fn set_stock_qty<'e, E>(
        &self,
        executor: E,
        company_id: i64,
        product_id: i64,
        qty: i64,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("UPDATE products SET stock_qty = ? WHERE id = ? AND company_id = ?")
            .bind(qty)
            .bind(product_id)
            .bind(company_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Registra uma linha no histórico (somente inserção).
    pub async fn record_audit<'e, E>(
        &self,
        executor: E,
        entry: NewAuditEntry<'_>,
    ) -> Result<AuditEntry, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let audit = sqlx::query_as::<_, AuditEntry>(
            r#"
            INSERT INTO inventory_audits (
                company_id, branch_id, product_id, action_type, field_changed,
                old_value, new_value, change_reason, actor_id, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
            .bind(entry.company_id)
            .bind(entry.branch_id)
            .bind(entry.product_id)
            .bind(entry.action)
            .bind(entry.field)
            .bind(entry.old_value)
            .bind(entry.new_value)
            .bind(entry.reason)
            .bind(entry.actor_id)
            .bind(entry.created_at)
            .fetch_one(executor)
            .await?;
        Ok(audit)
    }

    // --- Categorias ---

    pub async fn insert_category<'e, E>(
        &self,
        executor: E,
        company_id: i64,
        input: &CategoryInput,
        photo: &str,
        now: i64,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id = sqlx::query_scalar(
            r#"
            INSERT INTO categories (company_id, category_name, category_photo, is_deleted, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
            .bind(company_id)
            .bind(&input.category_name)
            .bind(photo)
            .bind(input.is_deleted)
            .bind(now)
            .fetch_one(executor)
            .await?;
        Ok(id)
    }

    pub async fn update_category<'e, E>(
        &self,
        executor: E,
        company_id: i64,
        category_id: i64,
        input: &CategoryInput,
        photo: &str,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE categories SET category_name = ?, category_photo = ?, is_deleted = ? WHERE id = ? AND company_id = ?",
        )
            .bind(&input.category_name)
            .bind(photo)
            .bind(input.is_deleted)
            .bind(category_id)
            .bind(company_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn soft_delete_category<'e, E>(&self, executor: E, company_id: i64, category_id: i64) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("UPDATE categories SET is_deleted = 1 WHERE id = ? AND company_id = ?")
            .bind(category_id)
            .bind(company_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    // --- Regras de preço ---

    /// "UPSERT" por (produto, dia): regra existente só troca preço/janela.
    pub async fn upsert_price_rule<'e, E>(
        &self,
        executor: E,
        company_id: i64,
        branch_id: i64,
        product_id: i64,
        rule: &PriceRuleInput,
        now: i64,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id = sqlx::query_scalar(
            r#"
            INSERT INTO price_rules (
                company_id, branch_id, product_id, day_of_week, special_price,
                start_time, end_time, is_active, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (product_id, day_of_week)
            DO UPDATE SET
                special_price = excluded.special_price,
                start_time = excluded.start_time,
                end_time = excluded.end_time,
                is_active = excluded.is_active
            RETURNING id
            "#,
        )
            .bind(company_id)
            .bind(branch_id)
            .bind(product_id)
            .bind(rule.day_of_week)
            .bind(rule.special_price.to_string())
            .bind(rule.start_time)
            .bind(rule.end_time)
            .bind(rule.is_active)
            .bind(now)
            .fetch_one(executor)
            .await?;
        Ok(id)
    }
}

/// Dados de uma nova linha de auditoria.
#[derive(Debug, Clone)]
pub struct NewAuditEntry<'a> {
    pub company_id: i64,
    pub branch_id: i64,
    pub product_id: i64,
    pub action: AuditAction,
    pub field: &'a str,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub reason: &'a str,
    pub actor_id: i64,
    pub created_at: i64,
}
