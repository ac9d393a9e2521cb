// src/models/purchase.rs

use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

use crate::common::db_utils::DecimalText;
use crate::models::inventory::validate_not_negative;
use crate::models::sync::SyncStatus;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Paid,    // Quitado
    Partial, // Pago Parcialmente
    Due,     // Em aberto
}

impl PaymentStatus {
    /// Deriva o status a partir do que foi pago. Retorna (saldo devedor, status).
    pub fn derive(total_amount: Decimal, paid_amount: Decimal) -> (Decimal, PaymentStatus) {
        let due = total_amount - paid_amount;
        let status = if due <= Decimal::ZERO {
            PaymentStatus::Paid
        } else if paid_amount > Decimal::ZERO {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Due
        };
        (due, status)
    }
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: i64,
    pub company_id: i64,
    pub supplier_name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[sqlx(try_from = "DecimalText")]
    pub total_balance: Decimal, // Quanto devemos ao fornecedor
    pub is_deleted: bool,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseInvoice {
    pub id: i64,
    pub company_id: i64,
    pub branch_id: i64,
    pub manager_id: i64,
    pub supplier_id: i64,
    pub invoice_no: String,
    #[sqlx(try_from = "DecimalText")]
    pub total_amount: Decimal,
    #[sqlx(try_from = "DecimalText")]
    pub paid_amount: Decimal,
    #[sqlx(try_from = "DecimalText")]
    pub due_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub attachment_path: Option<String>,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseInvoiceItem {
    pub id: i64,
    pub company_id: i64,
    pub purchase_id: i64,
    pub product_id: i64,
    pub qty: i64,
    #[sqlx(try_from = "DecimalText")]
    pub buying_price: Decimal,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
}

/// Nota + itens, como devolvido por `create_purchase_invoice`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseInvoiceDetail {
    #[serde(flatten)]
    pub invoice: PurchaseInvoice,
    pub items: Vec<PurchaseInvoiceItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SupplierPayment {
    pub id: i64,
    pub company_id: i64,
    pub branch_id: i64,
    pub manager_id: i64,
    pub supplier_id: i64,
    pub purchase_id: Option<i64>,
    #[sqlx(try_from = "DecimalText")]
    pub amount: Decimal,
    pub receipt_path: Option<String>,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReturn {
    pub id: i64,
    pub company_id: i64,
    pub branch_id: i64,
    pub manager_id: i64,
    pub supplier_id: i64,
    #[sqlx(try_from = "DecimalText")]
    pub total_refunded_amount: Decimal,
    pub attachment_path: Option<String>,
    pub reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InventoryDamage {
    pub id: i64,
    pub company_id: i64,
    pub branch_id: i64,
    pub manager_id: i64,
    pub product_id: i64,
    pub qty: i64,
    pub reason: String,
    pub notes: Option<String>,
    pub attachment_path: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub sync_status: SyncStatus,
}

// ---
// Payloads de entrada
// ---

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SupplierInput {
    pub id: Option<i64>,

    #[validate(length(min = 1, message = "O nome do fornecedor é obrigatório."))]
    pub supplier_name: String,

    pub contact_person: Option<String>,
    pub phone: Option<String>,

    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseItemInput {
    pub product_id: i64,

    #[validate(range(min = 1, message = "A quantidade deve ser maior que zero."))]
    pub qty: i64,

    #[validate(custom(function = "validate_not_negative"))]
    pub buying_price: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseInvoiceInput {
    pub supplier_id: i64,

    #[validate(length(min = 1, message = "O número da nota é obrigatório."))]
    pub invoice_no: String,

    #[validate(length(min = 1, message = "A nota precisa de pelo menos um item."), nested)]
    pub items: Vec<PurchaseItemInput>,

    #[validate(custom(function = "validate_not_negative"))]
    #[serde(default)]
    pub paid_amount: Decimal,

    // Arquivo local (PDF/foto da nota) a ser copiado para a pasta de documentos
    pub document: Option<PathBuf>,

    pub notes: Option<String>,
}

impl PurchaseInvoiceInput {
    pub fn total_amount(&self) -> Decimal {
        self.items
            .iter()
            .map(|i| Decimal::from(i.qty) * i.buying_price)
            .sum()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SupplierPaymentInput {
    pub supplier_id: i64,

    // Pagamento pode ser avulso (abatendo só o saldo) ou de uma nota específica
    pub purchase_id: Option<i64>,

    #[validate(custom(function = "validate_positive"))]
    pub amount: Decimal,

    pub receipt: Option<PathBuf>,

    pub notes: Option<String>,
}

fn validate_positive(val: &Decimal) -> Result<(), ValidationError> {
    if *val <= Decimal::ZERO {
        let mut err = ValidationError::new("range");
        err.message = Some("O valor deve ser maior que zero.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReturnItemInput {
    pub product_id: i64,

    #[validate(range(min = 1, message = "A quantidade deve ser maior que zero."))]
    pub qty: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReturnInput {
    pub supplier_id: i64,

    #[validate(length(min = 1, message = "A devolução precisa de pelo menos um item."), nested)]
    pub items: Vec<ReturnItemInput>,

    #[validate(custom(function = "validate_not_negative"))]
    #[serde(default)]
    pub refund: Decimal,

    pub document: Option<PathBuf>,

    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DamageInput {
    pub product_id: i64,

    #[validate(range(min = 1, message = "A quantidade deve ser maior que zero."))]
    pub qty: i64,

    #[validate(length(min = 1, message = "O motivo é obrigatório."))]
    pub reason: String,

    pub notes: Option<String>,

    pub document: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(qty: i64, price: i64) -> PurchaseItemInput {
        PurchaseItemInput { product_id: 1, qty, buying_price: Decimal::new(price, 0) }
    }

    #[test]
    fn payment_status_follows_paid_amount() {
        let total = Decimal::new(150, 0);

        assert_eq!(PaymentStatus::derive(total, Decimal::new(150, 0)), (Decimal::ZERO, PaymentStatus::Paid));
        assert_eq!(
            PaymentStatus::derive(total, Decimal::new(50, 0)),
            (Decimal::new(100, 0), PaymentStatus::Partial)
        );
        assert_eq!(PaymentStatus::derive(total, Decimal::ZERO), (total, PaymentStatus::Due));
        // Pagou a mais: saldo negativo, mas quitado
        assert_eq!(PaymentStatus::derive(total, Decimal::new(200, 0)).1, PaymentStatus::Paid);
    }

    #[test]
    fn invoice_total_is_sum_of_lines() {
        let input = PurchaseInvoiceInput {
            supplier_id: 1,
            invoice_no: "NF-1".into(),
            items: vec![item(10, 10), item(5, 10)],
            paid_amount: Decimal::ZERO,
            document: None,
            notes: None,
        };
        assert_eq!(input.total_amount(), Decimal::new(150, 0));
    }

    #[test]
    fn invoice_without_items_is_rejected() {
        let input = PurchaseInvoiceInput {
            supplier_id: 1,
            invoice_no: "NF-2".into(),
            items: vec![],
            paid_amount: Decimal::ZERO,
            document: None,
            notes: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn zero_quantity_line_is_rejected() {
        let input = PurchaseInvoiceInput {
            supplier_id: 1,
            invoice_no: "NF-3".into(),
            items: vec![item(0, 10)],
            paid_amount: Decimal::ZERO,
            document: None,
            notes: None,
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.errors().contains_key("items"));
    }

    #[test]
    fn return_items_are_validated_one_by_one() {
        let input = |qty: i64| PurchaseReturnInput {
            supplier_id: 1,
            items: vec![ReturnItemInput { product_id: 1, qty: 2 }, ReturnItemInput { product_id: 2, qty }],
            refund: Decimal::ZERO,
            document: None,
            reason: None,
        };
        assert!(input(1).validate().is_ok());
        assert!(input(0).validate().unwrap_err().errors().contains_key("items"));

        let empty = PurchaseReturnInput { items: vec![], ..input(1) };
        assert!(empty.validate().is_err());
    }
}
