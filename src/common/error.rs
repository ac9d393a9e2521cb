// src/common/error.rs

use thiserror::Error;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Produto {0} não encontrado")]
    ProductNotFound(i64),

    #[error("Fornecedor {0} não encontrado")]
    SupplierNotFound(i64),

    #[error("Nota de compra {0} não encontrada")]
    PurchaseInvoiceNotFound(i64),

    #[error("Regra de negócio violada: {0}")]
    BusinessRule(String),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro ao rodar migrações: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    // --- Sincronização ---
    #[error("Erro de transporte HTTP: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Servidor central retornou HTTP {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    #[error("Servidor central recusou a operação: {0}")]
    RemoteRejected(String),

    #[error("Registro remoto inválido: {0}")]
    InvalidRemoteRecord(String),

    #[error("Erro de JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Erro de arquivo: {0}")]
    IoError(#[from] std::io::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno: {0}")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    /// Falhas que o próximo ciclo de sync resolve sozinho (rede, servidor fora).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::HttpError(_) | AppError::RemoteStatus { .. } | AppError::RemoteRejected(_)
        )
    }
}
