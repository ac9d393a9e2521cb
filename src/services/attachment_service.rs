// src/services/attachment_service.rs

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::common::{db_utils::now_unix, error::AppError};

/// Pastas de anexos, relativas à raiz de assets da filial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    ProductPhoto,
    CategoryPhoto,
    PurchaseDocument,
}

impl AttachmentKind {
    pub const ALL: [AttachmentKind; 3] = [
        AttachmentKind::ProductPhoto,
        AttachmentKind::CategoryPhoto,
        AttachmentKind::PurchaseDocument,
    ];

    pub fn dir(&self) -> &'static str {
        match self {
            AttachmentKind::ProductPhoto => "assets/img/products",
            AttachmentKind::CategoryPhoto => "assets/img/categories",
            AttachmentKind::PurchaseDocument => "assets/docs/purchases",
        }
    }
}

#[derive(Clone)]
pub struct AttachmentService {
    root: PathBuf,
}

impl AttachmentService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Caminho absoluto (no disco) de um caminho relativo gravado na linha.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub async fn ensure_layout(&self) -> Result<(), AppError> {
        for kind in AttachmentKind::ALL {
            tokio::fs::create_dir_all(self.root.join(kind.dir())).await?;
        }
        Ok(())
    }

    /// Copia `source` para a pasta do tipo com um nome que não colide
    /// (`{prefix}_{unix}_{token}.{ext}`) e devolve o caminho relativo.
    pub async fn store(&self, kind: AttachmentKind, source: &Path, prefix: &str) -> Result<String, AppError> {
        let dir = self.root.join(kind.dir());
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = generate_file_name(prefix, source);
        tokio::fs::copy(source, dir.join(&file_name)).await?;

        let relative = format!("{}/{}", kind.dir(), file_name);
        tracing::debug!("📎 Anexo salvo em {}", relative);
        Ok(relative)
    }

    /// Remove um anexo salvo por uma operação que acabou falhando.
    pub async fn discard(&self, relative: &str) {
        if let Err(e) = tokio::fs::remove_file(self.resolve(relative)).await {
            tracing::warn!("Não foi possível remover o anexo {}: {}", relative, e);
        }
    }
}

fn generate_file_name(prefix: &str, source: &Path) -> String {
    let token = Uuid::new_v4().simple();
    match source.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}_{}_{}.{}", prefix, now_unix(), token, ext),
        _ => format!("{}_{}_{}", prefix, now_unix(), token),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_keep_prefix_and_extension() {
        let a = generate_file_name("INV", Path::new("/tmp/nota.pdf"));
        let b = generate_file_name("INV", Path::new("/tmp/nota.pdf"));

        assert!(a.starts_with("INV_"));
        assert!(a.ends_with(".pdf"));
        assert_ne!(a, b);

        let bare = generate_file_name("DMG", Path::new("/tmp/foto"));
        assert!(bare.starts_with("DMG_"));
        assert!(!bare.contains('.'));
    }

    #[tokio::test]
    async fn store_copies_into_kind_directory() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("recibo.jpg");
        tokio::fs::write(&source, b"jpeg").await.unwrap();

        let service = AttachmentService::new(root.path());
        service.ensure_layout().await.unwrap();
        for kind in AttachmentKind::ALL {
            assert!(root.path().join(kind.dir()).is_dir());
        }

        let relative = service.store(AttachmentKind::PurchaseDocument, &source, "PAY").await.unwrap();
        assert!(relative.starts_with("assets/docs/purchases/PAY_"));
        assert_eq!(tokio::fs::read(service.resolve(&relative)).await.unwrap(), b"jpeg");

        service.discard(&relative).await;
        assert!(!service.resolve(&relative).exists());
    }

    #[tokio::test]
    async fn store_fails_for_missing_source() {
        let root = tempfile::tempdir().unwrap();
        let service = AttachmentService::new(root.path());

        let result = service
            .store(AttachmentKind::PurchaseDocument, &root.path().join("nao-existe.pdf"), "INV")
            .await;
        assert!(matches!(result, Err(AppError::IoError(_))));
    }
}
