// src/sync/assets.rs

use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use crate::sync::transport::SyncTransport;

/// O que `ensure` fez com um caminho.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetOutcome {
    /// Caminho vazio ou fora da raiz de assets.
    Skipped,
    /// Já existia no disco; nenhuma chamada de rede.
    Present,
    Fetched,
    /// Falhou ao baixar/gravar. Fica para o próximo ciclo.
    Failed,
}

/// Baixa sob demanda os arquivos referenciados pelas linhas do pull.
#[derive(Clone)]
pub struct AssetReplicator {
    transport: Arc<dyn SyncTransport>,
    root: PathBuf,
}

impl AssetReplicator {
    pub fn new(transport: Arc<dyn SyncTransport>, root: impl Into<PathBuf>) -> Self {
        Self { transport, root: root.into() }
    }

    /// Garante que `path` existe localmente. Nunca devolve erro: falha de
    /// rede ou de disco não pode derrubar o pull.
    pub async fn ensure(&self, path: &str) -> AssetOutcome {
        let Some(target) = resolve_asset_path(&self.root, path) else {
            if !path.trim().is_empty() {
                tracing::warn!("Caminho de anexo ignorado (fora da raiz): {}", path);
            }
            return AssetOutcome::Skipped;
        };

        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return AssetOutcome::Present;
        }

        let bytes = match self.transport.fetch_asset(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Falha ao baixar o anexo {}: {}", path, e);
                return AssetOutcome::Failed;
            }
        };

        if let Some(parent) = target.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!("Falha ao criar a pasta de {}: {}", path, e);
                return AssetOutcome::Failed;
            }
        }

        match tokio::fs::write(&target, &bytes).await {
            Ok(()) => {
                tracing::debug!("⬇️ Anexo {} baixado ({} bytes)", path, bytes.len());
                AssetOutcome::Fetched
            }
            Err(e) => {
                tracing::warn!("Falha ao gravar o anexo {}: {}", path, e);
                AssetOutcome::Failed
            }
        }
    }
}

/// Resolve um caminho relativo vindo de uma linha sincronizada dentro de
/// `root`. `None` para vazio, absoluto ou com `..`.
pub fn resolve_asset_path(root: &Path, path: &str) -> Option<PathBuf> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }

    let relative = Path::new(path);
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if resolved == root {
        return None;
    }
    Some(resolved)
}
