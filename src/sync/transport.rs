// src/sync/transport.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;

use crate::{
    common::error::AppError,
    models::sync::{PullRequest, PullResponse, PushBatch, PushResponse},
};

/// Fronteira de rede da replicação. O resto do sync só fala com o servidor
/// central por aqui (os testes usam uma implementação em memória).
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// `POST {api}{endpoint}/push` (multipart).
    async fn push(&self, endpoint: &str, batch: &PushBatch) -> Result<PushResponse, AppError>;

    /// `POST {api}{endpoint}/pull` (JSON).
    async fn pull(&self, endpoint: &str, request: &PullRequest) -> Result<PullResponse, AppError>;

    /// `GET {api}/{path}`: bytes crus do arquivo.
    async fn fetch_asset(&self, path: &str) -> Result<Vec<u8>, AppError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint_url(&self, endpoint: &str, action: &str) -> String {
        format!("{}{}/{}", self.base_url, endpoint, action)
    }

    fn asset_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn push(&self, endpoint: &str, batch: &PushBatch) -> Result<PushResponse, AppError> {
        let payload = serde_json::to_string(&batch.records)?;

        let mut form = Form::new()
            .text("company_id", batch.company_id.to_string())
            .text("idempotency_key", batch.idempotency_key.clone())
            .text("payload", payload);

        // Parte `file_{i}`: i é a posição do registro dentro do lote
        for file in &batch.files {
            let file_name = file.path.rsplit('/').next().unwrap_or(&file.path).to_string();
            let part = Part::bytes(file.bytes.clone()).file_name(file_name);
            form = form.part(format!("file_{}", file.index), part);
        }

        let response = self
            .client
            .post(self.endpoint_url(endpoint, "push"))
            .header("Idempotency-Key", &batch.idempotency_key)
            .multipart(form)
            .send()
            .await?;

        parse_response(response).await
    }

    async fn pull(&self, endpoint: &str, request: &PullRequest) -> Result<PullResponse, AppError> {
        let response = self
            .client
            .post(self.endpoint_url(endpoint, "pull"))
            .json(request)
            .send()
            .await?;

        parse_response(response).await
    }

    async fn fetch_asset(&self, path: &str) -> Result<Vec<u8>, AppError> {
        let response = self.client.get(self.asset_url(path)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::RemoteStatus {
                status: status.as_u16(),
                body: format!("arquivo {} indisponível", path),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AppError> {
    let status = response.status();
    let body = response.text().await?;
    tracing::debug!("Resposta do servidor central ({}): {}", status, body);

    if !status.is_success() {
        return Err(AppError::RemoteStatus {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        });
    }

    // Corpo que não é o JSON esperado conta como recusa
    serde_json::from_str(&body).map_err(|e| {
        AppError::RemoteRejected(format!(
            "resposta inválida ({}): {}",
            e,
            body.chars().take(200).collect::<String>()
        ))
    })
}

#[cfg(test)]
pub mod fake {
    //! Transporte em memória para os testes do sync.

    use std::{
        collections::{HashMap, HashSet, VecDeque},
        sync::Mutex,
    };

    use super::*;
    use crate::models::sync::RecordMap;

    #[derive(Default)]
    pub struct FakeTransport {
        pub pushes: Mutex<Vec<(String, PushBatch)>>,
        pub pulls: Mutex<Vec<(String, PullRequest)>>,
        pub fetches: Mutex<Vec<String>>,
        push_script: Mutex<VecDeque<Result<PushResponse, AppError>>>,
        pull_data: Mutex<HashMap<String, Vec<RecordMap>>>,
        failing_pulls: Mutex<HashSet<String>>,
        assets: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl FakeTransport {
        /// Próximo push devolve este resultado (depois volta a aceitar tudo).
        pub fn script_push(&self, result: Result<PushResponse, AppError>) {
            self.push_script.lock().unwrap().push_back(result);
        }

        pub fn serve_pull(&self, endpoint: &str, records: Vec<RecordMap>) {
            self.pull_data.lock().unwrap().insert(endpoint.to_string(), records);
        }

        pub fn fail_pull(&self, endpoint: &str) {
            self.failing_pulls.lock().unwrap().insert(endpoint.to_string());
        }

        pub fn serve_asset(&self, path: &str, bytes: &[u8]) {
            self.assets.lock().unwrap().insert(path.to_string(), bytes.to_vec());
        }

        pub fn push_count(&self) -> usize {
            self.pushes.lock().unwrap().len()
        }

        pub fn pull_count(&self) -> usize {
            self.pulls.lock().unwrap().len()
        }

        pub fn fetch_count(&self) -> usize {
            self.fetches.lock().unwrap().len()
        }

        pub fn network_calls(&self) -> usize {
            self.push_count() + self.pull_count() + self.fetch_count()
        }
    }

    #[async_trait]
    impl SyncTransport for FakeTransport {
        async fn push(&self, endpoint: &str, batch: &PushBatch) -> Result<PushResponse, AppError> {
            self.pushes.lock().unwrap().push((endpoint.to_string(), batch.clone()));
            self.push_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(PushResponse { status: true, message: "ok".into() }))
        }

        async fn pull(&self, endpoint: &str, request: &PullRequest) -> Result<PullResponse, AppError> {
            self.pulls.lock().unwrap().push((endpoint.to_string(), request.clone()));

            if self.failing_pulls.lock().unwrap().contains(endpoint) {
                return Err(AppError::RemoteStatus { status: 503, body: "indisponível".into() });
            }

            let data = self.pull_data.lock().unwrap().get(endpoint).cloned().unwrap_or_default();
            Ok(PullResponse { status: true, message: "ok".into(), data })
        }

        async fn fetch_asset(&self, path: &str) -> Result<Vec<u8>, AppError> {
            self.fetches.lock().unwrap().push(path.to_string());
            self.assets
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| AppError::RemoteStatus { status: 404, body: path.to_string() })
        }
    }
}
