//! 登録台帳照会
//!
//! 「抽出データの確認」アクション。抽出された識別子ごとに台帳を並行照会し、
//! 個別の失敗は結果に記録して他の照会は続行する。

use crate::error::{DeviceVerifyError, Result};
use async_trait::async_trait;
use device_verify_common::{
    verification_targets, IdentifierSet, RegistryStatus, RegistryVerification, VerificationOutcome,
};
use futures::future::join_all;
use serde::Deserialize;
use std::time::Duration;

/// 台帳照会の外部インターフェース
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn verify_registry_record(&self, identifier: &str) -> Result<RegistryStatus>;
}

/// HTTP 台帳クライアント
///
/// `GET {base_url}/records/{identifier}` を呼び、`{"status": "..."}` を読む。
/// 404 は未登録として扱う。
pub struct HttpRegistryClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct RegistryRecord {
    #[serde(default)]
    status: Option<RegistryStatus>,
}

impl HttpRegistryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn record_url(&self, identifier: &str) -> String {
        format!("{}/records/{}", self.base_url, identifier)
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn verify_registry_record(&self, identifier: &str) -> Result<RegistryStatus> {
        let response = self.client.get(self.record_url(identifier)).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(RegistryStatus::NotRegistered);
        }
        if !response.status().is_success() {
            return Err(DeviceVerifyError::Registry(format!(
                "{}: HTTP {}",
                identifier,
                response.status()
            )));
        }

        let record: RegistryRecord = response.json().await?;
        Ok(record.status.unwrap_or(RegistryStatus::Unknown))
    }
}

/// 抽出済みの識別子をすべて台帳照会する
pub async fn verify_extracted(identifiers: &IdentifierSet, client: &dyn RegistryClient) -> Vec<RegistryVerification> {
    let lookups = verification_targets(identifiers).into_iter().map(|(field, identifier)| async move {
        let outcome = match client.verify_registry_record(&identifier).await {
            Ok(status) => VerificationOutcome::Status(status),
            Err(e) => {
                tracing::warn!(identifier = %identifier, error = %e, "registry lookup failed");
                VerificationOutcome::Failed(e.to_string())
            }
        };
        RegistryVerification {
            field,
            identifier,
            outcome,
        }
    });

    join_all(lookups).await
}
