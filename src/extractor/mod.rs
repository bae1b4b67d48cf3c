//! 画像解析（識別子抽出）アダプタ
//!
//! 外部の画像解析は `Extractor` トレイトの背後に隠す:
//! - CliExtractor: AI CLI（claude / codex / gemini）を子プロセスで実行
//! - GeminiExtractor: Gemini API に画像をインラインで送信
//! - CachingExtractor: 画像ハッシュで結果をキャッシュ
//! - TimeoutExtractor: 呼び出しに上限時間を設ける（ハングさせない）

pub mod cache;
mod cli_runner;
mod gemini;

pub use cache::{CacheFile, CachingExtractor};
pub use cli_runner::CliExtractor;
pub use gemini::GeminiExtractor;

use crate::ai_provider::AiProvider;
use crate::config::Config;
use crate::error::{DeviceVerifyError, Result};
use async_trait::async_trait;
use device_verify_common::{ExpectedKind, ExtractionResult, IdentifierSet, NormalizeOptions};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// 画像から識別子を抽出する外部コラボレーター
#[async_trait]
pub trait Extractor: Send + Sync {
    /// 表示名（ログ用）
    fn name(&self) -> &'static str;

    /// 画像を解析して正規化済みの抽出結果を返す
    ///
    /// `hint` はオペレーターの入力値で、読み取りの手掛かりとしてのみ使う。
    async fn extract(
        &self,
        image: &Path,
        kind: ExpectedKind,
        hint: Option<&IdentifierSet>,
    ) -> Result<ExtractionResult>;
}

#[async_trait]
impl<E: Extractor + ?Sized> Extractor for Box<E> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn extract(
        &self,
        image: &Path,
        kind: ExpectedKind,
        hint: Option<&IdentifierSet>,
    ) -> Result<ExtractionResult> {
        (**self).extract(image, kind, hint).await
    }
}

/// 上限時間付きの Extractor
pub struct TimeoutExtractor<E> {
    inner: E,
    timeout: Duration,
}

impl<E: Extractor> TimeoutExtractor<E> {
    pub fn new(inner: E, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<E: Extractor> Extractor for TimeoutExtractor<E> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn extract(
        &self,
        image: &Path,
        kind: ExpectedKind,
        hint: Option<&IdentifierSet>,
    ) -> Result<ExtractionResult> {
        match tokio::time::timeout(self.timeout, self.inner.extract(image, kind, hint)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(extractor = self.inner.name(), image = %image.display(), "extraction timed out");
                Err(DeviceVerifyError::Timeout(self.timeout))
            }
        }
    }
}

/// 設定から Extractor を組み立てる
///
/// Gemini はAPIキーがあればHTTP API、なければ gemini CLI を使う。
pub fn build_extractor(
    config: &Config,
    provider: AiProvider,
    options: NormalizeOptions,
    use_cache: bool,
) -> Arc<dyn Extractor> {
    let base: Box<dyn Extractor> = match (provider, config.get_api_key()) {
        (AiProvider::Gemini, Ok(api_key)) => Box::new(GeminiExtractor::new(api_key, config.model.clone(), options)),
        _ => Box::new(CliExtractor::new(provider, options)),
    };

    let layered: Box<dyn Extractor> = if use_cache {
        Box::new(CachingExtractor::new(base, options))
    } else {
        base
    };

    Arc::new(TimeoutExtractor::new(layered, config.timeout()))
}
