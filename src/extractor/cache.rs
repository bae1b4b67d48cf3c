//! 抽出結果キャッシュモジュール
//!
//! 画像のSHA-256ハッシュと抽出種別をキーにして抽出結果をキャッシュし、
//! 同じ画像の再解析（AI呼び出し）をスキップする。
//! キャッシュファイルは画像と同じフォルダに置く。

use super::Extractor;
use crate::error::{DeviceVerifyError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use device_verify_common::{ExpectedKind, ExtractionResult, IdentifierSet, NormalizeOptions};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

const CACHE_FILE_NAME: &str = ".extraction-cache.json";

/// キャッシュファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    /// バージョン（互換性チェック用）
    version: u32,
    /// キャッシュキー → 抽出結果のマップ
    entries: HashMap<String, CacheEntry>,
}

/// キャッシュエントリ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub file_name: String,
    pub file_size: u64,
    pub cached_at: DateTime<Utc>,
    pub result: ExtractionResult,
}

impl CacheFile {
    const CURRENT_VERSION: u32 = 1;

    pub fn cache_path(folder: &Path) -> PathBuf {
        folder.join(CACHE_FILE_NAME)
    }

    /// キャッシュファイルを読み込み（存在しない・壊れている場合は空）
    pub fn load(folder: &Path) -> Self {
        let cache_path = Self::cache_path(folder);
        let file = match File::open(&cache_path) {
            Ok(f) => f,
            Err(_) => return Self::default(),
        };

        match serde_json::from_reader::<_, CacheFile>(BufReader::new(file)) {
            Ok(cache) if cache.version == Self::CURRENT_VERSION => cache,
            Ok(_) => {
                tracing::warn!(path = %cache_path.display(), "cache version mismatch, starting fresh");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(path = %cache_path.display(), error = %e, "unreadable cache, starting fresh");
                Self::default()
            }
        }
    }

    /// キャッシュファイルを保存
    pub fn save(&self, folder: &Path) -> Result<()> {
        let file = File::create(Self::cache_path(folder))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// キャッシュファイルを削除（存在しなければ false）
    pub fn clear(folder: &Path) -> Result<bool> {
        let cache_path = Self::cache_path(folder);
        if !cache_path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(cache_path)?;
        Ok(true)
    }

    pub fn get(&self, key: &str) -> Option<&ExtractionResult> {
        self.entries.get(key).map(|e| &e.result)
    }

    pub fn insert(&mut self, key: String, file_name: String, file_size: u64, result: ExtractionResult) {
        self.entries.insert(
            key,
            CacheEntry {
                file_name,
                file_size,
                cached_at: Utc::now(),
                result,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// 画像ファイルのSHA-256ハッシュ（16進）
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// キャッシュキー
///
/// 正規化の最大長が違えば結果も変わるため、キーに含める。
pub fn cache_key(hash: &str, kind: ExpectedKind, options: &NormalizeOptions) -> String {
    format!("{}:{}:{}:{}", hash, kind, options.imei_max_len, options.serial_max_len)
}

/// キャッシュ付き Extractor
pub struct CachingExtractor<E> {
    inner: E,
    options: NormalizeOptions,
    // 同じフォルダのキャッシュファイルへの読み書きを直列化する
    file_lock: tokio::sync::Mutex<()>,
}

impl<E: Extractor> CachingExtractor<E> {
    pub fn new(inner: E, options: NormalizeOptions) -> Self {
        Self {
            inner,
            options,
            file_lock: tokio::sync::Mutex::new(()),
        }
    }
}

/// ブロッキングのファイル操作を専用スレッドで実行する
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DeviceVerifyError::Io(std::io::Error::other(e)))?
}

#[async_trait]
impl<E: Extractor> Extractor for CachingExtractor<E> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn extract(
        &self,
        image: &Path,
        kind: ExpectedKind,
        hint: Option<&IdentifierSet>,
    ) -> Result<ExtractionResult> {
        let folder = image.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let image_path = image.to_path_buf();
        let hash = run_blocking(move || compute_file_hash(&image_path)).await?;
        let key = cache_key(&hash, kind, &self.options);

        {
            let _guard = self.file_lock.lock().await;
            let dir = folder.clone();
            let cache = run_blocking(move || Ok(CacheFile::load(&dir))).await?;
            if let Some(cached) = cache.get(&key) {
                tracing::debug!(image = %image.display(), "extraction cache hit");
                return Ok(cached.clone());
            }
        }

        let result = self.inner.extract(image, kind, hint).await?;

        let _guard = self.file_lock.lock().await;
        let image_path = image.to_path_buf();
        let entry = result.clone();
        let saved = run_blocking(move || {
            let mut cache = CacheFile::load(&folder);
            let file_name = image_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let file_size = std::fs::metadata(&image_path).map(|m| m.len()).unwrap_or(0);
            cache.insert(key, file_name, file_size, entry);
            cache.save(&folder)
        })
        .await;
        if let Err(e) = saved {
            // 保存できなくても抽出結果は返す
            tracing::warn!(error = %e, "failed to save extraction cache");
        }

        Ok(result)
    }
}
