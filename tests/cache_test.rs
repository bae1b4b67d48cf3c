//! キャッシュ機能テスト
//!
//! 抽出結果キャッシュの保存・読み込みとキャッシュ付き Extractor の動作を検証

use async_trait::async_trait;
use device_verify::error::Result;
use device_verify::extractor::cache::{cache_key, compute_file_hash};
use device_verify::extractor::{CacheFile, CachingExtractor, Extractor};
use device_verify_common::{ExpectedKind, ExtractionResult, IdentifierSet, NormalizeOptions};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

fn sample_result(imei1: &str) -> ExtractionResult {
    ExtractionResult::new(
        IdentifierSet::from_raw(imei1, "", "", &NormalizeOptions::registration()),
        vec![],
    )
}

/// 呼び出し回数を数える Extractor
struct CountingExtractor {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Extractor for CountingExtractor {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn extract(
        &self,
        _image: &Path,
        _kind: ExpectedKind,
        _hint: Option<&IdentifierSet>,
    ) -> Result<ExtractionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(sample_result("490154203237518"))
    }
}

/// 空のキャッシュファイル
#[test]
fn test_cache_file_empty() {
    let dir = tempdir().expect("Failed to create temp dir");
    let cache = CacheFile::load(dir.path());

    assert_eq!(cache.len(), 0);
    assert!(cache.is_empty());
}

/// キャッシュの保存と読み込み
#[test]
fn test_cache_save_and_load() {
    let dir = tempdir().expect("Failed to create temp dir");

    let mut cache = CacheFile::load(dir.path());
    cache.insert(
        "abc123:imei:15:20".to_string(),
        "screen.jpg".to_string(),
        1024,
        sample_result("490154203237518"),
    );
    cache.save(dir.path()).expect("キャッシュ保存失敗");

    let loaded = CacheFile::load(dir.path());
    assert_eq!(loaded.len(), 1);

    let cached = loaded.get("abc123:imei:15:20").expect("キャッシュが見つからない");
    assert_eq!(cached.identifiers().imei1(), Some("490154203237518"));
    assert_eq!(cached.imei_count(), 1);
    assert!(loaded.get("nonexistent").is_none());
}

/// 壊れたキャッシュファイルは空として扱う
#[test]
fn test_cache_corrupted_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(CacheFile::cache_path(dir.path()), "{ not json").unwrap();

    let cache = CacheFile::load(dir.path());
    assert!(cache.is_empty());
}

/// 古いバージョンのキャッシュは読み捨てる
#[test]
fn test_cache_version_mismatch() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(
        CacheFile::cache_path(dir.path()),
        r#"{"version": 0, "entries": {}}"#,
    )
    .unwrap();

    let cache = CacheFile::load(dir.path());
    assert!(cache.is_empty());
}

/// キャッシュ削除
#[test]
fn test_cache_clear() {
    let dir = tempdir().expect("Failed to create temp dir");
    assert!(!CacheFile::clear(dir.path()).unwrap());

    CacheFile::default().save(dir.path()).unwrap();
    assert!(CacheFile::cache_path(dir.path()).exists());
    assert!(CacheFile::clear(dir.path()).unwrap());
    assert!(!CacheFile::cache_path(dir.path()).exists());
}

/// ハッシュは内容で決まり、キーは種別と最大長で分かれる
#[test]
fn test_hash_and_key() {
    let dir = tempdir().expect("Failed to create temp dir");
    let a = dir.path().join("a.jpg");
    let b = dir.path().join("b.jpg");
    std::fs::write(&a, b"same bytes").unwrap();
    std::fs::write(&b, b"same bytes").unwrap();

    let hash = compute_file_hash(&a).unwrap();
    assert_eq!(hash, compute_file_hash(&b).unwrap());
    assert_eq!(hash.len(), 64);

    let registration = cache_key(&hash, ExpectedKind::Imei, &NormalizeOptions::registration());
    let reconciliation = cache_key(&hash, ExpectedKind::Imei, &NormalizeOptions::reconciliation());
    let serial = cache_key(&hash, ExpectedKind::Serial, &NormalizeOptions::registration());
    assert_ne!(registration, reconciliation);
    assert_ne!(registration, serial);
}

/// 同じ画像の2回目は内側の Extractor を呼ばない
#[tokio::test]
async fn test_caching_extractor_skips_second_call() {
    let dir = tempdir().expect("Failed to create temp dir");
    let image = dir.path().join("screen.jpg");
    std::fs::write(&image, b"screen pixels").unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let extractor = CachingExtractor::new(
        CountingExtractor { calls: calls.clone() },
        NormalizeOptions::registration(),
    );

    let first = extractor.extract(&image, ExpectedKind::Imei, None).await.unwrap();
    let second = extractor.extract(&image, ExpectedKind::Imei, None).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(CacheFile::load(dir.path()).len(), 1);

    // 種別が違えば別エントリ
    extractor.extract(&image, ExpectedKind::Serial, None).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(CacheFile::load(dir.path()).len(), 2);
}

/// 画像が変わればキャッシュは使われない
#[tokio::test]
async fn test_caching_extractor_detects_changed_image() {
    let dir = tempdir().expect("Failed to create temp dir");
    let image = dir.path().join("screen.jpg");
    std::fs::write(&image, b"before").unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let extractor = CachingExtractor::new(
        CountingExtractor { calls: calls.clone() },
        NormalizeOptions::registration(),
    );

    extractor.extract(&image, ExpectedKind::Imei, None).await.unwrap();
    std::fs::write(&image, b"after").unwrap();
    extractor.extract(&image, ExpectedKind::Imei, None).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// 同じフォルダの2画像を並行して解析しても両方キャッシュされる（単一スレッドのランタイムでも止まらない）
#[tokio::test(flavor = "current_thread")]
async fn test_caching_extractor_concurrent_images() {
    let dir = tempdir().expect("Failed to create temp dir");
    let front = dir.path().join("front.jpg");
    let back = dir.path().join("back.jpg");
    std::fs::write(&front, b"front pixels").unwrap();
    std::fs::write(&back, b"back pixels").unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let extractor = CachingExtractor::new(
        CountingExtractor { calls: calls.clone() },
        NormalizeOptions::registration(),
    );

    let (a, b) = tokio::join!(
        extractor.extract(&front, ExpectedKind::Imei, None),
        extractor.extract(&back, ExpectedKind::Imei, None),
    );
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(CacheFile::load(dir.path()).len(), 2);

    extractor.extract(&front, ExpectedKind::Imei, None).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
