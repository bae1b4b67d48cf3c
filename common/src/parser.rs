//! 抽出応答のパース
//!
//! AI CLI / Gemini の応答テキストから JSON を取り出し、
//! 正規化済みの ExtractionResult にする

use crate::error::{Error, Result};
use crate::normalizer::NormalizeOptions;
use crate::types::{ExtractionResult, IdentifierSet};
use serde::Deserialize;

/// レスポンスのJSONオブジェクト（正規化前）
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawExtraction {
    imei1: Option<String>,
    imei2: Option<String>,
    #[serde(alias = "serial", alias = "serial_number")]
    serial_number: Option<String>,
    imei_count: Option<u8>,
    errors: Option<Vec<String>>,
}

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// 応答テキストから JSON オブジェクト部分を切り出す
///
/// フェンス付きブロック（```json）を優先し、なければ最初の `{` から最後の `}` まで。
///
/// # Examples
/// ```
/// use device_verify_common::extract_json;
///
/// let response = "Result: {\"imei1\": \"123\"}";
/// assert_eq!(extract_json(response).unwrap(), "{\"imei1\": \"123\"}");
/// ```
pub fn extract_json(response: &str) -> Result<&str> {
    let fenced = response
        .split_once(FENCE_OPEN)
        .and_then(|(_, rest)| rest.split_once(FENCE_CLOSE))
        .map(|(body, _)| body.trim());
    if let Some(body) = fenced {
        return Ok(body);
    }

    match (response.find('{'), response.rfind('}')) {
        (Some(open), Some(close)) if open < close => Ok(&response[open..=close]),
        _ => Err(Error::Parse("応答にJSONオブジェクトがありません".into())),
    }
}

/// 抽出レスポンスをパース
///
/// 識別子は正規化し、`imeiCount` は正規化後に残った IMEI の数で上書きする。
/// AIの申告値と食い違う場合は `raw_errors` に記録する。
pub fn parse_extraction_response(response: &str, options: &NormalizeOptions) -> Result<ExtractionResult> {
    let raw: RawExtraction = serde_json::from_str(extract_json(response)?)
        .map_err(|e| Error::Parse(format!("抽出結果 JSONパースエラー: {}", e)))?;

    let identifiers = IdentifierSet::from_raw(
        raw.imei1.as_deref().unwrap_or_default(),
        raw.imei2.as_deref().unwrap_or_default(),
        raw.serial_number.as_deref().unwrap_or_default(),
        options,
    );

    let mut raw_errors = raw.errors.unwrap_or_default();
    if let Some(reported) = raw.imei_count {
        if reported != identifiers.imei_count() {
            raw_errors.push(format!(
                "reported imeiCount {} but {} IMEI(s) were readable",
                reported,
                identifiers.imei_count()
            ));
        }
    }

    Ok(ExtractionResult::new(identifiers, raw_errors))
}
