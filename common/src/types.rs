//! 識別子・解析結果の型定義
//!
//! CLIと将来のWebフロントで共有される型:
//! - IdentifierSet: 正規化済みの IMEI1 / IMEI2 / シリアル番号
//! - ExtractionResult: 画像解析（抽出）の出力
//! - UserInput: フォームに入力された生の文字列
//! - ComparisonResult: 照合結果（エラー / 警告 / 提案）

use crate::normalizer::{normalize_imei, normalize_serial, NormalizeOptions};
use serde::{Deserialize, Serialize};

/// 抽出対象の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedKind {
    /// IMEI表示画面（*#06# など）
    Imei,
    /// シリアル番号の表示・ラベル
    Serial,
    /// 端末情報（スペック）画面
    Specs,
}

impl ExpectedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpectedKind::Imei => "imei",
            ExpectedKind::Serial => "serial",
            ExpectedKind::Specs => "specs",
        }
    }
}

impl std::fmt::Display for ExpectedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExpectedKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "imei" => Ok(ExpectedKind::Imei),
            "serial" | "sn" => Ok(ExpectedKind::Serial),
            "specs" | "spec" => Ok(ExpectedKind::Specs),
            _ => Err(format!("Unknown kind: {}. Use imei, serial, or specs", s)),
        }
    }
}

/// 正規化済みの識別子セット
///
/// 値が存在するフィールドは必ず空でない。未検出・未入力は `None` で表し、
/// 空文字列として保持することはない。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawIdentifierSet")]
pub struct IdentifierSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    imei1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    imei2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    serial_number: Option<String>,
}

/// デシリアライズ用（空文字列を `None` に寄せる）
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawIdentifierSet {
    imei1: Option<String>,
    imei2: Option<String>,
    serial_number: Option<String>,
}

impl From<RawIdentifierSet> for IdentifierSet {
    fn from(raw: RawIdentifierSet) -> Self {
        Self {
            imei1: non_empty(raw.imei1),
            imei2: non_empty(raw.imei2),
            serial_number: non_empty(raw.serial_number),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl IdentifierSet {
    /// 生の文字列から正規化して構築する
    pub fn from_raw(imei1: &str, imei2: &str, serial_number: &str, options: &NormalizeOptions) -> Self {
        Self {
            imei1: non_empty(Some(normalize_imei(imei1, options.imei_max_len))),
            imei2: non_empty(Some(normalize_imei(imei2, options.imei_max_len))),
            serial_number: non_empty(Some(normalize_serial(serial_number, options.serial_max_len))),
        }
    }

    pub fn imei1(&self) -> Option<&str> {
        self.imei1.as_deref()
    }

    pub fn imei2(&self) -> Option<&str> {
        self.imei2.as_deref()
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    /// 存在する IMEI の数（0〜2）
    pub fn imei_count(&self) -> u8 {
        self.imei1.is_some() as u8 + self.imei2.is_some() as u8
    }

    /// 存在する IMEI を位置順に返す
    pub fn imeis(&self) -> impl Iterator<Item = &str> {
        self.imei1().into_iter().chain(self.imei2())
    }

    pub fn is_empty(&self) -> bool {
        self.imei1.is_none() && self.imei2.is_none() && self.serial_number.is_none()
    }
}

/// 画像解析の出力
///
/// 解析呼び出しが成功するたびに1つ生成され、以後変更されない。
/// `imeiCount` は常に `identifiers` から数えた値（保存済みの値は読み込み時に無視する）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawExtractionResult")]
pub struct ExtractionResult {
    identifiers: IdentifierSet,
    imei_count: u8,
    raw_errors: Vec<String>,
}

/// デシリアライズ用（`imeiCount` は読まない）
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawExtractionResult {
    identifiers: IdentifierSet,
    raw_errors: Vec<String>,
}

impl From<RawExtractionResult> for ExtractionResult {
    fn from(raw: RawExtractionResult) -> Self {
        Self::new(raw.identifiers, raw.raw_errors)
    }
}

impl ExtractionResult {
    /// `imei_count` は識別子から算出する
    pub fn new(identifiers: IdentifierSet, raw_errors: Vec<String>) -> Self {
        let imei_count = identifiers.imei_count();
        Self { identifiers, imei_count, raw_errors }
    }

    pub fn identifiers(&self) -> &IdentifierSet {
        &self.identifiers
    }

    pub fn imei_count(&self) -> u8 {
        self.imei_count
    }

    pub fn raw_errors(&self) -> &[String] {
        &self.raw_errors
    }
}

/// フォームに入力された生の値
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserInput {
    pub imei1: String,
    pub imei2: String,
    pub serial_number: String,
}

impl UserInput {
    pub fn new(imei1: impl Into<String>, imei2: impl Into<String>, serial_number: impl Into<String>) -> Self {
        Self {
            imei1: imei1.into(),
            imei2: imei2.into(),
            serial_number: serial_number.into(),
        }
    }

    /// 読み取り時に正規化して IdentifierSet に変換
    pub fn to_identifier_set(&self, options: &NormalizeOptions) -> IdentifierSet {
        IdentifierSet::from_raw(&self.imei1, &self.imei2, &self.serial_number, options)
    }
}

/// 照合結果
///
/// `is_valid` は `errors` が空のときに限り true。警告・提案は影響しない。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

impl ComparisonResult {
    pub fn from_parts(errors: Vec<String>, warnings: Vec<String>, suggestions: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            suggestions,
        }
    }

    /// エラー・警告・提案がすべて空
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty() && self.suggestions.is_empty()
    }
}
