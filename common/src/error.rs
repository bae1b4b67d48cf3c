//! エラー型定義

use thiserror::Error;

/// 共通エラー型
///
/// 照合エンジンそのものは失敗しない。ここに来るのは応答の解析失敗とスロット操作の誤りだけ。
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown upload slot: {0}")]
    UnknownSlot(String),

    #[error("Retry is not allowed for slot {slot} in state {state}")]
    RetryNotAllowed { slot: String, state: String },

    #[error("No file assigned to slot {0}")]
    NoFile(String),
}

pub type Result<T> = std::result::Result<T, Error>;
