//! device-verify
//!
//! 端末画面の写真から IMEI・シリアル番号を抽出し、オペレーターの入力値と照合する。
//! 照合エンジン本体は `device_verify_common`、ここは外部解析・台帳照会・非同期実行系。

pub mod ai_provider;
pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod form;
pub mod image_input;
pub mod registry;
