//! Device Verify Common Library
//!
//! 端末画面の写真から抽出した識別子（IMEI×2、シリアル番号）と
//! オペレーターの入力値を照合するエンジン。I/O と非同期処理は含まない。

pub mod aggregator;
pub mod error;
pub mod normalizer;
pub mod parser;
pub mod prompts;
pub mod reconcile;
pub mod registry;
pub mod slot;
pub mod types;

pub use aggregator::{can_proceed, evaluate, Blocker, ProceedDecision, ProceedPolicy};
pub use error::{Error, Result};
pub use normalizer::{normalize_imei, normalize_serial, NormalizeOptions};
pub use parser::{extract_json, parse_extraction_response};
pub use prompts::build_extraction_prompt;
pub use reconcile::{compare, compare_with, ReconcileOptions};
pub use registry::{
    verification_targets, IdentifierField, RegistryStatus, RegistryVerification, VerificationOutcome,
};
pub use slot::{AnalysisTicket, Completion, FileRef, SlotStatus, UploadSlot, ValidationState};
pub use types::{ComparisonResult, ExpectedKind, ExtractionResult, IdentifierSet, UserInput};
