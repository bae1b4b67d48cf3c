//! アップロードスロットの状態機械
//!
//! フォームの各アップロード欄（IMEI画面、シリアル画面、スペック画面など）ごとに
//! ファイルの有無・解析の進行状態・直近の照合結果を保持する。
//!
//! ```text
//! Idle ──(遅延後)──▶ Analyzing ──▶ Success / Error
//!                        ▲              │
//!                        └──(再試行)────┘
//! 任意の状態 ──(ファイル削除)──▶ Idle
//! ```
//!
//! `generation` はファイルの差し替え・削除のたびに増加し、キャンセルトークンとして働く。
//! 解析開始時に発行した AnalysisTicket の世代が現在と異なれば、その結果は破棄する。
//! ここには非同期処理もタイマーも含まない。実行はフォーム側が担う。

use crate::error::{Error, Result};
use crate::reconcile::{compare_with, ReconcileOptions};
use crate::types::{ComparisonResult, ExpectedKind, ExtractionResult, IdentifierSet};
use serde::{Deserialize, Serialize};

/// 解析の進行状態
///
/// `Success` は「解析が完了した」ことを表し、照合の合否は `last_result.is_valid` が持つ。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationState {
    #[default]
    Idle,
    Analyzing,
    Success,
    Error,
}

impl ValidationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationState::Idle => "idle",
            ValidationState::Analyzing => "analyzing",
            ValidationState::Success => "success",
            ValidationState::Error => "error",
        }
    }
}

impl std::fmt::Display for ValidationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// スロットに割り当てられたファイルへの参照
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRef(String);

impl FileRef {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 解析1回分の発行情報
///
/// 完了時にこのチケットを返すことで、発行時の世代と照合される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisTicket {
    pub slot_id: String,
    pub generation: u64,
    pub file: FileRef,
    pub kind: ExpectedKind,
}

/// 解析完了の適用結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// スロットに反映した
    Applied,
    /// 世代が変わっていたので破棄した
    Stale,
}

/// 読み取り専用の状態スナップショット
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotStatus {
    pub validation_state: ValidationState,
    pub last_result: Option<ComparisonResult>,
    pub has_file: bool,
    pub generation: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// アップロードスロット
#[derive(Debug, Clone)]
pub struct UploadSlot {
    id: String,
    kind: ExpectedKind,
    file: Option<FileRef>,
    validation_state: ValidationState,
    last_result: Option<ComparisonResult>,
    last_extraction: Option<ExtractionResult>,
    error_message: Option<String>,
    generation: u64,
}

impl UploadSlot {
    /// 空のスロット（Idle）を作成
    pub fn new(id: impl Into<String>, kind: ExpectedKind) -> Self {
        Self {
            id: id.into(),
            kind,
            file: None,
            validation_state: ValidationState::Idle,
            last_result: None,
            last_extraction: None,
            error_message: None,
            generation: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ExpectedKind {
        self.kind
    }

    pub fn file(&self) -> Option<&FileRef> {
        self.file.as_ref()
    }

    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }

    pub fn validation_state(&self) -> ValidationState {
        self.validation_state
    }

    pub fn last_result(&self) -> Option<&ComparisonResult> {
        self.last_result.as_ref()
    }

    pub fn last_extraction(&self) -> Option<&ExtractionResult> {
        self.last_extraction.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> SlotStatus {
        SlotStatus {
            validation_state: self.validation_state,
            last_result: self.last_result.clone(),
            has_file: self.file.is_some(),
            generation: self.generation,
            error_message: self.error_message.clone(),
        }
    }

    /// ファイルを割り当てる（差し替えも含む）
    ///
    /// 世代を進めて前回の結果を破棄し、自動解析1回分のチケットを返す。
    /// 状態は遅延後に `begin_analysis` が呼ばれるまで Idle のまま。
    pub fn assign_file(&mut self, file: FileRef) -> AnalysisTicket {
        self.generation += 1;
        self.file = Some(file.clone());
        self.validation_state = ValidationState::Idle;
        self.last_result = None;
        self.last_extraction = None;
        self.error_message = None;

        self.ticket_for(file)
    }

    /// ファイルを削除して Idle に戻す
    pub fn remove_file(&mut self) {
        self.generation += 1;
        self.file = None;
        self.validation_state = ValidationState::Idle;
        self.last_result = None;
        self.last_extraction = None;
        self.error_message = None;
    }

    /// 遅延タイマー発火時に解析を開始する
    ///
    /// チケットが古い（差し替え・削除済み）場合は false を返し、何もしない。
    pub fn begin_analysis(&mut self, ticket: &AnalysisTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.validation_state = ValidationState::Analyzing;
        self.error_message = None;
        true
    }

    /// 手動再試行
    ///
    /// Error 状態、または照合に失敗した Success 状態からのみ可能。
    /// 世代は変えない（新しいファイルではないため）。
    pub fn retry(&mut self) -> Result<AnalysisTicket> {
        let file = self.file.clone().ok_or_else(|| Error::NoFile(self.id.clone()))?;

        let allowed = match self.validation_state {
            ValidationState::Error => true,
            ValidationState::Success => self.last_result.as_ref().is_some_and(|r| !r.is_valid),
            ValidationState::Idle | ValidationState::Analyzing => false,
        };
        if !allowed {
            return Err(Error::RetryNotAllowed {
                slot: self.id.clone(),
                state: self.validation_state.to_string(),
            });
        }

        self.validation_state = ValidationState::Analyzing;
        self.error_message = None;
        Ok(self.ticket_for(file))
    }

    /// 解析完了を反映する
    ///
    /// 抽出が成功していれば現在の入力値と照合して Success にする（合否に関わらず）。
    /// 抽出が失敗していれば Error にし、照合は行わない。
    pub fn complete(
        &mut self,
        ticket: &AnalysisTicket,
        outcome: std::result::Result<ExtractionResult, String>,
        user: &IdentifierSet,
        options: &ReconcileOptions,
    ) -> Completion {
        if !self.is_current(ticket) {
            return Completion::Stale;
        }

        match outcome {
            Ok(extraction) => {
                self.last_result = Some(compare_with(extraction.identifiers(), user, options));
                self.last_extraction = Some(extraction);
                self.validation_state = ValidationState::Success;
                self.error_message = None;
            }
            Err(message) => {
                self.validation_state = ValidationState::Error;
                self.error_message = Some(message);
            }
        }
        Completion::Applied
    }

    /// 保持している抽出結果で再照合する（入力値の変更時）
    ///
    /// 解析済みでなければ何もせず false を返す。
    pub fn revalidate(&mut self, user: &IdentifierSet, options: &ReconcileOptions) -> bool {
        if self.validation_state != ValidationState::Success {
            return false;
        }
        match &self.last_extraction {
            Some(extraction) => {
                self.last_result = Some(compare_with(extraction.identifiers(), user, options));
                true
            }
            None => false,
        }
    }

    fn is_current(&self, ticket: &AnalysisTicket) -> bool {
        ticket.slot_id == self.id && ticket.generation == self.generation && self.file.is_some()
    }

    fn ticket_for(&self, file: FileRef) -> AnalysisTicket {
        AnalysisTicket {
            slot_id: self.id.clone(),
            generation: self.generation,
            file,
            kind: self.kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::NormalizeOptions;

    const A: &str = "490154203237518";
    const B: &str = "490154203237526";

    fn ids(imei1: &str, imei2: &str) -> IdentifierSet {
        IdentifierSet::from_raw(imei1, imei2, "", &NormalizeOptions::registration())
    }

    fn extraction(imei1: &str, imei2: &str) -> ExtractionResult {
        ExtractionResult::new(ids(imei1, imei2), vec![])
    }

    fn opts() -> ReconcileOptions {
        ReconcileOptions::default()
    }

    #[test]
    fn test_new_slot_is_idle() {
        let slot = UploadSlot::new("imei_proof", ExpectedKind::Imei);
        let status = slot.status();
        assert_eq!(status.validation_state, ValidationState::Idle);
        assert!(status.last_result.is_none());
        assert!(!status.has_file);
        assert_eq!(status.generation, 0);
    }

    #[test]
    fn test_assign_then_complete_success() {
        let mut slot = UploadSlot::new("imei_proof", ExpectedKind::Imei);
        let ticket = slot.assign_file(FileRef::new("a.jpg"));
        assert_eq!(ticket.generation, 1);
        assert_eq!(slot.validation_state(), ValidationState::Idle);

        assert!(slot.begin_analysis(&ticket));
        assert_eq!(slot.validation_state(), ValidationState::Analyzing);

        let done = slot.complete(&ticket, Ok(extraction(A, B)), &ids(A, B), &opts());
        assert_eq!(done, Completion::Applied);
        assert_eq!(slot.validation_state(), ValidationState::Success);
        assert!(slot.last_result().is_some_and(|r| r.is_valid));
    }

    #[test]
    fn test_success_with_failing_result() {
        let mut slot = UploadSlot::new("imei_proof", ExpectedKind::Imei);
        let ticket = slot.assign_file(FileRef::new("a.jpg"));
        slot.begin_analysis(&ticket);
        slot.complete(&ticket, Ok(extraction(A, "")), &ids(B, ""), &opts());

        assert_eq!(slot.validation_state(), ValidationState::Success);
        assert!(slot.last_result().is_some_and(|r| !r.is_valid));
    }

    #[test]
    fn test_extraction_failure_sets_error_without_result() {
        let mut slot = UploadSlot::new("imei_proof", ExpectedKind::Imei);
        let ticket = slot.assign_file(FileRef::new("a.jpg"));
        slot.begin_analysis(&ticket);
        slot.complete(&ticket, Err("timeout".into()), &ids(A, ""), &opts());

        assert_eq!(slot.validation_state(), ValidationState::Error);
        assert_eq!(slot.error_message(), Some("timeout"));
        assert!(slot.last_result().is_none());
    }

    #[test]
    fn test_stale_timer_does_not_start_analysis() {
        let mut slot = UploadSlot::new("imei_proof", ExpectedKind::Imei);
        let old = slot.assign_file(FileRef::new("a.jpg"));
        let new = slot.assign_file(FileRef::new("b.jpg"));

        assert!(!slot.begin_analysis(&old));
        assert_eq!(slot.validation_state(), ValidationState::Idle);
        assert!(slot.begin_analysis(&new));
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let mut slot = UploadSlot::new("imei_proof", ExpectedKind::Imei);
        let a = slot.assign_file(FileRef::new("a.jpg"));
        slot.begin_analysis(&a);

        slot.remove_file();
        let b = slot.assign_file(FileRef::new("b.jpg"));
        slot.begin_analysis(&b);

        let done = slot.complete(&a, Ok(extraction(B, "")), &ids(A, ""), &opts());
        assert_eq!(done, Completion::Stale);
        assert_eq!(slot.validation_state(), ValidationState::Analyzing);
        assert!(slot.last_result().is_none());

        slot.complete(&b, Ok(extraction(A, "")), &ids(A, ""), &opts());
        assert!(slot.last_result().is_some_and(|r| r.is_valid));
    }

    #[test]
    fn test_remove_resets_and_bumps_generation() {
        let mut slot = UploadSlot::new("imei_proof", ExpectedKind::Imei);
        let ticket = slot.assign_file(FileRef::new("a.jpg"));
        slot.begin_analysis(&ticket);
        slot.complete(&ticket, Ok(extraction(A, "")), &ids(A, ""), &opts());

        slot.remove_file();
        assert_eq!(slot.generation(), 2);
        assert_eq!(slot.validation_state(), ValidationState::Idle);
        assert!(slot.last_result().is_none());
        assert!(!slot.has_file());
        assert_eq!(slot.complete(&ticket, Ok(extraction(A, "")), &ids(A, ""), &opts()), Completion::Stale);
    }

    #[test]
    fn test_retry_keeps_generation() {
        let mut slot = UploadSlot::new("imei_proof", ExpectedKind::Imei);
        let ticket = slot.assign_file(FileRef::new("a.jpg"));
        slot.begin_analysis(&ticket);
        slot.complete(&ticket, Err("network".into()), &ids(A, ""), &opts());

        let retry = slot.retry().expect("再試行できるはず");
        assert_eq!(retry.generation, ticket.generation);
        assert_eq!(slot.validation_state(), ValidationState::Analyzing);
        assert!(slot.error_message().is_none());
    }

    #[test]
    fn test_retry_allowed_from_failing_success() {
        let mut slot = UploadSlot::new("imei_proof", ExpectedKind::Imei);
        let ticket = slot.assign_file(FileRef::new("a.jpg"));
        slot.begin_analysis(&ticket);
        slot.complete(&ticket, Ok(extraction(A, "")), &ids(B, ""), &opts());
        assert!(slot.retry().is_ok());
    }

    #[test]
    fn test_retry_rejected() {
        let mut slot = UploadSlot::new("imei_proof", ExpectedKind::Imei);
        assert!(matches!(slot.retry(), Err(Error::NoFile(_))));

        let ticket = slot.assign_file(FileRef::new("a.jpg"));
        assert!(matches!(slot.retry(), Err(Error::RetryNotAllowed { .. })));

        slot.begin_analysis(&ticket);
        assert!(matches!(slot.retry(), Err(Error::RetryNotAllowed { .. })));

        slot.complete(&ticket, Ok(extraction(A, "")), &ids(A, ""), &opts());
        assert!(matches!(slot.retry(), Err(Error::RetryNotAllowed { .. })));
    }

    #[test]
    fn test_revalidate_uses_retained_extraction() {
        let mut slot = UploadSlot::new("imei_proof", ExpectedKind::Imei);
        let ticket = slot.assign_file(FileRef::new("a.jpg"));
        slot.begin_analysis(&ticket);
        slot.complete(&ticket, Ok(extraction(A, "")), &ids(B, ""), &opts());
        assert!(slot.last_result().is_some_and(|r| !r.is_valid));

        assert!(slot.revalidate(&ids(A, ""), &opts()));
        assert!(slot.last_result().is_some_and(|r| r.is_valid));
    }

    #[test]
    fn test_revalidate_ignored_before_analysis() {
        let mut slot = UploadSlot::new("imei_proof", ExpectedKind::Imei);
        slot.assign_file(FileRef::new("a.jpg"));
        assert!(!slot.revalidate(&ids(A, ""), &opts()));
        assert!(slot.last_result().is_none());
    }
}
