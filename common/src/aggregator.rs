//! スロット集約
//!
//! 複数スロットを持つステップが次へ進めるかを判定する。

use crate::slot::UploadSlot;
use serde::Serialize;

/// 進行可否の方針
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProceedPolicy {
    /// 解析が未完了（結果なし）のスロットでも進行を許可する
    ///
    /// 既定は true。遅延解析の完了前に次ステップへ進めてしまう挙動を
    /// 名前付きの方針として残している。
    pub allow_pending_validation: bool,
}

impl Default for ProceedPolicy {
    fn default() -> Self {
        Self { allow_pending_validation: true }
    }
}

/// 進行を妨げている理由
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "slot", rename_all = "camelCase")]
pub enum Blocker {
    /// 必須スロットがフォームに存在しない
    MissingSlot(String),
    /// ファイル未選択
    NoFile(String),
    /// 解析結果がまだない
    PendingValidation(String),
    /// 照合エラーあり
    Invalid(String),
}

impl std::fmt::Display for Blocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Blocker::MissingSlot(id) => write!(f, "{}: slot does not exist", id),
            Blocker::NoFile(id) => write!(f, "{}: no file selected", id),
            Blocker::PendingValidation(id) => write!(f, "{}: validation has not finished", id),
            Blocker::Invalid(id) => write!(f, "{}: identifiers do not match", id),
        }
    }
}

/// 判定結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProceedDecision {
    pub can_proceed: bool,
    pub blockers: Vec<Blocker>,
}

/// 必須スロットごとに進行を妨げる理由を集める
pub fn evaluate(slots: &[UploadSlot], required_ids: &[&str], policy: &ProceedPolicy) -> ProceedDecision {
    let blockers: Vec<Blocker> = required_ids
        .iter()
        .filter_map(|id| match slots.iter().find(|s| s.id() == *id) {
            None => Some(Blocker::MissingSlot(id.to_string())),
            Some(slot) => slot_blocker(slot, policy),
        })
        .collect();

    ProceedDecision {
        can_proceed: blockers.is_empty(),
        blockers,
    }
}

/// 必須スロットがすべてファイルを持ち、結果があればすべて有効なら true
pub fn can_proceed(slots: &[UploadSlot], required_ids: &[&str], policy: &ProceedPolicy) -> bool {
    evaluate(slots, required_ids, policy).can_proceed
}

fn slot_blocker(slot: &UploadSlot, policy: &ProceedPolicy) -> Option<Blocker> {
    if !slot.has_file() {
        return Some(Blocker::NoFile(slot.id().to_string()));
    }
    match slot.last_result() {
        Some(result) if !result.is_valid => Some(Blocker::Invalid(slot.id().to_string())),
        Some(_) => None,
        None if policy.allow_pending_validation => None,
        None => Some(Blocker::PendingValidation(slot.id().to_string())),
    }
}
