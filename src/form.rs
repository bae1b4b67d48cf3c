//! アップロードフォームの実行系
//!
//! フォームが持つスロット群に対して、ファイル選択・削除・再試行・解析完了の
//! すべてのイベントをここで直列に適用する。
//!
//! - ファイル選択後、遅延（debounce）を置いてから自動解析を1回だけ実行
//! - 遅延中に差し替え・削除されたらタイマーを中止する
//! - 実行中の解析は中断しない。完了時に世代が変わっていれば結果を捨てる
//! - 各スロットの状態は watch チャネルで購読できる

use crate::config::{Config, FlowContext};
use crate::error::Result;
use crate::extractor::Extractor;
use crate::image_input::ImageInput;
use device_verify_common::{
    aggregator, AnalysisTicket, Completion, Error as CommonError, ExpectedKind, NormalizeOptions,
    ProceedDecision, ProceedPolicy, ReconcileOptions, SlotStatus, UploadSlot, UserInput,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// スロットID → 状態スナップショット
pub type FormSnapshot = BTreeMap<String, SlotStatus>;

/// フォームの動作設定
#[derive(Debug, Clone, Copy)]
pub struct FormOptions {
    pub debounce: Duration,
    pub normalize: NormalizeOptions,
    pub reconcile: ReconcileOptions,
    pub proceed: ProceedPolicy,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1000),
            normalize: NormalizeOptions::default(),
            reconcile: ReconcileOptions::default(),
            proceed: ProceedPolicy::default(),
        }
    }
}

impl FormOptions {
    pub fn from_config(config: &Config, context: FlowContext) -> Self {
        Self {
            debounce: config.debounce(),
            normalize: config.normalize_options(context),
            reconcile: config.reconcile_options(),
            proceed: config.proceed_policy(),
        }
    }
}

struct FormState {
    slots: Vec<UploadSlot>,
    user_input: UserInput,
    timers: HashMap<String, JoinHandle<()>>,
}

impl FormState {
    fn slot_mut(&mut self, id: &str) -> Result<&mut UploadSlot> {
        self.slots
            .iter_mut()
            .find(|s| s.id() == id)
            .ok_or_else(|| CommonError::UnknownSlot(id.to_string()).into())
    }

    fn cancel_timer(&mut self, id: &str) {
        if let Some(handle) = self.timers.remove(id) {
            handle.abort();
        }
    }

    fn snapshot(&self) -> FormSnapshot {
        self.slots.iter().map(|s| (s.id().to_string(), s.status())).collect()
    }
}

struct FormInner {
    state: Mutex<FormState>,
    extractor: Arc<dyn Extractor>,
    options: FormOptions,
    snapshot_tx: watch::Sender<FormSnapshot>,
}

impl FormInner {
    fn publish(&self, state: &FormState) {
        self.snapshot_tx.send_replace(state.snapshot());
    }
}

/// アップロードフォーム
///
/// 複製してもスロット群は共有される。ファイル選択と再試行は tokio ランタイム上で呼ぶこと。
#[derive(Clone)]
pub struct UploadForm {
    inner: Arc<FormInner>,
}

impl UploadForm {
    pub fn new(extractor: Arc<dyn Extractor>, options: FormOptions) -> Self {
        let (snapshot_tx, _) = watch::channel(FormSnapshot::new());
        Self {
            inner: Arc::new(FormInner {
                state: Mutex::new(FormState {
                    slots: Vec::new(),
                    user_input: UserInput::default(),
                    timers: HashMap::new(),
                }),
                extractor,
                options,
                snapshot_tx,
            }),
        }
    }

    pub fn options(&self) -> &FormOptions {
        &self.inner.options
    }

    /// 空のスロットを追加（既にあれば false）
    pub fn add_slot(&self, id: &str, kind: ExpectedKind) -> bool {
        let mut state = self.inner.state.lock();
        if state.slots.iter().any(|s| s.id() == id) {
            return false;
        }
        state.slots.push(UploadSlot::new(id, kind));
        self.inner.publish(&state);
        true
    }

    /// 入力欄の現在値を更新する
    ///
    /// 照合は次の解析完了時（または `revalidate_all`）に行われる。
    pub fn set_user_input(&self, input: UserInput) {
        self.inner.state.lock().user_input = input;
    }

    pub fn user_input(&self) -> UserInput {
        self.inner.state.lock().user_input.clone()
    }

    /// ファイルを割り当て、遅延後の自動解析を予約する
    ///
    /// 新しい世代番号を返す。
    pub fn assign_file(&self, id: &str, image: &ImageInput) -> Result<u64> {
        let mut state = self.inner.state.lock();
        let ticket = state.slot_mut(id)?.assign_file(image.file_ref());
        state.cancel_timer(id);

        tracing::debug!(slot = id, generation = ticket.generation, file = %image.file_name, "file assigned");

        let generation = ticket.generation;
        let handle = schedule_analysis(Arc::clone(&self.inner), ticket);
        state.timers.insert(id.to_string(), handle);
        self.inner.publish(&state);
        Ok(generation)
    }

    /// ファイルを削除して Idle に戻す
    pub fn remove_file(&self, id: &str) -> Result<()> {
        let mut state = self.inner.state.lock();
        state.slot_mut(id)?.remove_file();
        state.cancel_timer(id);

        tracing::debug!(slot = id, "file removed");

        self.inner.publish(&state);
        Ok(())
    }

    /// 手動再試行（遅延なしで即時に解析する）
    pub fn retry(&self, id: &str) -> Result<()> {
        let mut state = self.inner.state.lock();
        let ticket = state.slot_mut(id)?.retry()?;

        tracing::debug!(slot = id, generation = ticket.generation, "manual retry");

        self.inner.publish(&state);
        drop(state);

        tokio::spawn(run_analysis(Arc::clone(&self.inner), ticket));
        Ok(())
    }

    /// 保持している抽出結果と現在の入力値で全スロットを再照合する
    ///
    /// 外部の解析は呼ばない。再照合したスロット数を返す。
    pub fn revalidate_all(&self) -> usize {
        let mut state = self.inner.state.lock();
        let user = state.user_input.to_identifier_set(&self.inner.options.normalize);
        let reconcile = self.inner.options.reconcile;
        let count = state
            .slots
            .iter_mut()
            .map(|slot| slot.revalidate(&user, &reconcile))
            .filter(|revalidated| *revalidated)
            .count();
        self.inner.publish(&state);
        count
    }

    pub fn status(&self, id: &str) -> Option<SlotStatus> {
        let state = self.inner.state.lock();
        state.slots.iter().find(|s| s.id() == id).map(UploadSlot::status)
    }

    pub fn snapshot(&self) -> FormSnapshot {
        self.inner.state.lock().snapshot()
    }

    /// 状態の変化を購読する
    pub fn subscribe(&self) -> watch::Receiver<FormSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// スロットの状態が条件を満たすまで待つ
    pub async fn wait_for<F>(&self, id: &str, predicate: F) -> Result<SlotStatus>
    where
        F: Fn(&SlotStatus) -> bool,
    {
        if self.status(id).is_none() {
            return Err(CommonError::UnknownSlot(id.to_string()).into());
        }

        let mut rx = self.subscribe();
        let snapshot = rx
            .wait_for(|snapshot| snapshot.get(id).is_some_and(&predicate))
            .await
            .map_err(|_| CommonError::UnknownSlot(id.to_string()))?;
        Ok(snapshot.get(id).cloned().unwrap_or_default())
    }

    /// 必須スロットがそろっていれば次のステップへ進める
    pub fn can_proceed(&self, required_ids: &[&str]) -> bool {
        self.proceed_decision(required_ids).can_proceed
    }

    pub fn proceed_decision(&self, required_ids: &[&str]) -> ProceedDecision {
        let state = self.inner.state.lock();
        aggregator::evaluate(&state.slots, required_ids, &self.inner.options.proceed)
    }
}

/// 遅延後に解析を開始するタイマーを起動する
///
/// 中止できるのは待機中だけ。解析そのものは別タスクで走らせ、中断しない。
fn schedule_analysis(inner: Arc<FormInner>, ticket: AnalysisTicket) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(inner.options.debounce).await;

        let started = {
            let mut state = inner.state.lock();
            let started = match state.slot_mut(&ticket.slot_id) {
                Ok(slot) => slot.begin_analysis(&ticket),
                Err(_) => false,
            };
            if started {
                inner.publish(&state);
            }
            started
        };

        if started {
            tokio::spawn(run_analysis(inner, ticket));
        } else {
            tracing::debug!(slot = %ticket.slot_id, generation = ticket.generation, "stale timer ignored");
        }
    })
}

/// 外部解析を呼び、結果をスロットに反映する
async fn run_analysis(inner: Arc<FormInner>, ticket: AnalysisTicket) {
    let hint = {
        let state = inner.state.lock();
        state.user_input.to_identifier_set(&inner.options.normalize)
    };

    let image = PathBuf::from(ticket.file.as_str());
    let outcome = inner
        .extractor
        .extract(&image, ticket.kind, Some(&hint))
        .await
        .map_err(|e| {
            tracing::warn!(slot = %ticket.slot_id, generation = ticket.generation, error = %e, "extraction failed");
            e.to_string()
        });

    let mut state = inner.state.lock();
    let user = state.user_input.to_identifier_set(&inner.options.normalize);
    let reconcile = inner.options.reconcile;
    let completion = match state.slot_mut(&ticket.slot_id) {
        Ok(slot) => slot.complete(&ticket, outcome, &user, &reconcile),
        Err(_) => Completion::Stale,
    };

    match completion {
        Completion::Applied => {
            tracing::info!(slot = %ticket.slot_id, generation = ticket.generation, "analysis completed");
            inner.publish(&state);
        }
        Completion::Stale => {
            tracing::debug!(slot = %ticket.slot_id, generation = ticket.generation, "stale analysis result discarded");
        }
    }
}
