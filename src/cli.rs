use crate::ai_provider::AiProvider;
use crate::config::FlowContext;
use clap::{Parser, Subcommand};
use device_verify_common::ExpectedKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "device-verify")]
#[command(about = "端末画面写真からのIMEI・シリアル抽出と入力値照合ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// AIプロバイダ (claude/codex/gemini)。省略時は設定ファイルの値
    #[arg(long, global = true)]
    pub ai_provider: Option<AiProvider>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 画像から識別子を抽出してJSONを出力
    Extract {
        /// 端末画面の写真
        #[arg(required = true)]
        image: PathBuf,

        /// 抽出種別 (imei/serial/specs)
        #[arg(short, long, default_value = "imei")]
        kind: ExpectedKind,

        /// 照合の文脈（IMEIの最大長が変わる）
        #[arg(long, value_enum, default_value = "registration")]
        context: FlowContext,

        /// キャッシュを使用（再解析をスキップ）
        #[arg(long)]
        use_cache: bool,
    },

    /// 画像を解析して入力値と照合
    Check {
        /// 端末画面の写真
        #[arg(required = true)]
        image: PathBuf,

        /// 抽出種別 (imei/serial/specs)
        #[arg(short, long, default_value = "imei")]
        kind: ExpectedKind,

        /// 入力したIMEI1
        #[arg(long)]
        imei1: Option<String>,

        /// 入力したIMEI2
        #[arg(long)]
        imei2: Option<String>,

        /// 入力したシリアル番号
        #[arg(long)]
        serial: Option<String>,

        /// 照合の文脈（IMEIの最大長が変わる）
        #[arg(long, value_enum, default_value = "registration")]
        context: FlowContext,

        /// キャッシュを使用（再解析をスキップ）
        #[arg(long)]
        use_cache: bool,
    },

    /// 抽出値と入力値を直接照合（画像解析なし）
    Compare {
        #[arg(long)]
        imei1: Option<String>,

        #[arg(long)]
        imei2: Option<String>,

        #[arg(long)]
        serial: Option<String>,

        #[arg(long)]
        extracted_imei1: Option<String>,

        #[arg(long)]
        extracted_imei2: Option<String>,

        #[arg(long)]
        extracted_serial: Option<String>,

        /// 照合の文脈（IMEIの最大長が変わる）
        #[arg(long, value_enum, default_value = "registration")]
        context: FlowContext,
    },

    /// 画像から抽出した識別子を登録台帳で確認
    Verify {
        /// 端末画面の写真
        #[arg(required = true)]
        image: PathBuf,

        /// 抽出種別 (imei/serial/specs)
        #[arg(short, long, default_value = "imei")]
        kind: ExpectedKind,

        /// キャッシュを使用（再解析をスキップ）
        #[arg(long)]
        use_cache: bool,
    },

    /// 設定を表示/編集
    Config {
        /// Gemini APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 登録台帳のURLを設定
        #[arg(long)]
        set_registry_url: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },

    /// キャッシュ管理
    Cache {
        /// キャッシュを削除
        #[arg(long)]
        clear: bool,

        /// 対象フォルダ（省略時はカレント）
        #[arg(short, long)]
        folder: Option<PathBuf>,

        /// キャッシュ情報を表示
        #[arg(long)]
        info: bool,
    },
}
