use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceVerifyError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("APIキーが設定されていません。`device-verify config --set-api-key YOUR_KEY` で設定してください")]
    MissingApiKey,

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("対応していない画像形式です: {0}")]
    UnsupportedImage(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    #[error("API呼び出しエラー: {0}")]
    ApiCall(String),

    #[error("APIレスポンスのパースに失敗: {0}")]
    ApiParse(String),

    #[error("画像解析がタイムアウトしました（{0:?}）")]
    Timeout(std::time::Duration),

    #[error("CLI実行エラー: {0}")]
    CliExecution(String),

    #[error("台帳照会エラー: {0}")]
    Registry(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTPエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Common(#[from] device_verify_common::Error),
}

pub type Result<T> = std::result::Result<T, DeviceVerifyError>;
