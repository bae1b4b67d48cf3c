//! AI CLI連携
//!
//! 画像パスをプロンプトに含めて AI CLI を非対話モードで実行し、
//! 標準出力のJSONを抽出結果として読む。

use super::Extractor;
use crate::ai_provider::AiProvider;
use crate::error::{DeviceVerifyError, Result};
use async_trait::async_trait;
use device_verify_common::{
    build_extraction_prompt, parse_extraction_response, ExpectedKind, ExtractionResult, IdentifierSet,
    NormalizeOptions,
};
use std::path::Path;
use tokio::process::Command;

pub struct CliExtractor {
    provider: AiProvider,
    options: NormalizeOptions,
}

impl CliExtractor {
    pub fn new(provider: AiProvider, options: NormalizeOptions) -> Self {
        Self { provider, options }
    }
}

#[async_trait]
impl Extractor for CliExtractor {
    fn name(&self) -> &'static str {
        self.provider.command_name()
    }

    async fn extract(
        &self,
        image: &Path,
        kind: ExpectedKind,
        hint: Option<&IdentifierSet>,
    ) -> Result<ExtractionResult> {
        // CLI から読めるよう絶対パスにする
        let abs_path = tokio::fs::canonicalize(image).await?;
        let image_path = abs_path.display().to_string().replace('\\', "/");

        let raw_prompt = format!(
            "Read the following image file and analyze it: {}\n\n{}",
            image_path,
            build_extraction_prompt(kind, hint)
        );
        let prompt = argv_prompt(&raw_prompt);

        tracing::debug!(provider = %self.provider, kind = %kind, prompt_len = prompt.len(), "running AI CLI");

        let response = run_cli(self.provider, &prompt).await?;

        tracing::debug!(provider = %self.provider, response_len = response.len(), "AI CLI responded");

        parse_extraction_response(&response, &self.options)
            .map_err(|e| DeviceVerifyError::ApiParse(format!("抽出結果: {}", e)))
    }
}

/// プロンプトを1つのコマンドライン引数にする
///
/// 改行は空白にする。`cmd /c` を経由する Windows だけ `"` をエスケープする。
fn argv_prompt(raw: &str) -> String {
    let prompt = raw.replace('\n', " ");
    #[cfg(windows)]
    let prompt = prompt.replace('"', "\\\"");
    prompt
}

async fn run_cli(provider: AiProvider, prompt: &str) -> Result<String> {
    #[cfg(windows)]
    let mut command = {
        let mut command = Command::new("cmd");
        command.arg("/c").arg(provider.command_name());
        command
    };

    #[cfg(not(windows))]
    let mut command = Command::new(provider.command_name());

    // タイムアウトで future が破棄されたら子プロセスも終了させる
    let output = command
        .args(provider.prompt_args(prompt))
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| DeviceVerifyError::CliExecution(format!("{} 実行エラー: {}", provider, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DeviceVerifyError::ApiCall(format!(
            "{} CLI failed (code {:?}): {}",
            provider,
            output.status.code(),
            stderr
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
