use crate::ai_provider::AiProvider;
use crate::error::{DeviceVerifyError, Result};
use device_verify_common::{normalizer, NormalizeOptions, ProceedPolicy, ReconcileOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 照合の文脈（IMEI の最大長が異なる）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FlowContext {
    /// 端末登録
    #[default]
    Registration,
    /// 所有確認（照合）
    Reconciliation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ai_provider: AiProvider,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    pub debounce_ms: u64,
    pub registration_imei_max_len: usize,
    pub reconciliation_imei_max_len: usize,
    pub serial_max_len: usize,
    pub allow_pending_validation: bool,
    pub suppress_positional_on_swap: bool,
    pub registry_url: Option<String>,
    pub use_cache: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ai_provider: AiProvider::Claude,
            model: "gemini-2.0-flash".into(),
            api_key: None,
            timeout_seconds: 60,
            debounce_ms: 1000,
            registration_imei_max_len: normalizer::REGISTRATION_IMEI_MAX_LEN,
            reconciliation_imei_max_len: normalizer::RECONCILIATION_IMEI_MAX_LEN,
            serial_max_len: normalizer::SERIAL_MAX_LEN,
            allow_pending_validation: true,
            suppress_positional_on_swap: false,
            registry_url: None,
            use_cache: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| DeviceVerifyError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("device-verify").join("config.json"))
    }

    pub fn get_api_key(&self) -> Result<String> {
        // 環境変数を優先
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }

        self.api_key.clone().ok_or(DeviceVerifyError::MissingApiKey)
    }

    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        self.api_key = Some(key);
        self.save()
    }

    pub fn set_registry_url(&mut self, url: String) -> Result<()> {
        self.registry_url = Some(url.trim_end_matches('/').to_string());
        self.save()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn normalize_options(&self, context: FlowContext) -> NormalizeOptions {
        let imei_max_len = match context {
            FlowContext::Registration => self.registration_imei_max_len,
            FlowContext::Reconciliation => self.reconciliation_imei_max_len,
        };
        NormalizeOptions {
            imei_max_len,
            serial_max_len: self.serial_max_len,
        }
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            suppress_positional_on_swap: self.suppress_positional_on_swap,
        }
    }

    pub fn proceed_policy(&self) -> ProceedPolicy {
        ProceedPolicy {
            allow_pending_validation: self.allow_pending_validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lengths_differ_by_context() {
        let config = Config::default();
        assert_eq!(config.normalize_options(FlowContext::Registration).imei_max_len, 15);
        assert_eq!(config.normalize_options(FlowContext::Reconciliation).imei_max_len, 20);
        assert_eq!(config.normalize_options(FlowContext::Registration).serial_max_len, 20);
    }

    #[test]
    fn test_default_policies() {
        let config = Config::default();
        assert!(config.proceed_policy().allow_pending_validation);
        assert!(!config.reconcile_options().suppress_positional_on_swap);
        assert_eq!(config.debounce(), Duration::from_millis(1000));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"debounce_ms": 250, "ai_provider": "gemini"}"#).unwrap();
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.ai_provider, AiProvider::Gemini);
        assert_eq!(config.timeout_seconds, 60);
    }
}
