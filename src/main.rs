use anyhow::{bail, Context};
use clap::Parser;
use device_verify::{cli, config, extractor, form, image_input, registry};
use cli::{Cli, Commands};
use config::Config;
use device_verify_common::{compare_with, IdentifierSet, SlotStatus, UserInput, ValidationState};
use extractor::{build_extractor, CacheFile, Extractor};
use form::{FormOptions, UploadForm};
use image_input::ImageInput;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const CHECK_SLOT: &str = "device_screen";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load().context("設定ファイルの読み込みに失敗しました")?;
    let provider = cli.ai_provider.unwrap_or(config.ai_provider);

    match cli.command {
        Commands::Extract { image, kind, context, use_cache } => {
            let image = ImageInput::open(&image)?;
            let extractor = build_extractor(
                &config,
                provider,
                config.normalize_options(context),
                use_cache || config.use_cache,
            );

            let spinner = spinner(format!("{} で解析中: {}", extractor.name(), image.file_name));
            let result = extractor.extract(&image.path, kind, None).await;
            spinner.finish_and_clear();

            println!("{}", serde_json::to_string_pretty(&result?)?);
        }

        Commands::Check { image, kind, imei1, imei2, serial, context, use_cache } => {
            let image = ImageInput::open(&image)?;
            let extractor = build_extractor(
                &config,
                provider,
                config.normalize_options(context),
                use_cache || config.use_cache,
            );

            let form = UploadForm::new(extractor, FormOptions::from_config(&config, context));
            form.add_slot(CHECK_SLOT, kind);
            form.set_user_input(UserInput::new(
                imei1.unwrap_or_default(),
                imei2.unwrap_or_default(),
                serial.unwrap_or_default(),
            ));
            form.assign_file(CHECK_SLOT, &image)?;

            let spinner = spinner(format!("解析中: {}", image.file_name));
            let status = form
                .wait_for(CHECK_SLOT, |s| {
                    matches!(s.validation_state, ValidationState::Success | ValidationState::Error)
                })
                .await?;
            spinner.finish_and_clear();

            print_status(&status);
            println!("{}", serde_json::to_string_pretty(&status)?);

            if status.validation_state == ValidationState::Error {
                bail!("画像解析に失敗しました");
            }
            if !form.can_proceed(&[CHECK_SLOT]) {
                bail!("入力値が画像と一致しません");
            }
        }

        Commands::Compare {
            imei1,
            imei2,
            serial,
            extracted_imei1,
            extracted_imei2,
            extracted_serial,
            context,
        } => {
            let options = config.normalize_options(context);
            let user = IdentifierSet::from_raw(
                imei1.as_deref().unwrap_or_default(),
                imei2.as_deref().unwrap_or_default(),
                serial.as_deref().unwrap_or_default(),
                &options,
            );
            let extracted = IdentifierSet::from_raw(
                extracted_imei1.as_deref().unwrap_or_default(),
                extracted_imei2.as_deref().unwrap_or_default(),
                extracted_serial.as_deref().unwrap_or_default(),
                &options,
            );

            let result = compare_with(&extracted, &user, &config.reconcile_options());
            println!("{}", serde_json::to_string_pretty(&result)?);

            if !result.is_valid {
                bail!("入力値が抽出値と一致しません");
            }
        }

        Commands::Verify { image, kind, use_cache } => {
            let registry_url = config
                .registry_url
                .clone()
                .context("登録台帳のURLが未設定です。`device-verify config --set-registry-url URL` で設定してください")?;

            let image = ImageInput::open(&image)?;
            let extractor = build_extractor(
                &config,
                provider,
                config.normalize_options(config::FlowContext::Reconciliation),
                use_cache || config.use_cache,
            );

            let spinner = spinner(format!("解析中: {}", image.file_name));
            let extraction = extractor.extract(&image.path, kind, None).await;
            spinner.finish_and_clear();
            let extraction = extraction?;

            if extraction.identifiers().is_empty() {
                bail!("画像から識別子を読み取れませんでした");
            }

            let client = registry::HttpRegistryClient::new(&registry_url, config.timeout())?;
            let verifications = registry::verify_extracted(extraction.identifiers(), &client).await;
            println!("{}", serde_json::to_string_pretty(&verifications)?);
        }

        Commands::Config { set_api_key, set_registry_url, show } => {
            let mut config = config;

            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }

            if let Some(url) = set_registry_url {
                config.set_registry_url(url)?;
                println!("✔ 登録台帳のURLを設定しました");
            }

            if show {
                println!("設定: {}", Config::config_path()?.display());
                println!("  AIプロバイダ: {}", config.ai_provider);
                println!("  モデル: {}", config.model);
                println!("  APIキー: {}", if config.api_key.is_some() { "設定済み" } else { "未設定" });
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!("  解析遅延: {}ms", config.debounce_ms);
                println!(
                    "  IMEI最大長: 登録 {} / 照合 {}",
                    config.registration_imei_max_len, config.reconciliation_imei_max_len
                );
                println!("  シリアル最大長: {}", config.serial_max_len);
                println!("  解析完了前の進行: {}", if config.allow_pending_validation { "許可" } else { "不可" });
                println!("  登録台帳: {}", config.registry_url.as_deref().unwrap_or("未設定"));
            }
        }

        Commands::Cache { clear, folder, info } => {
            let target = folder.unwrap_or_else(|| std::path::PathBuf::from("."));
            let cache_path = CacheFile::cache_path(&target);

            if info || !clear {
                if cache_path.exists() {
                    let cache = CacheFile::load(&target);
                    println!("キャッシュ情報:");
                    println!("  パス: {}", cache_path.display());
                    println!("  件数: {}", cache.len());
                    if let Ok(meta) = std::fs::metadata(&cache_path) {
                        println!("  サイズ: {} bytes", meta.len());
                    }
                } else {
                    println!("キャッシュファイルが存在しません: {}", cache_path.display());
                }
            }

            if clear {
                match CacheFile::clear(&target) {
                    Ok(true) => println!("✔ キャッシュを削除しました: {}", cache_path.display()),
                    Ok(false) => println!("キャッシュファイルが存在しません"),
                    Err(e) => println!("キャッシュ削除エラー: {}", e),
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn print_status(status: &SlotStatus) {
    match status.validation_state {
        ValidationState::Error => {
            println!("✖ 解析失敗: {}", status.error_message.as_deref().unwrap_or("不明なエラー"));
        }
        _ => {
            if let Some(result) = &status.last_result {
                let mark = if result.is_valid { "✔" } else { "✖" };
                println!("{} 照合{}", mark, if result.is_valid { "OK" } else { "NG" });
                for e in &result.errors {
                    println!("  エラー: {}", e);
                }
                for w in &result.warnings {
                    println!("  警告: {}", w);
                }
                for s in &result.suggestions {
                    println!("  提案: {}", s);
                }
            }
        }
    }
    println!();
}
