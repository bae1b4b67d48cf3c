//! Gemini API連携
//!
//! 画像を base64 でインライン送信し、レスポンスのテキストを抽出結果としてパースする。

use super::Extractor;
use crate::error::{DeviceVerifyError, Result};
use async_trait::async_trait;
use base64::Engine;
use device_verify_common::{
    build_extraction_prompt, parse_extraction_response, ExpectedKind, ExtractionResult, IdentifierSet,
    NormalizeOptions,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini APIリクエスト
#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

/// Gemini APIレスポンス
#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

pub struct GeminiExtractor {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    options: NormalizeOptions,
}

impl GeminiExtractor {
    pub fn new(api_key: String, model: String, options: NormalizeOptions) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: GEMINI_API_BASE.to_string(),
            model,
            options,
        }
    }

    /// 接続先を差し替える（プロキシ・テスト用）
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// APIキーは URL に載せない（reqwest のエラー表示に URL が含まれるため）
    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl Extractor for GeminiExtractor {
    fn name(&self) -> &'static str {
        "gemini-api"
    }

    async fn extract(
        &self,
        image: &Path,
        kind: ExpectedKind,
        hint: Option<&IdentifierSet>,
    ) -> Result<ExtractionResult> {
        let bytes = tokio::fs::read(image)
            .await
            .map_err(|e| DeviceVerifyError::ImageLoad(format!("{}: {}", image.display(), e)))?;

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: build_extraction_prompt(kind, hint),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: crate::image_input::mime_type_for(image).to_string(),
                            data: base64::engine::general_purpose::STANDARD.encode(&bytes),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                response_mime_type: "application/json".to_string(),
            },
        };

        tracing::debug!(model = %self.model, kind = %kind, image_bytes = bytes.len(), "calling Gemini API");

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        if !response.status().is_success() {
            return Err(DeviceVerifyError::ApiCall(format!("Gemini API error: {}", response.status())));
        }

        let body: GeminiResponse = response.json().await.map_err(reqwest::Error::without_url)?;
        let text = response_text(&body).ok_or_else(|| DeviceVerifyError::ApiParse("Empty response".into()))?;

        parse_extraction_response(text, &self.options)
            .map_err(|e| DeviceVerifyError::ApiParse(format!("抽出結果: {}", e)))
    }
}

fn response_text(response: &GeminiResponse) -> Option<&str> {
    response
        .candidates
        .first()
        .and_then(|c| c.content.parts.first())
        .map(|p| p.text.as_str())
        .filter(|t| !t.is_empty())
}
