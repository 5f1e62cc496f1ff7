use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use nanoforge_contracts::{GenerationRequest, ModelTier, ReferenceImage};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::credentials::{non_empty_env, resolve_credential};
use crate::errors::{embedded_error, ApiError, GenerateError, OutputError};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const API_BASE_ENV: &str = "NANOFORGE_API_BASE";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Text parts longer than this with no space or newline are read as base64.
pub const TEXT_IMAGE_MIN_LEN: usize = 1000;

#[derive(Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub tier: ModelTier,
    pub base_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>, tier: ModelTier) -> Self {
        Self {
            api_key: api_key.into(),
            tier,
            base_url: DEFAULT_API_BASE.to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn from_env(tier: ModelTier) -> Result<Self, GenerateError> {
        let config = Self::new(resolve_credential()?, tier);
        Ok(match non_empty_env(API_BASE_ENV) {
            Some(base) => config.with_base_url(base),
            None => config,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"REDACTED")
            .field("tier", &self.tier)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedImage {
    InlineData(String),
    /// Best-effort fallback: some responses carry the image as a bare base64
    /// text part. Nothing in the provider contract guarantees this shape.
    TextEncoded(String),
    NotFound,
}

impl ExtractedImage {
    pub fn into_payload(self) -> Option<String> {
        match self {
            ExtractedImage::InlineData(data) | ExtractedImage::TextEncoded(data) => Some(data),
            ExtractedImage::NotFound => None,
        }
    }
}

pub struct ImageClient {
    config: ClientConfig,
    http: HttpClient,
}

impl ImageClient {
    pub fn new(config: ClientConfig) -> Result<Self, GenerateError> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .map_err(GenerateError::HttpClient)?;
        Ok(Self { config, http })
    }

    pub fn tier(&self) -> ModelTier {
        self.config.tier
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent",
            self.config.base_url,
            self.config.tier.model_id()
        )
    }

    pub fn generate(&self, request: &GenerationRequest) -> Result<String, GenerateError> {
        let payload = build_payload(request, self.config.tier)?;
        let endpoint = self.endpoint();
        debug!(
            url = %format!("{endpoint}?key=REDACTED"),
            tier = %self.config.tier,
            images = request.reference_images.len(),
            "sending generateContent request"
        );

        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&payload)
            .send()
            .map_err(GenerateError::Transport)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(GenerateError::Transport)?;
        debug!(status, body_len = body.len(), "received response");

        interpret_response(status, &body)
    }
}

/// Builds the `generateContent` body for `tier`, validating first so an
/// invalid request never reaches the network.
pub fn build_payload(request: &GenerationRequest, tier: ModelTier) -> Result<Value, GenerateError> {
    request.validate(tier)?;

    let mut parts = vec![json!({ "text": request.instruction })];
    for image in &request.reference_images {
        parts.push(inline_image_part(image));
    }

    let mut payload = Map::new();
    payload.insert(
        "contents".to_string(),
        Value::Array(vec![json!({
            "role": "user",
            "parts": parts,
        })]),
    );

    let mut image_config = Map::new();
    if let Some(aspect_ratio) = request.aspect_ratio {
        image_config.insert(
            "aspectRatio".to_string(),
            Value::String(aspect_ratio.as_str().to_string()),
        );
    }
    if let Some(image_size) = tier.spec().wire_image_size(request.resolution) {
        image_config.insert(
            "imageSize".to_string(),
            Value::String(image_size.as_str().to_string()),
        );
    }
    if !image_config.is_empty() {
        payload.insert(
            "generationConfig".to_string(),
            json!({ "imageConfig": Value::Object(image_config) }),
        );
    }

    Ok(Value::Object(payload))
}

fn inline_image_part(image: &ReferenceImage) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": BASE64.encode(&image.bytes),
        }
    })
}

pub fn interpret_response(status: u16, body: &str) -> Result<String, GenerateError> {
    if !(200..300).contains(&status) {
        return Err(ApiError::from_response_body(status, body).into());
    }
    let payload: Value = serde_json::from_str(body)?;
    if let Some((code, message)) = embedded_error(&payload) {
        return Err(ApiError::classify(code, message).into());
    }
    extract_image(&payload)
        .into_payload()
        .ok_or(GenerateError::NoImageData)
}

/// Scans `candidates[0].content.parts`: first for inline data, then for a
/// long whitespace-free text part.
pub fn extract_image(payload: &Value) -> ExtractedImage {
    let parts = payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let inline = parts.iter().find_map(|part| {
        part.get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(|inline| inline.get("data"))
            .and_then(Value::as_str)
            .filter(|data| !data.is_empty())
    });
    if let Some(data) = inline {
        return ExtractedImage::InlineData(data.to_string());
    }

    let text = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .find(|text| looks_like_base64_text(text));
    match text {
        Some(text) => ExtractedImage::TextEncoded(text.to_string()),
        None => ExtractedImage::NotFound,
    }
}

fn looks_like_base64_text(text: &str) -> bool {
    text.len() > TEXT_IMAGE_MIN_LEN && !text.contains(' ') && !text.contains('\n')
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

pub fn reference_image_from_path(path: &Path) -> Result<ReferenceImage, OutputError> {
    let bytes = fs::read(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => OutputError::MissingInput {
            path: path.to_path_buf(),
        },
        _ => OutputError::ReadInput {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let mime = mime_for_path(path).unwrap_or("image/png");
    Ok(ReferenceImage::new(mime, bytes))
}

#[cfg(test)]
mod tests {
    use nanoforge_contracts::{AspectRatio, RequestError, Resolution};

    use super::*;
    use crate::errors::ApiErrorKind;

    fn image_config(payload: &Value) -> Option<&Map<String, Value>> {
        payload
            .get("generationConfig")
            .and_then(|config| config.get("imageConfig"))
            .and_then(Value::as_object)
    }

    #[test]
    fn standard_tier_defaults_image_size_to_4k() -> anyhow::Result<()> {
        let payload = build_payload(&GenerationRequest::new("watercolor fox"), ModelTier::Standard)?;
        let config = image_config(&payload).ok_or_else(|| anyhow::anyhow!("no imageConfig"))?;
        assert_eq!(config.get("imageSize"), Some(&json!("4K")));
        assert!(config.get("aspectRatio").is_none());

        let explicit = GenerationRequest::new("fox")
            .with_resolution(Some(Resolution::TwoK))
            .with_aspect_ratio(Some(AspectRatio::Portrait9x16));
        let payload = build_payload(&explicit, ModelTier::Standard)?;
        let config = image_config(&payload).ok_or_else(|| anyhow::anyhow!("no imageConfig"))?;
        assert_eq!(config.get("imageSize"), Some(&json!("2K")));
        assert_eq!(config.get("aspectRatio"), Some(&json!("9:16")));
        Ok(())
    }

    #[test]
    fn frugal_payload_never_contains_image_size() -> anyhow::Result<()> {
        for resolution in [None, Some(Resolution::OneK)] {
            let request = GenerationRequest::new("fox")
                .with_resolution(resolution)
                .with_aspect_ratio(Some(AspectRatio::Square));
            let payload = build_payload(&request, ModelTier::Frugal)?;
            assert!(!payload.to_string().contains("imageSize"));
            let config = image_config(&payload).ok_or_else(|| anyhow::anyhow!("no imageConfig"))?;
            assert_eq!(config.get("aspectRatio"), Some(&json!("1:1")));
        }

        let bare = build_payload(&GenerationRequest::new("fox"), ModelTier::Frugal)?;
        assert!(bare.get("generationConfig").is_none());
        Ok(())
    }

    #[test]
    fn frugal_rejects_higher_resolution_before_dispatch() {
        let request = GenerationRequest::new("fox").with_resolution(Some(Resolution::FourK));
        let err = build_payload(&request, ModelTier::Frugal).unwrap_err();
        assert!(matches!(
            err,
            GenerateError::Request(RequestError::FrugalResolution { .. })
        ));
    }

    #[test]
    fn text_part_comes_first_then_images_in_order() -> anyhow::Result<()> {
        let request = GenerationRequest::new("merge these")
            .with_reference_image(ReferenceImage::png(vec![1]))
            .with_reference_image(ReferenceImage::new("image/jpeg", vec![2]));
        let payload = build_payload(&request, ModelTier::Standard)?;
        let parts = payload["contents"][0]["parts"]
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("parts missing"))?;
        assert_eq!(payload["contents"][0]["role"], json!("user"));
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["text"], json!("merge these"));
        assert_eq!(parts[1]["inlineData"]["mimeType"], json!("image/png"));
        assert_eq!(parts[1]["inlineData"]["data"], json!(BASE64.encode([1u8])));
        assert_eq!(parts[2]["inlineData"]["mimeType"], json!("image/jpeg"));
        Ok(())
    }

    #[test]
    fn inline_data_wins_over_text_fallback() {
        let long_text = "A".repeat(1500);
        let payload = json!({
            "candidates": [{"content": {"parts": [
                {"text": long_text},
                {"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}}
            ]}}]
        });
        assert_eq!(
            extract_image(&payload),
            ExtractedImage::InlineData("aGVsbG8=".to_string())
        );
    }

    #[test]
    fn snake_case_inline_data_is_accepted() {
        let payload = json!({
            "candidates": [{"content": {"parts": [
                {"inline_data": {"mime_type": "image/png", "data": "aGVsbG8="}}
            ]}}]
        });
        assert_eq!(
            extract_image(&payload),
            ExtractedImage::InlineData("aGVsbG8=".to_string())
        );
    }

    #[test]
    fn text_fallback_needs_length_and_no_space_or_newline() {
        let exact = "A".repeat(TEXT_IMAGE_MIN_LEN);
        let spaced = format!("{} {}", "A".repeat(800), "B".repeat(800));
        let wrapped = format!("{}\n{}", "A".repeat(800), "B".repeat(800));
        for text in [exact, spaced, wrapped] {
            let payload = json!({"candidates": [{"content": {"parts": [{"text": text}]}}]});
            assert_eq!(extract_image(&payload), ExtractedImage::NotFound);
        }

        let encoded = "Q".repeat(1500);
        let payload = json!({"candidates": [{"content": {"parts": [
            {"text": "Here is your image"},
            {"text": encoded.clone()}
        ]}}]});
        assert_eq!(extract_image(&payload), ExtractedImage::TextEncoded(encoded));
    }

    #[test]
    fn only_the_first_candidate_is_scanned() {
        let payload = json!({"candidates": [
            {"content": {"parts": [{"text": "refused"}]}},
            {"content": {"parts": [{"inlineData": {"data": "aGVsbG8="}}]}}
        ]});
        assert_eq!(extract_image(&payload), ExtractedImage::NotFound);
        assert_eq!(extract_image(&json!({})), ExtractedImage::NotFound);
    }

    #[test]
    fn interpret_response_classifies_failures() {
        let quota = json!({"error": {"code": 403, "message": "Quota exceeded", "status": "PERMISSION_DENIED"}});
        let err = interpret_response(403, &quota.to_string()).unwrap_err();
        assert_eq!(err.api_kind(), Some(ApiErrorKind::QuotaExceeded));

        let embedded = json!({"error": {"code": 400, "message": "Blocked for safety reasons"}});
        let err = interpret_response(200, &embedded.to_string()).unwrap_err();
        assert_eq!(err.api_kind(), Some(ApiErrorKind::SafetyRejected));

        let empty = json!({"candidates": [{"content": {"parts": [{"text": "no"}]}}]});
        assert!(matches!(
            interpret_response(200, &empty.to_string()),
            Err(GenerateError::NoImageData)
        ));
        assert!(matches!(
            interpret_response(200, "not json"),
            Err(GenerateError::InvalidResponse(_))
        ));
    }

    #[test]
    fn endpoint_uses_tier_model_and_trimmed_base() -> anyhow::Result<()> {
        let config =
            ClientConfig::new("secret", ModelTier::Frugal).with_base_url("http://127.0.0.1:9/models/");
        let client = ImageClient::new(config)?;
        assert_eq!(
            client.endpoint(),
            "http://127.0.0.1:9/models/gemini-2.5-flash-image:generateContent"
        );
        assert!(!format!("{:?}", client.config()).contains("secret"));
        Ok(())
    }

    #[test]
    fn missing_reference_file_is_reported_as_not_found() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("nope.png");
        assert!(matches!(
            reference_image_from_path(&missing),
            Err(OutputError::MissingInput { .. })
        ));

        let photo = dir.path().join("photo.JPG");
        fs::write(&photo, [0xffu8, 0xd8])?;
        let image = reference_image_from_path(&photo)?;
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.bytes, vec![0xff, 0xd8]);
        Ok(())
    }
}
