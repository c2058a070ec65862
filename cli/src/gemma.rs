use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use reqwest::multipart::{Form, Part as FormPart};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use larder_core::assistant::{
    Assistant, ImageInput, OfflineAssistant, finish_recipes, finish_recognition,
};
use larder_core::gemma::{
    DEFAULT_API_BASE, DEFAULT_MODEL, FileData, GenerateRequest, GenerationConfig, InlineData,
    MAX_UPLOAD_BYTES, Part, UploadedFile, interpret_recipes, interpret_recognition,
    parse_upload_response, pick_cuisine, recipe_prompt, recognition_prompt,
};
use larder_core::models::RecognitionResult;
use larder_core::photo::to_base64;

#[derive(Debug, Error)]
pub enum GemmaError {
    #[error("no AI backend configured (set GOOGLE_API_KEY or LARDER_AI_PROXY)")]
    NotConfigured,
    #[error("image is empty")]
    EmptyImage,
    #[error("image is {0} bytes, the upload limit is 20 MB")]
    ImageTooLarge(usize),
    #[error("failed to reach the AI service: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("AI service returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("upload response did not include a file uri")]
    MissingFileUri,
}

/// Where requests go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Straight to the generative-language API with our own key.
    Direct { api_key: String },
    /// Through a `larder serve` proxy that injects the key.
    Proxy { url: String },
    Offline,
}

#[derive(Debug, Clone)]
pub struct GemmaSettings {
    pub api_key: Option<String>,
    pub proxy_url: Option<String>,
    pub api_base: String,
    pub model: String,
}

impl Default for GemmaSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            proxy_url: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl GemmaSettings {
    /// A key takes precedence over a proxy.
    #[must_use]
    pub fn backend(&self) -> Backend {
        fn non_empty(s: &Option<String>) -> Option<&str> {
            s.as_deref().map(str::trim).filter(|s| !s.is_empty())
        }
        if let Some(key) = non_empty(&self.api_key) {
            Backend::Direct {
                api_key: key.to_string(),
            }
        } else if let Some(url) = non_empty(&self.proxy_url) {
            Backend::Proxy {
                url: url.trim_end_matches('/').to_string(),
            }
        } else {
            Backend::Offline
        }
    }
}

pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(format!(
            "larder/{} (food inventory)",
            env!("CARGO_PKG_VERSION")
        ))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
}

pub struct GemmaClient {
    client: reqwest::Client,
    backend: Backend,
    api_base: String,
    model: String,
    rng: Mutex<StdRng>,
    offline: OfflineAssistant,
}

impl GemmaClient {
    pub fn new(settings: &GemmaSettings) -> Result<Self, GemmaError> {
        Ok(Self {
            client: http_client(Duration::from_secs(60))?,
            backend: settings.backend(),
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            rng: Mutex::new(StdRng::from_os_rng()),
            offline: OfflineAssistant::new(),
        })
    }

    #[must_use]
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate_url(&self) -> String {
        match &self.backend {
            Backend::Proxy { url } => format!("{url}/api/gemma"),
            _ => format!("{}/models/{}:generateContent", self.api_base, self.model),
        }
    }

    /// Send a generateContent request and return the raw JSON reply.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<Value, GemmaError> {
        let mut builder = self.client.post(self.generate_url()).json(request);
        match &self.backend {
            Backend::Direct { api_key } => builder = builder.query(&[("key", api_key)]),
            Backend::Proxy { .. } => {}
            Backend::Offline => return Err(GemmaError::NotConfigured),
        }
        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GemmaError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }

    /// Upload an image to the files API. Only available with a direct key.
    pub async fn upload(&self, image: &ImageInput) -> Result<UploadedFile, GemmaError> {
        check_upload_size(image)?;
        let Backend::Direct { api_key } = &self.backend else {
            return Err(GemmaError::NotConfigured);
        };
        let part = FormPart::bytes(image.bytes.clone())
            .file_name("food-image")
            .mime_str(&image.mime_type)?;
        let form = Form::new().part("file", part);
        let resp = self
            .client
            .post(format!("{}/files", self.api_base))
            .query(&[("key", api_key)])
            .header("X-Goog-Upload-Protocol", "multipart")
            .multipart(form)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GemmaError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let value: Value = resp.json().await?;
        parse_upload_response(&value, &image.mime_type).ok_or(GemmaError::MissingFileUri)
    }

    /// Reference the image by uploaded file when possible, inline otherwise.
    async fn image_part(&self, image: &ImageInput) -> Result<Part, GemmaError> {
        check_upload_size(image)?;
        if matches!(self.backend, Backend::Direct { .. }) {
            match self.upload(image).await {
                Ok(file) => {
                    debug!(uri = %file.uri, "uploaded image");
                    return Ok(Part::FileData(FileData {
                        mime_type: file.mime_type,
                        file_uri: file.uri,
                    }));
                }
                Err(e) => warn!(error = %e, "image upload failed, sending inline data"),
            }
        }
        Ok(Part::InlineData(InlineData {
            mime_type: image.mime_type.clone(),
            data: to_base64(&image.bytes),
        }))
    }

    async fn try_recognize(&self, image: Option<&ImageInput>) -> Result<Value, GemmaError> {
        let mut request =
            GenerateRequest::text(&recognition_prompt(image.is_some()), GenerationConfig::STANDARD);
        if let Some(image) = image {
            request = request.with_part(self.image_part(image).await?);
        }
        self.generate(&request).await
    }

    /// Check that the backend answers at all.
    pub async fn ping(&self) -> Result<(), GemmaError> {
        self.generate(&GenerateRequest::ping()).await.map(|_| ())
    }

    fn lock_rng(&self) -> std::sync::MutexGuard<'_, StdRng> {
        self.rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn check_upload_size(image: &ImageInput) -> Result<(), GemmaError> {
    if image.bytes.is_empty() {
        return Err(GemmaError::EmptyImage);
    }
    if image.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(GemmaError::ImageTooLarge(image.bytes.len()));
    }
    Ok(())
}

impl Assistant for GemmaClient {
    async fn recognize_food(&self, image: Option<&ImageInput>) -> RecognitionResult {
        if self.backend == Backend::Offline {
            return self.offline.recognize_food(image).await;
        }
        let started = Instant::now();
        let reply = match self.try_recognize(image).await {
            Ok(value) => interpret_recognition(&value),
            Err(e) => {
                warn!(error = %e, "food recognition failed");
                None
            }
        };
        finish_recognition(reply, started)
    }

    async fn recommend_recipes(&self, ingredients: &[String]) -> Vec<String> {
        if self.backend == Backend::Offline {
            return self.offline.recommend_recipes(ingredients).await;
        }
        let cuisine = pick_cuisine(&mut *self.lock_rng());
        let request =
            GenerateRequest::text(&recipe_prompt(ingredients, cuisine), GenerationConfig::STANDARD);
        let reply = match self.generate(&request).await {
            Ok(value) => interpret_recipes(&value),
            Err(e) => {
                warn!(error = %e, "recipe generation failed");
                None
            }
        };
        finish_recipes(reply, ingredients, &mut *self.lock_rng())
    }
}
