use crate::config::{ModelConfig, Provider};
use crate::error::{Error, Result};
use async_openai::{
    self,
    config::OpenAIConfig,
    types::responses::{
        CreateResponseArgs, EasyInputMessageArgs, InputItem, InputParam, OutputItem,
        OutputMessageContent, Role,
    },
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// A generative model that answers a prompt with raw text.
#[async_trait(?Send)]
pub trait Generator {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Sampling knobs; kept low so repeated calls land close to each other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.8,
            top_k: 40,
        }
    }
}

impl From<&ModelConfig> for Sampling {
    fn from(config: &ModelConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
        }
    }
}

pub fn build_generator(config: &ModelConfig) -> Box<dyn Generator> {
    let sampling = Sampling::from(config);
    match config.provider {
        Provider::Gemini => Box::new(GeminiClient::new(
            config.api_key.clone(),
            config.name.clone(),
            config.base_url.clone().unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            sampling,
        )),
        Provider::OpenAi => Box::new(OpenAiClient::new(
            &config.api_key,
            config.name.clone(),
            config.base_url.as_deref(),
            sampling,
        )),
    }
}

// -- Gemini

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    sampling: Sampling,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        sampling: Sampling,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            sampling,
        }
    }
}

#[async_trait(?Send)]
impl Generator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.sampling.temperature,
                top_p: self.sampling.top_p,
                top_k: self.sampling.top_k,
            },
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (code, message) = serde_json::from_str::<GeminiErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), body));

            tracing::error!(code, message = %message, "Gemini API error");
            return Err(Error::custom(format!("Gemini API error {code}: {message}")));
        }

        let body: GenerateContentResponse = response.json().await?;

        // First candidate only; a blocked prompt comes back with none.
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        Ok(text)
    }
}

// -- OpenAI

#[derive(Clone)]
pub struct OpenAiClient {
    client: async_openai::Client<OpenAIConfig>,
    model: String,
    sampling: Sampling,
}

impl OpenAiClient {
    pub fn new(api_key: &str, model: String, base_url: Option<&str>, sampling: Sampling) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = base_url {
            config = config.with_api_base(base);
        }

        Self {
            client: async_openai::Client::with_config(config),
            model,
            sampling,
        }
    }
}

#[async_trait(?Send)]
impl Generator for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        // The Responses API has no top_k; temperature and top_p carry over.
        let request = CreateResponseArgs::default()
            .model(self.model.as_str())
            .temperature(self.sampling.temperature)
            .top_p(self.sampling.top_p)
            .input(InputParam::Items(vec![InputItem::EasyMessage(
                EasyInputMessageArgs::default()
                    .role(Role::User)
                    .content(prompt)
                    .build()?,
            )]))
            .build()?;

        let response = self.client.responses().create(request).await?;

        let mut content = String::new();
        for output in response.output {
            if let OutputItem::Message(out) = output {
                for c in out.content {
                    match c {
                        OutputMessageContent::OutputText(text) => content.push_str(&text.text),
                        _ => {
                            tracing::debug!(content = ?c, "ignoring non-text output");
                            continue;
                        }
                    }
                }
            }
        }

        Ok(content)
    }
}
