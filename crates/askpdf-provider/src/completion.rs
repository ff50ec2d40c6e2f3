use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use askpdf_core::config::CompletionSettings;
use askpdf_core::traits::Completer;
use askpdf_core::{Error, Result};

use crate::http::HttpEndpoint;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// The fixed prompt shape: a system instruction confining the model to the
/// context, then the context and the question in one user turn.
pub fn build_messages(system_prompt: &str, context: &str, question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage { role: "system", content: system_prompt.to_string() },
        ChatMessage { role: "user", content: format!("{context}\n\nQuestion: {question}") },
    ]
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCompleter {
    endpoint: HttpEndpoint,
    model: String,
    temperature: f32,
    max_tokens: u32,
    system_prompt: String,
    id: String,
}

impl OpenAiCompleter {
    pub fn new(settings: &CompletionSettings) -> Result<Self> {
        let api_key = settings.resolve_api_key();
        if api_key.is_none() && settings.base_url.contains("api.openai.com") {
            return Err(Error::InvalidConfig(format!(
                "{} environment variable is not set",
                settings.api_key_env
            )));
        }
        let endpoint = HttpEndpoint::new("openai-chat", &settings.base_url, api_key, settings.timeout_secs)?;
        Ok(Self {
            endpoint,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            system_prompt: settings.system_prompt.clone(),
            id: format!("openai:{}", settings.model),
        })
    }
}

#[async_trait]
impl Completer for OpenAiCompleter {
    fn completer_id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, context: &str, question: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: build_messages(&self.system_prompt, context, question),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let response: ChatResponse = self.endpoint.post_json("chat/completions", &body).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::provider(self.endpoint.provider(), "completion returned no content"))
    }
}
