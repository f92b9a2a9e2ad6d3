
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::GenerationError;
use super::prompt::Prompt;
use crate::config::{GenerationConfig, GenerationProvider};

/// A hosted language model that turns a prompt into free text
pub trait ChatModel: Send + Sync {
    fn complete(&self, prompt: &Prompt) -> Result<String, GenerationError>;
}

/// Blocking client for the hosted answer model. One attempt per request.
#[derive(Clone)]
pub struct HostedModelClient {
    provider: GenerationProvider,
    endpoint: Url,
    model: String,
    api_key: String,
    max_tokens: u32,
    agent: ureq::Agent,
}

impl fmt::Debug for HostedModelClient {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostedModelClient")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct TextGenerationRequest<'a> {
    inputs: &'a str,
    parameters: TextGenerationParameters,
}

#[derive(Debug, Serialize)]
struct TextGenerationParameters {
    max_new_tokens: u32,
    return_full_text: bool,
    do_sample: bool,
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}

impl HostedModelClient {
    /// Build a client, reading the bearer token from the variable named by `api_key_env`
    #[inline]
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let api_key = config
            .api_key()
            .ok_or_else(|| GenerationError::MissingApiKey(config.api_key_env.clone()))?;

        Self::with_api_key(config, api_key)
    }

    #[inline]
    pub fn with_api_key(config: &GenerationConfig, api_key: String) -> Result<Self, GenerationError> {
        let endpoint = config.endpoint_url()?;
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            provider: config.provider,
            endpoint,
            model: config.model.clone(),
            api_key,
            max_tokens: config.max_tokens,
            agent,
        })
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let body = match self.provider {
            GenerationProvider::OpenaiCompatible => serde_json::to_string(&ChatCompletionRequest {
                model: &self.model,
                messages: [
                    ChatMessage {
                        role: "system",
                        content: &prompt.system,
                    },
                    ChatMessage {
                        role: "user",
                        content: &prompt.user,
                    },
                ],
                temperature: 0.0,
                max_tokens: self.max_tokens,
            }),
            GenerationProvider::HuggingFace => {
                let inputs = prompt.to_turn_format();
                serde_json::to_string(&TextGenerationRequest {
                    inputs: &inputs,
                    parameters: TextGenerationParameters {
                        max_new_tokens: self.max_tokens,
                        return_full_text: false,
                        do_sample: false,
                    },
                })
            }
        };

        body.map_err(|e| GenerationError::InvalidResponse(format!("Failed to encode request: {}", e)))
    }

    fn post(&self, body: &str) -> Result<String, GenerationError> {
        debug!(
            "Posting {} request to {} (model {})",
            self.provider.as_str(),
            self.endpoint,
            self.model
        );

        self.agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send(body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|error| {
                warn!("Answer model request failed: {}", error);
                match error {
                    ureq::Error::StatusCode(status) => GenerationError::Status(status),
                    ureq::Error::Timeout(_) => GenerationError::Timeout,
                    other => GenerationError::Transport(other.to_string()),
                }
            })
    }

    fn parse_response(&self, response_text: &str) -> Result<String, GenerationError> {
        let text = match self.provider {
            GenerationProvider::OpenaiCompatible => {
                let response: ChatCompletionResponse = serde_json::from_str(response_text)
                    .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
                response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .ok_or(GenerationError::EmptyResponse)?
            }
            GenerationProvider::HuggingFace => {
                let response: Vec<GeneratedText> = serde_json::from_str(response_text)
                    .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
                response
                    .into_iter()
                    .next()
                    .map(|generated| generated.generated_text.trim().to_string())
                    .ok_or(GenerationError::EmptyResponse)?
            }
        };

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text)
    }
}

impl ChatModel for HostedModelClient {
    #[inline]
    fn complete(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let body = self.request_body(prompt)?;
        let response_text = self.post(&body)?;
        let text = self.parse_response(&response_text)?;

        debug!("Answer model returned {} characters", text.chars().count());
        Ok(text)
    }
}
