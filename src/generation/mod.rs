// Generation module
// Prompt assembly, the hosted answer model and the answer contract

pub mod client;
pub mod prompt;

#[cfg(test)]
mod tests;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::ConfigError;
use crate::corpus::Article;

pub use client::{ChatModel, HostedModelClient};
pub use prompt::{Prompt, SYSTEM_INSTRUCTION};

/// The whole response when the articles do not answer the question
pub const ABSTENTION_SENTENCE: &str = "المعلومات المطلوبة غير متوفرة في المواد القانونية المقدمة.";
/// Returned without calling the model when retrieval found nothing
pub const NO_CONTEXT_SENTENCE: &str = "لم أتمكن من العثور على أي مواد قانونية ذات صلة بالسؤال.";
/// Shown to the user in place of any model failure
pub const SERVICE_ERROR_SENTENCE: &str = "حدث خطأ أثناء الاتصال بالخادم.";

pub const SUMMARY_MARKER: &str = "**الخلاصة:**";
pub const ANALYSIS_MARKER: &str = "**التحليل القانوني:**";
pub const CITED_ARTICLES_MARKER: &str = "**المواد المُستشهد بها:**";

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("Invalid generation config: {0}")]
    Config(#[from] ConfigError),

    #[error("Answer model returned HTTP {0}")]
    Status(u16),

    #[error("Answer model request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid answer model response: {0}")]
    InvalidResponse(String),

    #[error("Answer model returned no text")]
    EmptyResponse,
}

/// How an answer relates to the answer contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    /// Retrieval found nothing; the model was not called
    NoContext,
    /// The model replied with exactly the abstention sentence
    Abstained,
    /// All three section markers appear, in order
    Grounded,
    /// The model replied but ignored the required layout
    Unstructured,
    /// The model call failed
    ServiceError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub kind: AnswerKind,
}

impl Answer {
    #[inline]
    pub fn no_context() -> Self {
        Self {
            text: NO_CONTEXT_SENTENCE.to_string(),
            kind: AnswerKind::NoContext,
        }
    }

    #[inline]
    pub fn service_error() -> Self {
        Self {
            text: SERVICE_ERROR_SENTENCE.to_string(),
            kind: AnswerKind::ServiceError,
        }
    }

    /// Classify raw model output
    #[inline]
    pub fn from_model_output(text: String) -> Self {
        if text.trim() == ABSTENTION_SENTENCE {
            return Self {
                text: ABSTENTION_SENTENCE.to_string(),
                kind: AnswerKind::Abstained,
            };
        }

        let kind = if has_sections_in_order(&text) {
            AnswerKind::Grounded
        } else {
            AnswerKind::Unstructured
        };
        Self { text, kind }
    }
}

fn has_sections_in_order(text: &str) -> bool {
    let mut rest = text;
    for marker in [SUMMARY_MARKER, ANALYSIS_MARKER, CITED_ARTICLES_MARKER] {
        match rest.split_once(marker) {
            Some((_, after)) => rest = after,
            None => return false,
        }
    }
    true
}

/// Composes answers from retrieved articles through a [`ChatModel`]
pub struct AnswerGenerator {
    model: Box<dyn ChatModel>,
}

impl AnswerGenerator {
    #[inline]
    pub fn new(model: Box<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Answer `question` from `context` only.
    ///
    /// Never fails: an empty context and a model failure both become fixed
    /// sentences, and the failure cause goes to the log.
    #[inline]
    pub fn generate(&self, question: &str, context: &[Article]) -> Answer {
        if context.is_empty() {
            info!("No articles retrieved, answering without the model");
            return Answer::no_context();
        }

        let prompt = Prompt::build(question, context);
        debug!("Requesting answer grounded in {} articles", context.len());

        match self.model.complete(&prompt) {
            Ok(text) => {
                let answer = Answer::from_model_output(text);
                debug!("Answer classified as {:?}", answer.kind);
                answer
            }
            Err(e) => {
                error!("Answer generation failed: {}", e);
                Answer::service_error()
            }
        }
    }
}
