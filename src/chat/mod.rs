// Chat module
// Per-session transcript and the question -> retrieval -> answer turn

pub mod render;


use std::num::NonZeroUsize;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::LegalError;
use crate::corpus::Article;
use crate::generation::{Answer, AnswerGenerator, AnswerKind};
use crate::retrieval::{ArticleSearch, RetrievedArticle};

pub use render::render_markdown;

/// Appended to every assistant message
pub const DISCLAIMER: &str = "\n\n---\n*إخلاء مسؤولية: هذه المعلومات للاسترشاد فقط ولا تعد استشارة قانونية. يجب استشارة محامٍ مختص.*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Outcome of one turn
#[derive(Debug, Clone)]
pub struct Reply {
    /// Assistant message as stored in the transcript, disclaimer included
    pub content: String,
    pub kind: AnswerKind,
    pub articles: Vec<RetrievedArticle>,
}

/// One user's conversation. Lives only as long as the session; nothing is persisted.
#[derive(Debug)]
pub struct ChatSession {
    id: Uuid,
    transcript: Vec<Message>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    #[inline]
    pub fn new() -> Self {
        let id = Uuid::new_v4();
        debug!("Started chat session {}", id);
        Self {
            id,
            transcript: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.transcript
    }

    /// Answer one question and append both sides of the exchange to the transcript.
    ///
    /// Never fails: a missing index counts as no matches, and any other
    /// retrieval failure is logged and answered with the service error sentence.
    #[inline]
    pub async fn ask(
        &mut self,
        question: &str,
        search: &dyn ArticleSearch,
        generator: &AnswerGenerator,
        k: NonZeroUsize,
    ) -> Reply {
        self.transcript.push(Message {
            role: Role::User,
            content: question.to_string(),
        });

        let (answer, articles) = match search.search(question, k).await {
            Ok(articles) => {
                let context: Vec<Article> =
                    articles.iter().map(|found| found.article.clone()).collect();
                (generator.generate(question, &context), articles)
            }
            Err(LegalError::NotReady) => {
                warn!("Index not loaded in session {}, answering without articles", self.id);
                (generator.generate(question, &[]), Vec::new())
            }
            Err(e) => {
                error!("Retrieval failed in session {}: {}", self.id, e);
                (Answer::service_error(), Vec::new())
            }
        };

        info!(
            "Session {} turn {}: {} articles, answer {:?}",
            self.id,
            self.transcript.len().div_ceil(2),
            articles.len(),
            answer.kind
        );

        let mut content = answer.text;
        content.push_str(DISCLAIMER);
        self.transcript.push(Message {
            role: Role::Assistant,
            content: content.clone(),
        });

        Reply {
            content,
            kind: answer.kind,
            articles,
        }
    }
}
