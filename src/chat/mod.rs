
pub mod memory;

use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, warn};

use crate::index::SearchHit;
use crate::providers::{ChatMessage, LanguageModel, Role};
use crate::retriever::Retriever;
use crate::{PdfChatError, Result};

pub use memory::MemoryBuffer;

/// Characters of chunk text quoted in a source reference
const PREVIEW_CHARS: usize = 120;

const CONDENSE_PROMPT: &str = "Rewrite the user's follow-up question as a single \
standalone question that can be understood without the conversation. Resolve \
pronouns and references like \"that\" or \"the second one\" using the \
conversation. Reply with only the rewritten question.";

const ANSWER_PROMPT: &str = "You are answering questions about the user's PDF \
documents. Base your answer on the context excerpts below; when the context \
does not contain the answer, say so instead of guessing.";

/// One answered question: the model's reply plus the chunks it was grounded on
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerResult {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Citation for one retrieved chunk, in retrieval order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub file: String,
    pub page: String,
    pub preview: String,
}

/// The per-turn conversational state machine: condense the question using
/// memory, retrieve supporting chunks, generate a grounded answer, record
/// the turn.
///
/// `ask` takes `&mut self`, so one instance serves exactly one in-flight
/// turn at a time; callers issue questions sequentially.
pub struct ConversationEngine {
    retriever: Retriever,
    memory: MemoryBuffer,
    llm: Arc<dyn LanguageModel>,
}

impl ConversationEngine {
    #[inline]
    pub fn new(retriever: Retriever, memory: MemoryBuffer, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            retriever,
            memory,
            llm,
        }
    }

    /// Answer one question against the corpus and the conversation so far.
    ///
    /// Memory is written only after the model call succeeds, so a failed
    /// turn leaves the conversation context exactly as it was.
    #[inline]
    pub async fn ask(&mut self, question: &str) -> Result<AnswerResult> {
        debug!("Condensing question into a standalone query");
        let standalone = self.condense(question);

        debug!("Retrieving context for: {standalone}");
        let hits = self.retriever.retrieve(&standalone).await?;

        debug!("Generating answer from {} retrieved chunks", hits.len());
        let messages = self.grounded_messages(&hits, question);
        let answer = self
            .llm
            .complete(&messages)
            .map_err(|e| PdfChatError::Generation(format!("{e:#}")))?;

        debug!("Recording completed turn");
        self.memory.append(ChatMessage::user(question));
        self.memory.append(ChatMessage::assistant(answer.clone()));

        let sources = hits
            .iter()
            .map(|hit| SourceRef {
                file: hit.source_file.clone(),
                page: hit.page_label.clone(),
                preview: preview(&hit.text),
            })
            .collect();

        Ok(AnswerResult { answer, sources })
    }

    /// Rewrite a follow-up into a standalone search query using the
    /// conversation. The first question of a conversation is already
    /// standalone; a failed or empty rewrite falls back to the verbatim
    /// question, since condensation only sharpens retrieval.
    fn condense(&self, question: &str) -> String {
        if self.memory.is_empty() {
            return question.to_string();
        }

        let transcript = self
            .memory
            .all()
            .iter()
            .map(|turn| {
                let speaker = match turn.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                    Role::System => "System",
                };
                format!("{speaker}: {}", turn.content)
            })
            .join("\n");

        let messages = vec![
            ChatMessage::system(CONDENSE_PROMPT),
            ChatMessage::user(format!(
                "Conversation:\n{transcript}\n\nFollow-up question: {question}"
            )),
        ];

        match self.llm.complete(&messages) {
            Ok(rewritten) if !rewritten.trim().is_empty() => {
                let rewritten = rewritten.trim().to_string();
                debug!("Condensed follow-up to: {rewritten}");
                rewritten
            }
            Ok(_) => {
                warn!("Condense step returned an empty rewrite; using the question verbatim");
                question.to_string()
            }
            Err(e) => {
                warn!("Condense step failed ({e:#}); using the question verbatim");
                question.to_string()
            }
        }
    }

    /// System message with labeled context excerpts, then the conversation
    /// history, then the original question.
    fn grounded_messages(&self, hits: &[SearchHit], question: &str) -> Vec<ChatMessage> {
        let system = if hits.is_empty() {
            format!("{ANSWER_PROMPT}\n\nNo relevant context was found for this question.")
        } else {
            let context = hits
                .iter()
                .map(|hit| format!("[{}, page {}]\n{}", hit.source_file, hit.page_label, hit.text))
                .join("\n\n");
            format!("{ANSWER_PROMPT}\n\nContext:\n\n{context}")
        };

        let mut messages = Vec::with_capacity(self.memory.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend(self.memory.all());
        messages.push(ChatMessage::user(question));
        messages
    }

    /// Forget the conversation; the index and retriever are unaffected
    #[inline]
    pub fn clear_memory(&mut self) {
        self.memory.reset();
    }

    /// The retained conversation turns, oldest first
    #[inline]
    pub fn history(&self) -> Vec<ChatMessage> {
        self.memory.all()
    }

    #[inline]
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }
}

/// First ~120 characters of a chunk with whitespace runs collapsed to
/// single spaces. Truncation is by character, never mid code point.
fn preview(text: &str) -> String {
    let collapsed = text.split_whitespace().join(" ");
    if collapsed.chars().count() <= PREVIEW_CHARS {
        collapsed
    } else {
        let mut cut: String = collapsed.chars().take(PREVIEW_CHARS).collect();
        cut.push('…');
        cut
    }
}
