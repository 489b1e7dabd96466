//! The digital agent: command dispatch, conversation bookkeeping,
//! prompt assembly, and translation of failures into chat messages.

pub mod commands;
pub mod history;

use crate::config::{
    Settings, CONVERSATION_CACHE_CAPACITY, CONVERSATION_TTL_SECS, MAX_EXTRACTED_CHARS,
};
use crate::documents::{DocumentError, DocumentProcessor};
use crate::llm::{LlmClient, LlmError, Message};
use chrono::Utc;
use commands::Command;
use history::{ConversationStore, Role, Turn};
use tracing::{error, warn};

/// Model input used when a document arrives without any message text
const ATTACHMENT_ONLY_PROMPT: &str =
    "Please analyze the attached document and summarize its key points.";

/// A file shared in chat, downloaded and ready for extraction
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// File name as declared by the platform
    pub name: String,
    /// Declared MIME type, if any
    pub content_type: Option<String>,
    /// Raw bytes (transient, never persisted)
    pub bytes: Vec<u8>,
}

/// Conversational agent bound to one model client and one history store
pub struct DigitalAgent {
    llm: LlmClient,
    documents: DocumentProcessor,
    store: ConversationStore,
    system_instructions: String,
    history_window: usize,
}

impl DigitalAgent {
    /// Build the agent from settings.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::MissingConfig`] if the model API key is
    /// absent.
    pub fn new(settings: &Settings) -> Result<Self, LlmError> {
        let llm = LlmClient::new(settings)?;
        let documents =
            DocumentProcessor::new(settings.max_file_size_bytes(), MAX_EXTRACTED_CHARS);
        let store = ConversationStore::new(
            settings.max_conversation_history,
            CONVERSATION_TTL_SECS,
            CONVERSATION_CACHE_CAPACITY,
        );
        Ok(Self::with_parts(llm, documents, store, settings))
    }

    /// Assemble an agent from prebuilt parts (test seam)
    #[must_use]
    pub fn with_parts(
        llm: LlmClient,
        documents: DocumentProcessor,
        store: ConversationStore,
        settings: &Settings,
    ) -> Self {
        Self {
            llm,
            documents,
            store,
            system_instructions: settings.system_instructions().to_string(),
            history_window: settings.history_window,
        }
    }

    /// Handle one inbound message and produce the reply text.
    ///
    /// Commands act locally and skip the model. Everything else is
    /// recorded as a user turn, decorated with extracted attachment
    /// text, and forwarded to the model; the assistant turn is only
    /// recorded on success.
    pub async fn handle(
        &self,
        conversation_id: &str,
        text: &str,
        attachments: &[UploadedFile],
    ) -> String {
        let trimmed = text.trim();

        if let Some(command) = Command::parse(trimmed) {
            return self.run_command(conversation_id, command).await;
        }

        if trimmed.is_empty() && attachments.is_empty() {
            return "Send me a message or share a document, and I'll do my best to help."
                .to_string();
        }

        // Window is taken before the new turn is recorded so the
        // current message reaches the model exactly once.
        let window = self.store.window(conversation_id, self.history_window).await;

        let mut user_turn = Turn::new(Role::User, trimmed);
        if let Some(first) = attachments.first() {
            user_turn = user_turn.with_attachment(first.name.clone());
        }
        self.store.append(conversation_id, user_turn).await;

        let (context_blocks, notes) = self.extract_attachments(attachments);

        if trimmed.is_empty() && context_blocks.is_empty() {
            // Nothing readable arrived; report the failures and stop.
            return notes.join("\n");
        }

        let mut model_input = String::new();
        if !context_blocks.is_empty() {
            model_input.push_str(&context_blocks.join("\n\n"));
            model_input.push_str("\n\n");
        }
        model_input.push_str(if trimmed.is_empty() {
            ATTACHMENT_ONLY_PROMPT
        } else {
            trimmed
        });

        let prompt_history: Vec<Message> = window
            .iter()
            .map(|turn| Message {
                role: turn.role.as_str().to_string(),
                content: turn.text.clone(),
            })
            .collect();

        match self
            .llm
            .chat_completion(&self.system_instructions, &prompt_history, &model_input)
            .await
        {
            Ok(reply) => {
                self.store
                    .append(conversation_id, Turn::new(Role::Assistant, reply.clone()))
                    .await;
                prepend_notes(&notes, reply)
            }
            Err(e) => {
                error!("Model request failed for {}: {}", conversation_id, e);
                prepend_notes(&notes, apology_for(&e))
            }
        }
    }

    /// Fixed greeting for members newly added to a conversation
    #[must_use]
    pub const fn welcome_message(&self) -> &'static str {
        commands::WELCOME_MESSAGE
    }

    async fn run_command(&self, conversation_id: &str, command: Command) -> String {
        match command {
            Command::Help => commands::HELP_MESSAGE.to_string(),
            Command::Clear => {
                self.store.clear(conversation_id).await;
                commands::CLEAR_MESSAGE.to_string()
            }
            Command::Status => self.status_message(),
        }
    }

    fn status_message(&self) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        format!(
            "🔍 **Digital Agent Status**\n\n\
             **AI Model:** ✅ {}\n\
             **Document Processor:** ✅ Ready\n\
             **Active Conversations:** {}\n\
             **Timestamp:** {timestamp}\n\n\
             **System:** All systems operational and ready to assist! 🚀",
            self.llm.model_id(),
            self.store.tracked_conversations(),
        )
    }

    /// Run every attachment through the document processor, splitting
    /// results into prompt context blocks and user-facing failure notes.
    fn extract_attachments(&self, attachments: &[UploadedFile]) -> (Vec<String>, Vec<String>) {
        let mut context_blocks = Vec::new();
        let mut notes = Vec::new();

        for file in attachments {
            match self
                .documents
                .extract(&file.name, file.content_type.as_deref(), &file.bytes)
            {
                Ok(extraction) => {
                    context_blocks.push(format!(
                        "--- Attached document: {} ---\n{}\n--- End of document ---",
                        file.name, extraction.text
                    ));
                }
                Err(e) => {
                    warn!("Document extraction failed for {}: {}", file.name, e);
                    notes.push(document_failure_note(&file.name, &e));
                }
            }
        }

        (context_blocks, notes)
    }
}

fn prepend_notes(notes: &[String], reply: String) -> String {
    if notes.is_empty() {
        reply
    } else {
        format!("{}\n\n{reply}", notes.join("\n"))
    }
}

/// Friendly message for a classified model failure
fn apology_for(error: &LlmError) -> String {
    match error {
        LlmError::RateLimited(_) => {
            "I'm receiving a lot of requests right now and hit my usage limit. \
             Please try again in a moment."
        }
        LlmError::AuthFailed(_) | LlmError::MissingConfig(_) => {
            "My connection to the AI service is misconfigured. \
             Please contact your administrator."
        }
        LlmError::Timeout(_) => "The AI service took too long to respond. Please try again.",
        LlmError::Api(_) | LlmError::Network(_) | LlmError::InvalidResponse(_) => {
            "Sorry, I'm having trouble connecting to my AI brain right now. \
             Please try again later."
        }
    }
    .to_string()
}

/// Chat message for a document that could not be processed
fn document_failure_note(file_name: &str, error: &DocumentError) -> String {
    match error {
        DocumentError::Unsupported { kind } => format!(
            "⚠️ I can't read **{file_name}** ({kind} is not a supported format). \
             I can process PDF, DOCX, XLSX, CSV, JSON and plain text files."
        ),
        DocumentError::TooLarge { size, limit } => {
            let to_mb = |bytes: usize| bytes as f64 / (1024.0 * 1024.0);
            format!(
                "⚠️ **{file_name}** is too large to process ({:.1} MB, limit {:.0} MB).",
                to_mb(*size),
                to_mb(*limit)
            )
        }
        DocumentError::Corrupt { .. } => format!(
            "⚠️ I couldn't extract any text from **{file_name}** - the file may be \
             corrupt or in an unexpected format."
        ),
    }
}
