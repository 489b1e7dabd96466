//! Bot Framework activity envelope.
//!
//! Serde mapping of the subset of the wire schema this service reads
//! and writes; unknown fields are ignored on input and `None` fields
//! are omitted on output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Activity type for chat messages
pub const ACTIVITY_TYPE_MESSAGE: &str = "message";
/// Activity type for roster changes
pub const ACTIVITY_TYPE_CONVERSATION_UPDATE: &str = "conversationUpdate";

/// A user or bot account on the channel
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    /// Channel-scoped account id
    #[serde(default)]
    pub id: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The conversation an activity belongs to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    /// Channel-scoped conversation id
    #[serde(default)]
    pub id: String,
}

/// A file shared with a message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    /// Declared MIME type
    #[serde(default)]
    pub content_type: Option<String>,
    /// URL the file content can be fetched from
    #[serde(default)]
    pub content_url: Option<String>,
    /// File name
    #[serde(default)]
    pub name: Option<String>,
    /// Channel-specific payload; Teams puts a `downloadUrl` here
    #[serde(default)]
    pub content: Option<serde_json::Value>,
}

impl AttachmentRef {
    /// Best URL to download the file content from.
    ///
    /// Teams file attachments carry a pre-authenticated `downloadUrl`
    /// inside `content`; other channels use `contentUrl` directly.
    #[must_use]
    pub fn download_url(&self) -> Option<&str> {
        self.content
            .as_ref()
            .and_then(|c| c.get("downloadUrl"))
            .and_then(|u| u.as_str())
            .or(self.content_url.as_deref())
    }
}

/// One inbound or outbound chat message envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Activity type (`message`, `conversationUpdate`, ...)
    #[serde(rename = "type", default)]
    pub activity_type: String,
    /// Channel-assigned activity id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// When the activity was produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Connector endpoint replies must be posted to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    /// Originating channel (e.g. `msteams`, `emulator`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    /// Sender account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    /// Receiving account (the bot, on inbound activities)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    /// Conversation reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    /// Message text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Activity this one replies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    /// Accounts added to the conversation (`conversationUpdate`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members_added: Option<Vec<ChannelAccount>>,
    /// Files shared with the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<AttachmentRef>>,
}

impl Activity {
    /// Conversation id, falling back to the sender id so emulator
    /// payloads without a conversation still key a history.
    #[must_use]
    pub fn conversation_key(&self) -> Option<String> {
        self.conversation
            .as_ref()
            .map(|c| c.id.clone())
            .filter(|id| !id.is_empty())
            .or_else(|| {
                self.from
                    .as_ref()
                    .map(|f| f.id.clone())
                    .filter(|id| !id.is_empty())
            })
    }

    /// Build the reply activity for this one.
    ///
    /// Sender/recipient are swapped, the conversation is carried over,
    /// and a fresh id and timestamp are stamped.
    #[must_use]
    pub fn create_reply(&self, text: &str) -> Self {
        Self {
            activity_type: ACTIVITY_TYPE_MESSAGE.to_string(),
            id: Some(Uuid::new_v4().to_string()),
            timestamp: Some(Utc::now()),
            service_url: self.service_url.clone(),
            channel_id: self.channel_id.clone(),
            from: self.recipient.clone(),
            recipient: self.from.clone(),
            conversation: self.conversation.clone(),
            text: Some(text.to_string()),
            reply_to_id: self.id.clone(),
            members_added: None,
            attachments: None,
        }
    }
}
