// Mod-mail domain models.
//
// Ids are plain u64s; the Discord layer converts to and from serenity types.

use std::fmt;

/// Sent to a user the first time their DM opens a session.
pub const CONNECTED_ACK: &str = "✅ Connected to Mod Mail";

/// Sent to a user when staff close their thread.
pub const CLOSED_NOTICE: &str = "✅ Your Mod Mail has been closed by the support team.";

const THREAD_NAME_PREFIX: &str = "Mod Mail - ";
// Discord caps channel (and thread) names at 100 characters
const MAX_THREAD_NAME_LEN: usize = 100;
// Embed field values are capped at 1024 characters
const MAX_FIELD_LEN: usize = 1024;

/// Opaque reference to a staff-side thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadHandle(pub u64);

impl fmt::Display for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named permission an actor either holds or lacks.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageMessages,
    KickMembers,
    BanMembers,
    ModerateMembers,
    ManageChannels,
    Administrator,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::ManageMessages => write!(f, "manage-messages"),
            Capability::KickMembers => write!(f, "kick-members"),
            Capability::BanMembers => write!(f, "ban-members"),
            Capability::ModerateMembers => write!(f, "moderate-members"),
            Capability::ManageChannels => write!(f, "manage-channels"),
            Capability::Administrator => write!(f, "administrator"),
        }
    }
}

/// An inbound direct message from an end user.
#[derive(Debug, Clone)]
pub struct DirectMessage {
    pub user_id: u64,
    /// Username, used to name the thread.
    pub username: String,
    /// Display tag shown to staff.
    pub user_tag: String,
    pub content: String,
    pub attachment_urls: Vec<String>,
}

/// A message posted inside a guild thread.
#[derive(Debug, Clone)]
pub struct ThreadMessage {
    pub thread_id: u64,
    pub parent_id: Option<u64>,
    pub author_id: u64,
    pub content: String,
}

/// A `close` invocation and where it happened.
#[derive(Debug, Clone)]
pub struct CloseRequest {
    pub channel_id: u64,
    /// Whether the invoking channel is a thread at all.
    pub in_thread: bool,
    pub parent_id: Option<u64>,
    pub actor_id: u64,
}

/// What gets posted into a thread for each relayed DM.
#[derive(Debug, Clone, PartialEq)]
pub struct ModmailEntry {
    pub user_id: u64,
    pub user_tag: String,
    pub content: String,
    pub attachment_urls: Vec<String>,
}

impl ModmailEntry {
    /// "tag (id)" as shown in the User field.
    pub fn user_field(&self) -> String {
        format!("{} ({})", self.user_tag, self.user_id)
    }

    /// Message body plus attachment links, never empty and within the
    /// embed field limit.
    pub fn message_field(&self) -> String {
        let mut body = if self.content.trim().is_empty() {
            "*(no text content)*".to_string()
        } else {
            self.content.clone()
        };

        for url in &self.attachment_urls {
            body.push_str("\n📎 ");
            body.push_str(url);
        }

        truncate_chars(&body, MAX_FIELD_LEN)
    }
}

impl From<&DirectMessage> for ModmailEntry {
    fn from(message: &DirectMessage) -> Self {
        Self {
            user_id: message.user_id,
            user_tag: message.user_tag.clone(),
            content: message.content.clone(),
            attachment_urls: message.attachment_urls.clone(),
        }
    }
}

/// What the relay did with an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Sender is blocked; nothing happened and nothing was said.
    Dropped,
    /// A new session was opened and the message forwarded.
    Opened { thread: ThreadHandle },
    /// Forwarded into an existing session.
    Forwarded { thread: ThreadHandle },
    /// Staff reply delivered to the session's user.
    Replied { user_id: u64 },
    /// Not something the relay handles.
    Ignored,
}

/// A session that was just torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedSession {
    pub user_id: u64,
    pub thread: ThreadHandle,
}

/// Thread name for a user's session.
pub fn thread_name(username: &str) -> String {
    truncate_chars(
        &format!("{}{}", THREAD_NAME_PREFIX, username),
        MAX_THREAD_NAME_LEN,
    )
}

/// DM text for a staff reply.
pub fn support_reply(content: &str) -> String {
    format!("💬 **Support Agent:** {}", content)
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let mut truncated: String = text.chars().take(max - 1).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_name() {
        assert_eq!(thread_name("alice"), "Mod Mail - alice");

        let long = "x".repeat(200);
        assert_eq!(thread_name(&long).chars().count(), 100);
    }

    #[test]
    fn test_support_reply_format() {
        assert_eq!(support_reply("hello"), "💬 **Support Agent:** hello");
    }

    #[test]
    fn test_message_field_placeholder_and_attachments() {
        let entry = ModmailEntry {
            user_id: 1,
            user_tag: "alice".to_string(),
            content: String::new(),
            attachment_urls: vec!["https://cdn.example/a.png".to_string()],
        };

        assert_eq!(
            entry.message_field(),
            "*(no text content)*\n📎 https://cdn.example/a.png"
        );
        assert_eq!(entry.user_field(), "alice (1)");
    }

    #[test]
    fn test_message_field_is_capped() {
        let entry = ModmailEntry {
            user_id: 1,
            user_tag: "alice".to_string(),
            content: "é".repeat(3000),
            attachment_urls: Vec::new(),
        };

        assert_eq!(entry.message_field().chars().count(), 1024);
    }
}
