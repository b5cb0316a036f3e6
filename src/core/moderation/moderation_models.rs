// Moderation domain models - warnings, blocks and proof artifacts.
//
// These are pure domain types with no Discord dependencies.
// The Discord layer converts attachments and members into these.

use chrono::{DateTime, Duration, Utc};

/// Longest timeout Discord accepts (28 days), in minutes.
pub const MAX_TIMEOUT_MINUTES: u64 = 28 * 24 * 60;

/// Discord's bulk-delete endpoint refuses more than 100 messages.
pub const MAX_PURGE_AMOUNT: u64 = 100;

/// Bulk delete also refuses messages older than two weeks.
pub const BULK_DELETE_MAX_AGE_DAYS: i64 = 14;

/// File extensions accepted as image proof when no content type is reported.
const IMAGE_EXTENSIONS: [&str; 5] = [".png", ".jpg", ".jpeg", ".gif", ".webp"];

/// A single warning row. Rows accumulate; there is no uniqueness per user.
#[derive(Debug, Clone, PartialEq)]
pub struct WarningRecord {
    pub user_id: u64,
    pub guild_id: u64,
    pub reason: String,
    /// When the warning was issued (UTC).
    pub time: DateTime<Utc>,
}

impl WarningRecord {
    pub fn new(user_id: u64, guild_id: u64, reason: impl Into<String>) -> Self {
        Self {
            user_id,
            guild_id,
            reason: reason.into(),
            time: Utc::now(),
        }
    }
}

/// An attachment offered as evidence for a warning.
#[derive(Debug, Clone, PartialEq)]
pub struct ProofArtifact {
    pub url: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub size: u32,
}

impl ProofArtifact {
    /// Whether the attachment looks like an image.
    ///
    /// Discord usually reports a MIME type; older uploads sometimes don't,
    /// so fall back to the file extension.
    pub fn is_image(&self) -> bool {
        if let Some(content_type) = &self.content_type {
            return content_type.starts_with("image/");
        }

        let name = self.filename.to_lowercase();
        IMAGE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
    }
}

/// A warning that passed validation but has not been written yet.
///
/// Holding one of these is the proof that the input was checked, so the
/// Discord layer can perform the role grant before anything is persisted.
#[derive(Debug, Clone)]
pub struct WarningDraft {
    pub reason: String,
    pub proof_url: String,
}

/// Result of a committed warning.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedWarning {
    /// Ordinal of this warning, computed from the persisted list.
    pub number: usize,
    pub reason: String,
    pub proof_url: String,
}

impl IssuedWarning {
    /// Embed title posted to the log channel.
    pub fn title(&self) -> String {
        format!("⚠️ Warning #{}", self.number)
    }
}

/// What happened to the warning role on a grant or revoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChange {
    Applied,
    /// The configured role no longer exists in the guild; nothing to do.
    RoleMissing,
}

/// Messages for a purge, split by how Discord lets us delete them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeBatch {
    /// Recent enough for one bulk-delete call (always two or more).
    pub bulk: Vec<u64>,
    /// Deleted one at a time.
    pub single: Vec<u64>,
}

impl PurgeBatch {
    /// Split `(message_id, sent_at)` pairs around the bulk-delete age limit.
    pub fn split(messages: &[(u64, DateTime<Utc>)], now: DateTime<Utc>) -> Self {
        let cutoff = now - Duration::days(BULK_DELETE_MAX_AGE_DAYS);

        let (mut bulk, mut single): (Vec<&(u64, DateTime<Utc>)>, Vec<&(u64, DateTime<Utc>)>) = messages
            .iter()
            .partition(|(_, sent_at)| *sent_at > cutoff);

        // Bulk delete wants at least two ids
        if bulk.len() < 2 {
            single.append(&mut bulk);
        }

        Self {
            bulk: bulk.into_iter().map(|(id, _)| *id).collect(),
            single: single.into_iter().map(|(id, _)| *id).collect(),
        }
    }

    pub fn total(&self) -> usize {
        self.bulk.len() + self.single.len()
    }
}
