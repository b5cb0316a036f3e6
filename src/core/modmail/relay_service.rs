// Mod-mail relay - routes user DMs into staff threads and staff replies
// back to the user.
//
// Per user there are two states: no session, or a session bound to one
// thread. A DM from an unblocked user opens a session; `close` or `block`
// ends it. Everything that touches Discord goes through `ModmailPlatform`,
// so this module can be driven entirely from tests.

use super::modmail_models::{
    support_reply, thread_name, Capability, ClosedSession, CloseRequest, DirectMessage,
    ModmailEntry, RelayOutcome, ThreadHandle, ThreadMessage, CLOSED_NOTICE, CONNECTED_ACK,
};
use super::session_registry::SessionRegistry;
use crate::core::moderation::{ModerationError, ModerationStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ModmailError {
    #[error("User {0} already has an open mod mail session")]
    AlreadyOpen(u64),

    #[error("Thread {0} is already bound to another user")]
    ThreadInUse(ThreadHandle),

    /// Command used outside the context it needs. The message is user-facing.
    #[error("{0}")]
    NotFound(&'static str),

    #[error("Missing the {0} permission")]
    Permission(Capability),

    #[error(transparent)]
    Store(#[from] ModerationError),

    #[error("Platform error: {0}")]
    Platform(String),
}

// ============================================================================
// PLATFORM TRAIT (PORT)
// ============================================================================

/// The chat-platform operations the relay needs.
#[async_trait]
pub trait ModmailPlatform: Send + Sync {
    /// Create a thread under `parent_id` and return its handle.
    async fn create_thread(&self, parent_id: u64, name: &str)
        -> Result<ThreadHandle, ModmailError>;

    /// Post a relayed DM into a thread.
    async fn post_entry(&self, thread: ThreadHandle, entry: &ModmailEntry)
        -> Result<(), ModmailError>;

    /// Send a direct message to a user.
    async fn send_direct(&self, user_id: u64, content: &str) -> Result<(), ModmailError>;

    /// Archive and lock a thread.
    async fn archive_thread(&self, thread: ThreadHandle) -> Result<(), ModmailError>;

    /// Whether an actor holds a capability.
    async fn has_capability(
        &self,
        actor_id: u64,
        capability: Capability,
    ) -> Result<bool, ModmailError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct RelayService<S: ModerationStore> {
    store: Arc<S>,
    sessions: SessionRegistry,
    staff_channel_id: u64,
    /// Single-flight guard per user. Held across the block check, session
    /// creation and forwarding so two DMs can't both open a thread.
    user_locks: DashMap<u64, Arc<Mutex<()>>>,
}

impl<S: ModerationStore> RelayService<S> {
    pub fn new(store: Arc<S>, staff_channel_id: u64) -> Self {
        Self {
            store,
            sessions: SessionRegistry::new(),
            staff_channel_id,
            user_locks: DashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Cheap pre-filter for guild messages: is this channel a live session?
    pub fn is_session_thread(&self, channel_id: u64) -> bool {
        self.sessions
            .find_user_by_thread(ThreadHandle(channel_id))
            .is_some()
    }

    /// Handle a DM from an end user.
    pub async fn handle_direct_message<P: ModmailPlatform>(
        &self,
        platform: &P,
        message: DirectMessage,
    ) -> Result<RelayOutcome, ModmailError> {
        let user_id = message.user_id;
        let lock = self.user_lock(user_id);
        let guard = lock.lock().await;

        let result = self.relay_direct(platform, &message).await;

        drop(guard);
        drop(lock);
        self.release_user_lock(user_id);
        result
    }

    async fn relay_direct<P: ModmailPlatform>(
        &self,
        platform: &P,
        message: &DirectMessage,
    ) -> Result<RelayOutcome, ModmailError> {
        let user_id = message.user_id;

        if self.store.is_blocked(user_id).await? {
            // Stay silent so the user can't tell they are blocked
            tracing::debug!(user_id, "Dropped mod mail from blocked user");
            return Ok(RelayOutcome::Dropped);
        }

        let (thread, opened) = match self.sessions.get(user_id) {
            Some(thread) => (thread, false),
            None => {
                let thread = platform
                    .create_thread(self.staff_channel_id, &thread_name(&message.username))
                    .await?;
                self.sessions.open(user_id, thread)?;
                tracing::info!(user_id, thread_id = thread.0, "Mod mail session opened");

                platform.send_direct(user_id, CONNECTED_ACK).await?;
                (thread, true)
            }
        };

        platform
            .post_entry(thread, &ModmailEntry::from(message))
            .await?;

        if opened {
            Ok(RelayOutcome::Opened { thread })
        } else {
            Ok(RelayOutcome::Forwarded { thread })
        }
    }

    /// Handle a message posted in a guild thread. Only staff replies in a
    /// registered session thread are relayed; everything else is ignored.
    pub async fn handle_thread_message<P: ModmailPlatform>(
        &self,
        platform: &P,
        message: ThreadMessage,
    ) -> Result<RelayOutcome, ModmailError> {
        if message.parent_id != Some(self.staff_channel_id) {
            return Ok(RelayOutcome::Ignored);
        }

        let Some(user_id) = self
            .sessions
            .find_user_by_thread(ThreadHandle(message.thread_id))
        else {
            return Ok(RelayOutcome::Ignored);
        };

        if !platform
            .has_capability(message.author_id, Capability::ManageMessages)
            .await?
        {
            return Ok(RelayOutcome::Ignored);
        }

        platform
            .send_direct(user_id, &support_reply(&message.content))
            .await?;

        tracing::debug!(
            user_id,
            thread_id = message.thread_id,
            staff_id = message.author_id,
            "Relayed staff reply"
        );
        Ok(RelayOutcome::Replied { user_id })
    }

    /// Close the session bound to the invoking thread.
    pub async fn close_session<P: ModmailPlatform>(
        &self,
        platform: &P,
        request: CloseRequest,
    ) -> Result<ClosedSession, ModmailError> {
        if !request.in_thread || request.parent_id != Some(self.staff_channel_id) {
            return Err(ModmailError::NotFound(
                "This command can only be used in a Mod Mail thread.",
            ));
        }

        if !platform
            .has_capability(request.actor_id, Capability::ManageMessages)
            .await?
        {
            return Err(ModmailError::Permission(Capability::ManageMessages));
        }

        let thread = ThreadHandle(request.channel_id);
        let not_linked = ModmailError::NotFound("This thread is not linked to a Mod Mail session.");
        let Some(user_id) = self.sessions.find_user_by_thread(thread) else {
            return Err(not_linked);
        };

        let lock = self.user_lock(user_id);
        let guard = lock.lock().await;

        // Re-check under the lock; a block may have won the race
        let result = match self.sessions.get(user_id) {
            Some(current) if current == thread => {
                self.sessions.close(user_id);
                Ok(ClosedSession { user_id, thread })
            }
            _ => Err(not_linked),
        };

        drop(guard);
        drop(lock);
        self.release_user_lock(user_id);
        let closed = result?;

        tracing::info!(
            user_id,
            thread_id = thread.0,
            staff_id = request.actor_id,
            "Mod mail session closed"
        );

        if let Err(e) = platform.send_direct(user_id, CLOSED_NOTICE).await {
            // The user may have DMs disabled; the thread still gets archived
            tracing::warn!(user_id, "Failed to send close notice: {}", e);
        }

        platform.archive_thread(thread).await?;
        Ok(closed)
    }

    /// Block a user from mod mail and tear down any open session.
    ///
    /// The user is never notified. Returns the thread that was closed.
    pub async fn block_user<P: ModmailPlatform>(
        &self,
        platform: &P,
        user_id: u64,
    ) -> Result<Option<ThreadHandle>, ModmailError> {
        let lock = self.user_lock(user_id);
        let guard = lock.lock().await;

        let result = self.block_locked(user_id).await;

        drop(guard);
        drop(lock);
        self.release_user_lock(user_id);

        let closed = result?;
        tracing::info!(user_id, had_session = closed.is_some(), "User blocked from mod mail");

        if let Some(thread) = closed {
            platform.archive_thread(thread).await?;
        }
        Ok(closed)
    }

    async fn block_locked(&self, user_id: u64) -> Result<Option<ThreadHandle>, ModmailError> {
        self.store.block_user(user_id).await?;
        Ok(self.sessions.close(user_id))
    }

    fn user_lock(&self, user_id: u64) -> Arc<Mutex<()>> {
        Arc::clone(
            &self
                .user_locks
                .entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Drop the lock entry once nobody else is holding or waiting on it.
    fn release_user_lock(&self, user_id: u64) {
        self.user_locks
            .remove_if(&user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

// ============================================================================
// TESTS
// ============================================================================
