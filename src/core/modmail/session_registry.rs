// In-memory registry of open mod-mail sessions.
//
// Sessions live only as long as the process. A restart leaves the threads
// open on Discord, but they are no longer routable.

use super::modmail_models::ThreadHandle;
use super::relay_service::ModmailError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Bidirectional user <-> thread map.
///
/// Both directions are kept so reverse lookup is O(1). Writers always lock
/// `by_user` before `by_thread`, which keeps the two maps in step.
pub struct SessionRegistry {
    by_user: DashMap<u64, ThreadHandle>,
    by_thread: DashMap<ThreadHandle, u64>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            by_user: DashMap::new(),
            by_thread: DashMap::new(),
        }
    }

    /// The open thread for a user, if any.
    pub fn get(&self, user_id: u64) -> Option<ThreadHandle> {
        self.by_user.get(&user_id).map(|entry| *entry)
    }

    /// Bind a user to a thread.
    ///
    /// Fails if the user already has a session or the thread already
    /// belongs to someone else.
    pub fn open(&self, user_id: u64, thread: ThreadHandle) -> Result<(), ModmailError> {
        match self.by_user.entry(user_id) {
            Entry::Occupied(_) => Err(ModmailError::AlreadyOpen(user_id)),
            Entry::Vacant(slot) => {
                match self.by_thread.entry(thread) {
                    Entry::Occupied(_) => return Err(ModmailError::ThreadInUse(thread)),
                    Entry::Vacant(reverse) => {
                        reverse.insert(user_id);
                    }
                }
                slot.insert(thread);
                Ok(())
            }
        }
    }

    /// Unbind a user, returning the thread they had.
    pub fn close(&self, user_id: u64) -> Option<ThreadHandle> {
        let (_, thread) = self.by_user.remove(&user_id)?;
        self.by_thread.remove(&thread);
        Some(thread)
    }

    /// Which user a thread belongs to.
    pub fn find_user_by_thread(&self, thread: ThreadHandle) -> Option<u64> {
        self.by_thread.get(&thread).map(|entry| *entry)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.by_user.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_get_close() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.get(1), None);

        registry.open(1, ThreadHandle(100)).unwrap();
        assert_eq!(registry.get(1), Some(ThreadHandle(100)));
        assert_eq!(registry.find_user_by_thread(ThreadHandle(100)), Some(1));

        assert_eq!(registry.close(1), Some(ThreadHandle(100)));
        assert_eq!(registry.get(1), None);
        assert_eq!(registry.find_user_by_thread(ThreadHandle(100)), None);

        // Closing twice is harmless
        assert_eq!(registry.close(1), None);
    }

    #[test]
    fn test_second_open_for_same_user_fails() {
        let registry = SessionRegistry::new();
        registry.open(1, ThreadHandle(100)).unwrap();

        let err = registry.open(1, ThreadHandle(200)).unwrap_err();
        assert!(matches!(err, ModmailError::AlreadyOpen(1)));

        // Original binding untouched, and the rejected thread never registered
        assert_eq!(registry.get(1), Some(ThreadHandle(100)));
        assert_eq!(registry.find_user_by_thread(ThreadHandle(200)), None);
    }

    #[test]
    fn test_thread_cannot_be_shared() {
        let registry = SessionRegistry::new();
        registry.open(1, ThreadHandle(100)).unwrap();

        let err = registry.open(2, ThreadHandle(100)).unwrap_err();
        assert!(matches!(err, ModmailError::ThreadInUse(ThreadHandle(100))));
        assert_eq!(registry.get(2), None);
        assert_eq!(registry.find_user_by_thread(ThreadHandle(100)), Some(1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reopen_after_close() {
        let registry = SessionRegistry::new();
        registry.open(1, ThreadHandle(100)).unwrap();
        registry.close(1);

        registry.open(1, ThreadHandle(101)).unwrap();
        assert_eq!(registry.get(1), Some(ThreadHandle(101)));
        assert_eq!(registry.find_user_by_thread(ThreadHandle(100)), None);
    }
}
