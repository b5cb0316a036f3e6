// Moderation service - warnings, blocks and the argument rules behind
// the moderation slash commands.
//
// NO Discord dependencies here. The Discord layer extracts ids and
// attachments, calls in here, and turns the results into embeds.

use super::moderation_models::{
    IssuedWarning, ProofArtifact, RoleChange, WarningDraft, WarningRecord, MAX_PURGE_AMOUNT,
    MAX_TIMEOUT_MINUTES,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ModerationError {
    /// Required input missing or malformed. Nothing was changed.
    #[error("{0}")]
    ValidationError(String),

    /// Discord refused the action (role hierarchy, missing permission).
    /// The message is user-facing.
    #[error("{0}")]
    PermissionDenied(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Platform error: {0}")]
    PlatformError(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Durable warnings and mod-mail block list.
///
/// Every method is a single auto-committed statement.
#[async_trait]
pub trait ModerationStore: Send + Sync {
    /// Append a warning row.
    async fn record_warning(&self, record: WarningRecord) -> Result<(), ModerationError>;

    /// Reasons for a user in a guild, in insertion order.
    async fn list_warnings(&self, user_id: u64, guild_id: u64)
        -> Result<Vec<String>, ModerationError>;

    /// Delete every warning for a user in a guild. Deleting nothing is fine.
    async fn clear_warnings(&self, user_id: u64, guild_id: u64) -> Result<(), ModerationError>;

    /// Insert-or-ignore into the block list.
    async fn block_user(&self, user_id: u64) -> Result<(), ModerationError>;

    /// Remove from the block list if present.
    async fn unblock_user(&self, user_id: u64) -> Result<(), ModerationError>;

    async fn is_blocked(&self, user_id: u64) -> Result<bool, ModerationError>;
}

// ============================================================================
// ROLE TRAIT (PORT)
// ============================================================================

/// Grants and revokes the configured warning role.
#[async_trait]
pub trait WarningRoles: Send + Sync {
    async fn grant(
        &self,
        user_id: u64,
        guild_id: u64,
        audit_reason: &str,
    ) -> Result<RoleChange, ModerationError>;

    async fn revoke(
        &self,
        user_id: u64,
        guild_id: u64,
        audit_reason: &str,
    ) -> Result<RoleChange, ModerationError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct ModerationService<S: ModerationStore> {
    store: Arc<S>,
}

impl<S: ModerationStore> ModerationService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Check a warn invocation before anything is mutated.
    ///
    /// The Discord layer must call this before granting the warning role,
    /// so a rejected command leaves both the table and the roles untouched.
    pub fn prepare_warning(
        &self,
        reason: &str,
        proof: Option<&ProofArtifact>,
    ) -> Result<WarningDraft, ModerationError> {
        let proof = proof.ok_or_else(|| {
            ModerationError::ValidationError("You must attach an image as proof.".to_string())
        })?;

        if proof.size == 0 || proof.url.is_empty() {
            return Err(ModerationError::ValidationError(
                "The proof attachment is empty.".to_string(),
            ));
        }

        if !proof.is_image() {
            return Err(ModerationError::ValidationError(
                "The proof attachment must be an image.".to_string(),
            ));
        }

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ModerationError::ValidationError(
                "A reason is required.".to_string(),
            ));
        }

        Ok(WarningDraft {
            reason: reason.to_string(),
            proof_url: proof.url.clone(),
        })
    }

    /// Persist a validated warning and report its ordinal.
    ///
    /// The number is the length of the re-read list rather than a counter,
    /// so it always matches what is stored, even with concurrent warns.
    pub async fn commit_warning(
        &self,
        user_id: u64,
        guild_id: u64,
        draft: WarningDraft,
    ) -> Result<IssuedWarning, ModerationError> {
        self.store
            .record_warning(WarningRecord::new(user_id, guild_id, draft.reason.clone()))
            .await?;

        let number = self.store.list_warnings(user_id, guild_id).await?.len();

        tracing::info!(user_id, guild_id, number, "Warning recorded");

        Ok(IssuedWarning {
            number,
            reason: draft.reason,
            proof_url: draft.proof_url,
        })
    }

    /// Grant the warning role, then record the warning.
    ///
    /// A refused grant writes nothing. If the write fails after the role was
    /// granted, the grant is reverted so roles and rows stay in step.
    pub async fn warn<R: WarningRoles>(
        &self,
        roles: &R,
        user_id: u64,
        guild_id: u64,
        moderator: &str,
        draft: WarningDraft,
    ) -> Result<IssuedWarning, ModerationError> {
        let change = roles
            .grant(user_id, guild_id, &format!("Warned by {}", moderator))
            .await?;

        match self.commit_warning(user_id, guild_id, draft).await {
            Ok(issued) => Ok(issued),
            Err(e) => {
                if change == RoleChange::Applied {
                    tracing::error!(user_id, guild_id, "Warning not stored, reverting role: {}", e);
                    if let Err(revert) = roles
                        .revoke(user_id, guild_id, "Warning could not be recorded")
                        .await
                    {
                        tracing::error!(user_id, guild_id, "Failed to revert warning role: {}", revert);
                    }
                }
                Err(e)
            }
        }
    }

    /// Remove the warning role, then delete the user's warnings.
    ///
    /// Same ordering and rollback as `warn`, mirrored.
    pub async fn clear<R: WarningRoles>(
        &self,
        roles: &R,
        user_id: u64,
        guild_id: u64,
        moderator: &str,
    ) -> Result<RoleChange, ModerationError> {
        let change = roles
            .revoke(user_id, guild_id, &format!("Warnings cleared by {}", moderator))
            .await?;

        if let Err(e) = self.clear_warnings(user_id, guild_id).await {
            if change == RoleChange::Applied {
                tracing::error!(user_id, guild_id, "Warnings not cleared, restoring role: {}", e);
                if let Err(revert) = roles
                    .grant(user_id, guild_id, "Warnings could not be cleared")
                    .await
                {
                    tracing::error!(user_id, guild_id, "Failed to restore warning role: {}", revert);
                }
            }
            return Err(e);
        }

        Ok(change)
    }

    pub async fn list_warnings(
        &self,
        user_id: u64,
        guild_id: u64,
    ) -> Result<Vec<String>, ModerationError> {
        self.store.list_warnings(user_id, guild_id).await
    }

    pub async fn clear_warnings(&self, user_id: u64, guild_id: u64) -> Result<(), ModerationError> {
        self.store.clear_warnings(user_id, guild_id).await?;
        tracing::info!(user_id, guild_id, "Warnings cleared");
        Ok(())
    }

    /// Lift a mod-mail block. Blocking lives on the relay service because
    /// it also tears down the user's open session.
    pub async fn unblock_user(&self, user_id: u64) -> Result<(), ModerationError> {
        self.store.unblock_user(user_id).await?;
        tracing::info!(user_id, "User unblocked from mod mail");
        Ok(())
    }

    #[cfg(test)]
    pub async fn is_blocked(&self, user_id: u64) -> Result<bool, ModerationError> {
        self.store.is_blocked(user_id).await
    }
}

// ============================================================================
// ARGUMENT RULES
// ============================================================================

/// When a timeout of `minutes` started at `now` should end.
pub fn timeout_until(now: DateTime<Utc>, minutes: u64) -> Result<DateTime<Utc>, ModerationError> {
    if minutes == 0 || minutes > MAX_TIMEOUT_MINUTES {
        return Err(ModerationError::ValidationError(format!(
            "Timeout must be between 1 and {} minutes.",
            MAX_TIMEOUT_MINUTES
        )));
    }

    Ok(now + Duration::minutes(minutes as i64))
}

/// Validate a purge amount and narrow it to the size Discord expects.
pub fn purge_limit(amount: u64) -> Result<u8, ModerationError> {
    if amount == 0 || amount > MAX_PURGE_AMOUNT {
        return Err(ModerationError::ValidationError(format!(
            "Amount must be between 1 and {}.",
            MAX_PURGE_AMOUNT
        )));
    }

    Ok(amount as u8)
}

/// Numbered listing used by the `warnings` command.
pub fn format_warning_list(reasons: &[String]) -> String {
    if reasons.is_empty() {
        return "No warnings".to_string();
    }

    reasons
        .iter()
        .enumerate()
        .map(|(i, reason)| format!("{}. {}", i + 1, reason))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use dashmap::{DashMap, DashSet};
    use std::sync::Mutex;

    /// In-memory store for testing
    pub(crate) struct MockModerationStore {
        warnings: Mutex<Vec<WarningRecord>>,
        blocked: DashSet<u64>,
        fail_writes: bool,
        // user_id -> number of list calls, to check the recount
        list_calls: DashMap<u64, usize>,
    }

    impl MockModerationStore {
        pub(crate) fn new() -> Self {
            Self {
                warnings: Mutex::new(Vec::new()),
                blocked: DashSet::new(),
                fail_writes: false,
                list_calls: DashMap::new(),
            }
        }

        fn failing() -> Self {
            Self {
                fail_writes: true,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl ModerationStore for MockModerationStore {
        async fn record_warning(&self, record: WarningRecord) -> Result<(), ModerationError> {
            if self.fail_writes {
                return Err(ModerationError::StorageError("disk full".to_string()));
            }
            self.warnings.lock().unwrap().push(record);
            Ok(())
        }

        async fn list_warnings(
            &self,
            user_id: u64,
            guild_id: u64,
        ) -> Result<Vec<String>, ModerationError> {
            *self.list_calls.entry(user_id).or_insert(0) += 1;
            Ok(self
                .warnings
                .lock()
                .unwrap()
                .iter()
                .filter(|w| w.user_id == user_id && w.guild_id == guild_id)
                .map(|w| w.reason.clone())
                .collect())
        }

        async fn clear_warnings(&self, user_id: u64, guild_id: u64) -> Result<(), ModerationError> {
            if self.fail_writes {
                return Err(ModerationError::StorageError("disk full".to_string()));
            }
            self.warnings
                .lock()
                .unwrap()
                .retain(|w| !(w.user_id == user_id && w.guild_id == guild_id));
            Ok(())
        }

        async fn block_user(&self, user_id: u64) -> Result<(), ModerationError> {
            self.blocked.insert(user_id);
            Ok(())
        }

        async fn unblock_user(&self, user_id: u64) -> Result<(), ModerationError> {
            self.blocked.remove(&user_id);
            Ok(())
        }

        async fn is_blocked(&self, user_id: u64) -> Result<bool, ModerationError> {
            Ok(self.blocked.contains(&user_id))
        }
    }

    /// Records role calls; can refuse them or pretend the role is gone.
    #[derive(Default)]
    struct MockRoles {
        refuse: bool,
        missing: bool,
        calls: Mutex<Vec<(&'static str, u64, String)>>,
    }

    impl MockRoles {
        fn calls(&self) -> Vec<(&'static str, u64, String)> {
            self.calls.lock().unwrap().clone()
        }

        fn answer(&self, op: &'static str, user_id: u64, reason: &str) -> Result<RoleChange, ModerationError> {
            if self.refuse {
                return Err(ModerationError::PermissionDenied(
                    "I cannot assign the warning role.".to_string(),
                ));
            }
            if self.missing {
                return Ok(RoleChange::RoleMissing);
            }
            self.calls
                .lock()
                .unwrap()
                .push((op, user_id, reason.to_string()));
            Ok(RoleChange::Applied)
        }
    }

    #[async_trait]
    impl WarningRoles for MockRoles {
        async fn grant(
            &self,
            user_id: u64,
            _guild_id: u64,
            audit_reason: &str,
        ) -> Result<RoleChange, ModerationError> {
            self.answer("grant", user_id, audit_reason)
        }

        async fn revoke(
            &self,
            user_id: u64,
            _guild_id: u64,
            audit_reason: &str,
        ) -> Result<RoleChange, ModerationError> {
            self.answer("revoke", user_id, audit_reason)
        }
    }

    fn image_proof() -> ProofArtifact {
        ProofArtifact {
            url: "https://cdn.example/proof.png".to_string(),
            filename: "proof.png".to_string(),
            content_type: Some("image/png".to_string()),
            size: 2048,
        }
    }

    fn make_service() -> ModerationService<MockModerationStore> {
        ModerationService::new(Arc::new(MockModerationStore::new()))
    }

    #[test]
    fn test_missing_proof_is_rejected() {
        let service = make_service();

        let err = service.prepare_warning("spam", None).unwrap_err();
        assert!(matches!(err, ModerationError::ValidationError(_)));
        assert_eq!(err.to_string(), "You must attach an image as proof.");
    }

    #[test]
    fn test_non_image_proof_is_rejected() {
        let service = make_service();
        let proof = ProofArtifact {
            url: "https://cdn.example/log.txt".to_string(),
            filename: "log.txt".to_string(),
            content_type: Some("text/plain".to_string()),
            size: 10,
        };

        assert!(service.prepare_warning("spam", Some(&proof)).is_err());
    }

    #[test]
    fn test_empty_proof_is_rejected() {
        let service = make_service();
        let proof = ProofArtifact {
            size: 0,
            ..image_proof()
        };

        assert!(service.prepare_warning("spam", Some(&proof)).is_err());
    }

    #[test]
    fn test_proof_extension_fallback() {
        let proof = ProofArtifact {
            content_type: None,
            filename: "Screenshot.JPG".to_string(),
            ..image_proof()
        };
        assert!(proof.is_image());

        let proof = ProofArtifact {
            content_type: None,
            filename: "notes.pdf".to_string(),
            ..image_proof()
        };
        assert!(!proof.is_image());
    }

    #[test]
    fn test_blank_reason_is_rejected() {
        let service = make_service();
        assert!(service.prepare_warning("   ", Some(&image_proof())).is_err());
    }

    #[tokio::test]
    async fn test_third_warning_is_numbered_three() {
        let store = Arc::new(MockModerationStore::new());
        store
            .record_warning(WarningRecord::new(7, 1, "first"))
            .await
            .unwrap();
        store
            .record_warning(WarningRecord::new(7, 1, "second"))
            .await
            .unwrap();
        // Different guild must not count
        store
            .record_warning(WarningRecord::new(7, 2, "elsewhere"))
            .await
            .unwrap();

        let service = ModerationService::new(Arc::clone(&store));
        let draft = service.prepare_warning("spam", Some(&image_proof())).unwrap();
        let issued = service.commit_warning(7, 1, draft).await.unwrap();

        assert_eq!(issued.number, 3);
        assert_eq!(issued.reason, "spam");
        assert_eq!(issued.proof_url, "https://cdn.example/proof.png");
        assert_eq!(*store.list_calls.get(&7).unwrap(), 1);
        assert_eq!(
            service.list_warnings(7, 1).await.unwrap(),
            vec!["first", "second", "spam"]
        );
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let service = ModerationService::new(Arc::new(MockModerationStore::failing()));
        let draft = service.prepare_warning("spam", Some(&image_proof())).unwrap();

        let err = service.commit_warning(1, 1, draft).await.unwrap_err();
        assert!(matches!(err, ModerationError::StorageError(_)));
    }

    #[tokio::test]
    async fn test_clear_then_list_is_empty() {
        let service = make_service();
        for reason in ["a", "b"] {
            let draft = service.prepare_warning(reason, Some(&image_proof())).unwrap();
            service.commit_warning(3, 4, draft).await.unwrap();
        }

        service.clear_warnings(3, 4).await.unwrap();
        assert!(service.list_warnings(3, 4).await.unwrap().is_empty());

        // Clearing again is not an error
        service.clear_warnings(3, 4).await.unwrap();
    }

    #[tokio::test]
    async fn test_unblock() {
        let store = Arc::new(MockModerationStore::new());
        store.block_user(9).await.unwrap();

        let service = ModerationService::new(Arc::clone(&store));
        assert!(service.is_blocked(9).await.unwrap());
        service.unblock_user(9).await.unwrap();
        assert!(!service.is_blocked(9).await.unwrap());
    }

    #[tokio::test]
    async fn test_warn_grants_role_then_records() {
        let store = Arc::new(MockModerationStore::new());
        let service = ModerationService::new(Arc::clone(&store));
        let roles = MockRoles::default();

        for reason in ["first", "second", "third"] {
            let draft = service.prepare_warning(reason, Some(&image_proof())).unwrap();
            let issued = service.warn(&roles, 7, 1, "mod", draft).await.unwrap();
            assert_eq!(issued.reason, reason);
        }

        let draft = service.prepare_warning("fourth", Some(&image_proof())).unwrap();
        let issued = service.warn(&roles, 7, 1, "mod", draft).await.unwrap();
        assert_eq!(issued.title(), "⚠️ Warning #4");
        assert_eq!(roles.calls()[0], ("grant", 7, "Warned by mod".to_string()));
    }

    #[tokio::test]
    async fn test_refused_grant_records_nothing() {
        let store = Arc::new(MockModerationStore::new());
        let service = ModerationService::new(Arc::clone(&store));
        let roles = MockRoles {
            refuse: true,
            ..Default::default()
        };

        let draft = service.prepare_warning("spam", Some(&image_proof())).unwrap();
        let err = service.warn(&roles, 7, 1, "mod", draft).await.unwrap_err();

        assert!(matches!(err, ModerationError::PermissionDenied(_)));
        assert!(store.warnings.lock().unwrap().is_empty());
        assert!(store.list_calls.is_empty());
    }

    #[tokio::test]
    async fn test_missing_role_still_records_warning() {
        let service = make_service();
        let roles = MockRoles {
            missing: true,
            ..Default::default()
        };

        let draft = service.prepare_warning("spam", Some(&image_proof())).unwrap();
        let issued = service.warn(&roles, 7, 1, "mod", draft).await.unwrap();

        assert_eq!(issued.number, 1);
        assert!(roles.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_reverts_grant() {
        let service = ModerationService::new(Arc::new(MockModerationStore::failing()));
        let roles = MockRoles::default();

        let draft = service.prepare_warning("spam", Some(&image_proof())).unwrap();
        let err = service.warn(&roles, 7, 1, "mod", draft).await.unwrap_err();

        assert!(matches!(err, ModerationError::StorageError(_)));
        let ops: Vec<_> = roles.calls().into_iter().map(|(op, user, _)| (op, user)).collect();
        assert_eq!(ops, vec![("grant", 7), ("revoke", 7)]);
    }

    #[tokio::test]
    async fn test_clear_revokes_then_deletes() {
        let service = make_service();
        let roles = MockRoles::default();
        let draft = service.prepare_warning("spam", Some(&image_proof())).unwrap();
        service.warn(&roles, 7, 1, "mod", draft).await.unwrap();

        let change = service.clear(&roles, 7, 1, "admin").await.unwrap();

        assert_eq!(change, RoleChange::Applied);
        assert!(service.list_warnings(7, 1).await.unwrap().is_empty());
        assert_eq!(
            roles.calls().last().unwrap(),
            &("revoke", 7, "Warnings cleared by admin".to_string())
        );
    }

    #[tokio::test]
    async fn test_refused_revoke_keeps_warnings() {
        let store = Arc::new(MockModerationStore::new());
        store
            .record_warning(WarningRecord::new(7, 1, "spam"))
            .await
            .unwrap();
        let service = ModerationService::new(Arc::clone(&store));
        let roles = MockRoles {
            refuse: true,
            ..Default::default()
        };

        assert!(service.clear(&roles, 7, 1, "admin").await.is_err());
        assert_eq!(service.list_warnings(7, 1).await.unwrap(), vec!["spam"]);
    }

    #[tokio::test]
    async fn test_failed_clear_restores_role() {
        let service = ModerationService::new(Arc::new(MockModerationStore::failing()));
        let roles = MockRoles::default();

        let err = service.clear(&roles, 7, 1, "admin").await.unwrap_err();

        assert!(matches!(err, ModerationError::StorageError(_)));
        let ops: Vec<_> = roles.calls().into_iter().map(|(op, _, _)| op).collect();
        assert_eq!(ops, vec!["revoke", "grant"]);
    }

    #[test]
    fn test_timeout_bounds() {
        let now = Utc::now();

        assert!(timeout_until(now, 0).is_err());
        assert!(timeout_until(now, MAX_TIMEOUT_MINUTES + 1).is_err());
        assert_eq!(timeout_until(now, 15).unwrap(), now + Duration::minutes(15));
    }

    #[test]
    fn test_purge_limit_bounds() {
        assert!(purge_limit(0).is_err());
        assert!(purge_limit(101).is_err());
        assert_eq!(purge_limit(100).unwrap(), 100);
    }

    #[test]
    fn test_warning_list_formatting() {
        assert_eq!(format_warning_list(&[]), "No warnings");
        assert_eq!(
            format_warning_list(&["spam".to_string(), "raid".to_string()]),
            "1. spam\n2. raid"
        );
    }
}
