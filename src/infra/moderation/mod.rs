// Moderation infrastructure - SQLite storage for warnings and blocks

mod sqlite_moderation_store;

pub use sqlite_moderation_store::SqliteModerationStore;
