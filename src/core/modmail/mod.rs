// Core mod-mail module - the session registry and the DM <-> thread relay.
// No Discord types here; see discord/modmail for the serenity adapter.

pub mod modmail_models;
pub mod relay_service;
pub mod session_registry;

pub use modmail_models::*;
pub use relay_service::*;
pub use session_registry::*;
