//! Application layer for histchat.
//!
//! Use cases that coordinate the domain traits: guest trial sessions
//! (`GuestSessionManager`), guest-to-user upgrade (`MigrationCoordinator`),
//! bounded context retrieval (`ContextResolver`) and the guest start throttle
//! (`StartThrottle`).

pub mod context_resolver;
pub mod guest_session_manager;
pub mod migration_coordinator;
pub mod start_throttle;

pub use context_resolver::ContextResolver;
pub use guest_session_manager::{
    AskRequest, AskResponse, GuestSessionManager, SessionStatus, StartedSession,
};
pub use migration_coordinator::{MigrationCoordinator, UpgradeOutcome};
pub use start_throttle::StartThrottle;
