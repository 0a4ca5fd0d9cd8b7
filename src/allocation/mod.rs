pub mod engine;
pub mod selector;
pub mod session;
pub mod types;

pub use engine::{AllocationEngine, AllocationService, Proposal};
pub use session::{AllocationSession, SessionState, SessionTracker};
pub use types::{ParticipantId, ScopeId, SortOrder};
