use crate::allocation::ScopeId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("no reward role resolvable for scope {0}")]
    NoEligibleRole(ScopeId),

    #[error("no eligible members in scope {0}")]
    NoEligibleMembers(ScopeId),

    #[error("a proposal is already awaiting confirmation in scope {0}")]
    SessionAlreadyActive(ScopeId),

    #[error("no proposal awaiting confirmation in scope {0}")]
    NoActiveSession(ScopeId),

    #[error("the proposal in scope {0} expired before confirmation")]
    SessionExpired(ScopeId),

    #[error("invalid requested count: {0}")]
    InvalidCount(String),

    #[error("counter store write failed: {0}")]
    StoreWrite(#[from] std::io::Error),

    #[error("counter snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AllocationError>;
