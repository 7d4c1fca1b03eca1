mod engine;
mod notifier;

pub use engine::{PlayReport, SettlementEngine};
pub use notifier::{NoopNotifier, RecordingNotifier, SettlementNotifier};

use balance_ledger::BalanceLedgerError;
use duel_domain::{DomainError, Username};
use ledger_store::LedgerStoreError;
use match_store::MatchStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Ledger(#[from] BalanceLedgerError),
    #[error(transparent)]
    Matches(#[from] MatchStoreError),
    #[error("{0} has no funds, top up the wallet first")]
    EmptyWallet(Username),
}

/// How a failed user action is reported. Every kind is scoped to the action
/// that raised it; none leaves earlier persisted state altered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Serialization,
    TransientStore,
}

impl SettlementError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(DomainError::InconsistentMatch(_)) => ErrorKind::Serialization,
            Self::Domain(_) | Self::EmptyWallet(_) => ErrorKind::Validation,
            Self::Ledger(BalanceLedgerError::Store(err)) => store_error_kind(err),
            Self::Ledger(_) => ErrorKind::Validation,
            Self::Matches(MatchStoreError::NotFound(_)) => ErrorKind::NotFound,
            Self::Matches(MatchStoreError::Store(err)) => store_error_kind(err),
            Self::Matches(MatchStoreError::Money(_)) => ErrorKind::Validation,
        }
    }

    #[must_use]
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(
            self,
            Self::Ledger(BalanceLedgerError::InsufficientFunds { .. })
        )
    }
}

fn store_error_kind(err: &LedgerStoreError) -> ErrorKind {
    match err {
        LedgerStoreError::Serialization { .. } | LedgerStoreError::MissingKey { .. } => {
            ErrorKind::Serialization
        }
        LedgerStoreError::Transient(_) | LedgerStoreError::LockPoisoned => {
            ErrorKind::TransientStore
        }
    }
}
