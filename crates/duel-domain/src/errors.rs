use thiserror::Error;

use crate::money::MoneyError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("illegal transition: {event} while match is {phase}")]
    IllegalTransition {
        phase: &'static str,
        event: &'static str,
    },
    #[error("player {0} is not a participant of this match")]
    NotParticipant(String),
    #[error("inconsistent match document: {0}")]
    InconsistentMatch(String),
    #[error("a player cannot challenge themselves")]
    SelfChallenge,
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("amount must be greater than zero")]
    ZeroAmount,
    #[error(transparent)]
    Money(#[from] MoneyError),
}
