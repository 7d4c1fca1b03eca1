pub mod account;
pub mod errors;
pub mod events;
pub mod game;
pub mod ids;
pub mod money;
pub mod wallet;

pub use account::Account;
pub use errors::DomainError;
pub use events::{NoticeOutcome, SettlementNotice};
pub use game::{Item, ItemChoice, Match, MatchStatus, Outcome, Role, Selection};
pub use ids::{MatchId, NodeId, TransactionId, Username};
pub use money::{Cents, MoneyError};
pub use wallet::{Balance, Transaction, TransactionKind};
