//! Pure duel rules: outcome resolution and the match lifecycle. No I/O.

mod resolver;
mod state;

pub use resolver::{Resolution, resolve, resolve_selections};
pub use state::{MatchEvent, MatchPhase, Transition, apply, mark_host_notified};
