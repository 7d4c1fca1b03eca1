use duel_domain::{Cents, Match, MatchStatus, MoneyError, Role};
use ledger_store::DocumentStore;

use crate::{MatchField, MatchRepository, MatchStoreError};

/// Lifetime record of one player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerStats {
    pub wins: usize,
    pub draws: usize,
    pub losses: usize,
    /// Sum of the counterpart's stake over won matches.
    pub total_won: Cents,
    /// Sum of own stake over lost matches.
    pub total_lost: Cents,
}

impl PlayerStats {
    pub fn tally(
        player: &str,
        won: &[Match],
        lost: &[Match],
        drawn: &[Match],
    ) -> Result<Self, MoneyError> {
        let mut stats = Self {
            wins: won.len(),
            losses: lost.len(),
            draws: drawn.iter().filter(|m| m.is_participant(player)).count(),
            ..Self::default()
        };
        for m in won {
            let own = own_bet(m, player);
            stats.total_won = stats.total_won.checked_add(m.bet_amount.checked_sub(own)?)?;
        }
        for m in lost {
            stats.total_lost = stats.total_lost.checked_add(own_bet(m, player))?;
        }
        Ok(stats)
    }
}

fn own_bet(m: &Match, player: &str) -> Cents {
    match m.role_of(player) {
        Some(Role::Host) => m.host.bet,
        Some(Role::Opponent) => m.opponent.bet,
        None => Cents::ZERO,
    }
}

impl<S> MatchRepository<S>
where
    S: DocumentStore,
{
    pub async fn player_stats(&self, player: &str) -> Result<PlayerStats, MatchStoreError> {
        let won = self.query_by(MatchField::Winner, player).await?;
        let lost = self.query_by(MatchField::Loser, player).await?;
        let drawn = self
            .query_by(MatchField::Status, MatchStatus::Draw.as_str())
            .await?;
        Ok(PlayerStats::tally(player, &won, &lost, &drawn)?)
    }
}
