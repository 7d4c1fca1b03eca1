use duel_domain::{Cents, DomainError, ItemChoice, Match, MatchStatus, Username};

use crate::resolver::{Resolution, resolve_selections};

/// Explicit lifecycle of a match, derived from the persisted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPhase {
    AwaitingHost,
    AwaitingOpponent {
        host_choice: ItemChoice,
        host_bet: Cents,
    },
    Declined,
    Completed {
        winner: Username,
        loser: Username,
    },
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    HostPlayed { choice: ItemChoice, bet: Cents },
    OpponentPlayed { choice: ItemChoice, bet: Cents },
    Declined,
}

impl MatchEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::HostPlayed { .. } => "host_played",
            Self::OpponentPlayed { .. } => "opponent_played",
            Self::Declined => "declined",
        }
    }
}

/// Result of a legal transition: the full next document plus the outcome
/// when the transition settled the duel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: Match,
    pub resolution: Option<Resolution>,
}

impl MatchPhase {
    pub fn of(m: &Match) -> Result<Self, DomainError> {
        let inconsistent = |what: &str| DomainError::InconsistentMatch(format!("{}: {what}", m.id));
        let decided = m.winner.is_some() || m.loser.is_some();
        match m.status {
            MatchStatus::Pending => {
                if decided || m.host_notified {
                    return Err(inconsistent("pending match carries settlement fields"));
                }
                if m.opponent.has_played() {
                    return Err(inconsistent("opponent played but match still pending"));
                }
                match m.host.item_choice {
                    None => Ok(Self::AwaitingHost),
                    Some(host_choice) => {
                        if m.bet_amount != m.host.bet {
                            return Err(inconsistent("bet_amount differs from host bet"));
                        }
                        Ok(Self::AwaitingOpponent {
                            host_choice,
                            host_bet: m.host.bet,
                        })
                    }
                }
            }
            MatchStatus::Declined => {
                if decided || m.opponent.has_played() {
                    return Err(inconsistent("declined match carries a result"));
                }
                Ok(Self::Declined)
            }
            MatchStatus::Draw | MatchStatus::Completed => {
                if !(m.host.has_played() && m.opponent.has_played()) {
                    return Err(inconsistent("settled match is missing a choice"));
                }
                if m.bet_amount != m.host.bet.checked_add(m.opponent.bet)? {
                    return Err(inconsistent("bet_amount differs from sum of bets"));
                }
                if m.status == MatchStatus::Draw {
                    if decided {
                        return Err(inconsistent("draw names a winner"));
                    }
                    return Ok(Self::Draw);
                }
                match (&m.winner, &m.loser) {
                    (Some(winner), Some(loser))
                        if winner != loser && m.is_participant(winner) && m.is_participant(loser) =>
                    {
                        Ok(Self::Completed {
                            winner: winner.clone(),
                            loser: loser.clone(),
                        })
                    }
                    _ => Err(inconsistent("completed match without valid winner and loser")),
                }
            }
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AwaitingHost => "awaiting_host",
            Self::AwaitingOpponent { .. } => "awaiting_opponent",
            Self::Declined => "declined",
            Self::Completed { .. } => "completed",
            Self::Draw => "draw",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Declined | Self::Completed { .. } | Self::Draw)
    }
}

/// Applies `event` to `current`, rejecting every move the lifecycle forbids.
pub fn apply(current: &Match, event: MatchEvent) -> Result<Transition, DomainError> {
    let phase = MatchPhase::of(current)?;
    let illegal = || DomainError::IllegalTransition {
        phase: phase.name(),
        event: event.name(),
    };
    let mut next = current.clone();
    match (&phase, event) {
        (MatchPhase::AwaitingHost, MatchEvent::HostPlayed { choice, bet }) => {
            if bet.is_zero() {
                return Err(DomainError::ZeroAmount);
            }
            next.host.item_choice = Some(choice);
            next.host.bet = bet;
            next.bet_amount = bet;
            Ok(Transition {
                next,
                resolution: None,
            })
        }
        (MatchPhase::AwaitingOpponent { host_bet, .. }, MatchEvent::OpponentPlayed { choice, bet }) => {
            if bet.is_zero() {
                return Err(DomainError::ZeroAmount);
            }
            next.opponent.item_choice = Some(choice);
            next.opponent.bet = bet;
            next.bet_amount = host_bet.checked_add(bet)?;
            let resolution = resolve_selections(&next.host, &next.opponent).ok_or_else(illegal)?;
            next.status = if resolution.winner.is_some() {
                MatchStatus::Completed
            } else {
                MatchStatus::Draw
            };
            next.winner = resolution.winner.clone();
            next.loser = resolution.loser.clone();
            Ok(Transition {
                next,
                resolution: Some(resolution),
            })
        }
        (
            MatchPhase::AwaitingHost | MatchPhase::AwaitingOpponent { .. },
            MatchEvent::Declined,
        ) => {
            next.status = MatchStatus::Declined;
            Ok(Transition {
                next,
                resolution: None,
            })
        }
        _ => Err(illegal()),
    }
}

/// Flips `host_notified` on a settled match. `Ok(None)` means it was already set.
pub fn mark_host_notified(current: &Match) -> Result<Option<Match>, DomainError> {
    if !current.status.is_terminal() {
        return Err(DomainError::IllegalTransition {
            phase: MatchPhase::of(current)?.name(),
            event: "host_notified",
        });
    }
    if current.host_notified {
        return Ok(None);
    }
    let mut next = current.clone();
    next.host_notified = true;
    Ok(Some(next))
}
