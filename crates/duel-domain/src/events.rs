use serde::{Deserialize, Serialize};

use crate::game::{Outcome, Role};
use crate::ids::{MatchId, Username};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeOutcome {
    Win,
    Loss,
    Draw,
    ChallengeCreated,
}

impl From<Outcome> for NoticeOutcome {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Win => Self::Win,
            Outcome::Loss => Self::Loss,
            Outcome::Draw => Self::Draw,
        }
    }
}

/// User-visible settlement result, surfaced once per recipient per match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementNotice {
    pub match_id: MatchId,
    pub recipient: Username,
    pub recipient_role: Role,
    pub outcome: NoticeOutcome,
    pub opponent_username: Username,
}

impl SettlementNotice {
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self.outcome {
            NoticeOutcome::Win => "Congrats",
            NoticeOutcome::Loss => "Try again",
            NoticeOutcome::Draw => "A tie",
            NoticeOutcome::ChallengeCreated => "Success",
        }
    }

    #[must_use]
    pub fn body(&self) -> String {
        let opponent = &self.opponent_username;
        match self.outcome {
            NoticeOutcome::Win => format!("You won your match with {opponent}"),
            NoticeOutcome::Loss => format!("You lost your match with {opponent}"),
            NoticeOutcome::Draw => {
                format!("Your match with {opponent} ended in a draw. Bets refunded.")
            }
            NoticeOutcome::ChallengeCreated => format!("Challenge sent to {opponent}."),
        }
    }
}
