use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::ids::{MatchId, Username};
use crate::money::Cents;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemChoice {
    Rock,
    Paper,
    Scissors,
}

impl ItemChoice {
    pub const ALL: [Self; 3] = [Self::Rock, Self::Paper, Self::Scissors];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rock => "rock",
            Self::Paper => "paper",
            Self::Scissors => "scissors",
        }
    }

    /// Catalog id the item is stored under.
    #[must_use]
    pub fn catalog_id(self) -> u8 {
        match self {
            Self::Rock => 1,
            Self::Paper => 2,
            Self::Scissors => 3,
        }
    }
}

impl fmt::Display for ItemChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemChoice {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "rock" => Ok(Self::Rock),
            "paper" => Ok(Self::Paper),
            "scissors" => Ok(Self::Scissors),
            other => Err(format!("unknown item {other:?}")),
        }
    }
}

/// Result of a duel seen from the opponent, who is the second player to act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl Outcome {
    /// The same result seen from the other side of the table.
    #[must_use]
    pub fn reversed(self) -> Self {
        match self {
            Self::Win => Self::Loss,
            Self::Loss => Self::Win,
            Self::Draw => Self::Draw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Declined,
    Draw,
    Completed,
}

impl MatchStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Declined => "declined",
            Self::Draw => "draw",
            Self::Completed => "completed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Host,
    Opponent,
}

/// One side of a match. Field names follow the documents already stored by peers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(rename = "Username", default)]
    pub username: Username,
    #[serde(rename = "ItemName", default, with = "blank_as_none")]
    pub item_choice: Option<ItemChoice>,
    #[serde(rename = "Bet", default)]
    pub bet: Cents,
}

impl Selection {
    #[must_use]
    pub fn new(username: impl Into<Username>) -> Self {
        Self {
            username: username.into(),
            item_choice: None,
            bet: Cents::ZERO,
        }
    }

    #[must_use]
    pub fn has_played(&self) -> bool {
        self.item_choice.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    #[serde(rename = "_id")]
    pub id: MatchId,
    pub status: MatchStatus,
    #[serde(default)]
    pub bet_amount: Cents,
    pub host: Selection,
    pub opponent: Selection,
    #[serde(default, with = "blank_as_none")]
    pub winner: Option<Username>,
    #[serde(default, with = "blank_as_none")]
    pub loser: Option<Username>,
    #[serde(default)]
    pub host_notified: bool,
}

impl Match {
    /// A fresh challenge from `host` to `opponent`.
    pub fn challenge(
        host: impl Into<Username>,
        opponent: impl Into<Username>,
    ) -> Result<Self, DomainError> {
        let host = host.into();
        let opponent = opponent.into();
        if host.is_empty() || opponent.is_empty() {
            return Err(DomainError::EmptyUsername);
        }
        if host == opponent {
            return Err(DomainError::SelfChallenge);
        }
        Ok(Self {
            id: MatchId::new(),
            status: MatchStatus::Pending,
            bet_amount: Cents::ZERO,
            host: Selection::new(host),
            opponent: Selection::new(opponent),
            winner: None,
            loser: None,
            host_notified: false,
        })
    }

    #[must_use]
    pub fn role_of(&self, username: &str) -> Option<Role> {
        if self.host.username == username {
            Some(Role::Host)
        } else if self.opponent.username == username {
            Some(Role::Opponent)
        } else {
            None
        }
    }

    #[must_use]
    pub fn selection(&self, role: Role) -> &Selection {
        match role {
            Role::Host => &self.host,
            Role::Opponent => &self.opponent,
        }
    }

    #[must_use]
    pub fn counterpart(&self, role: Role) -> &Username {
        match role {
            Role::Host => &self.opponent.username,
            Role::Opponent => &self.host.username,
        }
    }

    #[must_use]
    pub fn is_participant(&self, username: &str) -> bool {
        self.role_of(username).is_some()
    }

    /// The settled result for `role`, or `None` while the match is not decided.
    #[must_use]
    pub fn outcome_for(&self, role: Role) -> Option<Outcome> {
        let me = &self.selection(role).username;
        match self.status {
            MatchStatus::Draw => Some(Outcome::Draw),
            MatchStatus::Completed => match self.winner.as_ref() {
                Some(winner) if winner == me => Some(Outcome::Win),
                Some(_) => Some(Outcome::Loss),
                None => None,
            },
            MatchStatus::Pending | MatchStatus::Declined => None,
        }
    }
}

/// An entry of the playable item catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: ItemChoice,
    /// Base64 encoded jpeg.
    pub image: String,
}

mod blank_as_none {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse().map(Some).map_err(D::Error::custom)
    }
}
