use duel_domain::{ItemChoice, Outcome, Selection, Username};

/// Decides a duel from the opponent's side: `Win` means the opponent won.
///
/// Rock beats scissors, scissors beats paper, paper beats rock.
#[must_use]
pub fn resolve(host: ItemChoice, opponent: ItemChoice) -> Outcome {
    if host == opponent {
        Outcome::Draw
    } else if beats(opponent, host) {
        Outcome::Win
    } else {
        Outcome::Loss
    }
}

fn beats(attacker: ItemChoice, defender: ItemChoice) -> bool {
    matches!(
        (attacker, defender),
        (ItemChoice::Rock, ItemChoice::Scissors)
            | (ItemChoice::Scissors, ItemChoice::Paper)
            | (ItemChoice::Paper, ItemChoice::Rock)
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: Outcome,
    pub winner: Option<Username>,
    pub loser: Option<Username>,
}

/// Resolves two played selections, naming winner and loser when decisive.
/// Returns `None` while either side has not chosen.
#[must_use]
pub fn resolve_selections(host: &Selection, opponent: &Selection) -> Option<Resolution> {
    let outcome = resolve(host.item_choice?, opponent.item_choice?);
    let (winner, loser) = match outcome {
        Outcome::Win => (
            Some(opponent.username.clone()),
            Some(host.username.clone()),
        ),
        Outcome::Loss => (
            Some(host.username.clone()),
            Some(opponent.username.clone()),
        ),
        Outcome::Draw => (None, None),
    };
    Some(Resolution {
        outcome,
        winner,
        loser,
    })
}
