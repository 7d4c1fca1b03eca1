//! Challenge lifecycle, escrow and payout.
//!
//! Each client runs its own engine against the shared store. Writers are
//! confined so that only the acting participant touches a match document at a
//! time: the host writes it on challenge and on the host's own play, the
//! opponent on decline and on settlement, the host again when flipping
//! `host_notified`. Balances are read-check-write; the play path re-reads the
//! match after escrow and refunds if the match moved underneath it.

use balance_ledger::BalanceLedger;
use duel_domain::{
    Balance, Cents, DomainError, ItemChoice, Match, MatchId, NoticeOutcome, Outcome, Role,
    SettlementNotice, TransactionKind,
};
use duel_engine::{MatchEvent, MatchPhase, Resolution, Transition, apply, mark_host_notified};
use ledger_store::{DocumentStore, LedgerStore};
use match_store::MatchRepository;
use tracing::{debug, error, info, warn};

use crate::SettlementError;
use crate::notifier::SettlementNotifier;

/// What the acting player sees after a play went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayReport {
    pub match_doc: Match,
    pub role: Role,
    /// From the acting player's perspective; `None` until the duel is decided.
    pub outcome: Option<Outcome>,
    pub balance: Balance,
}

#[derive(Debug, Clone)]
pub struct SettlementEngine<S, N> {
    matches: MatchRepository<S>,
    ledger: BalanceLedger<S>,
    notifier: N,
}

impl<S, N> SettlementEngine<S, N>
where
    S: DocumentStore + Clone,
    N: SettlementNotifier,
{
    #[must_use]
    pub fn from_store(store: LedgerStore<S>, notifier: N) -> Self {
        Self::new(
            MatchRepository::new(store.clone()),
            BalanceLedger::new(store),
            notifier,
        )
    }
}

impl<S, N> SettlementEngine<S, N>
where
    S: DocumentStore,
    N: SettlementNotifier,
{
    #[must_use]
    pub fn new(matches: MatchRepository<S>, ledger: BalanceLedger<S>, notifier: N) -> Self {
        Self {
            matches,
            ledger,
            notifier,
        }
    }

    #[must_use]
    pub fn matches(&self) -> &MatchRepository<S> {
        &self.matches
    }

    #[must_use]
    pub fn ledger(&self) -> &BalanceLedger<S> {
        &self.ledger
    }

    pub async fn challenge(&self, host: &str, opponent: &str) -> Result<Match, SettlementError> {
        let m = Match::challenge(host, opponent)?;
        self.matches.create(&m).await?;
        info!(match_id = %m.id, host, opponent, "challenge created");
        Ok(m)
    }

    /// Validated read: the opponent may only accept a live challenge addressed to them.
    pub async fn accept(&self, match_id: MatchId, opponent: &str) -> Result<Match, SettlementError> {
        let m = self.matches.get_by_id(match_id).await?;
        require_role(&m, opponent, Role::Opponent)?;
        let phase = MatchPhase::of(&m)?;
        if phase.is_terminal() {
            return Err(DomainError::IllegalTransition {
                phase: phase.name(),
                event: "accepted",
            }
            .into());
        }
        debug!(match_id = %m.id, opponent, phase = phase.name(), "challenge accepted");
        Ok(m)
    }

    /// Opponent refuses the challenge. A host bet already in escrow is credited back.
    pub async fn decline(&self, match_id: MatchId, opponent: &str) -> Result<Match, SettlementError> {
        let current = self.matches.get_by_id(match_id).await?;
        require_role(&current, opponent, Role::Opponent)?;
        let Transition { next, .. } = apply(&current, MatchEvent::Declined)?;
        self.matches.upsert(&next).await?;
        info!(match_id = %next.id, opponent, "challenge declined");

        let host = &next.host;
        if host.has_played() && !host.bet.is_zero() {
            self.settle_credit(next.id, &host.username, host.bet).await?;
            info!(
                match_id = %next.id,
                host = %host.username,
                amount = host.bet.as_u64(),
                "host escrow refunded on decline"
            );
        }
        Ok(next)
    }

    /// Host or opponent commits a choice and bet. The role is taken from the
    /// match document, never from the caller.
    pub async fn play(
        &self,
        match_id: MatchId,
        player: &str,
        choice: ItemChoice,
        bet: Cents,
    ) -> Result<PlayReport, SettlementError> {
        let current = self.matches.get_by_id(match_id).await?;
        let role = current
            .role_of(player)
            .ok_or_else(|| DomainError::NotParticipant(player.to_string()))?;
        let event = match role {
            Role::Host => MatchEvent::HostPlayed { choice, bet },
            Role::Opponent => MatchEvent::OpponentPlayed { choice, bet },
        };
        // Nothing is written unless the move is legal on what we just read.
        apply(&current, event)?;

        match self.ledger.find_balance(player).await? {
            Some(balance) if !balance.amount.is_zero() => {}
            _ => return Err(SettlementError::EmptyWallet(player.to_string())),
        }
        let after_escrow = self.ledger.escrow(player, bet).await?;
        self.ledger
            .record_transaction_best_effort(player, TransactionKind::Debit, bet)
            .await;

        let transition = match self.recheck(match_id, event).await {
            Ok(transition) => transition,
            Err(err) => {
                self.refund_escrow(match_id, player, bet).await;
                return Err(err);
            }
        };
        if let Err(err) = self.matches.upsert(&transition.next).await {
            self.refund_escrow(match_id, player, bet).await;
            return Err(err.into());
        }
        info!(
            match_id = %match_id,
            player,
            role = ?role,
            choice = choice.as_str(),
            bet = bet.as_u64(),
            status = transition.next.status.as_str(),
            "play recorded"
        );

        let next = transition.next;
        match (role, transition.resolution) {
            (Role::Host, _) => {
                self.dispatch(SettlementNotice {
                    match_id,
                    recipient: next.host.username.clone(),
                    recipient_role: Role::Host,
                    outcome: NoticeOutcome::ChallengeCreated,
                    opponent_username: next.opponent.username.clone(),
                })
                .await;
                Ok(PlayReport {
                    match_doc: next,
                    role,
                    outcome: None,
                    balance: after_escrow,
                })
            }
            (Role::Opponent, Some(resolution)) => {
                self.pay_out(&next, &resolution).await?;
                self.dispatch(SettlementNotice {
                    match_id,
                    recipient: next.opponent.username.clone(),
                    recipient_role: Role::Opponent,
                    outcome: resolution.outcome.into(),
                    opponent_username: next.host.username.clone(),
                })
                .await;
                let balance = self.ledger.get_balance(player).await?;
                Ok(PlayReport {
                    match_doc: next,
                    role,
                    outcome: Some(resolution.outcome),
                    balance,
                })
            }
            (Role::Opponent, None) => Err(DomainError::InconsistentMatch(format!(
                "{match_id}: opponent play left the duel unresolved"
            ))
            .into()),
        }
    }

    /// Host-side poll. Every settled match hosted by `host` whose result was
    /// not yet surfaced gets its flag flipped, then one notice dispatched.
    /// Declined matches are flipped silently.
    pub async fn check_host_notifications(
        &self,
        host: &str,
    ) -> Result<Vec<SettlementNotice>, SettlementError> {
        let candidates = self.matches.hosted_by(host).await?;
        let mut delivered = Vec::new();
        for candidate in candidates {
            if !candidate.status.is_terminal() || candidate.host_notified {
                continue;
            }
            let latest = self.matches.get_by_id(candidate.id).await?;
            let Some(next) = mark_host_notified(&latest)? else {
                continue;
            };
            self.matches.upsert(&next).await?;
            debug!(match_id = %next.id, host, status = next.status.as_str(), "host notified flag set");

            let Some(outcome) = next.outcome_for(Role::Host) else {
                continue;
            };
            let notice = SettlementNotice {
                match_id: next.id,
                recipient: next.host.username.clone(),
                recipient_role: Role::Host,
                outcome: outcome.into(),
                opponent_username: next.opponent.username.clone(),
            };
            self.dispatch(notice.clone()).await;
            delivered.push(notice);
        }
        Ok(delivered)
    }

    async fn recheck(&self, match_id: MatchId, event: MatchEvent) -> Result<Transition, SettlementError> {
        let latest = self.matches.get_by_id(match_id).await?;
        Ok(apply(&latest, event)?)
    }

    async fn pay_out(&self, m: &Match, resolution: &Resolution) -> Result<(), SettlementError> {
        let payouts: Vec<(&str, Cents)> = match (&resolution.winner, resolution.outcome) {
            (_, Outcome::Draw) => vec![
                (m.host.username.as_str(), m.host.bet),
                (m.opponent.username.as_str(), m.opponent.bet),
            ],
            (Some(winner), _) => vec![(winner.as_str(), m.bet_amount)],
            (None, _) => {
                return Err(DomainError::InconsistentMatch(format!(
                    "{}: decisive outcome without a winner",
                    m.id
                ))
                .into());
            }
        };
        // Peer-written zero bets are skipped. A failed credit does not stop the
        // others; the first failure is returned.
        let mut first_failure = None;
        for (player, amount) in payouts.into_iter().filter(|(_, amount)| !amount.is_zero()) {
            if let Err(err) = self.settle_credit(m.id, player, amount).await {
                first_failure.get_or_insert(err);
            }
        }
        if let Some(err) = first_failure {
            return Err(err);
        }
        info!(
            match_id = %m.id,
            outcome = ?resolution.outcome,
            pot = m.bet_amount.as_u64(),
            "match paid out"
        );
        Ok(())
    }

    /// Credits a player on a match that is already terminal. A failure strands
    /// the funds, so it is logged for manual correction before being returned.
    async fn settle_credit(
        &self,
        match_id: MatchId,
        player: &str,
        amount: Cents,
    ) -> Result<(), SettlementError> {
        if let Err(err) = self.ledger.credit(player, amount).await {
            error!(
                match_id = %match_id,
                player,
                amount = amount.as_u64(),
                error = %err,
                "credit failed; match is terminal but the funds are missing"
            );
            return Err(err.into());
        }
        self.ledger
            .record_transaction_best_effort(player, TransactionKind::Credit, amount)
            .await;
        Ok(())
    }

    async fn refund_escrow(&self, match_id: MatchId, player: &str, amount: Cents) {
        match self.ledger.credit(player, amount).await {
            Ok(_) => {
                self.ledger
                    .record_transaction_best_effort(player, TransactionKind::Credit, amount)
                    .await;
                warn!(match_id = %match_id, player, amount = amount.as_u64(), "play aborted, escrow refunded");
            }
            Err(err) => {
                error!(
                    match_id = %match_id,
                    player,
                    amount = amount.as_u64(),
                    error = %err,
                    "escrow refund failed; balance needs manual correction"
                );
            }
        }
    }

    async fn dispatch(&self, notice: SettlementNotice) {
        if let Err(err) = self.notifier.notify(notice.clone()).await {
            warn!(match_id = %notice.match_id, recipient = %notice.recipient, error = %err, "notice dispatch failed");
        }
    }
}

fn require_role(m: &Match, player: &str, expected: Role) -> Result<(), DomainError> {
    if m.role_of(player) == Some(expected) {
        Ok(())
    } else {
        Err(DomainError::NotParticipant(player.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use duel_domain::MatchStatus;
    use ledger_store::{InMemoryDocumentStore, LedgerStoreError};

    use super::*;
    use crate::{ErrorKind, NoopNotifier, RecordingNotifier};

    type Engine = SettlementEngine<InMemoryDocumentStore, RecordingNotifier>;

    async fn funded(amount: u64) -> (Engine, InMemoryDocumentStore, RecordingNotifier) {
        let store = InMemoryDocumentStore::new();
        let notifier = RecordingNotifier::new();
        let engine = SettlementEngine::from_store(LedgerStore::new(store.clone()), notifier.clone());
        for player in ["alice", "bob"] {
            engine
                .ledger()
                .deposit(player, Cents(amount))
                .await
                .expect("deposit");
        }
        (engine, store, notifier)
    }

    async fn balance_of(engine: &Engine, player: &str) -> u64 {
        engine
            .ledger()
            .get_balance(player)
            .await
            .expect("balance")
            .amount
            .as_u64()
    }

    #[tokio::test]
    async fn host_play_escrows_bet_and_confirms_challenge() {
        let (engine, _, notifier) = funded(500).await;
        let m = engine.challenge("alice", "bob").await.expect("challenge");

        let report = engine
            .play(m.id, "alice", ItemChoice::Rock, Cents(100))
            .await
            .expect("host play");

        assert_eq!(report.role, Role::Host);
        assert_eq!(report.outcome, None);
        assert_eq!(report.balance.amount, Cents(400));
        assert_eq!(report.match_doc.status, MatchStatus::Pending);
        assert_eq!(report.match_doc.bet_amount, Cents(100));
        let notices = notifier.notices_snapshot();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].outcome, NoticeOutcome::ChallengeCreated);
        assert_eq!(notices[0].recipient, "alice");
    }

    #[tokio::test]
    async fn decisive_duel_pays_the_whole_pot_to_the_winner() {
        let (engine, _, notifier) = funded(500).await;
        let m = engine.challenge("alice", "bob").await.expect("challenge");
        engine
            .play(m.id, "alice", ItemChoice::Scissors, Cents(100))
            .await
            .expect("host play");

        let report = engine
            .play(m.id, "bob", ItemChoice::Rock, Cents(100))
            .await
            .expect("opponent play");

        assert_eq!(report.outcome, Some(Outcome::Win));
        assert_eq!(report.match_doc.status, MatchStatus::Completed);
        assert_eq!(report.match_doc.winner.as_deref(), Some("bob"));
        assert_eq!(report.match_doc.bet_amount, Cents(200));
        assert_eq!(report.balance.amount, Cents(600));
        assert_eq!(balance_of(&engine, "alice").await, 400);
        let last = notifier.notices_snapshot().pop().expect("opponent notice");
        assert_eq!(last.recipient, "bob");
        assert_eq!(last.outcome, NoticeOutcome::Win);
        assert_eq!(last.title(), "Congrats");
    }

    #[tokio::test]
    async fn draw_refunds_each_bet() {
        let (engine, _, _) = funded(500).await;
        let m = engine.challenge("alice", "bob").await.expect("challenge");
        engine
            .play(m.id, "alice", ItemChoice::Paper, Cents(120))
            .await
            .expect("host play");
        let report = engine
            .play(m.id, "bob", ItemChoice::Paper, Cents(80))
            .await
            .expect("opponent play");

        assert_eq!(report.outcome, Some(Outcome::Draw));
        assert_eq!(report.match_doc.status, MatchStatus::Draw);
        assert_eq!(balance_of(&engine, "alice").await, 500);
        assert_eq!(balance_of(&engine, "bob").await, 500);
    }

    #[tokio::test]
    async fn insufficient_funds_leaves_every_document_untouched() {
        let (engine, store, notifier) = funded(50).await;
        let m = engine.challenge("alice", "bob").await.expect("challenge");
        let transactions_before = store.document_count("rps_transaction");

        let err = engine
            .play(m.id, "alice", ItemChoice::Rock, Cents(100))
            .await
            .expect_err("overdraw");

        assert!(err.is_insufficient_funds());
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(balance_of(&engine, "alice").await, 50);
        assert_eq!(store.document_count("rps_transaction"), transactions_before);
        let stored = engine.matches().get_by_id(m.id).await.expect("match");
        assert_eq!(stored, m);
        assert!(notifier.notices_snapshot().is_empty());
    }

    #[tokio::test]
    async fn empty_wallet_is_rejected_before_escrow() {
        let store = InMemoryDocumentStore::new();
        let engine = SettlementEngine::from_store(LedgerStore::new(store), NoopNotifier);
        let m = engine.challenge("alice", "bob").await.expect("challenge");

        let err = engine
            .play(m.id, "alice", ItemChoice::Rock, Cents(10))
            .await
            .expect_err("no wallet");
        assert!(matches!(err, SettlementError::EmptyWallet(ref who) if who == "alice"));

        engine.ledger().ensure_wallet("alice").await.expect("wallet");
        let err = engine
            .play(m.id, "alice", ItemChoice::Rock, Cents(10))
            .await
            .expect_err("zero wallet");
        assert!(matches!(err, SettlementError::EmptyWallet(_)));
    }

    #[tokio::test]
    async fn opponent_cannot_play_before_host() {
        let (engine, _, _) = funded(500).await;
        let m = engine.challenge("alice", "bob").await.expect("challenge");

        let err = engine
            .play(m.id, "bob", ItemChoice::Rock, Cents(100))
            .await
            .expect_err("out of turn");

        assert!(matches!(
            err,
            SettlementError::Domain(DomainError::IllegalTransition { .. })
        ));
        assert_eq!(balance_of(&engine, "bob").await, 500);
    }

    #[tokio::test]
    async fn outsiders_and_repeat_plays_are_rejected() {
        let (engine, _, _) = funded(500).await;
        let m = engine.challenge("alice", "bob").await.expect("challenge");

        let err = engine
            .play(m.id, "mallory", ItemChoice::Rock, Cents(1))
            .await
            .expect_err("outsider");
        assert!(matches!(err, SettlementError::Domain(DomainError::NotParticipant(_))));

        engine
            .play(m.id, "alice", ItemChoice::Rock, Cents(100))
            .await
            .expect("host play");
        let err = engine
            .play(m.id, "alice", ItemChoice::Paper, Cents(100))
            .await
            .expect_err("second host play");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(balance_of(&engine, "alice").await, 400);
    }

    #[tokio::test]
    async fn accept_checks_addressee_and_phase() {
        let (engine, _, _) = funded(500).await;
        let m = engine.challenge("alice", "bob").await.expect("challenge");

        let accepted = engine.accept(m.id, "bob").await.expect("accept");
        assert_eq!(accepted.id, m.id);
        assert!(engine.accept(m.id, "alice").await.is_err());

        engine.decline(m.id, "bob").await.expect("decline");
        let err = engine.accept(m.id, "bob").await.expect_err("declined");
        assert!(matches!(
            err,
            SettlementError::Domain(DomainError::IllegalTransition { .. })
        ));
    }

    #[tokio::test]
    async fn decline_after_host_play_refunds_host_escrow() {
        let (engine, _, _) = funded(500).await;
        let m = engine.challenge("alice", "bob").await.expect("challenge");
        engine
            .play(m.id, "alice", ItemChoice::Rock, Cents(100))
            .await
            .expect("host play");

        let declined = engine.decline(m.id, "bob").await.expect("decline");

        assert_eq!(declined.status, MatchStatus::Declined);
        assert_eq!(balance_of(&engine, "alice").await, 500);
        assert_eq!(balance_of(&engine, "bob").await, 500);
        let recon = engine.ledger().reconcile("alice").await.expect("reconcile");
        assert_eq!(recon.drift(), 0);

        let err = engine
            .play(m.id, "bob", ItemChoice::Paper, Cents(100))
            .await
            .expect_err("terminal");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn only_the_opponent_may_decline() {
        let (engine, _, _) = funded(500).await;
        let m = engine.challenge("alice", "bob").await.expect("challenge");
        let err = engine.decline(m.id, "alice").await.expect_err("host decline");
        assert!(matches!(err, SettlementError::Domain(DomainError::NotParticipant(_))));
    }

    #[tokio::test]
    async fn host_notification_is_delivered_once() {
        let (engine, _, notifier) = funded(500).await;
        let m = engine.challenge("alice", "bob").await.expect("challenge");
        engine
            .play(m.id, "alice", ItemChoice::Rock, Cents(100))
            .await
            .expect("host play");
        engine
            .play(m.id, "bob", ItemChoice::Scissors, Cents(100))
            .await
            .expect("opponent play");

        let first = engine
            .check_host_notifications("alice")
            .await
            .expect("first check");
        let second = engine
            .check_host_notifications("alice")
            .await
            .expect("second check");

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].outcome, NoticeOutcome::Win);
        assert_eq!(first[0].opponent_username, "bob");
        assert!(second.is_empty());
        let stored = engine.matches().get_by_id(m.id).await.expect("match");
        assert!(stored.host_notified);
        let host_results = notifier
            .notices_snapshot()
            .into_iter()
            .filter(|n| n.recipient == "alice" && n.outcome != NoticeOutcome::ChallengeCreated)
            .count();
        assert_eq!(host_results, 1);
    }

    #[tokio::test]
    async fn declined_match_is_flagged_without_a_notice() {
        let (engine, _, notifier) = funded(500).await;
        let m = engine.challenge("alice", "bob").await.expect("challenge");
        engine.decline(m.id, "bob").await.expect("decline");

        let delivered = engine
            .check_host_notifications("alice")
            .await
            .expect("check");

        assert!(delivered.is_empty());
        assert!(notifier.notices_snapshot().is_empty());
        let stored = engine.matches().get_by_id(m.id).await.expect("match");
        assert!(stored.host_notified);
    }

    #[tokio::test]
    async fn pending_matches_are_not_flagged() {
        let (engine, _, _) = funded(500).await;
        let m = engine.challenge("alice", "bob").await.expect("challenge");
        let delivered = engine
            .check_host_notifications("alice")
            .await
            .expect("check");
        assert!(delivered.is_empty());
        let stored = engine.matches().get_by_id(m.id).await.expect("match");
        assert!(!stored.host_notified);
    }

    #[tokio::test]
    async fn unknown_match_reports_not_found() {
        let (engine, _, _) = funded(500).await;
        let err = engine
            .play(MatchId::new(), "alice", ItemChoice::Rock, Cents(1))
            .await
            .expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn unreachable_store_reports_transient_error() {
        let (engine, store, _) = funded(500).await;
        store.set_unavailable("rps_challenge", true);
        let err = engine
            .challenge("alice", "bob")
            .await
            .expect_err("unreachable");
        assert_eq!(err.kind(), ErrorKind::TransientStore);
    }

    #[tokio::test]
    async fn draw_against_zero_bet_host_still_refunds_the_opponent() {
        let (engine, store, _) = funded(500).await;
        let id = MatchId::new();
        let peer_written = serde_json::json!({
            "_id": id.to_string(),
            "status": "pending",
            "bet_amount": 0,
            "host": { "Username": "alice", "ItemName": "rock", "Bet": 0 },
            "opponent": { "Username": "bob", "ItemName": "", "Bet": 0 },
            "winner": "",
            "loser": "",
            "host_notified": false
        });
        store
            .put(
                "rps_challenge",
                &serde_json::to_vec(&peer_written).expect("encode"),
            )
            .await
            .expect("raw put");

        let report = engine
            .play(id, "bob", ItemChoice::Rock, Cents(100))
            .await
            .expect("opponent play");

        assert_eq!(report.outcome, Some(Outcome::Draw));
        assert_eq!(report.balance.amount, Cents(500));
        assert_eq!(balance_of(&engine, "alice").await, 500);
        let bob = engine.ledger().reconcile("bob").await.expect("reconcile");
        assert_eq!(bob.drift(), 0);
    }

    #[tokio::test]
    async fn corrupt_hosted_document_does_not_block_other_notices() {
        let (engine, store, _) = funded(500).await;
        let m = engine.challenge("alice", "bob").await.expect("challenge");
        engine
            .play(m.id, "alice", ItemChoice::Rock, Cents(100))
            .await
            .expect("host play");
        engine
            .play(m.id, "bob", ItemChoice::Scissors, Cents(100))
            .await
            .expect("opponent play");
        let corrupt = serde_json::json!({
            "_id": MatchId::new().to_string(),
            "status": "completed",
            "host": { "Username": "alice", "ItemName": "lizard", "Bet": 5 },
            "opponent": { "Username": "bob", "ItemName": "rock", "Bet": 5 }
        });
        store
            .put("rps_challenge", &serde_json::to_vec(&corrupt).expect("encode"))
            .await
            .expect("raw put");

        let delivered = engine
            .check_host_notifications("alice")
            .await
            .expect("poll");

        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].match_id, m.id);
        assert_eq!(delivered[0].outcome, NoticeOutcome::Win);
    }

    #[tokio::test]
    async fn failed_decline_refund_is_reported_and_match_stays_declined() {
        let (engine, store, _) = funded(500).await;
        let m = engine.challenge("alice", "bob").await.expect("challenge");
        engine
            .play(m.id, "alice", ItemChoice::Rock, Cents(100))
            .await
            .expect("host play");
        store.set_unavailable("rps_wallet", true);

        let err = engine.decline(m.id, "bob").await.expect_err("refund fails");

        assert_eq!(err.kind(), ErrorKind::TransientStore);
        store.set_unavailable("rps_wallet", false);
        let stored = engine.matches().get_by_id(m.id).await.expect("match");
        assert_eq!(stored.status, MatchStatus::Declined);
        assert_eq!(balance_of(&engine, "alice").await, 400);
    }

    /// Writes a prepared match over the stored one right after the first
    /// wallet write, standing in for a peer acting between our read and write.
    #[derive(Clone)]
    struct InterleavingStore {
        inner: InMemoryDocumentStore,
        pending_overwrite: Arc<Mutex<Option<Vec<u8>>>>,
    }

    #[async_trait]
    impl DocumentStore for InterleavingStore {
        async fn get(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>, LedgerStoreError> {
            self.inner.get(collection, key).await
        }

        async fn put(&self, collection: &str, document: &[u8]) -> Result<(), LedgerStoreError> {
            self.inner.put(collection, document).await?;
            if collection == "rps_wallet" {
                let overwrite = self
                    .pending_overwrite
                    .lock()
                    .map_err(|_| LedgerStoreError::LockPoisoned)?
                    .take();
                if let Some(raw) = overwrite {
                    self.inner.put("rps_challenge", &raw).await?;
                }
            }
            Ok(())
        }

        async fn query(
            &self,
            collection: &str,
            field: &str,
            value: &str,
        ) -> Result<Vec<Vec<u8>>, LedgerStoreError> {
            self.inner.query(collection, field, value).await
        }

        async fn delete(&self, collection: &str, scope: &str) -> Result<(), LedgerStoreError> {
            self.inner.delete(collection, scope).await
        }
    }

    #[tokio::test]
    async fn play_refunds_escrow_when_match_was_declined_meanwhile() {
        let (engine, store, _) = funded(500).await;
        let m = engine.challenge("alice", "bob").await.expect("challenge");
        engine
            .play(m.id, "alice", ItemChoice::Rock, Cents(100))
            .await
            .expect("host play");

        let mut declined = engine.matches().get_by_id(m.id).await.expect("match");
        declined.status = MatchStatus::Declined;
        let racing = InterleavingStore {
            inner: store,
            pending_overwrite: Arc::new(Mutex::new(Some(
                serde_json::to_vec(&declined).expect("encode"),
            ))),
        };
        let opponent_engine =
            SettlementEngine::from_store(LedgerStore::new(racing), NoopNotifier);

        let err = opponent_engine
            .play(m.id, "bob", ItemChoice::Paper, Cents(100))
            .await
            .expect_err("declined underneath");

        assert!(matches!(
            err,
            SettlementError::Domain(DomainError::IllegalTransition { .. })
        ));
        let bob = opponent_engine
            .ledger()
            .reconcile("bob")
            .await
            .expect("reconcile");
        assert_eq!(bob.balance.amount, Cents(500));
        assert_eq!(bob.drift(), 0);
        let stored = opponent_engine
            .matches()
            .get_by_id(m.id)
            .await
            .expect("match");
        assert_eq!(stored.status, MatchStatus::Declined);
    }
}
