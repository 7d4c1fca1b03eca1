//! Match documents keyed by match id.
//!
//! Queries are eventually consistent against a replicated store: a match just
//! written by one reader may not show up in another reader's query yet. Writes
//! always carry the full document.

mod items;
mod stats;

pub use items::{ItemCatalog, ItemCatalogError};
pub use stats::PlayerStats;

use duel_domain::{Match, MatchId, MatchStatus, MoneyError};
use ledger_store::{Collection, DocumentStore, LedgerStore, LedgerStoreError};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MatchStoreError {
    #[error(transparent)]
    Store(#[from] LedgerStoreError),
    #[error(transparent)]
    Money(#[from] MoneyError),
    #[error("match {0} not found")]
    NotFound(MatchId),
}

/// Queryable fields of a match document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Host,
    Opponent,
    Status,
    Winner,
    Loser,
}

impl MatchField {
    #[must_use]
    pub fn as_path(self) -> &'static str {
        match self {
            Self::Host => "host.Username",
            Self::Opponent => "opponent.Username",
            Self::Status => "status",
            Self::Winner => "winner",
            Self::Loser => "loser",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchRepository<S> {
    store: LedgerStore<S>,
}

impl<S> MatchRepository<S>
where
    S: DocumentStore,
{
    #[must_use]
    pub fn new(store: LedgerStore<S>) -> Self {
        Self { store }
    }

    /// Writes a new match. Ids are UUIDs, so no collision check is made.
    pub async fn create(&self, m: &Match) -> Result<(), MatchStoreError> {
        self.store.put(Collection::Matches, m).await?;
        debug!(match_id = %m.id, host = %m.host.username, opponent = %m.opponent.username, "match created");
        Ok(())
    }

    pub async fn find_by_id(&self, id: MatchId) -> Result<Option<Match>, MatchStoreError> {
        Ok(self.store.get(Collection::Matches, &id.to_string()).await?)
    }

    pub async fn get_by_id(&self, id: MatchId) -> Result<Match, MatchStoreError> {
        self.find_by_id(id)
            .await?
            .ok_or(MatchStoreError::NotFound(id))
    }

    pub async fn query_by(
        &self,
        field: MatchField,
        value: &str,
    ) -> Result<Vec<Match>, MatchStoreError> {
        Ok(self
            .store
            .query(Collection::Matches, field.as_path(), value)
            .await?)
    }

    /// Last-write-wins put of the full document. Re-fetch right before
    /// mutating to keep the clobber window short.
    pub async fn upsert(&self, m: &Match) -> Result<(), MatchStoreError> {
        self.store.put(Collection::Matches, m).await?;
        debug!(match_id = %m.id, status = m.status.as_str(), "match upserted");
        Ok(())
    }

    /// Challenges still waiting on `opponent`. Undecodable documents are skipped.
    pub async fn pending_challenges_for(
        &self,
        opponent: &str,
    ) -> Result<Vec<Match>, MatchStoreError> {
        Ok(self
            .listing(MatchField::Opponent, opponent)
            .await?
            .into_iter()
            .filter(|m| m.status == MatchStatus::Pending)
            .collect())
    }

    /// Every match hosted by `host`. Undecodable documents are skipped so one
    /// corrupt entry cannot hide the others.
    pub async fn hosted_by(&self, host: &str) -> Result<Vec<Match>, MatchStoreError> {
        self.listing(MatchField::Host, host).await
    }

    async fn listing(&self, field: MatchField, value: &str) -> Result<Vec<Match>, MatchStoreError> {
        Ok(self
            .store
            .query_lenient(Collection::Matches, field.as_path(), value)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duel_domain::{Cents, ItemChoice};
    use ledger_store::InMemoryDocumentStore;

    fn repo() -> MatchRepository<InMemoryDocumentStore> {
        MatchRepository::new(LedgerStore::new(InMemoryDocumentStore::new()))
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips_every_field() {
        let repo = repo();
        let mut m = Match::challenge("alice", "bob").expect("challenge");
        m.status = MatchStatus::Completed;
        m.bet_amount = Cents(300);
        m.host.item_choice = Some(ItemChoice::Paper);
        m.host.bet = Cents(100);
        m.opponent.item_choice = Some(ItemChoice::Scissors);
        m.opponent.bet = Cents(200);
        m.winner = Some("bob".to_string());
        m.loser = Some("alice".to_string());
        m.host_notified = true;

        repo.upsert(&m).await.expect("upsert");
        assert_eq!(repo.get_by_id(m.id).await.expect("get"), m);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let repo = repo();
        let id = MatchId::new();
        assert!(matches!(
            repo.get_by_id(id).await,
            Err(MatchStoreError::NotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn query_by_host_status_and_winner() {
        let repo = repo();
        let first = Match::challenge("alice", "bob").expect("challenge");
        let mut second = Match::challenge("alice", "carol").expect("challenge");
        second.status = MatchStatus::Declined;
        let mut third = Match::challenge("dave", "alice").expect("challenge");
        third.status = MatchStatus::Completed;
        third.winner = Some("alice".to_string());
        third.loser = Some("dave".to_string());
        for m in [&first, &second, &third] {
            repo.create(m).await.expect("create");
        }

        assert_eq!(repo.hosted_by("alice").await.expect("query").len(), 2);
        let declined = repo
            .query_by(MatchField::Status, MatchStatus::Declined.as_str())
            .await
            .expect("query");
        assert_eq!(declined, vec![second]);
        let won = repo
            .query_by(MatchField::Winner, "alice")
            .await
            .expect("query");
        assert_eq!(won, vec![third]);
    }

    #[tokio::test]
    async fn pending_challenges_skip_settled_and_declined() {
        let repo = repo();
        let open = Match::challenge("alice", "bob").expect("challenge");
        let mut closed = Match::challenge("carol", "bob").expect("challenge");
        closed.status = MatchStatus::Declined;
        repo.create(&open).await.expect("create");
        repo.create(&closed).await.expect("create");

        let inbox = repo.pending_challenges_for("bob").await.expect("inbox");
        assert_eq!(inbox, vec![open]);
        assert!(repo.pending_challenges_for("alice").await.expect("inbox").is_empty());
    }

    #[tokio::test]
    async fn corrupt_hosted_document_does_not_hide_the_rest() {
        let raw = InMemoryDocumentStore::new();
        let repo = MatchRepository::new(LedgerStore::new(raw.clone()));
        let good = Match::challenge("alice", "bob").expect("challenge");
        repo.create(&good).await.expect("create");
        let corrupt = format!(
            r#"{{"_id":"{}","status":"pending","host":{{"Username":"alice","ItemName":"lizard","Bet":5}},"opponent":{{"Username":"bob"}}}}"#,
            MatchId::new()
        );
        raw.put("rps_challenge", corrupt.as_bytes())
            .await
            .expect("raw put");

        assert!(repo.query_by(MatchField::Host, "alice").await.is_err());
        assert_eq!(repo.hosted_by("alice").await.expect("hosted"), vec![good.clone()]);
        assert_eq!(
            repo.pending_challenges_for("bob").await.expect("inbox"),
            vec![good]
        );
    }
}
