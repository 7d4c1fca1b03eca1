//! One peer's view of the game: its account plus the services it drives.

use std::sync::Arc;

use balance_ledger::BalanceLedgerError;
use duel_domain::{
    Account, Balance, Cents, Item, ItemChoice, Match, MatchId, NodeId, SettlementNotice,
    Transaction, Username,
};
use ledger_store::{DocumentStore, LedgerStore};
use match_store::{ItemCatalog, ItemCatalogError, MatchStoreError, PlayerStats};
use player_accounts::{AccountError, AccountRegistry};
use settlement::{PlayReport, SettlementEngine, SettlementError, SettlementNotifier};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Accounts(#[from] AccountError),
    #[error(transparent)]
    Settlement(#[from] SettlementError),
    #[error(transparent)]
    Ledger(#[from] BalanceLedgerError),
    #[error(transparent)]
    Matches(#[from] MatchStoreError),
    #[error(transparent)]
    Catalog(#[from] ItemCatalogError),
    #[error("no player named {0}")]
    UnknownOpponent(Username),
}

pub struct PlayerNode<S> {
    node_id: NodeId,
    username: Username,
    accounts: AccountRegistry<S>,
    catalog: ItemCatalog<S>,
    engine: SettlementEngine<S, Arc<dyn SettlementNotifier>>,
}

impl<S> PlayerNode<S>
where
    S: DocumentStore + Clone,
{
    /// Logs `username` in on `node_id`, registering the account on first use.
    pub async fn connect(
        store: LedgerStore<S>,
        node_id: &str,
        username: &str,
        notifier: Arc<dyn SettlementNotifier>,
    ) -> Result<Self, NodeError> {
        let accounts = AccountRegistry::new(store.clone());
        match accounts.login(node_id, username).await {
            Ok(_) => {}
            Err(AccountError::UnknownAccount { .. }) => {
                accounts.register(node_id, username).await?;
            }
            Err(err) => return Err(err.into()),
        }
        let node = Self {
            node_id: node_id.to_string(),
            username: username.to_string(),
            accounts,
            catalog: ItemCatalog::new(store.clone()),
            engine: SettlementEngine::from_store(store, notifier),
        };
        node.engine.ledger().ensure_wallet(username).await?;
        info!(node_id, username, "player connected");
        Ok(node)
    }
}

impl<S> PlayerNode<S>
where
    S: DocumentStore,
{
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    pub async fn disconnect(&self) -> Result<Account, NodeError> {
        Ok(self.accounts.logout(&self.node_id, &self.username).await?)
    }

    pub async fn opponents(&self) -> Result<Vec<Account>, NodeError> {
        Ok(self.accounts.list_players(&self.username).await?)
    }

    pub async fn items(&self) -> Result<Vec<Item>, NodeError> {
        Ok(self.catalog.list_items().await?)
    }

    pub async fn balance(&self) -> Result<Balance, NodeError> {
        Ok(self.engine.ledger().get_balance(&self.username).await?)
    }

    pub async fn deposit(&self, amount: Cents) -> Result<Balance, NodeError> {
        Ok(self.engine.ledger().deposit(&self.username, amount).await?)
    }

    pub async fn withdraw(&self, amount: Cents) -> Result<Balance, NodeError> {
        Ok(self.engine.ledger().withdraw(&self.username, amount).await?)
    }

    pub async fn transactions(&self) -> Result<Vec<Transaction>, NodeError> {
        Ok(self.engine.ledger().list_transactions(&self.username).await?)
    }

    pub async fn stats(&self) -> Result<PlayerStats, NodeError> {
        Ok(self.engine.matches().player_stats(&self.username).await?)
    }

    pub async fn challenge(&self, opponent: &str) -> Result<Match, NodeError> {
        if self.accounts.find_by_username(opponent).await?.is_none() {
            return Err(NodeError::UnknownOpponent(opponent.to_string()));
        }
        Ok(self.engine.challenge(&self.username, opponent).await?)
    }

    /// Challenges waiting on this player.
    pub async fn inbox(&self) -> Result<Vec<Match>, NodeError> {
        Ok(self
            .engine
            .matches()
            .pending_challenges_for(&self.username)
            .await?)
    }

    pub async fn accept(&self, match_id: MatchId) -> Result<Match, NodeError> {
        Ok(self.engine.accept(match_id, &self.username).await?)
    }

    pub async fn decline(&self, match_id: MatchId) -> Result<Match, NodeError> {
        Ok(self.engine.decline(match_id, &self.username).await?)
    }

    pub async fn play(
        &self,
        match_id: MatchId,
        choice: ItemChoice,
        bet: Cents,
    ) -> Result<PlayReport, NodeError> {
        Ok(self.engine.play(match_id, &self.username, choice, bet).await?)
    }

    pub async fn poll_results(&self) -> Result<Vec<SettlementNotice>, NodeError> {
        Ok(self.engine.check_host_notifications(&self.username).await?)
    }
}
