//! Player accounts, one per peer node.
//!
//! Username uniqueness is best effort: the store cannot enforce it, so the
//! registry checks before writing and re-checks right after. Two nodes
//! registering the same name between each other's checks can still both win;
//! closing that window needs a coordination service the store does not offer.

use duel_domain::{Account, NodeId, Username};
use ledger_store::{Collection, DocumentStore, LedgerStore, LedgerStoreError};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Store(#[from] LedgerStoreError),
    #[error("username {0} is taken")]
    DuplicateUsername(Username),
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("node {node_id} is already registered as {username}")]
    NodeAlreadyRegistered { node_id: NodeId, username: Username },
    #[error("no account {username} for node {node_id}")]
    UnknownAccount { node_id: NodeId, username: Username },
}

#[derive(Debug, Clone)]
pub struct AccountRegistry<S> {
    store: LedgerStore<S>,
}

impl<S> AccountRegistry<S>
where
    S: DocumentStore,
{
    #[must_use]
    pub fn new(store: LedgerStore<S>) -> Self {
        Self { store }
    }

    pub async fn register(&self, node_id: &str, username: &str) -> Result<Account, AccountError> {
        if username.trim().is_empty() {
            return Err(AccountError::EmptyUsername);
        }
        if let Some(existing) = self.store.get::<Account>(Collection::Accounts, node_id).await? {
            return Err(AccountError::NodeAlreadyRegistered {
                node_id: node_id.to_string(),
                username: existing.username,
            });
        }
        if self.username_taken_by_other(node_id, username).await? {
            return Err(AccountError::DuplicateUsername(username.to_string()));
        }

        let account = Account {
            id: node_id.to_string(),
            username: username.to_string(),
            logged_in: true,
        };
        self.store.put(Collection::Accounts, &account).await?;

        if self.username_taken_by_other(node_id, username).await? {
            warn!(node_id, username, "username collision detected after write, rolling back");
            self.store.delete(Collection::Accounts, node_id).await?;
            return Err(AccountError::DuplicateUsername(username.to_string()));
        }
        info!(node_id, username, "account registered");
        Ok(account)
    }

    pub async fn login(&self, node_id: &str, username: &str) -> Result<Account, AccountError> {
        self.set_logged_in(node_id, username, true).await
    }

    pub async fn logout(&self, node_id: &str, username: &str) -> Result<Account, AccountError> {
        self.set_logged_in(node_id, username, false).await
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<Account>, AccountError> {
        let mut found: Vec<Account> = self
            .store
            .query(Collection::Accounts, "username", username)
            .await?;
        Ok(found.pop())
    }

    /// Everyone who could be challenged by `except`, sorted by name.
    pub async fn list_players(&self, except: &str) -> Result<Vec<Account>, AccountError> {
        let mut players: Vec<Account> = self
            .store
            .query_all::<Account>(Collection::Accounts)
            .await?
            .into_iter()
            .filter(|account| account.username != except)
            .collect();
        players.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(players)
    }

    async fn username_taken_by_other(
        &self,
        node_id: &str,
        username: &str,
    ) -> Result<bool, AccountError> {
        let holders: Vec<Account> = self
            .store
            .query(Collection::Accounts, "username", username)
            .await?;
        Ok(holders.iter().any(|account| account.id != node_id))
    }

    async fn set_logged_in(
        &self,
        node_id: &str,
        username: &str,
        logged_in: bool,
    ) -> Result<Account, AccountError> {
        let unknown = || AccountError::UnknownAccount {
            node_id: node_id.to_string(),
            username: username.to_string(),
        };
        let mut account: Account = self
            .store
            .get(Collection::Accounts, node_id)
            .await?
            .ok_or_else(unknown)?;
        if account.username != username {
            return Err(unknown());
        }
        if account.logged_in != logged_in {
            account.logged_in = logged_in;
            self.store.put(Collection::Accounts, &account).await?;
        }
        info!(node_id, username, logged_in, "account session updated");
        Ok(account)
    }
}
