//! Per-player balances and the append-only transaction log.
//!
//! The balance document is authoritative. Every mutation is a plain
//! read-check-write against a last-write-wins store: two writers racing on the
//! same player can lose one update. Callers keep that window small by
//! confining writers (see the settlement engine); it is not detectable here.

use duel_domain::{Balance, Cents, MoneyError, Transaction, TransactionKind};
use ledger_store::{Collection, DocumentStore, LedgerStore, LedgerStoreError};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum BalanceLedgerError {
    #[error(transparent)]
    Store(#[from] LedgerStoreError),
    #[error(transparent)]
    Money(#[from] MoneyError),
    #[error("insufficient funds for {player}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        player: String,
        balance: Cents,
        requested: Cents,
    },
    #[error("amount must be greater than zero")]
    ZeroAmount,
}

/// Balance next to what the audit trail says it should be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub balance: Balance,
    pub total_credits: Cents,
    pub total_debits: Cents,
    pub transaction_count: usize,
}

impl Reconciliation {
    /// Signed difference between the stored balance and credits minus debits.
    /// Non-zero drift points at a lost update or a dropped audit entry.
    #[must_use]
    pub fn drift(&self) -> i128 {
        i128::from(self.balance.amount.as_u64()) - i128::from(self.total_credits.as_u64())
            + i128::from(self.total_debits.as_u64())
    }
}

#[derive(Debug, Clone)]
pub struct BalanceLedger<S> {
    store: LedgerStore<S>,
}

impl<S> BalanceLedger<S>
where
    S: DocumentStore,
{
    #[must_use]
    pub fn new(store: LedgerStore<S>) -> Self {
        Self { store }
    }

    /// `None` when the player never had a wallet.
    pub async fn find_balance(&self, player: &str) -> Result<Option<Balance>, BalanceLedgerError> {
        Ok(self.store.get(Collection::Wallets, player).await?)
    }

    /// Zero-valued balance when absent; use [`Self::find_balance`] to tell the two apart.
    pub async fn get_balance(&self, player: &str) -> Result<Balance, BalanceLedgerError> {
        Ok(self
            .find_balance(player)
            .await?
            .unwrap_or_else(|| Balance::zero(player)))
    }

    /// Creates the zero balance on first access.
    pub async fn ensure_wallet(&self, player: &str) -> Result<Balance, BalanceLedgerError> {
        if let Some(existing) = self.find_balance(player).await? {
            return Ok(existing);
        }
        let balance = Balance::zero(player);
        self.store.put(Collection::Wallets, &balance).await?;
        info!(player, "wallet created");
        Ok(balance)
    }

    /// Debits `amount` if the balance covers it. Rejected, never clamped.
    pub async fn escrow(&self, player: &str, amount: Cents) -> Result<Balance, BalanceLedgerError> {
        if amount.is_zero() {
            return Err(BalanceLedgerError::ZeroAmount);
        }
        let current = self.get_balance(player).await?;
        let remaining = current.amount.checked_sub(amount).map_err(|_| {
            BalanceLedgerError::InsufficientFunds {
                player: player.to_string(),
                balance: current.amount,
                requested: amount,
            }
        })?;
        let next = Balance {
            owner: current.owner,
            amount: remaining,
        };
        self.store.put(Collection::Wallets, &next).await?;
        info!(player, amount = amount.as_u64(), balance = next.amount.as_u64(), "balance debited");
        Ok(next)
    }

    pub async fn credit(&self, player: &str, amount: Cents) -> Result<Balance, BalanceLedgerError> {
        if amount.is_zero() {
            return Err(BalanceLedgerError::ZeroAmount);
        }
        let current = self.get_balance(player).await?;
        let next = Balance {
            owner: current.owner,
            amount: current.amount.checked_add(amount)?,
        };
        self.store.put(Collection::Wallets, &next).await?;
        info!(player, amount = amount.as_u64(), balance = next.amount.as_u64(), "balance credited");
        Ok(next)
    }

    pub async fn record_transaction(
        &self,
        player: &str,
        kind: TransactionKind,
        amount: Cents,
    ) -> Result<Transaction, BalanceLedgerError> {
        let tx = Transaction::new(player, kind, amount);
        self.store.put(Collection::Transactions, &tx).await?;
        Ok(tx)
    }

    /// Appends an audit entry; a failed append is logged and does not undo
    /// the balance mutation it describes.
    pub async fn record_transaction_best_effort(
        &self,
        player: &str,
        kind: TransactionKind,
        amount: Cents,
    ) -> Option<Transaction> {
        match self.record_transaction(player, kind, amount).await {
            Ok(tx) => Some(tx),
            Err(err) => {
                warn!(player, ?kind, amount = amount.as_u64(), error = %err, "transaction append failed");
                None
            }
        }
    }

    pub async fn deposit(&self, player: &str, amount: Cents) -> Result<Balance, BalanceLedgerError> {
        let balance = self.credit(player, amount).await?;
        self.record_transaction_best_effort(player, TransactionKind::Credit, amount)
            .await;
        Ok(balance)
    }

    pub async fn withdraw(&self, player: &str, amount: Cents) -> Result<Balance, BalanceLedgerError> {
        let balance = self.escrow(player, amount).await?;
        self.record_transaction_best_effort(player, TransactionKind::Debit, amount)
            .await;
        Ok(balance)
    }

    /// Audit trail of `player`, newest first.
    pub async fn list_transactions(
        &self,
        player: &str,
    ) -> Result<Vec<Transaction>, BalanceLedgerError> {
        let mut transactions: Vec<Transaction> = self
            .store
            .query(Collection::Transactions, "username", player)
            .await?;
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(transactions)
    }

    pub async fn reconcile(&self, player: &str) -> Result<Reconciliation, BalanceLedgerError> {
        let balance = self.get_balance(player).await?;
        let transactions = self.list_transactions(player).await?;
        let mut total_credits = Cents::ZERO;
        let mut total_debits = Cents::ZERO;
        for tx in &transactions {
            match tx.kind {
                TransactionKind::Credit => total_credits = total_credits.checked_add(tx.amount)?,
                TransactionKind::Debit => total_debits = total_debits.checked_add(tx.amount)?,
            }
        }
        Ok(Reconciliation {
            balance,
            total_credits,
            total_debits,
            transaction_count: transactions.len(),
        })
    }
}
