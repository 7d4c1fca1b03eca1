use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use duel_domain::SettlementNotice;

/// Boundary to whatever surfaces results to players.
#[async_trait]
pub trait SettlementNotifier: Send + Sync {
    async fn notify(&self, notice: SettlementNotice) -> Result<(), String>;
}

#[async_trait]
impl<N: SettlementNotifier + ?Sized> SettlementNotifier for Arc<N> {
    async fn notify(&self, notice: SettlementNotice) -> Result<(), String> {
        (**self).notify(notice).await
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl SettlementNotifier for NoopNotifier {
    async fn notify(&self, _notice: SettlementNotice) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<SettlementNotice>>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn notices_snapshot(&self) -> Vec<SettlementNotice> {
        self.notices
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SettlementNotifier for RecordingNotifier {
    async fn notify(&self, notice: SettlementNotice) -> Result<(), String> {
        self.notices
            .lock()
            .map_err(|_| "notice lock poisoned".to_string())?
            .push(notice);
        Ok(())
    }
}
