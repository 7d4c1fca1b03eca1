use async_trait::async_trait;
use duel_domain::SettlementNotice;
use settlement::SettlementNotifier;
use tracing::info;

/// Surfaces notices as structured log lines. Stands in for a desktop toast.
#[derive(Debug, Clone)]
pub struct TracingNotificationSink {
    service_name: String,
}

impl TracingNotificationSink {
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }
}

#[async_trait]
impl SettlementNotifier for TracingNotificationSink {
    async fn notify(&self, notice: SettlementNotice) -> Result<(), String> {
        info!(
            service = %self.service_name,
            match_id = %notice.match_id,
            recipient = %notice.recipient,
            role = ?notice.recipient_role,
            outcome = ?notice.outcome,
            title = notice.title(),
            body = %notice.body(),
            "notice"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duel_domain::{MatchId, NoticeOutcome, Role};

    #[tokio::test]
    async fn accepts_every_notice_kind() {
        let sink = TracingNotificationSink::new("duel-server-test");
        for outcome in [
            NoticeOutcome::Win,
            NoticeOutcome::Loss,
            NoticeOutcome::Draw,
            NoticeOutcome::ChallengeCreated,
        ] {
            sink.notify(SettlementNotice {
                match_id: MatchId::new(),
                recipient: "alice".to_string(),
                recipient_role: Role::Host,
                outcome,
                opponent_username: "bob".to_string(),
            })
            .await
            .expect("notify");
        }
    }
}
