mod notification_sink;
mod player_node;

use std::sync::Arc;

use anyhow::Result;
use duel_domain::{Cents, ItemChoice};
use ledger_store::{InMemoryDocumentStore, LedgerStore};
use match_store::ItemCatalog;
use notification_sink::TracingNotificationSink;
use observability::init_tracing;
use platform_core::AppConfig;
use player_node::PlayerNode;
use settlement::SettlementNotifier;
use tracing::info;

const PLACEHOLDER_ARTWORK: &str = "iVBORw0KGgo=";

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config.app.service_name, &config.observability.log_filter);
    info!(
        env = config.app.env.as_str(),
        store_endpoint = %config.store.endpoint,
        collection_prefix = %config.store.collection_prefix,
        "configuration loaded"
    );

    let store = LedgerStore::with_prefix(
        InMemoryDocumentStore::new(),
        config.store.collection_prefix.clone(),
    );
    let artwork: Vec<(ItemChoice, String)> = ItemChoice::ALL
        .iter()
        .map(|choice| (*choice, PLACEHOLDER_ARTWORK.to_string()))
        .collect();
    ItemCatalog::new(store.clone()).seed_items(&artwork).await?;

    let sink: Arc<dyn SettlementNotifier> =
        Arc::new(TracingNotificationSink::new(config.app.service_name.clone()));
    let alice = PlayerNode::connect(store.clone(), "node-alice", "alice", sink.clone()).await?;
    let bob = PlayerNode::connect(store.clone(), "node-bob", "bob", sink).await?;
    alice.deposit(Cents(500)).await?;
    bob.deposit(Cents(500)).await?;

    let challenge = alice.challenge(bob.username()).await?;
    alice.play(challenge.id, ItemChoice::Rock, Cents(100)).await?;
    for pending in bob.inbox().await? {
        bob.accept(pending.id).await?;
        let report = bob.play(pending.id, ItemChoice::Scissors, Cents(100)).await?;
        info!(
            match_id = %pending.id,
            status = report.match_doc.status.as_str(),
            outcome = ?report.outcome,
            "demo duel settled"
        );
    }
    let host_notices = alice.poll_results().await?;
    let alice_stats = alice.stats().await?;
    bob.withdraw(Cents(100)).await?;

    info!(
        alice = %alice.balance().await?.amount,
        bob = %bob.balance().await?.amount,
        alice_wins = alice_stats.wins,
        alice_total_won = %alice_stats.total_won,
        bob_transactions = bob.transactions().await?.len(),
        opponents_for_alice = alice.opponents().await?.len(),
        host_notices = host_notices.len(),
        items = alice.items().await?.len(),
        "demo balances"
    );
    alice.disconnect().await?;
    bob.disconnect().await?;
    info!("duel-server bootstrap complete");
    Ok(())
}
