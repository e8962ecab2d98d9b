use crate::bootstrap::Bootstrapper;
use crate::db::repositories::{list_votes, set_has_voted};
use crate::db::store::{ChangeStream, SharedStore};
use crate::error::StoreError;
use crate::fanout::{PropagationReport, Propagator};
use crate::tally::{Tally, tally_documents};
use crate::triggers::locks::ChannelLocks;
use crate::triggers::models::{SubscriberAdded, TriggerEvent, VoteChanged};
use futures::StreamExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub enum DispatchOutcome {
    Recounted {
        tally: Tally,
        report: PropagationReport,
    },
    /// The vote scan failed, so nothing was propagated.
    RecountSkipped(StoreError),
    Bootstrapped,
    BootstrapFailed(StoreError),
}

impl DispatchOutcome {
    pub fn to_json(&self) -> Value {
        match self {
            DispatchOutcome::Recounted { tally, report } => json!({
                "outcome": "recounted",
                "winner": tally.winner().map(|w| w.to_value()),
                "counts": tally
                    .iter()
                    .map(|(time, votes)| json!({"time": time.to_value(), "votes": votes}))
                    .collect::<Vec<_>>(),
                "optionsWritten": report.options_written,
                "subscriptionsWritten": report.subscriptions_written,
                "channelWritten": report.channel_written,
                "failures": report
                    .failures
                    .iter()
                    .map(|f| json!({"path": f.path, "error": f.error.to_string()}))
                    .collect::<Vec<_>>(),
            }),
            DispatchOutcome::RecountSkipped(e) => json!({
                "outcome": "recount_skipped",
                "error": e.to_string(),
            }),
            DispatchOutcome::Bootstrapped => json!({"outcome": "bootstrapped"}),
            DispatchOutcome::BootstrapFailed(e) => json!({
                "outcome": "bootstrap_failed",
                "error": e.to_string(),
            }),
        }
    }
}

/// Runs the handler for each trigger event. Holds no per-event state; every
/// event is a unit of work that can run concurrently with any other.
#[derive(Clone)]
pub struct Dispatcher {
    store: SharedStore,
    propagator: Propagator,
    bootstrapper: Bootstrapper,
    channel_locks: Option<Arc<ChannelLocks>>,
}

impl Dispatcher {
    /// With `serialize_channels`, recounts of one channel never overlap within
    /// this process.
    pub fn new(store: SharedStore, serialize_channels: bool) -> Self {
        Dispatcher {
            propagator: Propagator::new(store.clone()),
            bootstrapper: Bootstrapper::new(store.clone()),
            channel_locks: serialize_channels.then(|| Arc::new(ChannelLocks::new())),
            store,
        }
    }

    pub async fn dispatch(&self, event: TriggerEvent) -> DispatchOutcome {
        match event {
            TriggerEvent::VoteChanged(vote) => self.on_vote_changed(vote).await,
            TriggerEvent::SubscriberAdded(subscriber) => {
                self.on_subscriber_added(subscriber).await
            }
        }
    }

    pub fn spawn(&self, event: TriggerEvent) -> JoinHandle<DispatchOutcome> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.dispatch(event).await })
    }

    /// Consumes a change feed until it ends, spawning one task per event.
    pub async fn run(self, mut changes: ChangeStream) {
        info!("Dispatcher listening for document changes");
        while let Some(change) = changes.next().await {
            let path = change.path.clone();
            match TriggerEvent::classify(change) {
                Some(event) => {
                    debug!(
                        "Dispatching change to {} for user {} in channel {}",
                        path,
                        event.user_id(),
                        event.channel_id()
                    );
                    self.spawn(event);
                }
                None => debug!("No trigger for change to {}", path),
            }
        }
        error!("Change feed ended, dispatcher stopped");
    }

    async fn on_vote_changed(&self, vote: VoteChanged) -> DispatchOutcome {
        let has_voted = vote.has_voted();
        if let Err(e) =
            set_has_voted(self.store.as_ref(), &vote.user_id, &vote.channel_id, has_voted).await
        {
            warn!(
                "Could not record hasVoted={} for {} in {}: {}",
                has_voted, vote.user_id, vote.channel_id, e
            );
        }

        self.recount(&vote.channel_id).await
    }

    async fn on_subscriber_added(&self, subscriber: SubscriberAdded) -> DispatchOutcome {
        match self
            .bootstrapper
            .bootstrap(&subscriber.user_id, &subscriber.channel_id)
            .await
        {
            Ok(()) => DispatchOutcome::Bootstrapped,
            Err(e) => {
                warn!(
                    "Subscription bootstrap for {} in {} failed: {}",
                    subscriber.user_id, subscriber.channel_id, e
                );
                DispatchOutcome::BootstrapFailed(e)
            }
        }
    }

    /// Reads every vote of the channel, tallies, and fans the result out.
    pub async fn recount(&self, channel_id: &str) -> DispatchOutcome {
        let _guard = match &self.channel_locks {
            Some(locks) => Some(locks.lock(channel_id).await),
            None => None,
        };

        let votes = match list_votes(self.store.as_ref(), channel_id).await {
            Ok(votes) => votes,
            Err(e) => {
                error!("Could not read votes of channel {}: {}", channel_id, e);
                return DispatchOutcome::RecountSkipped(e);
            }
        };

        let tally = tally_documents(&votes);
        let report = self.propagator.propagate(channel_id, &tally).await;
        DispatchOutcome::Recounted { tally, report }
    }
}
