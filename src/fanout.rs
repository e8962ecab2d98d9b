//! Writes a channel's tally to every document that caches it.

use crate::db::models::{AlarmTime, DocPath};
use crate::db::paths::{self, TIME_FIELD};
use crate::db::repositories::{
    find_subscriptions, list_options, set_channel_alarm, set_option_votes,
    set_subscription_alarm,
};
use crate::db::store::SharedStore;
use crate::error::StoreError;
use crate::tally::Tally;
use futures::future::join_all;
use tracing::{info, warn};

/// A write or scan that did not go through. Nothing is retried; the next
/// vote change recomputes everything.
#[derive(Debug)]
pub struct WriteFailure {
    pub path: String,
    pub error: StoreError,
}

#[derive(Debug, Default)]
pub struct PropagationReport {
    pub options_written: usize,
    pub subscriptions_written: usize,
    pub channel_written: bool,
    pub failures: Vec<WriteFailure>,
}

impl PropagationReport {
    pub fn is_complete(&self) -> bool {
        self.channel_written && self.failures.is_empty()
    }

    fn record(&mut self, path: impl ToString, error: StoreError) {
        let path = path.to_string();
        warn!("Fan-out write to {} failed: {}", path, error);
        self.failures.push(WriteFailure { path, error });
    }

    fn absorb(&mut self, other: PropagationReport) {
        self.options_written += other.options_written;
        self.subscriptions_written += other.subscriptions_written;
        self.channel_written |= other.channel_written;
        self.failures.extend(other.failures);
    }
}

#[derive(Clone)]
pub struct Propagator {
    store: SharedStore,
}

impl Propagator {
    pub fn new(store: SharedStore) -> Self {
        Propagator { store }
    }

    /// Writes per-option counts and the winner. The option counts and the
    /// subscription copies are written concurrently; the channel's own
    /// `currentAlarm` goes last. One failing document never stops the rest.
    pub async fn propagate(&self, channel_id: &str, tally: &Tally) -> PropagationReport {
        let winner = tally.winner();

        let (options, subscriptions) = tokio::join!(
            self.write_option_counts(channel_id, tally),
            self.write_subscription_alarms(channel_id, winner),
        );

        let mut report = PropagationReport::default();
        report.absorb(options);
        report.absorb(subscriptions);

        match set_channel_alarm(self.store.as_ref(), channel_id, winner).await {
            Ok(()) => report.channel_written = true,
            Err(e) => report.record(paths::channel(channel_id), e),
        }

        info!(
            "Propagated channel {} winner {}: {} options, {} subscriptions, {} failures",
            channel_id,
            winner.map_or_else(|| "none".to_string(), |w| w.to_string()),
            report.options_written,
            report.subscriptions_written,
            report.failures.len()
        );

        report
    }

    async fn write_option_counts(&self, channel_id: &str, tally: &Tally) -> PropagationReport {
        let mut report = PropagationReport::default();
        let store = self.store.as_ref();

        let options = match list_options(store, channel_id).await {
            Ok(options) => options,
            Err(e) => {
                report.record(paths::options(channel_id), e);
                return report;
            }
        };

        let writes = options.iter().map(|option| {
            let votes = match AlarmTime::from_fields(&option.fields, TIME_FIELD) {
                Ok(Some(time)) => tally.count_for(time),
                Ok(None) => 0,
                Err(e) => {
                    warn!("Option {} has no usable time: {}", option.path, e);
                    0
                }
            };
            async move {
                let result = set_option_votes(store, &option.path, votes).await;
                (&option.path, result)
            }
        });

        for (path, result) in join_all(writes).await {
            match result {
                Ok(()) => report.options_written += 1,
                Err(e) => report.record(path, e),
            }
        }

        report
    }

    async fn write_subscription_alarms(
        &self,
        channel_id: &str,
        winner: Option<AlarmTime>,
    ) -> PropagationReport {
        let mut report = PropagationReport::default();
        let store = self.store.as_ref();

        let subscriptions: Vec<DocPath> = match find_subscriptions(store, channel_id).await {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                report.record(format!("*/{}", paths::SUBSCRIBED_CHANNELS), e);
                return report;
            }
        };

        let writes = subscriptions.iter().map(|subscription| async move {
            let result = set_subscription_alarm(store, subscription, winner).await;
            (subscription, result)
        });

        for (path, result) in join_all(writes).await {
            match result {
                Ok(()) => report.subscriptions_written += 1,
                Err(e) => report.record(path, e),
            }
        }

        report
    }
}
