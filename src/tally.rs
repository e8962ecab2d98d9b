//! Vote counting and winner selection.

use crate::db::models::{AlarmTime, Document};
use crate::db::paths::TIME_FIELD;
use std::collections::HashMap;
use tracing::warn;

/// Result of counting one channel's votes.
///
/// Only times that received at least one vote have an entry. The winner is
/// the time with the highest count; when several share the highest count, the
/// one that was seen first in the input wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    counts: HashMap<AlarmTime, u64>,
    first_seen: Vec<AlarmTime>,
    winner: Option<AlarmTime>,
}

impl Tally {
    pub fn winner(&self) -> Option<AlarmTime> {
        self.winner
    }

    pub fn counts(&self) -> &HashMap<AlarmTime, u64> {
        &self.counts
    }

    /// Votes for `time`, zero when nobody chose it.
    pub fn count_for(&self, time: AlarmTime) -> u64 {
        self.counts.get(&time).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Counted times with their votes, in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (AlarmTime, u64)> + '_ {
        self.first_seen
            .iter()
            .map(|time| (*time, self.counts[time]))
    }
}

/// Counts the chosen times in input order. `None` entries are voters who
/// opted out and are not counted.
pub fn tally<I>(votes: I) -> Tally
where
    I: IntoIterator<Item = Option<AlarmTime>>,
{
    let mut counts: HashMap<AlarmTime, u64> = HashMap::new();
    let mut first_seen = Vec::new();

    for time in votes.into_iter().flatten() {
        let count = counts.entry(time).or_insert_with(|| {
            first_seen.push(time);
            0
        });
        *count += 1;
    }

    let mut winner: Option<(AlarmTime, u64)> = None;
    for time in &first_seen {
        let count = counts[time];
        if winner.is_none_or(|(_, best)| count > best) {
            winner = Some((*time, count));
        }
    }

    Tally {
        counts,
        first_seen,
        winner: winner.map(|(time, _)| time),
    }
}

/// Tallies vote documents in the order given. A vote whose `time` cannot be
/// read is logged and left out, as if the voter had opted out.
pub fn tally_documents(votes: &[Document]) -> Tally {
    tally(votes.iter().map(|vote| {
        AlarmTime::from_fields(&vote.fields, TIME_FIELD).unwrap_or_else(|e| {
            warn!("Skipping vote {}: {}", vote.path, e);
            None
        })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{DocPath, Fields};
    use serde_json::{Value, json};

    const T1: AlarmTime = AlarmTime::from_millis(1_792_218_600_000);
    const T2: AlarmTime = AlarmTime::from_millis(1_792_220_400_000);
    const T3: AlarmTime = AlarmTime::from_millis(1_792_222_200_000);

    fn vote(user: &str, time: Value) -> Document {
        let mut fields = Fields::new();
        fields.insert(TIME_FIELD.to_string(), time);
        Document::new(
            DocPath::parse(&format!("channels/c1/votes/{user}")).unwrap(),
            fields,
        )
    }

    #[test]
    fn counts_each_chosen_time() {
        let result = tally([Some(T1), Some(T2), Some(T1), None, Some(T3), Some(T1)]);

        assert_eq!(result.count_for(T1), 3);
        assert_eq!(result.count_for(T2), 1);
        assert_eq!(result.count_for(T3), 1);
        assert_eq!(result.total(), 5);
        assert_eq!(result.winner(), Some(T1));
    }

    #[test]
    fn opted_out_votes_leave_no_entry() {
        let result = tally([None, Some(T2), None]);

        assert_eq!(result.counts().len(), 1);
        assert!(!result.counts().contains_key(&T1));
        assert_eq!(result.count_for(T1), 0);
    }

    #[test]
    fn tie_goes_to_first_seen() {
        assert_eq!(tally([Some(T2), Some(T1), Some(T1), Some(T2)]).winner(), Some(T2));
        assert_eq!(tally([Some(T1), Some(T2), Some(T2), Some(T1)]).winner(), Some(T1));
        assert_eq!(tally([Some(T3), Some(T1), Some(T2)]).winner(), Some(T3));
    }

    #[test]
    fn later_value_wins_only_with_strictly_more_votes() {
        let result = tally([Some(T1), Some(T2), Some(T2)]);
        assert_eq!(result.winner(), Some(T2));
    }

    #[test]
    fn no_votes_means_no_winner() {
        assert_eq!(tally(Vec::<Option<AlarmTime>>::new()).winner(), None);
        assert_eq!(tally([None, None]).winner(), None);
        assert!(tally([None]).counts().is_empty());
    }

    #[test]
    fn iter_follows_first_seen_order() {
        let result = tally([Some(T3), Some(T1), Some(T3)]);
        let seen: Vec<_> = result.iter().collect();
        assert_eq!(seen, vec![(T3, 2), (T1, 1)]);
    }

    #[test]
    fn malformed_vote_documents_are_skipped() {
        let votes = vec![
            vote("a", T1.to_value()),
            vote("b", json!("not a time")),
            vote("c", json!({"seconds": 12})),
            vote("d", Value::Null),
            vote("e", T2.to_value()),
        ];

        let result = tally_documents(&votes);
        assert_eq!(result.total(), 2);
        assert_eq!(result.winner(), Some(T1));
    }

    #[test]
    fn vote_without_time_field_is_opted_out() {
        let opted_out = Document::new(
            DocPath::parse("channels/c1/votes/x").unwrap(),
            Fields::new(),
        );
        let result = tally_documents(&[opted_out, vote("y", T2.to_value())]);
        assert_eq!(result.winner(), Some(T2));
        assert_eq!(result.total(), 1);
    }
}
