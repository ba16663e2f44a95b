use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Duration;

/// One disruption affecting a line: planned engineering work, or an
/// unplanned incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisruptionRecord {
    pub is_planned: bool,
    pub description: String,
    #[serde(default)]
    pub affected_routes: Vec<String>,
}

/// Current status of a single transit line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRecord {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub disruptions: Vec<DisruptionRecord>,
}

/// An immutable observation of all transit-line statuses at one instant.
///
/// Two snapshots are ordered by `queried_at`, ties broken by `queried_by`
/// lexicographically — this is the LWW rule used both by the
/// [`StatusRegister`](https://docs.rs) gossip merge and by the Replicator
/// when adopting a peer's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub lines: Vec<LineRecord>,
    pub queried_at: DateTime<Utc>,
    pub queried_by: String,
}

impl Snapshot {
    pub fn new(lines: Vec<LineRecord>, queried_at: DateTime<Utc>, queried_by: impl Into<String>) -> Self {
        Self {
            lines,
            queried_at,
            queried_by: queried_by.into(),
        }
    }

    /// Age of this snapshot relative to `now`, in milliseconds. Never negative;
    /// a snapshot stamped slightly in the future (clock skew) reports zero.
    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.queried_at).num_milliseconds().max(0)
    }

    /// `now - queried_at <= threshold`, the hard/soft "fresh enough" test used
    /// throughout the Replicator (both the periodic-tick register check and
    /// the per-request staleness decision).
    pub fn is_fresh_enough(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.age_ms(now) <= threshold.as_millis() as i64
    }

    /// Returns the line record matching `line_id`, if present.
    pub fn line(&self, line_id: &str) -> Option<&LineRecord> {
        self.lines.iter().find(|l| l.id == line_id)
    }
}

/// Orders by `(queried_at, queried_by)`, the LWW tie-break rule from the data
/// model: newer timestamp wins; equal timestamps are broken by node id.
impl PartialOrd for Snapshot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Snapshot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.queried_at
            .cmp(&other.queried_at)
            .then_with(|| self.queried_by.cmp(&other.queried_by))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snap_at(secs: i64, by: &str) -> Snapshot {
        Snapshot::new(vec![], Utc.timestamp_opt(secs, 0).unwrap(), by)
    }

    #[test]
    fn newer_queried_at_wins() {
        let a = snap_at(100, "node-a");
        let b = snap_at(200, "node-a");
        assert!(b > a);
    }

    #[test]
    fn ties_broken_by_queried_by() {
        let a = snap_at(100, "node-a");
        let b = snap_at(100, "node-b");
        assert!(b > a);
        assert_eq!(a.cmp(&a), Ordering::Equal);
    }

    #[test]
    fn age_ms_never_negative() {
        let snap = Snapshot::new(vec![], Utc::now() + chrono::Duration::seconds(5), "node-a");
        assert_eq!(snap.age_ms(Utc::now()), 0);
    }

    #[test]
    fn is_fresh_enough_respects_threshold() {
        let now = Utc::now();
        let snap = Snapshot::new(vec![], now - chrono::Duration::milliseconds(500), "node-a");
        assert!(snap.is_fresh_enough(now, Duration::from_secs(1)));
        assert!(!snap.is_fresh_enough(now, Duration::from_millis(100)));
    }

    #[test]
    fn line_lookup_by_id() {
        let snap = Snapshot::new(
            vec![LineRecord {
                id: "district".into(),
                name: "District".into(),
                status: "Minor Delays".into(),
                disruptions: vec![],
            }],
            Utc::now(),
            "node-a",
        );
        assert!(snap.line("district").is_some());
        assert!(snap.line("victoria").is_none());
    }
}
