use chrono::{DateTime, Duration, Utc};
use scout_common::{Event, StateSnapshot};
use tracing::{debug, warn};

/// Compares the snapshot of the previous run with the current one.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotDiff {
    freshness_window: Duration,
}

impl SnapshotDiff {
    pub fn new(freshness_window: std::time::Duration) -> Self {
        SnapshotDiff {
            freshness_window: Duration::from_std(freshness_window).unwrap_or(Duration::MAX),
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        SnapshotDiff::new(std::time::Duration::from_secs(secs))
    }

    pub fn is_stale(&self, former: &StateSnapshot, now: DateTime<Utc>) -> bool {
        now.checked_sub_signed(self.freshness_window)
            .is_some_and(|oldest_fresh| former.timestamp < oldest_fresh)
    }

    /// Derives the events between `former` and `current`. All events carry `now`.
    ///
    /// A first run (no former snapshot) yields nothing. Entities that appear for the
    /// first time inside an already known source are not reported.
    pub fn diff(
        &self,
        former: Option<&StateSnapshot>,
        current: &StateSnapshot,
        now: DateTime<Utc>,
    ) -> Vec<Event> {
        let Some(former) = former else {
            warn!("no former state, no events will be generated");
            return Vec::new();
        };

        let mut events = Vec::new();

        if self.is_stale(former, now) {
            let event = Event::stale_snapshot(
                now,
                former.timestamp,
                self.freshness_window.num_seconds().max(0) as u64,
            );
            warn!("{}", event.message);
            events.push(event);
        }

        for source in current.sources().filter(|s| !former.contains_source(s)) {
            events.push(Event::new_source(now, source));
        }

        for (source, former_entities) in &former.metrics {
            let Some(current_entities) = current.source(source) else {
                events.push(Event::source_missing(now, source));
                continue;
            };

            for (entity, previous) in former_entities {
                match current_entities.get(entity) {
                    None => events.push(Event::entity_missing(now, source, entity)),
                    Some(value) if value != previous => events.push(Event::state_transition(
                        now,
                        source,
                        entity,
                        &previous.to_string(),
                        &value.to_string(),
                    )),
                    Some(_) => {}
                }
            }
        }

        debug!(events = events.len(), "snapshot diff complete");
        events
    }
}
