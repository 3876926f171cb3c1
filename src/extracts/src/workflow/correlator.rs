use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use scout_common::WorkflowEvent;
use tracing::debug;

use super::classifier::Trigger;
use super::LogLine;

/// Walks one deployment's log lines and tracks a workflow per entity.
struct Correlator<'a> {
    deployment: &'a str,
    open: HashMap<String, WorkflowEvent>,
    emitted: Vec<WorkflowEvent>,
}

impl<'a> Correlator<'a> {
    fn new(deployment: &'a str) -> Self {
        Correlator {
            deployment,
            open: HashMap::new(),
            emitted: Vec::new(),
        }
    }

    fn apply(&mut self, line: &LogLine, trigger: &Trigger) {
        match trigger {
            Trigger::Start {
                workflow_id,
                entities,
            } => {
                for entity in entities {
                    if self.open.contains_key(entity) {
                        debug!(
                            deployment = self.deployment,
                            entity = %entity,
                            at = %line.timestamp,
                            "ignoring duplicate workflow start"
                        );
                        continue;
                    }
                    let event = WorkflowEvent::open(
                        self.deployment,
                        entity.as_str(),
                        workflow_id.as_str(),
                        line.timestamp,
                    );
                    self.open.insert(entity.clone(), event);
                }
            }
            Trigger::Attempt { entity } => match self.open.get_mut(entity) {
                Some(event) => event.increment_attempts(),
                None => debug!(
                    deployment = self.deployment,
                    entity = %entity,
                    at = %line.timestamp,
                    "ignoring attempt with no open workflow"
                ),
            },
            Trigger::Recovered { entity } => match self.open.remove(entity) {
                Some(mut event) => {
                    event.close(line.timestamp);
                    self.emitted.push(event);
                }
                None => debug!(
                    deployment = self.deployment,
                    entity = %entity,
                    at = %line.timestamp,
                    "ignoring recovery with no open workflow"
                ),
            },
        }
    }

    fn finish(mut self) -> Vec<WorkflowEvent> {
        let unrecovered = self
            .open
            .into_values()
            .sorted_by(|a, b| (a.start_time, &a.entity).cmp(&(b.start_time, &b.entity)));
        for event in unrecovered {
            debug!(
                deployment = self.deployment,
                entity = %event.entity,
                "closing unrecovered workflow"
            );
            self.emitted.push(event);
        }
        self.emitted
    }
}

/// Correlates the lines of one deployment from the triggers they already carry.
///
/// Lines are stably sorted by timestamp first; lines sharing a timestamp keep their
/// original order. Workflows still open at the end are returned unrecovered.
pub fn correlate(deployment: &str, mut lines: Vec<LogLine>) -> Vec<WorkflowEvent> {
    lines.sort_by_key(|line| line.timestamp);

    let mut correlator = Correlator::new(deployment);
    for line in &lines {
        for trigger in &line.triggers {
            correlator.apply(line, trigger);
        }
    }
    correlator.finish()
}

/// Correlates every deployment and merges the results ordered by start time.
pub fn correlate_deployments(logs: BTreeMap<String, Vec<LogLine>>) -> Vec<WorkflowEvent> {
    logs.into_iter()
        .flat_map(|(deployment, lines)| correlate(&deployment, lines))
        .sorted_by_key(|event| event.start_time)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 9, 24, 17, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn start(minute: i64, id: &str, vms: &[&str]) -> LogLine {
        let pairs = vms
            .iter()
            .map(|vm| format!("\"{vm}\":\"10.0.0.1\""))
            .join(",");
        LogLine::new(
            t(minute),
            format!(
                "Successfully started workflow with id wf.--.HighAvailabilityWorkflow__top, variables {{WFSContext={{}}, vms={{{pairs}}}}} and business key HA_x_{id}"
            ),
        )
    }

    fn attempt(minute: i64, vm: &str) -> LogLine {
        LogLine::new(t(minute), format!("Marking inner stack unhealthy for {vm}"))
    }

    fn recovered(minute: i64, vm: &str) -> LogLine {
        LogLine::new(t(minute), format!("VM ( {vm} ) successfully restored"))
    }

    #[test]
    fn test_shared_start_then_independent_lifecycles() {
        let lines = vec![
            start(1, "100", &["A", "B"]),
            attempt(2, "A"),
            recovered(3, "A"),
            attempt(4, "B"),
        ];

        let events = correlate("staging01", lines);

        assert_eq!(events.len(), 2);
        let a = &events[0];
        assert_eq!(a.entity, "A");
        assert_eq!(a.workflow_id, "100");
        assert_eq!(a.start_time, t(1));
        assert_eq!(a.recovered_time, Some(t(3)));
        assert_eq!(a.attempts, 1);

        let b = &events[1];
        assert_eq!(b.entity, "B");
        assert_eq!(b.start_time, t(1));
        assert_eq!(b.recovered_time, None);
        assert_eq!(b.attempts, 1);
        assert!(events.iter().all(|e| e.deployment == "staging01"));
    }

    #[test]
    fn test_duplicate_start_keeps_first() {
        let lines = vec![
            start(1, "100", &["A"]),
            start(2, "200", &["A"]),
            recovered(5, "A"),
        ];

        let events = correlate("staging01", lines);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].workflow_id, "100");
        assert_eq!(events[0].start_time, t(1));
        assert_eq!(events[0].recovered_time, Some(t(5)));
    }

    #[test]
    fn test_orphan_attempts_and_recoveries_are_ignored() {
        let lines = vec![attempt(1, "A"), recovered(2, "A"), attempt(3, "B")];
        assert!(correlate("staging01", lines).is_empty());
    }

    #[test]
    fn test_entity_can_reopen_after_recovery() {
        let lines = vec![
            start(1, "100", &["A"]),
            recovered(2, "A"),
            start(3, "300", &["A"]),
            attempt(4, "A"),
            attempt(5, "A"),
        ];

        let events = correlate("staging01", lines);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].workflow_id, "100");
        assert!(events[0].is_recovered());
        assert_eq!(events[1].workflow_id, "300");
        assert_eq!(events[1].attempts, 2);
        assert!(!events[1].is_recovered());
    }

    #[test]
    fn test_lines_are_sorted_before_walking() {
        let lines = vec![recovered(3, "A"), attempt(2, "A"), start(1, "100", &["A"])];

        let events = correlate("staging01", lines);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].attempts, 1);
        assert_eq!(events[0].recovered_time, Some(t(3)));
    }

    #[test]
    fn test_deployments_are_merged_by_start_time() {
        let logs = BTreeMap::from([
            ("alpha".to_string(), vec![start(5, "500", &["A"])]),
            ("beta".to_string(), vec![start(1, "100", &["B"]), recovered(2, "B")]),
        ]);

        let events = correlate_deployments(logs);

        let order: Vec<_> = events.iter().map(|e| (e.deployment.as_str(), e.entity.as_str())).collect();
        assert_eq!(order, vec![("beta", "B"), ("alpha", "A")]);
    }

    #[test]
    fn test_walks_the_triggers_carried_by_each_line() {
        let opened = LogLine::with_triggers(
            "2019-09-24 17:01:00,000 start",
            vec![Trigger::Start {
                workflow_id: "100".into(),
                entities: vec!["A".into()],
            }],
        )
        .unwrap();
        let closed = LogLine::with_triggers(
            "2019-09-24 17:02:00,000 done",
            vec![Trigger::Recovered { entity: "A".into() }],
        )
        .unwrap();

        let events = correlate("staging01", vec![opened, closed]);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].recovered_time, Some(t(2)));
    }
}
