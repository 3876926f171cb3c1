use scout_common::coerce::{coerce, Coerced};
use scout_common::constants::{METRICS_LINE_KEY, METRICS_SECTION_MARKER};
use scout_common::{EntityStates, MetricsParseError, SerfState, StateValue};
use tracing::{debug, warn};

/// Extracts `entity -> state` pairs from a metrics page.
///
/// Only the `status` gauge section is read; everything before its `# TYPE` marker is
/// ignored. Lines that look like samples but can't be split are skipped.
pub fn parse_metrics(body: &str) -> Result<EntityStates, MetricsParseError> {
    let mut states = EntityStates::new();

    let section = body
        .lines()
        .skip_while(|line| line.trim() != METRICS_SECTION_MARKER)
        .skip(1);

    for line in section.filter(|line| line.contains(METRICS_LINE_KEY)) {
        match parse_sample(line) {
            Some((entity, value)) => {
                states.insert(entity, value);
            }
            None => warn!(line, "skipping malformed status sample"),
        }
    }

    if states.is_empty() {
        return Err(MetricsParseError::Empty);
    }

    debug!(entities = states.len(), "parsed status samples");
    Ok(states)
}

pub fn parse_metrics_bytes(body: &[u8]) -> Result<EntityStates, MetricsParseError> {
    let text = std::str::from_utf8(body).map_err(|_| MetricsParseError::Encoding)?;
    parse_metrics(text)
}

// status{name="<entity>"} <value>
fn parse_sample(line: &str) -> Option<(String, StateValue)> {
    let (labels, raw_value) = line.split_once(' ')?;
    let entity = labels.split('"').nth(1).filter(|e| !e.is_empty())?;
    // an unterminated quote has no closing half
    if labels.matches('"').count() < 2 {
        return None;
    }
    Some((entity.to_string(), state_value(raw_value.trim())))
}

pub fn state_value(raw: &str) -> StateValue {
    match coerce(raw) {
        Coerced::Integer(ordinal) => SerfState::from_ordinal(ordinal)
            .map(StateValue::Serf)
            .unwrap_or_else(|| StateValue::raw(raw)),
        _ => StateValue::raw(raw),
    }
}
