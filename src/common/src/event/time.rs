//! Text form of event timestamps, shared by the CSV and JSON event files.
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};

pub const EVENT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";
const EVENT_TIME_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

pub fn truncate_to_millis(t: DateTime<Utc>) -> DateTime<Utc> {
    t.trunc_subsecs(3)
}

pub fn format_event_time(t: &DateTime<Utc>) -> String {
    t.format(EVENT_TIME_FORMAT).to_string()
}

pub fn parse_event_time(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s.trim(), EVENT_TIME_PARSE_FORMAT).map(|t| t.and_utc())
}

pub mod serde_event_time {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_event_time(t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_event_time(&s).map_err(serde::de::Error::custom)
    }
}

pub mod serde_event_time_option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        t: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match t {
            Some(t) => serializer.serialize_some(&super::format_event_time(t)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| super::parse_event_time(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
