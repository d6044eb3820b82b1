use chrono::{DateTime, Duration, Local, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One local calendar hour, formatted `YYYY-MM-DD-HH`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HourKey(String);

impl HourKey {
    pub fn from_time<Tz: TimeZone>(time: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self(time.format("%Y-%m-%d-%H").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HourKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Top of the hour following `now`, in the same time zone.
pub fn next_hour_boundary<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let truncated = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or_else(|| now.clone());
    truncated + Duration::hours(1)
}

/// A headline ready to be shown and persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Headline {
    pub text: String,
    pub source: String,
    pub url: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// The single durable record behind the widget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    pub last_hour_key: Option<HourKey>,
    pub dismissed_hour_key: Option<HourKey>,
    pub headline: Option<String>,
    pub source: Option<String>,
    pub url: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl PersistedState {
    pub fn apply_headline(&mut self, headline: Headline) {
        self.headline = Some(headline.text);
        self.source = Some(headline.source);
        self.url = headline.url;
        self.fetched_at = Some(headline.fetched_at);
    }

    pub fn has_headline(&self) -> bool {
        self.headline.is_some()
    }

    /// `"{source} • {HH:MM}"` in local time.
    pub fn caption(&self) -> String {
        let source = self.source.as_deref().unwrap_or("—");
        let at = self.fetched_at.unwrap_or_else(Utc::now).with_timezone(&Local);
        format!("{} • {}", source, at.format("%H:%M"))
    }
}

/// Short indicator of the most recent controller action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Ready(String),
    Cached,
    Fetching,
    Updated,
    NoApiKey,
    ApiError,
    Dismissed,
    Undone,
    Saved,
    EmptyKey,
    Cleared,
}

impl Status {
    pub fn label(&self) -> String {
        let text = match self {
            Status::Ready(text) => text.as_str(),
            Status::Cached => "cached",
            Status::Fetching => "fetching",
            Status::Updated => "updated",
            Status::NoApiKey => "no api key",
            Status::ApiError => "api error",
            Status::Dismissed => "dismissed",
            Status::Undone => "undone",
            Status::Saved => "saved",
            Status::EmptyKey => "empty key",
            Status::Cleared => "cleared",
        };
        text.to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(h: u32, m: u32, s: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 9, h, m, s)
            .unwrap()
    }

    #[test]
    fn hour_key_is_stable_within_an_hour() {
        assert_eq!(HourKey::from_time(&at(14, 0, 0)), HourKey::from_time(&at(14, 59, 59)));
        assert_eq!(HourKey::from_time(&at(14, 31, 7)).as_str(), "2024-03-09-14");
    }

    #[test]
    fn hour_key_changes_across_adjacent_hours() {
        assert_ne!(HourKey::from_time(&at(14, 59, 59)), HourKey::from_time(&at(15, 0, 0)));
    }

    #[test]
    fn hour_key_uses_the_local_offset() {
        let local = at(0, 30, 0);
        let utc = local.with_timezone(&Utc);
        assert_eq!(HourKey::from_time(&local).as_str(), "2024-03-09-00");
        assert_eq!(HourKey::from_time(&utc).as_str(), "2024-03-08-22");
    }

    #[test]
    fn next_boundary_is_top_of_next_hour() {
        assert_eq!(next_hour_boundary(&at(14, 31, 7)), at(15, 0, 0));
        assert_eq!(next_hour_boundary(&at(23, 0, 0)).to_rfc3339(), "2024-03-10T00:00:00+02:00");
    }

    #[test]
    fn persisted_state_json_round_trip() {
        let state = PersistedState {
            last_hour_key: Some(HourKey::from_time(&at(9, 5, 0))),
            dismissed_hour_key: Some(HourKey::from_time(&at(8, 0, 0))),
            headline: Some("Markets rally".to_string()),
            source: Some("Reuters".to_string()),
            url: Some("https://example.com/a".to_string()),
            fetched_at: Some(at(9, 5, 0).with_timezone(&Utc)),
        };

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"lastHourKey\":\"2024-03-09-09\""));
        assert!(json.contains("\"dismissedHourKey\""));

        let parsed: PersistedState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let parsed: PersistedState = serde_json::from_str(r#"{"headline":"x"}"#).unwrap();
        assert_eq!(parsed.headline.as_deref(), Some("x"));
        assert!(parsed.last_hour_key.is_none());
        assert!(parsed.fetched_at.is_none());
    }

    #[test]
    fn status_labels_are_upper_case() {
        assert_eq!(Status::NoApiKey.label(), "NO API KEY");
        assert_eq!(Status::Ready("web mode ✓".into()).label(), "WEB MODE ✓");
    }
}
