//! Calendar proximity detector — is the sender on an imminent meeting?

use chrono::{DateTime, Utc};

use crate::signals::SignalResult;

/// A calendar event supplied by the host for the briefing window.
#[derive(Debug, Clone)]
pub struct CalendarEvent {
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub attendees: Vec<String>,
}

/// Scores how soon the sender appears on an upcoming event. Buckets are a
/// swappable heuristic behind the `raw score + reasons` contract.
#[derive(Debug, Clone, Default)]
pub struct CalendarProximityDetector;

impl CalendarProximityDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(
        &self,
        sender: &str,
        events: &[CalendarEvent],
        now: DateTime<Utc>,
    ) -> SignalResult {
        let sender_lower = sender.to_lowercase();

        let next_event = events
            .iter()
            .filter(|e| e.starts_at > now)
            .filter(|e| {
                e.attendees
                    .iter()
                    .any(|a| a.to_lowercase() == sender_lower)
            })
            .min_by_key(|e| e.starts_at);

        let Some(event) = next_event else {
            return SignalResult::none();
        };

        let minutes_until = event.starts_at.signed_duration_since(now).num_minutes();
        let raw_score = match minutes_until {
            m if m <= 30 => 1.0,
            m if m <= 120 => 0.7,
            m if m <= 24 * 60 => 0.4,
            m if m <= 48 * 60 => 0.2,
            _ => 0.0,
        };

        let reasons = if raw_score > 0.0 {
            vec![format!(
                "upcoming_meeting: \"{}\" in {} minutes",
                event.title, minutes_until
            )]
        } else {
            Vec::new()
        };

        SignalResult::new(raw_score, reasons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event(title: &str, minutes: i64, attendee: &str) -> CalendarEvent {
        CalendarEvent {
            title: title.into(),
            starts_at: Utc::now() + Duration::minutes(minutes),
            attendees: vec![attendee.into()],
        }
    }

    #[test]
    fn imminent_meeting_scores_max() {
        let now = Utc::now();
        let events = vec![event("1:1 sync", 15, "alice@x.com")];
        let result = CalendarProximityDetector::new().detect("alice@x.com", &events, now);
        assert!((result.raw_score - 1.0).abs() < 1e-6);
        assert!(result.reasons[0].starts_with("upcoming_meeting"));
    }

    #[test]
    fn sender_not_an_attendee_scores_zero() {
        let now = Utc::now();
        let events = vec![event("standup", 15, "bob@x.com")];
        let result = CalendarProximityDetector::new().detect("alice@x.com", &events, now);
        assert_eq!(result.raw_score, 0.0);
    }

    #[test]
    fn past_events_are_ignored() {
        let now = Utc::now();
        let events = vec![event("retro", -60, "alice@x.com")];
        let result = CalendarProximityDetector::new().detect("alice@x.com", &events, now);
        assert_eq!(result.raw_score, 0.0);
    }

    #[test]
    fn nearest_matching_event_wins() {
        let now = Utc::now();
        let events = vec![
            event("far planning", 3 * 24 * 60, "alice@x.com"),
            event("near review", 90, "alice@x.com"),
        ];
        let result = CalendarProximityDetector::new().detect("alice@x.com", &events, now);
        assert!((result.raw_score - 0.7).abs() < 1e-6);
        assert!(result.reasons[0].contains("near review"));
    }

    #[test]
    fn attendee_match_is_case_insensitive() {
        let now = Utc::now();
        let events = vec![event("sync", 15, "Alice@X.com")];
        let result = CalendarProximityDetector::new().detect("alice@x.com", &events, now);
        assert!(result.raw_score > 0.0);
    }
}
