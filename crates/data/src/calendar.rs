//! Static news calendar backed by a configured event list.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sentinel_core::error::Result;
use sentinel_core::events::NewsEvent;
use sentinel_core::traits::NewsCalendar;

/// Calendar serving a fixed list of scheduled events.
#[derive(Default)]
pub struct StaticNewsCalendar {
    events: Vec<NewsEvent>,
}

impl StaticNewsCalendar {
    #[must_use]
    pub fn new(events: Vec<NewsEvent>) -> Self {
        Self { events }
    }

    /// A calendar with nothing scheduled.
    #[must_use]
    pub fn quiet() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NewsCalendar for StaticNewsCalendar {
    async fn get_events(&self, minutes_back: i64, minutes_ahead: i64) -> Result<Vec<NewsEvent>> {
        let now = Utc::now();
        let from = now - Duration::minutes(minutes_back);
        let to = now + Duration::minutes(minutes_ahead);
        Ok(self
            .events
            .iter()
            .filter(|event| event.timestamp >= from && event.timestamp <= to)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::events::NewsImpact;

    #[tokio::test]
    async fn returns_only_events_inside_the_window() {
        let now = Utc::now();
        let calendar = StaticNewsCalendar::new(vec![
            NewsEvent {
                timestamp: now + Duration::minutes(10),
                impact: NewsImpact::High,
                title: "CPI".to_string(),
            },
            NewsEvent {
                timestamp: now + Duration::hours(6),
                impact: NewsImpact::High,
                title: "far away".to_string(),
            },
        ]);
        let events = calendar.get_events(30, 30).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "CPI");
    }

    #[tokio::test]
    async fn quiet_calendar_is_empty() {
        let calendar = StaticNewsCalendar::quiet();
        assert!(calendar.get_events(60, 60).await.unwrap().is_empty());
    }
}
