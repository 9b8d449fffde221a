use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApplierId, JobId};

/// A single "applier looked at job" event.
///
/// Events are append-only: the recommendation core never mutates or deletes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewEvent {
    pub id: Uuid,
    pub applier_id: ApplierId,
    pub job_id: JobId,
    pub viewed_at: DateTime<Utc>,
}

/// Request body for logging a view
#[derive(Debug, Clone, Deserialize)]
pub struct NewViewEvent {
    pub applier_id: ApplierId,
    pub job_id: JobId,
    /// Defaults to the time the event is recorded
    #[serde(default)]
    pub viewed_at: Option<DateTime<Utc>>,
}

impl NewViewEvent {
    pub fn new(applier_id: ApplierId, job_id: JobId) -> Self {
        Self {
            applier_id,
            job_id,
            viewed_at: None,
        }
    }

    /// Stamps the event with an id and a timestamp
    pub fn into_event(self) -> ViewEvent {
        ViewEvent {
            id: Uuid::new_v4(),
            applier_id: self.applier_id,
            job_id: self.job_id,
            viewed_at: self.viewed_at.unwrap_or_else(Utc::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_into_event_keeps_explicit_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let new = NewViewEvent {
            applier_id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            viewed_at: Some(at),
        };

        let event = new.clone().into_event();
        assert_eq!(event.viewed_at, at);
        assert_eq!(event.applier_id, new.applier_id);
        assert_eq!(event.job_id, new.job_id);
    }

    #[test]
    fn test_into_event_defaults_timestamp_to_now() {
        let before = Utc::now();
        let event = NewViewEvent::new(Uuid::new_v4(), Uuid::new_v4()).into_event();
        assert!(event.viewed_at >= before);
    }

    #[test]
    fn test_new_view_event_deserializes_without_timestamp() {
        let json = r#"{
            "applier_id": "6f1c8a0e-2b8f-4c3e-9a53-0d2f5d3b8a11",
            "job_id": "0b7e6a1c-8d55-4f0e-9a3c-27d1c0c5e9f2"
        }"#;
        let new: NewViewEvent = serde_json::from_str(json).unwrap();
        assert!(new.viewed_at.is_none());
    }
}
