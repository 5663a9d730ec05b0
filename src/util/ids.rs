//! Task identifier generation.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Build a time-sortable task id of the form `T-YYYYMMDD-HHMMSS-xxxxxx`.
pub fn task_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("T-{}-{}", now.format("%Y%m%d-%H%M%S"), &suffix[..6])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_task_id_shape() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 18, 5, 9).unwrap();
        let id = task_id(now);
        assert!(id.starts_with("T-20261019-180509-"));
        assert_eq!(id.len(), "T-20261019-180509-".len() + 6);
    }

    #[test]
    fn test_task_ids_unique_within_same_second() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_ne!(task_id(now), task_id(now));
    }

    #[test]
    fn test_task_ids_sort_by_time() {
        let earlier = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 1).unwrap();
        assert!(task_id(earlier) < task_id(later));
    }
}
