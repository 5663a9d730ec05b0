//! Wall-clock helpers.

use chrono::{DateTime, Local, Utc};

/// Current UTC timestamp.
pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Current local time; quiet hours are judged on the local wall clock.
pub fn local_now() -> DateTime<Local> {
    Local::now()
}
