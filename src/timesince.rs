use chrono::{DateTime, Utc};
use serde::Serialize;

const SECONDS_PER_DAY: i64 = 24 * 3600;

/// `now - past` broken into whole days, then the remaining hours, minutes
/// and seconds. Never negative; no months or years.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Elapsed {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

pub fn elapsed_between(now: DateTime<Utc>, past: DateTime<Utc>) -> Elapsed {
    let total = (now - past).num_seconds();
    if total <= 0 {
        return Elapsed::default();
    }

    let days = total / SECONDS_PER_DAY;
    let rest = total % SECONDS_PER_DAY;
    Elapsed {
        days,
        hours: rest / 3600,
        minutes: rest % 3600 / 60,
        seconds: rest % 60,
    }
}

pub fn elapsed_since(past: DateTime<Utc>) -> Elapsed {
    elapsed_between(Utc::now(), past)
}
