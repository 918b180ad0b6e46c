use chrono::{DateTime, Local, Utc};

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Human-readable session key in local time, e.g. `Oct 19, 3:05 PM`.
/// Minute granularity; uniqueness is the history's job.
pub fn session_label(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%b %-d, %-I:%M %p").to_string()
}

#[cfg(test)]
pub use fixed::FixedClock;

#[cfg(test)]
mod fixed {
    use super::Clock;
    use chrono::{DateTime, TimeDelta, Utc};
    use std::cell::Cell;
    use std::rc::Rc;

    /// Manually advanced clock; clones share the same instant.
    #[derive(Clone)]
    pub struct FixedClock(Rc<Cell<DateTime<Utc>>>);

    impl FixedClock {
        pub fn at(ms: i64) -> Self {
            let t = DateTime::from_timestamp_millis(ms).expect("timestamp in range");
            Self(Rc::new(Cell::new(t)))
        }

        pub fn advance(&self, by: TimeDelta) {
            self.0.set(self.0.get() + by);
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0.get()
        }
    }
}
