use chrono::{DateTime, FixedOffset, Local};

/// Timestamps in the log look like `16.10.2026 14:03:27 UTC+02:00`.
const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M:%S UTC%:z";
const FILE_STAMP_FORMAT: &str = "%d.%m.%Y_%H-%M-%S";

pub trait Clock: Send {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock in the machine's local offset.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

pub fn format_timestamp(time: &DateTime<FixedOffset>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_file_stamp(time: &DateTime<FixedOffset>) -> String {
    time.format(FILE_STAMP_FORMAT).to_string()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Duration, FixedOffset};

    use super::Clock;

    /// Clock that only moves when told to. Clones share the same time.
    #[derive(Clone)]
    pub struct ManualClock(Arc<Mutex<DateTime<FixedOffset>>>);

    impl ManualClock {
        pub fn new(rfc3339: &str) -> Self {
            let time = DateTime::parse_from_rfc3339(rfc3339).unwrap();
            Self(Arc::new(Mutex::new(time)))
        }

        pub fn advance(&self, seconds: i64) {
            let mut time = self.0.lock().unwrap();
            *time += Duration::seconds(seconds);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<FixedOffset> {
            *self.0.lock().unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats() {
        let time = DateTime::parse_from_rfc3339("2024-06-05T07:08:09+02:00").unwrap();
        assert_eq!(format_timestamp(&time), "05.06.2024 07:08:09 UTC+02:00");
        assert_eq!(format_file_stamp(&time), "05.06.2024_07-08-09");

        let utc = DateTime::parse_from_rfc3339("2024-12-31T23:59:59Z").unwrap();
        assert_eq!(format_timestamp(&utc), "31.12.2024 23:59:59 UTC+00:00");
    }
}
