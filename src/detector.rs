use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, Local, NaiveTime};
use serde_derive::Deserialize;

use crate::messages::{ABSENT_RSSI, Presence};

/// RSSI values the radio can plausibly report. Anything outside is a
/// misbehaving sampler and is treated the same as no reading at all.
const RSSI_DOMAIN: std::ops::RangeInclusive<i32> = -127..=127;

/// Exclusive RSSI band that counts as present: `low < rssi < high`.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Threshold {
    pub low: i32,
    pub high: i32,
}

impl Threshold {
    pub fn contains(&self, rssi: i32) -> bool {
        self.low < rssi && rssi < self.high
    }
}

/// Outcome of classifying a single sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub state: Presence,
    pub rssi: i32,
    /// Set when daily mode fired: the monitor loop should idle until this
    /// local-midnight deadline before sampling again (unless running in
    /// debug mode, where the deadline is only reported).
    pub suspend_until: Option<DateTime<Local>>,
}

impl Classification {
    fn not_home(rssi: i32) -> Self {
        Classification {
            state: Presence::NotHome,
            rssi,
            suspend_until: None,
        }
    }
}

/// The per-device presence state machine. Stateless by itself: the same
/// sample and clock reading always produce the same classification, so the
/// debounce deadline lives in the returned `Classification`, not in here.
#[derive(Debug, Clone, Copy)]
pub struct Detector {
    threshold: Threshold,
    daily: bool,
}

impl Detector {
    pub fn new(threshold: Threshold, daily: bool) -> Self {
        Detector { threshold, daily }
    }

    /// Classify one RSSI sample taken at `now`. `None` means the address was
    /// not observed this cycle and always yields `not_home` with the absent
    /// marker, bypassing any debounce logic.
    pub fn classify(&self, sample: Option<i32>, now: DateTime<Local>) -> Classification {
        let rssi = match sample {
            Some(r) if RSSI_DOMAIN.contains(&r) => r,
            _ => return Classification::not_home(ABSENT_RSSI),
        };

        if self.threshold.contains(rssi) {
            Classification {
                state: Presence::Home,
                rssi,
                suspend_until: self.daily.then(|| next_midnight(now)),
            }
        } else {
            Classification::not_home(rssi)
        }
    }
}

/// 00:00:00 of the local day after `now`.
pub fn next_midnight(now: DateTime<Local>) -> DateTime<Local> {
    let tomorrow = (now.date_naive() + chrono::Days::new(1)).and_time(NaiveTime::MIN);
    match tomorrow.and_local_timezone(Local) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        // Midnight does not exist on DST-jump days; a flat day is close enough.
        LocalResult::None => now + Duration::hours(24),
    }
}
