//! Presentation timestamps.

use std::fmt;

/// Ticks per second of the MPEG-2 system clock used for Blu-ray PTS values.
pub const TICKS_PER_SECOND: u64 = 90_000;

/// A presentation timestamp, measured in ticks of the 90kHz [System Time
/// Clock][STC].  Blu-ray captions store these as 33-bit values, but we
/// don't truncate them.
///
/// [STC]: http://www.bretl.com/mpeghtml/STC.HTM
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    ticks: u64,
}

impl Timestamp {
    /// Construct a `Timestamp` from a raw 90kHz tick count.
    pub fn from_ticks(ticks: u64) -> Timestamp {
        Timestamp { ticks }
    }

    /// Construct a `Timestamp` from a number of milliseconds.
    pub fn from_millis(ms: u64) -> Timestamp {
        Timestamp { ticks: ms * (TICKS_PER_SECOND / 1000) }
    }

    /// The raw 90kHz tick count.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Convert a `Timestamp` to seconds.
    pub fn to_seconds(&self) -> f64 {
        self.ticks as f64 / TICKS_PER_SECOND as f64
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let ms = self.ticks / (TICKS_PER_SECOND / 1000);
        let h = ms / 3_600_000;
        let m = (ms / 60_000) % 60;
        let s = (ms / 1000) % 60;
        write!(f, "{}:{:02}:{:02}.{:03}", h, m, s, ms % 1000)
    }
}

#[test]
fn timestamp_conversions() {
    let ts = Timestamp::from_ticks(135_000);
    assert_eq!(ts.to_seconds(), 1.5);
    assert_eq!(Timestamp::from_millis(1500), ts);
}

#[test]
fn timestamp_display() {
    assert_eq!(Timestamp::from_ticks(0).to_string(), "0:00:00.000");
    assert_eq!(Timestamp::from_millis(3_723_045).to_string(), "1:02:03.045");
    // Sub-millisecond ticks are truncated.
    assert_eq!(Timestamp::from_ticks(89).to_string(), "0:00:00.000");
}
