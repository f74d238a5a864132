//! Exact media time.
//!
//! Frame times are kept as reduced fractions of a second so that stepping
//! through thousands of frames at 30000/1001 never drifts.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

use crate::error::{OverlayError, Result};

/// A point on the movie timeline, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RationalTime(Rational64);

impl RationalTime {
    pub const ZERO: Self = Self(Rational64::new_raw(0, 1));

    /// `numerator / denominator` seconds.
    #[inline]
    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self(Rational64::new(numerator, denominator))
    }

    #[inline]
    pub fn from_secs(seconds: i64) -> Self {
        Self(Rational64::from_integer(seconds))
    }

    /// Start of frame `index` at `rate`.
    #[inline]
    pub fn from_frames(index: i64, rate: FrameRate) -> Self {
        rate.frame_duration() * index
    }

    /// Rounds to the nearest microsecond.
    pub fn from_seconds_f64(seconds: f64) -> Self {
        const MICROS: i64 = 1_000_000;
        Self::new((seconds * MICROS as f64).round() as i64, MICROS)
    }

    #[inline]
    pub fn to_seconds_f64(self) -> f64 {
        *self.0.numer() as f64 / *self.0.denom() as f64
    }

    /// Index of the frame containing this time, truncated toward zero.
    #[inline]
    pub fn to_frames(self, rate: FrameRate) -> i64 {
        let per_second = Rational64::new(i64::from(rate.numerator), i64::from(rate.denominator));
        (self.0 * per_second).to_integer()
    }

    /// `HH:MM:SS:FF` at `rate`.
    ///
    /// Negative times read as zero. Fractional rates count frames against
    /// the rounded nominal rate, without drop-frame correction.
    pub fn to_timecode(self, rate: FrameRate) -> String {
        let nominal = rate.nominal_fps().max(1);
        let frame = self.to_frames(rate).max(0);
        let seconds = frame / nominal;
        format!(
            "{:02}:{:02}:{:02}:{:02}",
            seconds / 3600,
            seconds / 60 % 60,
            seconds % 60,
            frame % nominal
        )
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        *self.0.numer() < 0
    }
}

impl Default for RationalTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for RationalTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for RationalTime {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<i64> for RationalTime {
    type Output = Self;

    fn mul(self, times: i64) -> Self {
        Self(self.0 * times)
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.to_seconds_f64())
    }
}

/// Frames per second as `numerator / denominator`, e.g. 30000/1001.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameRate {
    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_60: Self = Self::new(60, 1);

    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        f64::from(self.numerator) / f64::from(self.denominator)
    }

    /// Frames per timecode second: 30 for 29.97.
    #[inline]
    pub fn nominal_fps(self) -> i64 {
        self.to_fps_f64().round() as i64
    }

    #[inline]
    pub fn frame_duration(self) -> RationalTime {
        RationalTime::new(i64::from(self.denominator), i64::from(self.numerator))
    }

    fn is_whole(self) -> bool {
        self.denominator != 0 && self.numerator % self.denominator == 0
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_30
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole() {
            write!(f, "{} fps", self.numerator / self.denominator)
        } else {
            write!(f, "{:.3} fps", self.to_fps_f64())
        }
    }
}

/// Half-open span `[start, start + duration)` of the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: RationalTime,
    pub duration: RationalTime,
}

impl TimeRange {
    pub const EMPTY: Self = Self {
        start: RationalTime::ZERO,
        duration: RationalTime::ZERO,
    };

    #[inline]
    pub fn new(start: RationalTime, duration: RationalTime) -> Self {
        Self { start, duration }
    }

    #[inline]
    pub fn from_start_end(start: RationalTime, end: RationalTime) -> Self {
        Self::new(start, end - start)
    }

    /// First time past the range.
    #[inline]
    pub fn end(self) -> RationalTime {
        self.start + self.duration
    }

    #[inline]
    pub fn contains(self, time: RationalTime) -> bool {
        self.start <= time && time < self.end()
    }

    /// Ranges that merely touch do not overlap.
    pub fn overlaps(self, other: Self) -> bool {
        self.start.max(other.start) < self.end().min(other.end())
    }

    pub fn intersection(self, other: Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end().min(other.end());
        (start < end).then(|| Self::from_start_end(start, end))
    }

    /// Non-negative start and a positive duration.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.validated().is_ok()
    }

    pub fn validated(self) -> Result<Self> {
        if self.start.is_negative() {
            Err(OverlayError::InvalidTimeRange(format!(
                "{self} starts before zero"
            )))
        } else if self.duration <= RationalTime::ZERO {
            Err(OverlayError::InvalidTimeRange(format!(
                "{self} has no positive duration"
            )))
        } else {
            Ok(self)
        }
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}
