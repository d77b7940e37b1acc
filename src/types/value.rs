/*
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::ops;
use std::str::FromStr;

use anyhow::anyhow;
use memchr::memchr;

/// A metric value that keeps its integral nature when it has one, so that
/// a counter built from integer increments still renders without a
/// fractional part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum MetricValue {
    Double(f64),
    Signed(i64),
    Unsigned(u64),
}

impl MetricValue {
    pub(crate) fn as_f64(&self) -> f64 {
        match self {
            MetricValue::Double(f) => *f,
            MetricValue::Signed(i) => *i as f64,
            MetricValue::Unsigned(u) => *u as f64,
        }
    }

    /// Compensate for a client-side sample rate: the reported value stands
    /// for only `rate` of the real events, so scale it by `1 / rate`.
    /// A rate of exactly 1.0 keeps the value (and its integral type) as is.
    pub(crate) fn scale_sample_rate(self, rate: f64) -> Self {
        if rate == 1.0 {
            self
        } else {
            MetricValue::Double(self.as_f64() / rate)
        }
    }

    /// Drop any fractional part, keeping an integral representation.
    pub(crate) fn trunc(self) -> Self {
        match self {
            MetricValue::Double(f) => {
                let t = f.trunc();
                if t >= 0.0 && t <= u64::MAX as f64 {
                    MetricValue::Unsigned(t as u64)
                } else if t >= i64::MIN as f64 && t < 0.0 {
                    MetricValue::Signed(t as i64)
                } else {
                    MetricValue::Double(t)
                }
            }
            v => v,
        }
    }

    /// Display form for graphite plaintext lines. Unlike the plain
    /// `Display` impl, a double that holds a whole number is written
    /// without its fractional part, matching what the wire carried.
    pub(crate) fn display_graphite(&self) -> DisplayGraphiteValue {
        DisplayGraphiteValue(self)
    }
}

impl FromStr for MetricValue {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(anyhow!("empty string"));
        }

        if memchr(b'.', s.as_bytes()).is_none() {
            if s.as_bytes()[0] == b'-' {
                if let Ok(i) = i64::from_str(s) {
                    return Ok(MetricValue::Signed(i));
                }
            } else if let Ok(u) = u64::from_str(s) {
                return Ok(MetricValue::Unsigned(u));
            }
        }

        // covers fractional values plus integers too wide for 64 bits
        // and exponent forms like 1e3
        let f = f64::from_str(s).map_err(|e| anyhow!("invalid f64 string: {e}"))?;
        Ok(MetricValue::Double(f))
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Unsigned(u) => f.write_str(itoa::Buffer::new().format(*u)),
            MetricValue::Signed(i) => f.write_str(itoa::Buffer::new().format(*i)),
            MetricValue::Double(v) => f.write_str(ryu::Buffer::new().format(*v)),
        }
    }
}

impl ops::Add for MetricValue {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (MetricValue::Unsigned(u1), MetricValue::Unsigned(u2)) => {
                MetricValue::Unsigned(u1.wrapping_add(u2))
            }
            (MetricValue::Unsigned(u1), MetricValue::Signed(i2)) => {
                MetricValue::Signed(i2.wrapping_add_unsigned(u1))
            }
            (MetricValue::Signed(i1), MetricValue::Unsigned(u2)) => {
                MetricValue::Signed(i1.wrapping_add_unsigned(u2))
            }
            (MetricValue::Signed(i1), MetricValue::Signed(i2)) => {
                MetricValue::Signed(i1.wrapping_add(i2))
            }
            (lhs, rhs) => MetricValue::Double(lhs.as_f64() + rhs.as_f64()),
        }
    }
}

impl ops::AddAssign for MetricValue {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

pub(crate) struct DisplayGraphiteValue<'a>(&'a MetricValue);

impl fmt::Display for DisplayGraphiteValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            MetricValue::Double(v) => {
                if v.is_finite() && v.fract() == 0.0 && v.abs() <= i64::MAX as f64 {
                    f.write_str(itoa::Buffer::new().format(*v as i64))
                } else {
                    f.write_str(ryu::Buffer::new().format(*v))
                }
            }
            v => fmt::Display::fmt(v, f),
        }
    }
}
