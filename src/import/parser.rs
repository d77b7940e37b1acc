/*
 * SPDX-License-Identifier: Apache-2.0
 */

use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::types::{MetricName, MetricRecord, MetricTagMap, MetricType, MetricValue};

#[derive(Debug, Error)]
pub(crate) enum StatsdParseError {
    #[error("no name field")]
    NoName,
    #[error("invalid name field: {0}")]
    InvalidName(anyhow::Error),
    #[error("no value field")]
    NoValue,
    #[error("invalid value field: {0}")]
    InvalidValue(anyhow::Error),
    #[error("no type field")]
    NoType,
    #[error("invalid tag field: {0}")]
    InvalidTag(anyhow::Error),
}

/// Walks the newline separated lines of a received datagram and yields one
/// decoded record per well formed line. Empty lines and lines carrying an
/// unrecognized metric type are skipped without an error; a malformed line
/// yields an `Err` and only that line is lost.
pub(crate) struct StatsdRecordIter<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> StatsdRecordIter<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        StatsdRecordIter { buf, offset: 0 }
    }

    fn next_line(&mut self) -> Option<&'a [u8]> {
        if self.offset >= self.buf.len() {
            return None;
        }

        let left = &self.buf[self.offset..];
        match memchr::memchr(b'\n', left) {
            Some(p) => {
                self.offset += p + 1;
                Some(&left[..p])
            }
            None => {
                self.offset = self.buf.len();
                Some(left)
            }
        }
    }
}

impl Iterator for StatsdRecordIter<'_> {
    type Item = Result<MetricRecord, StatsdParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let mut line = self.next_line()?;
            if let [head @ .., b'\r'] = line {
                line = head;
            }
            if line.is_empty() {
                continue;
            }

            match parse_line(line) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => {} // unrecognized type, drop silently
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

struct LineFieldIter<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for LineFieldIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }

        let left = &self.data[self.offset..];
        match memchr::memchr(b'|', left) {
            Some(p) => {
                self.offset += p + 1;
                Some(&left[..p])
            }
            None => {
                self.offset = self.data.len();
                Some(left)
            }
        }
    }
}

fn parse_line(line: &[u8]) -> Result<Option<MetricRecord>, StatsdParseError> {
    let mut fields = LineFieldIter {
        data: line,
        offset: 0,
    };

    let nv = fields.next().ok_or(StatsdParseError::NoName)?;
    let p = memchr::memchr(b':', nv).ok_or(StatsdParseError::NoValue)?;
    if p == 0 {
        return Err(StatsdParseError::NoName);
    }
    let name = std::str::from_utf8(&nv[..p])
        .map_err(|e| StatsdParseError::InvalidName(anyhow::anyhow!("invalid utf-8: {e}")))?;

    // anything after a second colon in the name:value field is ignored
    let mut value_buf = &nv[p + 1..];
    if let Some(p2) = memchr::memchr(b':', value_buf) {
        value_buf = &value_buf[..p2];
    }
    if value_buf.is_empty() {
        return Err(StatsdParseError::NoValue);
    }
    let value_str = std::str::from_utf8(value_buf)
        .map_err(|e| StatsdParseError::InvalidValue(anyhow::anyhow!("invalid utf-8: {e}")))?;
    let value = MetricValue::from_str(value_str).map_err(StatsdParseError::InvalidValue)?;

    let type_field = fields.next().ok_or(StatsdParseError::NoType)?;

    let mut sample_rate = 1.0f64;
    let mut tag_map = MetricTagMap::default();
    for extra in fields {
        match extra.first() {
            Some(&b'@') => {
                // absent, unparseable or non-positive rates fall back to 1.0
                if let Ok(s) = std::str::from_utf8(&extra[1..])
                    && let Ok(rate) = f64::from_str(s)
                    && rate > 0.0
                {
                    sample_rate = rate;
                }
            }
            Some(&b'#') => {
                tag_map
                    .parse_buf(&extra[1..], b':', b',')
                    .map_err(StatsdParseError::InvalidTag)?;
            }
            _ => {} // unknown extra field shape, ignore
        }
    }

    let (r#type, value) = match type_field {
        b"g" => (MetricType::Gauge, value),
        b"ms" | b"h" | b"t" => (MetricType::Timer, value.scale_sample_rate(sample_rate)),
        b"m" => (MetricType::Counter, value.scale_sample_rate(sample_rate)),
        t if t.first() == Some(&b'c') => {
            (MetricType::Counter, value.scale_sample_rate(sample_rate))
        }
        _ => return Ok(None),
    };

    Ok(Some(MetricRecord {
        r#type,
        name: Arc::new(MetricName::new(name)),
        tag_map: Arc::new(tag_map),
        value,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etsy_statsd() {
        let buf = b"gorets:1|c\n\ngaugor:333|g\n";

        let mut iter = StatsdRecordIter::new(buf);
        let r1 = iter.next().unwrap().unwrap();
        assert_eq!(r1.r#type, MetricType::Counter);
        assert_eq!(r1.name.as_str(), "gorets");
        assert_eq!(r1.value, MetricValue::Unsigned(1));

        let r2 = iter.next().unwrap().unwrap();
        assert_eq!(r2.r#type, MetricType::Gauge);
        assert_eq!(r2.value, MetricValue::Unsigned(333));

        assert!(iter.next().is_none());
    }

    #[test]
    fn timer_types() {
        for t in ["ms", "h", "t"] {
            let line = format!("req.time:30|{t}");
            let mut iter = StatsdRecordIter::new(line.as_bytes());
            let r = iter.next().unwrap().unwrap();
            assert_eq!(r.r#type, MetricType::Timer);
            assert_eq!(r.value, MetricValue::Unsigned(30));
        }
    }

    #[test]
    fn counter_aliases() {
        for t in ["c", "count", "m"] {
            let line = format!("hits:2|{t}");
            let mut iter = StatsdRecordIter::new(line.as_bytes());
            let r = iter.next().unwrap().unwrap();
            assert_eq!(r.r#type, MetricType::Counter);
        }
    }

    #[test]
    fn sample_rate() {
        let mut iter = StatsdRecordIter::new(b"hits:10|c|@0.9");
        let r = iter.next().unwrap().unwrap();
        let MetricValue::Double(v) = r.value else {
            panic!("expected scaled double");
        };
        assert!((v - 11.111).abs() < 0.001);

        // a broken rate field falls back to 1.0
        let mut iter = StatsdRecordIter::new(b"hits:10|c|@oops");
        let r = iter.next().unwrap().unwrap();
        assert_eq!(r.value, MetricValue::Unsigned(10));

        let mut iter = StatsdRecordIter::new(b"hits:10|c|@0");
        let r = iter.next().unwrap().unwrap();
        assert_eq!(r.value, MetricValue::Unsigned(10));
    }

    #[test]
    fn tags() {
        let mut iter = StatsdRecordIter::new(b"test1.value:20|g|#t3:10,t4:value2");
        let r = iter.next().unwrap().unwrap();
        assert_eq!(r.tag_map.get("t3"), Some("10"));
        assert_eq!(r.tag_map.get("t4"), Some("value2"));
    }

    #[test]
    fn unknown_type_skipped() {
        let mut iter = StatsdRecordIter::new(b"a:1|zz\nb:2|g\n");
        let r = iter.next().unwrap().unwrap();
        assert_eq!(r.name.as_str(), "b");
        assert!(iter.next().is_none());
    }

    #[test]
    fn malformed_lines() {
        let mut iter = StatsdRecordIter::new(b"novalue|g");
        assert!(iter.next().unwrap().is_err());

        let mut iter = StatsdRecordIter::new(b"a:notanumber|g");
        assert!(iter.next().unwrap().is_err());

        let mut iter = StatsdRecordIter::new(b"a:1");
        assert!(iter.next().unwrap().is_err());

        // a bad line only loses itself
        let mut iter = StatsdRecordIter::new(b"bad\ngood:1|c\n");
        assert!(iter.next().unwrap().is_err());
        let r = iter.next().unwrap().unwrap();
        assert_eq!(r.name.as_str(), "good");
    }

    #[test]
    fn crlf_line() {
        let mut iter = StatsdRecordIter::new(b"a:1|c\r\n");
        let r = iter.next().unwrap().unwrap();
        assert_eq!(r.name.as_str(), "a");
        assert!(iter.next().is_none());
    }
}
