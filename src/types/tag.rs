/*
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::BTreeMap;
use std::fmt;

use anyhow::anyhow;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct MetricTagName(String);

impl MetricTagName {
    #[inline]
    pub(crate) fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct MetricTagValue(String);

impl MetricTagValue {
    const EMPTY: MetricTagValue = MetricTagValue(String::new());

    #[inline]
    pub(crate) fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// The tag set part of a metric identity.
///
/// Two tag maps are equal iff they hold the same key/value pairs, no
/// matter the order the tags appeared on the wire. Rendering follows the
/// map's own (sorted) iteration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct MetricTagMap {
    inner: BTreeMap<MetricTagName, MetricTagValue>,
}

impl MetricTagMap {
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .get(&MetricTagName(name.to_string()))
            .map(|v| v.as_str())
    }

    /// Parse a wire tag section like `k1:v1,k2:v2` into this map.
    /// A pair without a value delimiter becomes a tag with an empty value.
    pub(crate) fn parse_buf(
        &mut self,
        data: &[u8],
        value_delimiter: u8,
        multi_delimiter: u8,
    ) -> anyhow::Result<()> {
        let iter = TagKvIter::new(data, value_delimiter, multi_delimiter);
        for r in iter {
            let (name, value) = r?;
            self.inner.insert(name, value);
        }
        Ok(())
    }

    /// Format as the output line tag suffix: `k1:v1,k2:v2`.
    pub(crate) fn display_suffix(&self) -> MetricTagMapDisplay<'_> {
        MetricTagMapDisplay(self)
    }
}

pub(crate) struct MetricTagMapDisplay<'a>(&'a MetricTagMap);

impl fmt::Display for MetricTagMapDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.0.inner.iter();
        let Some((name, value)) = iter.next() else {
            return Ok(());
        };
        f.write_str(name.as_str())?;
        f.write_str(":")?;
        f.write_str(value.as_str())?;

        for (name, value) in iter {
            f.write_str(",")?;
            f.write_str(name.as_str())?;
            f.write_str(":")?;
            f.write_str(value.as_str())?;
        }
        Ok(())
    }
}

struct TagKvIter<'a> {
    data: &'a [u8],
    value_delimiter: u8,
    multi_delimiter: u8,
    offset: usize,
}

impl<'a> TagKvIter<'a> {
    fn new(data: &'a [u8], value_delimiter: u8, multi_delimiter: u8) -> Self {
        TagKvIter {
            data,
            value_delimiter,
            multi_delimiter,
            offset: 0,
        }
    }

    fn next_field(&mut self) -> Option<&'a [u8]> {
        if self.offset >= self.data.len() {
            return None;
        }

        let left = &self.data[self.offset..];
        match memchr::memchr(self.multi_delimiter, left) {
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

impl Iterator for TagKvIter<'_> {
    type Item = anyhow::Result<(MetricTagName, MetricTagValue)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let part = self.next_field()?;
            if part.is_empty() {
                continue;
            }

            return match memchr::memchr(self.value_delimiter, part) {
                Some(p) => match parse_tag_name(&part[..p]) {
                    Ok(name) => {
                        if p + 1 >= part.len() {
                            Some(Ok((name, MetricTagValue::EMPTY)))
                        } else {
                            match parse_tag_value(&part[p + 1..]) {
                                Ok(value) => Some(Ok((name, value))),
                                Err(e) => Some(Err(e)),
                            }
                        }
                    }
                    Err(e) => Some(Err(e)),
                },
                None => match parse_tag_name(part) {
                    Ok(name) => Some(Ok((name, MetricTagValue::EMPTY))),
                    Err(e) => Some(Err(e)),
                },
            };
        }
    }
}

fn parse_tag_name(buf: &[u8]) -> anyhow::Result<MetricTagName> {
    let name = std::str::from_utf8(buf).map_err(|e| anyhow!("invalid tag name: {e}"))?;
    Ok(MetricTagName(name.to_string()))
}

fn parse_tag_value(buf: &[u8]) -> anyhow::Result<MetricTagValue> {
    let value = std::str::from_utf8(buf).map_err(|e| anyhow!("invalid tag value: {e}"))?;
    Ok(MetricTagValue(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_wire_tags() {
        let mut map = MetricTagMap::default();
        map.parse_buf(b"t3:10,t4:value2,extratag:1", b':', b',')
            .unwrap();
        assert_eq!(map.get("t3"), Some("10"));
        assert_eq!(map.get("t4"), Some("value2"));
        assert_eq!(map.get("extratag"), Some("1"));
        assert_eq!(map.get("missing"), None);
    }

    #[test]
    fn tag_without_value() {
        let mut map = MetricTagMap::default();
        map.parse_buf(b"debug,host:web1", b':', b',').unwrap();
        assert_eq!(map.get("debug"), Some(""));
        assert_eq!(map.get("host"), Some("web1"));
    }

    #[test]
    fn order_independent_equality() {
        let mut a = MetricTagMap::default();
        a.parse_buf(b"x:1,y:2", b':', b',').unwrap();
        let mut b = MetricTagMap::default();
        b.parse_buf(b"y:2,x:1", b':', b',').unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn display_suffix_format() {
        let mut map = MetricTagMap::default();
        map.parse_buf(b"b:2,a:1", b':', b',').unwrap();
        assert_eq!(map.display_suffix().to_string(), "a:1,b:2");

        let empty = MetricTagMap::default();
        assert_eq!(empty.display_suffix().to_string(), "");
    }
}
