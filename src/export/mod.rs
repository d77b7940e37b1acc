/*
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt::Write;

use crate::config::StatsdConfig;
use crate::types::{MetricName, MetricTagMap, MetricValue};

pub(crate) const KIND_GAUGES: &str = "gauges";
pub(crate) const KIND_COUNTERS: &str = "counters";
pub(crate) const KIND_TIMERS: &str = "timers";

/// Renders one aggregated data point into a graphite plaintext line:
/// `path value timestamp[ k:v,...]`. The dotted path is
/// `[client.][prefix.]<kind>.<name>[.<subkey>]` and must consist of
/// alphanumeric characters, periods, underscores and dashes only.
pub(crate) struct GraphiteFormatter {
    prefix: String,
}

impl GraphiteFormatter {
    pub(crate) fn new(config: &StatsdConfig) -> Self {
        let mut prefix = String::new();
        if config.add_client_prefix
            && let Some(client) = &config.client_prefix
        {
            prefix.push_str(client);
            prefix.push('.');
        }
        if config.add_path_prefix && !config.path_prefix.is_empty() {
            prefix.push_str(&config.path_prefix);
            prefix.push('.');
        }
        GraphiteFormatter { prefix }
    }

    /// Build and validate the metric path. An invalid path is reported as
    /// `Err` with the offending path so the caller can log and drop just
    /// this metric.
    fn metric_path(
        &self,
        kind: &str,
        name: &MetricName,
        subkey: Option<&str>,
    ) -> Result<String, String> {
        let mut path =
            String::with_capacity(self.prefix.len() + kind.len() + name.as_str().len() + 16);
        path.push_str(&self.prefix);
        path.push_str(kind);
        path.push('.');
        path.push_str(name.as_str());
        if let Some(subkey) = subkey {
            path.push('.');
            path.push_str(subkey);
        }

        if path_chars_valid(&path) {
            Ok(path)
        } else {
            Err(path)
        }
    }

    pub(crate) fn format_metric(
        &self,
        kind: &str,
        name: &MetricName,
        subkey: Option<&str>,
        value: MetricValue,
        timestamp: i64,
        tag_map: &MetricTagMap,
    ) -> Result<String, String> {
        let path = self.metric_path(kind, name, subkey)?;

        let mut line = path;
        let _ = write!(
            line,
            " {} {}",
            value.display_graphite(),
            itoa::Buffer::new().format(timestamp)
        );
        if !tag_map.is_empty() {
            let _ = write!(line, " {}", tag_map.display_suffix());
        }
        Ok(line)
    }
}

fn path_chars_valid(path: &str) -> bool {
    path.bytes()
        .all(|c| matches!(c, b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_' | b'-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter(client: Option<&str>, path: Option<&str>) -> GraphiteFormatter {
        let mut config = StatsdConfig::default();
        config.client_prefix = client.map(|s| s.to_string());
        if let Some(p) = path {
            config.path_prefix = p.to_string();
        } else {
            config.add_path_prefix = false;
        }
        GraphiteFormatter::new(&config)
    }

    #[test]
    fn full_prefix_path() {
        let f = formatter(Some("foo"), Some("statsd"));
        let line = f
            .format_metric(
                KIND_GAUGES,
                &MetricName::new("test1.value"),
                None,
                MetricValue::Unsigned(20),
                100,
                &MetricTagMap::default(),
            )
            .unwrap();
        assert_eq!(line, "foo.statsd.gauges.test1.value 20 100");
    }

    #[test]
    fn prefixes_are_optional() {
        let f = formatter(None, None);
        let line = f
            .format_metric(
                KIND_COUNTERS,
                &MetricName::new("c"),
                None,
                MetricValue::Unsigned(1),
                7,
                &MetricTagMap::default(),
            )
            .unwrap();
        assert_eq!(line, "counters.c 1 7");
    }

    #[test]
    fn timer_subkey() {
        let f = formatter(None, Some("statsd"));
        let line = f
            .format_metric(
                KIND_TIMERS,
                &MetricName::new("test1.time"),
                Some("upper_90"),
                MetricValue::Unsigned(30),
                100,
                &MetricTagMap::default(),
            )
            .unwrap();
        assert_eq!(line, "statsd.timers.test1.time.upper_90 30 100");
    }

    #[test]
    fn tag_suffix() {
        let mut tags = MetricTagMap::default();
        tags.parse_buf(b"t3:10,t4:value2", b':', b',').unwrap();

        let f = formatter(None, Some("statsd"));
        let line = f
            .format_metric(
                KIND_GAUGES,
                &MetricName::new("g"),
                None,
                MetricValue::Unsigned(2),
                9,
                &tags,
            )
            .unwrap();
        assert_eq!(line, "statsd.gauges.g 2 9 t3:10,t4:value2");
    }

    #[test]
    fn invalid_path_rejected() {
        let f = formatter(None, Some("statsd"));
        let r = f.format_metric(
            KIND_GAUGES,
            &MetricName::new("bad name!"),
            None,
            MetricValue::Unsigned(1),
            0,
            &MetricTagMap::default(),
        );
        assert_eq!(r.unwrap_err(), "statsd.gauges.bad name!");
    }
}
