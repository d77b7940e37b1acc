/*
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

/// A metric name as received on the wire.
///
/// The name is kept verbatim at ingestion time. Whether it is usable is
/// decided only when the full output path is assembled, so an update with
/// a bad name still lands in the store and is discarded at render time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct MetricName(String);

impl MetricName {
    pub(crate) fn new(s: &str) -> Self {
        MetricName(s.to_string())
    }

    #[inline]
    pub(crate) fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}
