/*
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

mod name;
pub(crate) use name::MetricName;

mod tag;
pub(crate) use tag::MetricTagMap;

mod value;
pub(crate) use value::MetricValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MetricType {
    Counter,
    Gauge,
    Timer,
}

/// One decoded metric update. For counters and timers the value already
/// carries the sample rate compensation applied by the parser.
#[derive(Clone)]
pub(crate) struct MetricRecord {
    pub(crate) r#type: MetricType,
    pub(crate) name: Arc<MetricName>,
    pub(crate) tag_map: Arc<MetricTagMap>,
    pub(crate) value: MetricValue,
}
