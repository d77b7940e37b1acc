/*
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use ahash::AHashMap;

use crate::types::{MetricName, MetricRecord, MetricTagMap, MetricType, MetricValue};

pub(super) type InnerMap<T> = AHashMap<Arc<MetricTagMap>, T>;

/// The three identity-keyed collections. Lookup is by exact
/// (name, tag set) match; the first update for an identity allocates its
/// entry and later updates mutate it in place. Entries of different kinds
/// sharing a name never interact.
#[derive(Default)]
pub(super) struct AggregateStore {
    gauge: AHashMap<Arc<MetricName>, InnerMap<MetricValue>>,
    counter: AHashMap<Arc<MetricName>, InnerMap<MetricValue>>,
    timer: AHashMap<Arc<MetricName>, InnerMap<Vec<MetricValue>>>,
}

impl AggregateStore {
    pub(super) fn add_record(&mut self, record: MetricRecord) {
        let MetricRecord {
            r#type,
            name,
            tag_map,
            value,
        } = record;

        match r#type {
            MetricType::Gauge => self.add_gauge(name, tag_map, value),
            MetricType::Counter => self.add_counter(name, tag_map, value),
            MetricType::Timer => self.add_timer(name, tag_map, value),
        }
    }

    /// Last write wins; a gauge update always replaces the stored value.
    pub(super) fn add_gauge(
        &mut self,
        name: Arc<MetricName>,
        tag_map: Arc<MetricTagMap>,
        value: MetricValue,
    ) {
        self.gauge
            .entry(name)
            .or_default()
            .entry(tag_map)
            .and_modify(|v| *v = value)
            .or_insert(value);
    }

    pub(super) fn add_counter(
        &mut self,
        name: Arc<MetricName>,
        tag_map: Arc<MetricTagMap>,
        amount: MetricValue,
    ) {
        self.counter
            .entry(name)
            .or_default()
            .entry(tag_map)
            .and_modify(|v| *v += amount)
            .or_insert(amount);
    }

    pub(super) fn add_timer(
        &mut self,
        name: Arc<MetricName>,
        tag_map: Arc<MetricTagMap>,
        sample: MetricValue,
    ) {
        self.timer
            .entry(name)
            .or_default()
            .entry(tag_map)
            .or_default()
            .push(sample);
    }

    pub(super) fn take_gauges(&mut self) -> AHashMap<Arc<MetricName>, InnerMap<MetricValue>> {
        std::mem::take(&mut self.gauge)
    }

    pub(super) fn take_counters(&mut self) -> AHashMap<Arc<MetricName>, InnerMap<MetricValue>> {
        std::mem::take(&mut self.counter)
    }

    pub(super) fn take_timers(&mut self) -> AHashMap<Arc<MetricName>, InnerMap<Vec<MetricValue>>> {
        std::mem::take(&mut self.timer)
    }
}
