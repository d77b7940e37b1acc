/*
 * SPDX-License-Identifier: Apache-2.0
 */

//! The engine task owning all aggregate state.
//!
//! Network receipt, parsing, aggregation, flush and harvest are serialized
//! by construction: listeners and the host only enqueue commands, and a
//! single task drains the queue in arrival order. Flush and harvest
//! answers travel back over oneshot channels.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info};
use tokio::sync::{mpsc, oneshot};

use crate::config::StatsdConfig;
use crate::export::{GraphiteFormatter, KIND_COUNTERS, KIND_GAUGES, KIND_TIMERS};
use crate::import::StatsdRecordIter;
use crate::types::{MetricName, MetricTagMap, MetricValue};

mod store;
use store::AggregateStore;

mod summary;
use summary::summarize;

const BATCH_SIZE: usize = 128;

enum Command {
    Packet(Vec<u8>),
    Flush(oneshot::Sender<usize>),
    Harvest(oneshot::Sender<String>),
}

/// Cheap cloneable handle used by the listeners and the host to talk to
/// the engine task.
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::UnboundedSender<Command>,
}

impl EngineHandle {
    /// Enqueue one received datagram. The engine decodes it line by line;
    /// a malformed line is logged and dropped without affecting others.
    pub fn feed_packet(&self, data: Vec<u8>) {
        let _ = self.sender.send(Command::Packet(data));
    }

    async fn request_flush(&self) -> Option<usize> {
        let (rsp_sender, rsp_receiver) = oneshot::channel();
        self.sender.send(Command::Flush(rsp_sender)).ok()?;
        rsp_receiver.await.ok()
    }

    /// Render the current aggregate state into the output buffer and clear
    /// the collections. Returns the number of lines appended. Normally
    /// driven by the internal flush timer.
    pub async fn flush(&self) -> usize {
        self.request_flush().await.unwrap_or(0)
    }

    /// Drain the output buffer. Returns the newline-terminated text blob
    /// (empty when nothing accumulated) and a status code, which is
    /// always 0: internal failures are logged, never surfaced here.
    pub async fn harvest(&self) -> (String, i32) {
        let (rsp_sender, rsp_receiver) = oneshot::channel();
        let text = if self.sender.send(Command::Harvest(rsp_sender)).is_ok() {
            rsp_receiver.await.unwrap_or_default()
        } else {
            String::new()
        };
        (text, 0)
    }
}

/// Spawn the engine task plus its flush timer and return the handle.
pub fn spawn(config: StatsdConfig) -> EngineHandle {
    let config = Arc::new(config);
    let (sender, receiver) = mpsc::unbounded_channel();
    let handle = EngineHandle { sender };

    let engine = Engine::new(config.clone(), receiver);
    tokio::spawn(engine.into_running());

    let flush_timer = FlushTimer {
        config,
        handle: handle.clone(),
    };
    tokio::spawn(flush_timer.into_running());

    handle
}

struct FlushTimer {
    config: Arc<StatsdConfig>,
    handle: EngineHandle,
}

impl FlushTimer {
    async fn into_running(self) {
        let mut interval = tokio::time::interval(self.config.flush_interval);
        // the first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            if self.handle.request_flush().await.is_none() {
                break;
            }
        }
    }
}

struct Engine {
    config: Arc<StatsdConfig>,
    receiver: mpsc::UnboundedReceiver<Command>,
    formatter: GraphiteFormatter,
    upper_pct_subkey: String,
    store: AggregateStore,
    metrics: Vec<String>,
}

impl Engine {
    fn new(config: Arc<StatsdConfig>, receiver: mpsc::UnboundedReceiver<Command>) -> Self {
        let formatter = GraphiteFormatter::new(&config);
        let upper_pct_subkey = config.upper_percentile_subkey();
        Engine {
            config,
            receiver,
            formatter,
            upper_pct_subkey,
            store: AggregateStore::default(),
            metrics: Vec::new(),
        }
    }

    async fn into_running(mut self) {
        let mut buffer = Vec::with_capacity(BATCH_SIZE);
        loop {
            let nr = self.receiver.recv_many(&mut buffer, BATCH_SIZE).await;
            if nr == 0 {
                break;
            }

            for cmd in buffer.drain(..) {
                match cmd {
                    Command::Packet(data) => self.ingest(&data),
                    Command::Flush(rsp_sender) => {
                        let nr = self.flush();
                        let _ = rsp_sender.send(nr);
                    }
                    Command::Harvest(rsp_sender) => {
                        let _ = rsp_sender.send(self.harvest());
                    }
                }
            }
        }
    }

    fn ingest(&mut self, data: &[u8]) {
        for r in StatsdRecordIter::new(data) {
            match r {
                Ok(record) => self.store.add_record(record),
                Err(e) => error!("statsd parser error: {e}"),
            }
        }
    }

    fn flush(&mut self) -> usize {
        let timestamp = Utc::now().timestamp();
        let mut nr = 0;

        for (name, inner) in self.store.take_gauges() {
            for (tag_map, value) in inner {
                nr += self.add_metric(KIND_GAUGES, &name, None, value, timestamp, &tag_map);
            }
        }

        for (name, inner) in self.store.take_counters() {
            for (tag_map, value) in inner {
                // counters render their integer part
                nr += self.add_metric(
                    KIND_COUNTERS,
                    &name,
                    None,
                    value.trunc(),
                    timestamp,
                    &tag_map,
                );
            }
        }

        let upper_pct_subkey = self.upper_pct_subkey.clone();
        for (name, inner) in self.store.take_timers() {
            for (tag_map, mut samples) in inner {
                let Some(summary) = summarize(&mut samples, self.config.percentile) else {
                    continue;
                };
                nr += self.add_metric(
                    KIND_TIMERS,
                    &name,
                    Some("lower"),
                    summary.lower,
                    timestamp,
                    &tag_map,
                );
                nr += self.add_metric(
                    KIND_TIMERS,
                    &name,
                    Some("mean"),
                    summary.mean,
                    timestamp,
                    &tag_map,
                );
                nr += self.add_metric(
                    KIND_TIMERS,
                    &name,
                    Some("upper"),
                    summary.upper,
                    timestamp,
                    &tag_map,
                );
                nr += self.add_metric(
                    KIND_TIMERS,
                    &name,
                    Some(&upper_pct_subkey),
                    summary.upper_pct,
                    timestamp,
                    &tag_map,
                );
            }
        }

        debug!("flushed statsd metrics, {nr} lines rendered");
        nr
    }

    fn add_metric(
        &mut self,
        kind: &str,
        name: &MetricName,
        subkey: Option<&str>,
        value: MetricValue,
        timestamp: i64,
        tag_map: &MetricTagMap,
    ) -> usize {
        match self
            .formatter
            .format_metric(kind, name, subkey, value, timestamp, tag_map)
        {
            Ok(line) => {
                self.metrics.push(line);
                1
            }
            Err(path) => {
                info!(
                    "invalid statsd metric: path must only consist of \
                     alpha-numeric characters, periods, underscores, and \
                     dashes, path: {path}"
                );
                0
            }
        }
    }

    fn harvest(&mut self) -> String {
        info!("statsd collected metrics, count {}", self.metrics.len());
        if self.metrics.is_empty() {
            return String::new();
        }

        let mut output = self.metrics.join("\n");
        output.push('\n');
        self.metrics.clear();
        output
    }
}
