/*
 * SPDX-License-Identifier: Apache-2.0
 */

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, anyhow};
use yaml_rust::Yaml;

/// Engine configuration, populated once at construction. The host may
/// build it from its merged settings through [`StatsdConfig::parse_yaml`]
/// or fill the fields directly; every field has a working default.
#[derive(Clone, Debug, PartialEq)]
pub struct StatsdConfig {
    /// listen address shared by the UDP and TCP sockets
    pub bind: IpAddr,
    /// listen port shared by the UDP and TCP sockets
    pub port: u16,
    /// period between aggregate flushes
    pub flush_interval: Duration,
    /// the host's harvest cadence, carried for the host's benefit only
    pub send_interval: Duration,
    /// timer percentile threshold
    pub percentile: f64,
    /// host-supplied client name, prepended to every path when
    /// `add_client_prefix` is set
    pub client_prefix: Option<String>,
    pub add_client_prefix: bool,
    /// prepended to every path (after the client prefix) when
    /// `add_path_prefix` is set
    pub path_prefix: String,
    pub add_path_prefix: bool,
}

impl Default for StatsdConfig {
    fn default() -> Self {
        StatsdConfig {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8125,
            flush_interval: Duration::from_secs(10),
            send_interval: Duration::from_secs(30),
            percentile: 90.0,
            client_prefix: None,
            add_client_prefix: true,
            path_prefix: "statsd".to_string(),
            add_path_prefix: true,
        }
    }
}

impl StatsdConfig {
    pub fn parse_yaml(v: &Yaml) -> anyhow::Result<Self> {
        let Yaml::Hash(map) = v else {
            return Err(anyhow!("yaml value type for statsd config should be 'map'"));
        };

        let mut config = StatsdConfig::default();
        for (k, v) in map.iter() {
            let k = k
                .as_str()
                .ok_or_else(|| anyhow!("all config keys should be strings"))?;
            config
                .set(&normalize_key(k), v)
                .context(format!("failed to parse value for key {k}"))?;
        }

        config.check()?;
        Ok(config)
    }

    fn set(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match k {
            "bind" => {
                self.bind = as_string(v)?
                    .parse()
                    .map_err(|e| anyhow!("invalid ip address value: {e}"))?;
                Ok(())
            }
            "port" => {
                self.port = as_u16(v)?;
                Ok(())
            }
            "flush_interval" => {
                self.flush_interval = as_duration_secs(v)?;
                Ok(())
            }
            "send_interval" => {
                self.send_interval = as_duration_secs(v)?;
                Ok(())
            }
            "percentile" => {
                self.percentile = as_f64(v)?;
                Ok(())
            }
            "client_prefix" => {
                self.client_prefix = Some(as_string(v)?);
                Ok(())
            }
            "add_client_prefix" => {
                self.add_client_prefix = as_bool(v)?;
                Ok(())
            }
            "path_prefix" => {
                self.path_prefix = as_string(v)?;
                Ok(())
            }
            "add_path_prefix" => {
                self.add_path_prefix = as_bool(v)?;
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }

    fn check(&self) -> anyhow::Result<()> {
        if !(self.percentile > 0.0 && self.percentile <= 100.0) {
            return Err(anyhow!(
                "percentile should be in (0, 100], got {}",
                self.percentile
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(anyhow!("flush_interval should not be zero"));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Subkey suffix for the timer percentile line, e.g. `upper_90`.
    pub(crate) fn upper_percentile_subkey(&self) -> String {
        if self.percentile.fract() == 0.0 {
            format!("upper_{}", self.percentile as i64)
        } else {
            format!("upper_{}", self.percentile)
        }
    }
}

fn normalize_key(k: &str) -> String {
    k.trim().replace('-', "_")
}

fn as_string(v: &Yaml) -> anyhow::Result<String> {
    match v {
        Yaml::String(s) => Ok(s.to_string()),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Real(s) => Ok(s.to_string()),
        _ => Err(anyhow!("yaml value type should be 'string'")),
    }
}

fn as_bool(v: &Yaml) -> anyhow::Result<bool> {
    match v {
        Yaml::Boolean(b) => Ok(*b),
        Yaml::Integer(i) => Ok(*i != 0),
        _ => Err(anyhow!("yaml value type should be 'boolean'")),
    }
}

fn as_u16(v: &Yaml) -> anyhow::Result<u16> {
    let Yaml::Integer(i) = v else {
        return Err(anyhow!("yaml value type should be 'integer'"));
    };
    u16::try_from(*i).map_err(|e| anyhow!("out of range u16 value: {e}"))
}

fn as_f64(v: &Yaml) -> anyhow::Result<f64> {
    match v {
        Yaml::Integer(i) => Ok(*i as f64),
        Yaml::Real(s) => s
            .parse()
            .map_err(|e| anyhow!("invalid f64 value: {e}")),
        _ => Err(anyhow!("yaml value type should be 'number'")),
    }
}

fn as_duration_secs(v: &Yaml) -> anyhow::Result<Duration> {
    let secs = as_f64(v)?;
    Duration::try_from_secs_f64(secs).map_err(|e| anyhow!("invalid duration value {secs}: {e}"))
}
