/*
 * SPDX-License-Identifier: Apache-2.0
 */

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};

use statsd_agg::{EngineHandle, StatsdConfig, collect, import};

fn test_config() -> StatsdConfig {
    StatsdConfig {
        bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        client_prefix: Some("foo".to_string()),
        ..Default::default()
    }
}

/// The engine processes network input asynchronously, so flush and
/// harvest repeatedly until the expected line shows up or time runs out.
/// Returns everything harvested so far.
async fn wait_for_line(handle: &EngineHandle, expected: &str) -> String {
    let mut collected = String::new();
    for _ in 0..500 {
        handle.flush().await;
        let (text, status) = handle.harvest().await;
        assert_eq!(status, 0);
        collected.push_str(&text);
        if collected.lines().any(|l| l.starts_with(expected)) {
            return collected;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no line starting with {expected:?} harvested in time");
}

#[tokio::test]
async fn udp_ingestion() {
    let config = test_config();
    let handle = collect::spawn(config.clone());
    let (udp_addr, _tcp_addr) = import::spawn_all(&config, &handle).await.unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(b"test1.count:10|c\ntest1.value:20|g\ntest1.time:30|ms\n", udp_addr)
        .await
        .unwrap();

    let text = wait_for_line(&handle, "foo.statsd.gauges.test1.value 20 ").await;
    assert!(text.contains("foo.statsd.counters.test1.count 10 "));
    assert!(text.contains("foo.statsd.timers.test1.time.lower 30 "));
    assert!(text.contains("foo.statsd.timers.test1.time.mean 30 "));
    assert!(text.contains("foo.statsd.timers.test1.time.upper 30 "));
    assert!(text.contains("foo.statsd.timers.test1.time.upper_90 30 "));
}

#[tokio::test]
async fn tcp_ingestion() {
    let config = test_config();
    let handle = collect::spawn(config.clone());
    let (_udp_addr, tcp_addr) = import::spawn_all(&config, &handle).await.unwrap();

    let mut stream = TcpStream::connect(tcp_addr).await.unwrap();
    stream.write_all(b"tcp.count:3|c\n").await.unwrap();
    // a partial line is delivered once the connection closes
    stream.write_all(b"tcp.value:4|g").await.unwrap();
    stream.shutdown().await.unwrap();
    drop(stream);

    let text = wait_for_line(&handle, "foo.statsd.gauges.tcp.value 4 ").await;
    assert!(text.contains("foo.statsd.counters.tcp.count 3 "));
}

#[tokio::test]
async fn malformed_datagram_does_not_stop_ingestion() {
    let config = test_config();
    let handle = collect::spawn(config.clone());
    let (udp_addr, _) = import::spawn_all(&config, &handle).await.unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(b"garbage", udp_addr).await.unwrap();
    client.send_to(b"bad name:1|g", udp_addr).await.unwrap();
    client.send_to(b"ok:5|g", udp_addr).await.unwrap();

    let text = wait_for_line(&handle, "foo.statsd.gauges.ok 5 ").await;
    assert!(!text.contains("bad name"));
}

#[tokio::test]
async fn harvest_without_traffic_is_empty_success() {
    let handle = collect::spawn(test_config());
    let (text, status) = handle.harvest().await;
    assert_eq!(status, 0);
    assert!(text.is_empty());
}
