/*
 * SPDX-License-Identifier: Apache-2.0
 */

//! Network ingestion: UDP and TCP listeners sharing one configured
//! address, both feeding raw packets into the engine's command queue.
//! Listener tasks never touch aggregate state themselves.

use std::net::SocketAddr;

use anyhow::Context;
use log::{debug, warn};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};

use crate::collect::EngineHandle;
use crate::config::StatsdConfig;

mod parser;
pub(crate) use parser::StatsdRecordIter;

const UDP_RECV_BUF_SIZE: usize = 65536;
const TCP_READ_BUF_SIZE: usize = 4096;

/// Bind both listeners and return their local addresses as
/// `(udp, tcp)`. With a configured port of 0 the two sockets end up on
/// different ephemeral ports.
pub async fn spawn_all(
    config: &StatsdConfig,
    handle: &EngineHandle,
) -> anyhow::Result<(SocketAddr, SocketAddr)> {
    let udp_addr = spawn_udp(config, handle.clone()).await?;
    let tcp_addr = spawn_tcp(config, handle.clone()).await?;
    Ok((udp_addr, tcp_addr))
}

pub async fn spawn_udp(config: &StatsdConfig, handle: EngineHandle) -> anyhow::Result<SocketAddr> {
    let listen_addr = config.listen_addr();
    let socket = UdpSocket::bind(listen_addr)
        .await
        .context(format!("failed to bind udp socket to {listen_addr}"))?;
    let local_addr = socket
        .local_addr()
        .context("failed to get udp local address")?;
    debug!("statsd udp socket bound to {local_addr}");

    tokio::spawn(async move {
        let mut buf = vec![0u8; UDP_RECV_BUF_SIZE];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((0, _)) => {}
                Ok((nr, _peer)) => handle.feed_packet(buf[..nr].to_vec()),
                Err(e) => warn!("statsd udp recv error: {e}"),
            }
        }
    });

    Ok(local_addr)
}

pub async fn spawn_tcp(config: &StatsdConfig, handle: EngineHandle) -> anyhow::Result<SocketAddr> {
    let listen_addr = config.listen_addr();
    let listener = TcpListener::bind(listen_addr)
        .await
        .context(format!("failed to bind tcp socket to {listen_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to get tcp local address")?;
    debug!("statsd tcp socket bound to {local_addr}");

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    debug!("statsd tcp connection from {peer}");
                    tokio::spawn(serve_stream(stream, handle.clone()));
                }
                Err(e) => warn!("statsd tcp accept error: {e}"),
            }
        }
    });

    Ok(local_addr)
}

/// Read a connection until EOF, handing complete lines to the engine as
/// they arrive and keeping any trailing partial line buffered.
async fn serve_stream(mut stream: TcpStream, handle: EngineHandle) {
    let mut pending: Vec<u8> = Vec::new();
    let mut buf = [0u8; TCP_READ_BUF_SIZE];

    loop {
        match stream.read(&mut buf).await {
            Ok(0) => {
                if !pending.is_empty() {
                    handle.feed_packet(pending);
                }
                return;
            }
            Ok(nr) => {
                pending.extend_from_slice(&buf[..nr]);
                if let Some(p) = memchr::memrchr(b'\n', &pending) {
                    let rest = pending.split_off(p + 1);
                    handle.feed_packet(pending);
                    pending = rest;
                }
            }
            Err(e) => {
                warn!("statsd tcp read error: {e}");
                return;
            }
        }
    }
}
