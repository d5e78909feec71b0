//! Bedrock edition unconnected ping.
//!
//! A single RakNet unconnected ping datagram and its pong reply. The pong
//! carries a semicolon-separated status string; the player count sits at
//! field index 4. There is no version negotiation and no favicon in this
//! family.

use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{instrument, trace};

use crate::time::epoch_millis;

use super::{PingError, PingResponse, PingResult, cap_player_count};

const ID_UNCONNECTED_PING: u8 = 0x01;
const ID_UNCONNECTED_PONG: u8 = 0x1c;

const OFFLINE_MESSAGE_MAGIC: [u8; 16] = [
    0x00, 0xff, 0xff, 0x00, 0xfe, 0xfe, 0xfe, 0xfe, 0xfd, 0xfd, 0xfd, 0xfd, 0x12, 0x34, 0x56, 0x78,
];

// id(1) + time(8) + server guid(8) + magic(16) + status length(2)
const PONG_HEADER_LEN: usize = 35;

/// Probe a Bedrock server, spending at most `timeout` on the exchange.
#[instrument(skip(timeout), fields(port))]
pub async fn ping(host: &str, port: u16, timeout: Duration) -> PingResult {
    if timeout.is_zero() {
        return Err(PingError::Timeout);
    }

    tokio::time::timeout(timeout, status_exchange(host, port)).await?
}

async fn status_exchange(host: &str, port: u16) -> PingResult {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect((host, port)).await?;

    let mut packet = Vec::with_capacity(33);
    packet.push(ID_UNCONNECTED_PING);
    packet.extend_from_slice(&epoch_millis().to_be_bytes());
    packet.extend_from_slice(&OFFLINE_MESSAGE_MAGIC);
    packet.extend_from_slice(&0i64.to_be_bytes()); // client guid
    socket.send(&packet).await?;

    let mut buf = [0u8; 2048];
    let len = socket.recv(&mut buf).await?;

    trace!("received {len} byte pong datagram");

    parse_pong(host, &buf[..len])
}

fn parse_pong(host: &str, datagram: &[u8]) -> PingResult {
    if datagram.first() != Some(&ID_UNCONNECTED_PONG) {
        return Err(PingError::Protocol(format!(
            "unexpected datagram id {:#x}",
            datagram.first().copied().unwrap_or(0)
        )));
    }

    if datagram.len() < PONG_HEADER_LEN {
        return Err(PingError::Protocol("truncated pong datagram".to_string()));
    }

    let status = std::str::from_utf8(&datagram[PONG_HEADER_LEN..])
        .map_err(|_| PingError::Protocol("status string is not UTF-8".to_string()))?;

    // MCPE;motd;protocol;version;players;max;...
    let players = status
        .split(';')
        .nth(4)
        .ok_or_else(|| PingError::Protocol("status string missing player count".to_string()))?;

    let players = players
        .trim()
        .parse::<i64>()
        .map_err(|_| PingError::Protocol(format!("unparseable player count '{players}'")))?;

    Ok(PingResponse {
        players_online: cap_player_count(host, players),
        protocol_version: None,
        favicon: None,
    })
}
