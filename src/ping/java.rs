//! Java edition server list ping.
//!
//! TCP exchange: a VarInt-framed handshake carrying the probe protocol id
//! (next state 1), an empty status request, and a JSON status document in
//! return. The probe version matters: servers echo the protocol id they are
//! willing to speak, which drives version compatibility tracking upstream.

use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{instrument, trace};

use super::{PingError, PingResponse, PingResult, cap_player_count};

/// Refuse status documents larger than this (favicons are tens of KiB;
/// anything in the MiB range is not a status response).
const MAX_STATUS_LEN: i32 = 2 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct StatusDocument {
    players: StatusPlayers,
    version: Option<StatusVersion>,
    favicon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusPlayers {
    online: i64,
}

#[derive(Debug, Deserialize)]
struct StatusVersion {
    protocol: i32,
}

/// Probe a Java server, spending at most `timeout` on the whole exchange.
#[instrument(skip(timeout, protocol_id), fields(port))]
pub async fn ping(host: &str, port: u16, timeout: Duration, protocol_id: i32) -> PingResult {
    // A resolver that consumed the whole connect budget leaves nothing to
    // spend here.
    if timeout.is_zero() {
        return Err(PingError::Timeout);
    }

    tokio::time::timeout(timeout, status_exchange(host, port, protocol_id)).await?
}

async fn status_exchange(host: &str, port: u16, protocol_id: i32) -> PingResult {
    let mut stream = TcpStream::connect((host, port)).await?;

    // Handshake: packet id 0x00, probe protocol, address, port, next state 1
    let mut handshake = Vec::with_capacity(host.len() + 16);
    write_varint(&mut handshake, 0x00);
    write_varint(&mut handshake, protocol_id);
    write_string(&mut handshake, host);
    handshake.extend_from_slice(&port.to_be_bytes());
    write_varint(&mut handshake, 1);
    write_packet(&mut stream, &handshake).await?;

    // Status request: empty packet id 0x00
    write_packet(&mut stream, &[0x00]).await?;

    let _packet_len = read_varint(&mut stream).await?;
    let packet_id = read_varint(&mut stream).await?;
    if packet_id != 0x00 {
        return Err(PingError::Protocol(format!(
            "unexpected status packet id {packet_id:#x}"
        )));
    }

    let json_len = read_varint(&mut stream).await?;
    if !(0..=MAX_STATUS_LEN).contains(&json_len) {
        return Err(PingError::Protocol(format!(
            "unreasonable status length {json_len}"
        )));
    }

    let mut raw = vec![0u8; json_len as usize];
    stream.read_exact(&mut raw).await?;

    trace!("received {} byte status document", raw.len());

    parse_status(host, &raw)
}

fn parse_status(host: &str, raw: &[u8]) -> PingResult {
    let doc: StatusDocument = serde_json::from_slice(raw)
        .map_err(|e| PingError::Protocol(format!("invalid status JSON: {e}")))?;

    // Only forward well-formed embedded image URIs; anything else is
    // discarded, not passed along to viewers.
    let favicon = doc.favicon.filter(|f| f.starts_with("data:image/"));

    Ok(PingResponse {
        players_online: cap_player_count(host, doc.players.online),
        protocol_version: doc.version.map(|v| v.protocol),
        favicon,
    })
}

/// Write a VarInt-length-prefixed packet
async fn write_packet<W: AsyncWrite + Unpin>(stream: &mut W, payload: &[u8]) -> std::io::Result<()> {
    let mut framed = Vec::with_capacity(payload.len() + 5);
    write_varint(&mut framed, payload.len() as i32);
    framed.extend_from_slice(payload);
    stream.write_all(&framed).await?;
    stream.flush().await
}

fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut value = value as u32;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

fn write_string(buf: &mut Vec<u8>, value: &str) {
    write_varint(buf, value.len() as i32);
    buf.extend_from_slice(value.as_bytes());
}

async fn read_varint<R: AsyncRead + Unpin>(stream: &mut R) -> Result<i32, PingError> {
    let mut value: u32 = 0;
    for i in 0..5 {
        let byte = stream.read_u8().await?;
        value |= ((byte & 0x7f) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(PingError::Protocol("VarInt longer than 5 bytes".to_string()))
}
