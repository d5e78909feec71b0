//! Helper functions for integration tests

use minepulse::config::Config;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Build a config tracking one Java server at `127.0.0.1:port`, with fast
/// cycles and no persistence unless `storage` overrides it.
pub fn single_java_config(port: u16, storage: &str) -> Config {
    let json = format!(
        r#"{{
            "servers": [
                {{ "name": "Fixture", "host": "127.0.0.1", "port": {port}, "family": "java" }}
            ],
            "rates": {{ "ping_interval_millis": 100, "connect_timeout_millis": 500 }},
            "storage": {storage}
        }}"#
    );
    serde_json::from_str(&json).unwrap()
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

async fn read_varint(stream: &mut tokio::net::TcpStream) -> i32 {
    let mut value: u32 = 0;
    for i in 0..5 {
        let byte = stream.read_u8().await.unwrap();
        value |= ((byte & 0x7f) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            break;
        }
    }
    value as i32
}

/// In-process Java status server: accepts connections until dropped and
/// answers every status request with `json`.
pub async fn spawn_status_fixture(json: &'static str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };

            tokio::spawn(async move {
                // handshake + status request frames
                for _ in 0..2 {
                    let len = read_varint(&mut stream).await;
                    let mut discard = vec![0u8; len as usize];
                    stream.read_exact(&mut discard).await.unwrap();
                }

                let mut payload = Vec::new();
                write_varint(&mut payload, 0x00);
                write_varint(&mut payload, json.len() as i32);
                payload.extend_from_slice(json.as_bytes());

                let mut framed = Vec::new();
                write_varint(&mut framed, payload.len() as i32);
                framed.extend_from_slice(&payload);
                stream.write_all(&framed).await.unwrap();
            });
        }
    });

    port
}

/// Listener that accepts connections but never answers, forcing timeouts.
pub async fn spawn_silent_fixture() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let mut open = Vec::new();
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            open.push(stream);
        }
    });

    port
}

/// Port nothing listens on (bind-then-drop).
pub async fn refused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
