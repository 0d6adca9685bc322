//! Java edition Server List Ping.
//!
//! ```text
//! C→S  handshake      [len][0x00][proto=-1][host][port u16][next=1]
//! C→S  status request [len][0x00]
//! S→C  status         [len][0x00][json string]
//! C→S  ping           [len][0x01][payload i64]
//! S→C  pong           [len][0x01][payload i64]
//! ```
//!
//! Lengths, ids and string prefixes are VarInts. Latency is the ping/pong
//! round trip.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use craft_core::DEFAULT_JAVA_PORT;

use crate::{elapsed_ms, epoch_millis, split_host_port, Players, QueryError, QueryFuture, ServerStatus, StatusQuery};

/// Responses larger than this are rejected.
const MAX_PACKET_LEN: usize = 2 * 1024 * 1024;

const HANDSHAKE_PROTOCOL: i32 = -1;
const NEXT_STATE_STATUS: i32 = 1;

#[derive(Debug, Default, Clone)]
pub struct JavaStatusQuery;

impl JavaStatusQuery {
    pub fn new() -> Self {
        Self
    }

    async fn query_inner(&self, host: &str) -> Result<ServerStatus, QueryError> {
        let (name, port) = split_host_port(host, DEFAULT_JAVA_PORT)?;
        let address = format!("{name}:{port}");
        let mut stream = TcpStream::connect((name.as_str(), port))
            .await
            .map_err(|e| QueryError::Connect {
                address: address.clone(),
                reason: e.to_string(),
            })?;
        stream.set_nodelay(true)?;

        let mut handshake = Vec::with_capacity(16 + name.len());
        write_varint(&mut handshake, 0x00);
        write_varint(&mut handshake, HANDSHAKE_PROTOCOL);
        write_string(&mut handshake, &name);
        handshake.extend_from_slice(&port.to_be_bytes());
        write_varint(&mut handshake, NEXT_STATE_STATUS);

        let mut out = Vec::with_capacity(handshake.len() + 8);
        write_frame(&mut out, &handshake);
        write_frame(&mut out, &[0x00]);
        stream.write_all(&out).await?;

        let body = read_frame(&mut stream).await?;
        let mut pos = 0;
        let id = read_varint_slice(&body, &mut pos)?;
        if id != 0x00 {
            return Err(QueryError::Protocol(format!(
                "expected status response, got packet {id:#04x}"
            )));
        }
        let json = read_string_slice(&body, &mut pos)?;
        let response: StatusResponse = serde_json::from_str(json)
            .map_err(|e| QueryError::Malformed(format!("status json: {e}")))?;

        let payload = epoch_millis();
        let mut ping = Vec::with_capacity(9);
        ping.push(0x01);
        ping.extend_from_slice(&payload.to_be_bytes());
        let mut out = Vec::with_capacity(10);
        write_frame(&mut out, &ping);

        let started = Instant::now();
        stream.write_all(&out).await?;
        let pong = read_frame(&mut stream).await?;
        let ping_ms = elapsed_ms(started);

        if pong.len() != 9 || pong[0] != 0x01 {
            return Err(QueryError::Protocol("invalid pong".to_string()));
        }
        let mut echoed = [0u8; 8];
        echoed.copy_from_slice(&pong[1..]);
        if i64::from_be_bytes(echoed) != payload {
            return Err(QueryError::Protocol("pong payload mismatch".to_string()));
        }

        debug!(%address, ping_ms, "java status received");
        Ok(ServerStatus {
            ping_ms,
            players: response.players.and_then(PlayersJson::into_players),
            version: response.version.map(|v| v.name),
            motd: response.description.and_then(motd_text),
        })
    }
}

impl StatusQuery for JavaStatusQuery {
    fn query<'a>(&'a self, host: &'a str, timeout: Duration) -> QueryFuture<'a> {
        Box::pin(async move {
            tokio::time::timeout(timeout, self.query_inner(host))
                .await
                .map_err(|_| QueryError::Timeout(timeout))?
        })
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    version: Option<VersionJson>,
    #[serde(default)]
    players: Option<PlayersJson>,
    #[serde(default)]
    description: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct VersionJson {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PlayersJson {
    max: Option<u32>,
    online: Option<u32>,
}

impl PlayersJson {
    /// Both counts or nothing.
    fn into_players(self) -> Option<Players> {
        Some(Players {
            online: self.online?,
            max: self.max?,
        })
    }
}

/// Descriptions are either a plain string or a chat component.
fn motd_text(description: serde_json::Value) -> Option<String> {
    match description {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Object(map) => map
            .get("text")
            .and_then(|t| t.as_str())
            .map(str::to_string),
        _ => None,
    }
}

// ── Framing ────────────────────────────────────────────────────────

pub(crate) fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut v = value as u32;
    loop {
        if v & !0x7f == 0 {
            buf.push(v as u8);
            return;
        }
        buf.push((v & 0x7f) as u8 | 0x80);
        v >>= 7;
    }
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_varint(buf, s.len() as i32);
    buf.extend_from_slice(s.as_bytes());
}

fn write_frame(buf: &mut Vec<u8>, body: &[u8]) {
    write_varint(buf, body.len() as i32);
    buf.extend_from_slice(body);
}

pub(crate) fn read_varint_slice(buf: &[u8], pos: &mut usize) -> Result<i32, QueryError> {
    let mut value: u32 = 0;
    for i in 0..5 {
        let byte = *buf
            .get(*pos)
            .ok_or_else(|| QueryError::Malformed("truncated varint".to_string()))?;
        *pos += 1;
        value |= ((byte & 0x7f) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(QueryError::Malformed("varint too long".to_string()))
}

fn read_string_slice<'a>(buf: &'a [u8], pos: &mut usize) -> Result<&'a str, QueryError> {
    let len = read_varint_slice(buf, pos)?;
    let len = usize::try_from(len)
        .map_err(|_| QueryError::Malformed(format!("negative string length {len}")))?;
    let end = pos
        .checked_add(len)
        .filter(|end| *end <= buf.len())
        .ok_or_else(|| QueryError::Malformed("truncated string".to_string()))?;
    let s = std::str::from_utf8(&buf[*pos..end])
        .map_err(|e| QueryError::Malformed(format!("string not utf-8: {e}")))?;
    *pos = end;
    Ok(s)
}

async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32, QueryError> {
    let mut value: u32 = 0;
    for i in 0..5 {
        let byte = reader.read_u8().await?;
        value |= ((byte & 0x7f) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(QueryError::Malformed("varint too long".to_string()))
}

async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, QueryError> {
    let len = read_varint(reader).await?;
    let len = usize::try_from(len)
        .ok()
        .filter(|len| *len > 0 && *len <= MAX_PACKET_LEN)
        .ok_or_else(|| QueryError::Malformed(format!("bad packet length {len}")))?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// A one-shot fake server answering with `json`.
    async fn fake_server(json: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();

            let handshake = read_frame(&mut sock).await.unwrap();
            let mut pos = 0;
            assert_eq!(read_varint_slice(&handshake, &mut pos).unwrap(), 0);
            assert_eq!(read_varint_slice(&handshake, &mut pos).unwrap(), -1);
            assert_eq!(read_string_slice(&handshake, &mut pos).unwrap(), "127.0.0.1");
            assert_eq!(*handshake.last().unwrap(), 1);

            let request = read_frame(&mut sock).await.unwrap();
            assert_eq!(request, vec![0x00]);

            let mut body = Vec::new();
            write_varint(&mut body, 0x00);
            write_string(&mut body, json);
            let mut out = Vec::new();
            write_frame(&mut out, &body);
            sock.write_all(&out).await.unwrap();

            // Clients that rejected the status never send a ping.
            if let Ok(ping) = read_frame(&mut sock).await {
                let mut out = Vec::new();
                write_frame(&mut out, &ping);
                let _ = sock.write_all(&out).await;
            }
        });
        addr.to_string()
    }

    #[test]
    fn varint_encoding() {
        let cases: [(i32, &[u8]); 5] = [
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7f]),
            (300, &[0xac, 0x02]),
            (-1, &[0xff, 0xff, 0xff, 0xff, 0x0f]),
        ];
        for (value, bytes) in cases {
            let mut buf = Vec::new();
            write_varint(&mut buf, value);
            assert_eq!(buf, bytes, "encoding {value}");
            let mut pos = 0;
            assert_eq!(read_varint_slice(&buf, &mut pos).unwrap(), value);
            assert_eq!(pos, bytes.len());
        }
    }

    #[test]
    fn motd_forms() {
        assert_eq!(
            motd_text(serde_json::json!("A Minecraft Server")),
            Some("A Minecraft Server".to_string())
        );
        assert_eq!(
            motd_text(serde_json::json!({"text": "hi", "extra": []})),
            Some("hi".to_string())
        );
        assert_eq!(motd_text(serde_json::json!(3)), None);
    }

    #[tokio::test]
    async fn status_with_players() {
        let host = fake_server(
            r#"{"version":{"name":"1.20.4","protocol":765},"players":{"max":20,"online":1},"description":{"text":"hello"}}"#,
        )
        .await;
        let status = JavaStatusQuery::new()
            .query(&host, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(status.players, Some(Players { online: 1, max: 20 }));
        assert_eq!(status.version.as_deref(), Some("1.20.4"));
        assert_eq!(status.motd.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn status_without_players() {
        let host = fake_server(r#"{"version":{"name":"1.20.4","protocol":765}}"#).await;
        let status = JavaStatusQuery::new()
            .query(&host, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(status.players.is_none());
    }

    #[tokio::test]
    async fn partial_players_still_report_ping() {
        for json in [
            r#"{"version":{"name":"1.20.4"},"players":{"max":20}}"#,
            r#"{"version":{"name":"1.20.4"},"players":{"online":2}}"#,
            r#"{"version":{"name":"1.20.4"},"players":null}"#,
        ] {
            let host = fake_server(json).await;
            let status = JavaStatusQuery::new()
                .query(&host, Duration::from_secs(2))
                .await
                .unwrap();
            assert!(status.players.is_none(), "{json}");
            assert_eq!(status.version.as_deref(), Some("1.20.4"));
        }
    }

    #[tokio::test]
    async fn malformed_json_is_an_error() {
        let host = fake_server("not json").await;
        let err = JavaStatusQuery::new()
            .query(&host, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Malformed(_)));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let err = JavaStatusQuery::new()
            .query(&host, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Timeout(_)));
    }

    #[tokio::test]
    async fn refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = JavaStatusQuery::new()
            .query(&host, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Connect { .. }));
    }
}
