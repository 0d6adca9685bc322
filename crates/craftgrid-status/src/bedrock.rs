//! Bedrock edition status via RakNet unconnected ping.
//!
//! ```text
//! C→S  0x01 [time i64][magic 16][client guid i64]
//! S→C  0x1c [time i64][server guid i64][magic 16][len u16][advertisement]
//! ```
//!
//! The advertisement is `MCPE;motd;protocol;version;online;max;...`.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tracing::debug;

use craft_core::DEFAULT_BEDROCK_IPV4_PORT;

use crate::{elapsed_ms, epoch_millis, split_host_port, Players, QueryError, QueryFuture, ServerStatus, StatusQuery};

const UNCONNECTED_PING: u8 = 0x01;
const UNCONNECTED_PONG: u8 = 0x1c;

/// RakNet offline message marker.
pub const OFFLINE_MAGIC: [u8; 16] = [
    0x00, 0xff, 0xff, 0x00, 0xfe, 0xfe, 0xfe, 0xfe, 0xfd, 0xfd, 0xfd, 0xfd, 0x12, 0x34, 0x56, 0x78,
];

/// Fixed-size prefix of a pong before the advertisement string.
const PONG_HEADER_LEN: usize = 1 + 8 + 8 + 16 + 2;

#[derive(Debug, Clone)]
pub struct BedrockStatusQuery {
    client_guid: i64,
}

impl Default for BedrockStatusQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl BedrockStatusQuery {
    pub fn new() -> Self {
        Self {
            client_guid: std::process::id() as i64,
        }
    }

    async fn query_inner(&self, host: &str) -> Result<ServerStatus, QueryError> {
        let (name, port) = split_host_port(host, DEFAULT_BEDROCK_IPV4_PORT)?;
        let address = format!("{name}:{port}");
        let target: SocketAddr = tokio::net::lookup_host((name.as_str(), port))
            .await
            .map_err(|e| QueryError::Connect {
                address: address.clone(),
                reason: e.to_string(),
            })?
            .next()
            .ok_or_else(|| QueryError::Connect {
                address: address.clone(),
                reason: "no addresses resolved".to_string(),
            })?;

        let local: SocketAddr = if target.is_ipv6() {
            "[::]:0".parse().map_err(|_| QueryError::Protocol("bind address".to_string()))?
        } else {
            "0.0.0.0:0".parse().map_err(|_| QueryError::Protocol("bind address".to_string()))?
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await?;

        let started = Instant::now();
        socket.send(&ping_packet(epoch_millis(), self.client_guid)).await?;

        let mut buf = vec![0u8; 1500];
        let len = socket.recv(&mut buf).await?;
        let ping_ms = elapsed_ms(started);

        let advertisement = parse_pong(&buf[..len])?;
        let status = parse_advertisement(&advertisement, ping_ms)?;
        debug!(%address, ping_ms, "bedrock status received");
        Ok(status)
    }
}

impl StatusQuery for BedrockStatusQuery {
    fn query<'a>(&'a self, host: &'a str, timeout: Duration) -> QueryFuture<'a> {
        Box::pin(async move {
            tokio::time::timeout(timeout, self.query_inner(host))
                .await
                .map_err(|_| QueryError::Timeout(timeout))?
        })
    }
}

pub fn ping_packet(time: i64, client_guid: i64) -> Vec<u8> {
    let mut packet = Vec::with_capacity(33);
    packet.push(UNCONNECTED_PING);
    packet.extend_from_slice(&time.to_be_bytes());
    packet.extend_from_slice(&OFFLINE_MAGIC);
    packet.extend_from_slice(&client_guid.to_be_bytes());
    packet
}

/// Extract the advertisement string from an unconnected pong.
pub fn parse_pong(packet: &[u8]) -> Result<String, QueryError> {
    if packet.first() != Some(&UNCONNECTED_PONG) {
        return Err(QueryError::Protocol(format!(
            "expected unconnected pong, got {:?}",
            packet.first()
        )));
    }
    if packet.len() < PONG_HEADER_LEN {
        return Err(QueryError::Malformed("pong too short".to_string()));
    }
    if packet[17..33] != OFFLINE_MAGIC {
        return Err(QueryError::Malformed("pong magic mismatch".to_string()));
    }
    let len = u16::from_be_bytes([packet[33], packet[34]]) as usize;
    let body = packet
        .get(PONG_HEADER_LEN..PONG_HEADER_LEN + len)
        .ok_or_else(|| QueryError::Malformed("truncated advertisement".to_string()))?;
    String::from_utf8(body.to_vec())
        .map_err(|e| QueryError::Malformed(format!("advertisement not utf-8: {e}")))
}

fn parse_advertisement(advertisement: &str, ping_ms: u64) -> Result<ServerStatus, QueryError> {
    let fields: Vec<&str> = advertisement.split(';').collect();
    if fields.len() < 6 {
        return Err(QueryError::Malformed(format!(
            "advertisement has {} fields",
            fields.len()
        )));
    }
    let count = |i: usize| -> Result<u32, QueryError> {
        fields[i]
            .parse()
            .map_err(|_| QueryError::Malformed(format!("player count {:?}", fields[i])))
    };
    Ok(ServerStatus {
        ping_ms,
        players: Some(Players {
            online: count(4)?,
            max: count(5)?,
        }),
        version: Some(fields[3].to_string()),
        motd: Some(fields[1].to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn pong_packet(advertisement: &str) -> Vec<u8> {
        let mut packet = vec![UNCONNECTED_PONG];
        packet.extend_from_slice(&0i64.to_be_bytes());
        packet.extend_from_slice(&42i64.to_be_bytes());
        packet.extend_from_slice(&OFFLINE_MAGIC);
        packet.extend_from_slice(&(advertisement.len() as u16).to_be_bytes());
        packet.extend_from_slice(advertisement.as_bytes());
        packet
    }

    #[test]
    fn ping_layout() {
        let packet = ping_packet(7, 9);
        assert_eq!(packet.len(), 33);
        assert_eq!(packet[0], 0x01);
        assert_eq!(&packet[9..25], &OFFLINE_MAGIC);
    }

    #[test]
    fn advertisement_fields() {
        let ad = "MCPE;Dedicated Server;589;1.20.0;3;10;12345;Bedrock level;Survival;1;19132;19133;";
        let advertisement = parse_pong(&pong_packet(ad)).unwrap();
        let status = parse_advertisement(&advertisement, 5).unwrap();
        assert_eq!(status.players, Some(Players { online: 3, max: 10 }));
        assert_eq!(status.version.as_deref(), Some("1.20.0"));
        assert_eq!(status.motd.as_deref(), Some("Dedicated Server"));
    }

    #[test]
    fn rejects_bad_pongs() {
        assert!(matches!(parse_pong(&[0x1d]), Err(QueryError::Protocol(_))));
        assert!(matches!(
            parse_pong(&[UNCONNECTED_PONG, 0, 0]),
            Err(QueryError::Malformed(_))
        ));
        let short = parse_pong(&pong_packet("MCPE;motd;1")).unwrap();
        assert!(parse_advertisement(&short, 1).is_err());
    }

    #[tokio::test]
    async fn query_against_fake_server() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let host = server.local_addr().unwrap().to_string();
        let server_task = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (len, peer) = server.recv_from(&mut buf).await.unwrap();
            assert_eq!(len, 33);
            assert_eq!(buf[0], UNCONNECTED_PING);
            let pong = pong_packet("MCPE;hello;589;1.20.0;0;10;1;level;Survival;1;19132;19133;");
            server.send_to(&pong, peer).await.unwrap();
            i64::from_be_bytes(buf[1..9].try_into().unwrap())
        });

        let before = epoch_millis();
        let status = BedrockStatusQuery::new()
            .query(&host, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(status.players, Some(Players { online: 0, max: 10 }));

        // The ping carries the client's wall clock.
        let sent = server_task.await.unwrap();
        assert!(sent >= before && sent <= epoch_millis(), "sent time {sent}");
    }

    #[tokio::test]
    async fn unanswered_ping_times_out() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let host = server.local_addr().unwrap().to_string();

        let err = BedrockStatusQuery::new()
            .query(&host, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Timeout(_)));
        drop(server);
    }
}
