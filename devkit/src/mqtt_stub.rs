/*!
Stub MQTT broker for tests without a real broker

Speaks just enough MQTT 3.1.1 for a publishing client: CONNACK on connect,
PUBACK for QoS 1 publishes, PINGRESP on keep-alive. Every publish is recorded
for assertions.
*/

use anyhow::Result;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

const CONNECT: u8 = 1;
const PUBLISH: u8 = 3;
const PINGREQ: u8 = 12;
const DISCONNECT: u8 = 14;

#[derive(Debug, Clone, PartialEq)]
pub struct StubMqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: u8,
}

pub struct StubMqttBroker {
    addr: SocketAddr,
    published: Arc<Mutex<Vec<StubMqttMessage>>>,
    accept_loop: JoinHandle<()>,
}

impl StubMqttBroker {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let published = Arc::new(Mutex::new(Vec::new()));

        let loop_published = published.clone();
        let accept_loop = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let published = loop_published.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve(socket, published).await {
                        tracing::debug!(error = %e, "stub mqtt connection ended");
                    }
                });
            }
        });

        tracing::info!(%addr, "stub mqtt broker listening");
        Ok(Self { addr, published, accept_loop })
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn published(&self) -> Vec<StubMqttMessage> {
        self.published.lock().unwrap().clone()
    }

    pub fn messages_on(&self, topic: &str) -> Vec<StubMqttMessage> {
        self.published().into_iter().filter(|m| m.topic == topic).collect()
    }

    /// Payloads published on `topic`, parsed as JSON.
    pub fn json_on(&self, topic: &str) -> Result<Vec<Value>> {
        self.messages_on(topic)
            .iter()
            .map(|m| Ok(serde_json::from_slice(&m.payload)?))
            .collect()
    }

    /// Polls until `count` messages arrived on `topic` or `timeout_ms` elapsed.
    pub async fn wait_for_messages(&self, topic: &str, count: usize, timeout_ms: u64) -> Vec<StubMqttMessage> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            let messages = self.messages_on(topic);
            if messages.len() >= count || tokio::time::Instant::now() >= deadline {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

impl Drop for StubMqttBroker {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

async fn serve(mut socket: TcpStream, published: Arc<Mutex<Vec<StubMqttMessage>>>) -> Result<()> {
    loop {
        let header = socket.read_u8().await?;
        let len = read_remaining_length(&mut socket).await?;
        let mut body = vec![0u8; len];
        socket.read_exact(&mut body).await?;

        match header >> 4 {
            CONNECT => socket.write_all(&[0x20, 0x02, 0x00, 0x00]).await?,
            PUBLISH => {
                let qos = (header >> 1) & 0x03;
                let (message, packet_id) = parse_publish(&body, qos)?;
                published.lock().unwrap().push(message);
                if let Some(id) = packet_id {
                    let id = id.to_be_bytes();
                    socket.write_all(&[0x40, 0x02, id[0], id[1]]).await?;
                }
            }
            PINGREQ => socket.write_all(&[0xd0, 0x00]).await?,
            DISCONNECT => return Ok(()),
            other => tracing::debug!(packet_type = other, "stub mqtt ignoring packet"),
        }
        socket.flush().await?;
    }
}

async fn read_remaining_length(socket: &mut TcpStream) -> Result<usize> {
    let mut value = 0usize;
    for i in 0..4 {
        let byte = socket.read_u8().await?;
        value |= usize::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    anyhow::bail!("remaining length too long")
}

fn parse_publish(body: &[u8], qos: u8) -> Result<(StubMqttMessage, Option<u16>)> {
    anyhow::ensure!(body.len() >= 2, "publish too short");
    let topic_len = usize::from(u16::from_be_bytes([body[0], body[1]]));
    let mut at = 2 + topic_len;
    anyhow::ensure!(body.len() >= at, "publish topic truncated");
    let topic = String::from_utf8(body[2..at].to_vec())?;

    let packet_id = if qos > 0 {
        anyhow::ensure!(body.len() >= at + 2, "publish packet id truncated");
        let id = u16::from_be_bytes([body[at], body[at + 1]]);
        at += 2;
        Some(id)
    } else {
        None
    };

    let message = StubMqttMessage { topic, payload: body[at..].to_vec(), qos };
    Ok((message, packet_id))
}
