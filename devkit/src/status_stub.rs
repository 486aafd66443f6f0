/*!
Stub Minecraft server for tests without a real server

Listens on a loopback port and answers Server List Ping status requests with
whatever `StubMode` is currently set. The mode can be switched at runtime to
script outages, hangs and broken answers.
*/

use anyhow::Result;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq)]
pub enum StubMode {
    /// Proper status answer. `names: None` omits the `sample` field.
    Online {
        online: i64,
        max: i64,
        names: Option<Vec<String>>,
    },
    /// Accepts and closes the connection straight away.
    Closed,
    /// Accepts and never answers.
    Hang,
    /// Answers with a frame that is not a status packet.
    Garbage,
}

impl StubMode {
    pub fn online(online: i64, max: i64, names: &[&str]) -> Self {
        Self::Online {
            online,
            max,
            names: Some(names.iter().map(|n| n.to_string()).collect()),
        }
    }

    pub fn online_anonymous(online: i64, max: i64) -> Self {
        Self::Online { online, max, names: None }
    }
}

pub struct StubStatusServer {
    addr: SocketAddr,
    mode: Arc<Mutex<StubMode>>,
    connections: Arc<AtomicUsize>,
    accept_loop: JoinHandle<()>,
}

impl StubStatusServer {
    pub async fn start(mode: StubMode) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let mode = Arc::new(Mutex::new(mode));
        let connections = Arc::new(AtomicUsize::new(0));

        let loop_mode = mode.clone();
        let loop_connections = connections.clone();
        let accept_loop = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                loop_connections.fetch_add(1, Ordering::SeqCst);
                let mode = loop_mode.lock().unwrap().clone();
                tokio::spawn(async move {
                    if let Err(e) = serve(socket, mode).await {
                        tracing::debug!(error = %e, "stub status connection ended");
                    }
                });
            }
        });

        tracing::info!(%addr, "stub status server listening");
        Ok(Self { addr, mode, connections, accept_loop })
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// `host:port`, as accepted by `MC_HOST`.
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn set_mode(&self, mode: StubMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for StubStatusServer {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

async fn serve(mut socket: TcpStream, mode: StubMode) -> Result<()> {
    match mode {
        StubMode::Closed => return Ok(()),
        StubMode::Hang => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            return Ok(());
        }
        _ => {}
    }

    // handshake, then status request
    read_frame(&mut socket).await?;
    read_frame(&mut socket).await?;

    let reply = match mode {
        StubMode::Online { online, max, names } => {
            let mut players = json!({ "online": online, "max": max });
            if let Some(names) = names {
                let sample: Vec<_> = names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| json!({ "name": name, "id": format!("00000000-0000-0000-0000-{i:012}") }))
                    .collect();
                players["sample"] = json!(sample);
            }
            let status = json!({
                "version": { "name": "1.21.1", "protocol": 767 },
                "players": players,
                "description": { "text": "stub server" }
            });
            let mut payload = Vec::new();
            write_string(&status.to_string(), &mut payload);
            frame(0x00, &payload)
        }
        _ => frame(0x7f, b"nope"),
    };
    socket.write_all(&reply).await?;
    socket.flush().await?;
    Ok(())
}

async fn read_frame(socket: &mut TcpStream) -> Result<Vec<u8>> {
    let len = read_varint(socket).await?;
    anyhow::ensure!((0..=4096).contains(&len), "unexpected frame length {len}");
    let mut body = vec![0u8; len as usize];
    socket.read_exact(&mut body).await?;
    Ok(body)
}

async fn read_varint(socket: &mut TcpStream) -> Result<i32> {
    let mut value: u32 = 0;
    for i in 0..5 {
        let byte = socket.read_u8().await?;
        value |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    anyhow::bail!("varint too long")
}

fn write_varint(value: i32, buf: &mut Vec<u8>) {
    let mut rest = value as u32;
    while rest >= 0x80 {
        buf.push((rest & 0x7f) as u8 | 0x80);
        rest >>= 7;
    }
    buf.push(rest as u8);
}

fn write_string(value: &str, buf: &mut Vec<u8>) {
    write_varint(value.len() as i32, buf);
    buf.extend_from_slice(value.as_bytes());
}

fn frame(packet_id: i32, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    write_varint(packet_id, &mut body);
    body.extend_from_slice(payload);
    let mut out = Vec::new();
    write_varint(body.len() as i32, &mut out);
    out.extend(body);
    out
}
