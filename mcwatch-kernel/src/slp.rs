//! Minecraft Server List Ping (status protocol, 1.7+).
//!
//! Wire format: every frame is `VarInt length ‖ VarInt packet id ‖ payload`.
//! The client sends a handshake (next state = status) and an empty status
//! request; the server answers with one frame holding a JSON string.

use crate::error::ProbeError;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

pub const DEFAULT_PORT: u16 = 25565;

/// Protocol version announced in the handshake. Servers answer status
/// requests for any version.
const PROTOCOL_VERSION: i32 = 47;
const NEXT_STATE_STATUS: i32 = 1;
const STATUS_PACKET_ID: i32 = 0x00;
const MAX_FRAME_LEN: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub players: Players,
    #[serde(default)]
    pub version: Option<ServerVersion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Players {
    pub online: u32,
    pub max: u32,
    #[serde(default)]
    pub sample: Option<Vec<PlayerSample>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerSample {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerVersion {
    pub name: String,
}

/// Connects to `host:port` and performs one status exchange.
pub async fn query_server_status(host: &str, port: u16) -> Result<StatusResponse, ProbeError> {
    let mut stream = TcpStream::connect((host, port)).await?;
    query_status(&mut stream, host, port).await
}

/// Status exchange over an already open stream.
pub async fn query_status<S>(stream: &mut S, host: &str, port: u16) -> Result<StatusResponse, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = frame(STATUS_PACKET_ID, &handshake_payload(host, port));
    request.extend(frame(STATUS_PACKET_ID, &[]));
    stream.write_all(&request).await?;
    stream.flush().await?;

    let len = read_varint(stream).await?;
    let len = usize::try_from(len)
        .ok()
        .filter(|len| *len > 0 && *len <= MAX_FRAME_LEN)
        .ok_or_else(|| ProbeError::Protocol(format!("bad frame length {len}")))?;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;

    let (packet_id, mut pos) = decode_varint(&body)?;
    if packet_id != STATUS_PACKET_ID {
        return Err(ProbeError::Protocol(format!("unexpected packet id {packet_id:#04x}")));
    }
    let (json_len, used) = decode_varint(&body[pos..])?;
    pos += used;
    let json = usize::try_from(json_len)
        .ok()
        .and_then(|json_len| pos.checked_add(json_len))
        .and_then(|end| body.get(pos..end))
        .ok_or_else(|| ProbeError::Protocol("status string overruns frame".into()))?;
    let json = std::str::from_utf8(json)
        .map_err(|e| ProbeError::Protocol(format!("status string is not utf-8: {e}")))?;

    Ok(serde_json::from_str(json)?)
}

fn handshake_payload(host: &str, port: u16) -> Vec<u8> {
    let mut payload = Vec::with_capacity(host.len() + 10);
    encode_varint(PROTOCOL_VERSION, &mut payload);
    encode_string(host, &mut payload);
    payload.extend_from_slice(&port.to_be_bytes());
    encode_varint(NEXT_STATE_STATUS, &mut payload);
    payload
}

fn frame(packet_id: i32, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + 5);
    encode_varint(packet_id, &mut body);
    body.extend_from_slice(payload);

    let mut out = Vec::with_capacity(body.len() + 5);
    encode_varint(body.len() as i32, &mut out);
    out.extend(body);
    out
}

fn encode_string(value: &str, buf: &mut Vec<u8>) {
    encode_varint(value.len() as i32, buf);
    buf.extend_from_slice(value.as_bytes());
}

fn encode_varint(value: i32, buf: &mut Vec<u8>) {
    let mut rest = value as u32;
    loop {
        if rest & !0x7F == 0 {
            buf.push(rest as u8);
            return;
        }
        buf.push((rest & 0x7F) as u8 | 0x80);
        rest >>= 7;
    }
}

fn decode_varint(buf: &[u8]) -> Result<(i32, usize), ProbeError> {
    let mut value: u32 = 0;
    for (i, byte) in buf.iter().take(5).enumerate() {
        value |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value as i32, i + 1));
        }
    }
    if buf.len() < 5 {
        Err(ProbeError::Protocol("truncated varint".into()))
    } else {
        Err(ProbeError::Protocol("varint longer than 5 bytes".into()))
    }
}

async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32, ProbeError> {
    let mut value: u32 = 0;
    for i in 0..5 {
        let byte = reader.read_u8().await?;
        value |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(ProbeError::Protocol("varint longer than 5 bytes".into()))
}
