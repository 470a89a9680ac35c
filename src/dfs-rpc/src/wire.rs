use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use dfs_lib::{DfsError, DfsResult};

/// Upper bound on a single frame body. A request carries at most one write
/// buffer and a reply at most one read buffer; 64 MiB leaves ample headroom.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// One remote method call: the method name, the parameter-type descriptors,
/// and the argument values, in that order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    pub param_types: Vec<String>,
    pub args: Vec<Value>,
}

/// The reply to a call: a success flag, then either the return value or the
/// serialized failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub ok: bool,
    pub value: Value,
}

impl RpcResponse {
    pub fn success(value: Value) -> Self {
        Self { ok: true, value }
    }

    pub fn failure(err: &DfsError) -> Self {
        Self {
            ok: false,
            value: serde_json::to_value(err).unwrap_or(Value::Null),
        }
    }
}

/// Writes one length-prefixed frame: a u32 big-endian byte count followed by
/// the serde_json body. Both peers must produce identical encodings, which
/// serde_json guarantees for the fixed record types above.
pub async fn write_frame<W, T>(stream: &mut W, body: &T) -> DfsResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = serde_json::to_vec(body).map_err(|e| DfsError::Rpc(format!("encode frame: {}", e)))?;
    if bytes.len() > MAX_FRAME_LEN as usize {
        return Err(DfsError::Rpc(format!(
            "frame of {} bytes exceeds the {} byte limit",
            bytes.len(),
            MAX_FRAME_LEN
        )));
    }
    stream
        .write_all(&(bytes.len() as u32).to_be_bytes())
        .await
        .map_err(|e| DfsError::Rpc(format!("write frame length: {}", e)))?;
    stream
        .write_all(&bytes)
        .await
        .map_err(|e| DfsError::Rpc(format!("write frame body: {}", e)))?;
    stream
        .flush()
        .await
        .map_err(|e| DfsError::Rpc(format!("flush frame: {}", e)))?;
    Ok(())
}

/// Reads one length-prefixed frame and decodes its body.
pub async fn read_frame<R, T>(stream: &mut R) -> DfsResult<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len = [0u8; 4];
    stream
        .read_exact(&mut len)
        .await
        .map_err(|e| DfsError::Rpc(format!("read frame length: {}", e)))?;
    let len = u32::from_be_bytes(len);
    if len > MAX_FRAME_LEN {
        return Err(DfsError::Rpc(format!(
            "frame of {} bytes exceeds the {} byte limit",
            len, MAX_FRAME_LEN
        )));
    }
    let mut body = vec![0u8; len as usize];
    stream
        .read_exact(&mut body)
        .await
        .map_err(|e| DfsError::Rpc(format!("read frame body: {}", e)))?;
    serde_json::from_slice(&body).map_err(|e| DfsError::Rpc(format!("decode frame: {}", e)))
}
