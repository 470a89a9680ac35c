use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use dfs_lib::{DfsError, DfsResult};

use crate::skeleton::Skeleton;
use crate::wire::{read_frame, write_frame, RpcRequest, RpcResponse};
use crate::InterfaceSpec;

/// The remote endpoint a stub points at.
///
/// Typed client stubs wrap one of these and delegate every remote method to
/// [`StubTarget::call`]. Equality, hashing, and display are resolved locally
/// from the interface name and address; they never touch the network. The
/// hostname is kept verbatim so a stub can carry an externally routable name
/// across the wire and resolve it at call time, which also makes a stub
/// restored on another host behave identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StubTarget {
    pub interface: String,
    pub host: String,
    pub port: u16,
}

impl StubTarget {
    /// Bootstrap form: point a stub at a known remote address.
    pub fn from_addr(spec: &'static InterfaceSpec, host: &str, port: u16) -> DfsResult<Self> {
        spec.check_remote()?;
        if host.is_empty() {
            return Err(DfsError::InvalidParam("stub hostname is empty".to_string()));
        }
        Ok(Self {
            interface: spec.name.to_string(),
            host: host.to_string(),
            port,
        })
    }

    /// Captures the address of a skeleton that has a fixed address or has
    /// been started.
    pub fn from_skeleton(spec: &'static InterfaceSpec, skeleton: &Skeleton) -> DfsResult<Self> {
        let addr = skeleton.bound_addr()?;
        Self::from_addr(spec, &addr.ip().to_string(), addr.port())
    }

    /// Like [`StubTarget::from_skeleton`], but with the host overridden for
    /// servers whose externally visible name differs from the bind address.
    /// Only the skeleton's port is used.
    pub fn from_skeleton_with_hostname(
        spec: &'static InterfaceSpec,
        skeleton: &Skeleton,
        hostname: &str,
    ) -> DfsResult<Self> {
        Self::from_addr(spec, hostname, skeleton.port()?)
    }

    /// Performs one remote call: connect, send the request frame, read the
    /// reply, close.
    ///
    /// A failed reply re-raises the error the server sent; every transport or
    /// marshaling problem surfaces as [`DfsError::Rpc`].
    pub async fn call(
        &self,
        spec: &'static InterfaceSpec,
        method: &str,
        args: Vec<Value>,
    ) -> DfsResult<Value> {
        let method = spec
            .methods
            .iter()
            .find(|m| m.name == method)
            .ok_or_else(|| DfsError::Rpc(format!("{} has no method {}", spec.name, method)))?;

        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| DfsError::Rpc(format!("connect {}:{}: {}", self.host, self.port, e)))?;

        let request = RpcRequest {
            method: method.name.to_string(),
            param_types: method.param_types.iter().map(|t| t.to_string()).collect(),
            args,
        };
        write_frame(&mut stream, &request).await?;
        let response: RpcResponse = read_frame(&mut stream).await?;
        let _ = stream.shutdown().await;

        if response.ok {
            Ok(response.value)
        } else {
            let err: DfsError = serde_json::from_value(response.value)
                .map_err(|e| DfsError::Rpc(format!("undecodable failure value: {}", e)))?;
            Err(err)
        }
    }
}

impl fmt::Display for StubTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stub for {}:{}", self.interface, self.host, self.port)
    }
}
