mod skeleton;
mod stub;
mod wire;

pub use skeleton::{Skeleton, SkeletonEvents};
pub use stub::StubTarget;
pub use wire::{read_frame, write_frame, RpcRequest, RpcResponse, MAX_FRAME_LEN};


use async_trait::async_trait;
use serde_json::Value;

use dfs_lib::{DfsError, DfsResult};

/// Name of the rpc-failure error kind. Every remote method must declare it.
pub const ERR_RPC: &str = "rpc";

/// Describes one remote method: its name, the parameter-type descriptors a
/// request must carry to match it, and the error kinds it may raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSpec {
    pub name: &'static str,
    pub param_types: &'static [&'static str],
    pub errors: &'static [&'static str],
}

/// Describes one remote interface: the unit a skeleton serves and a stub
/// connects to.
#[derive(Debug)]
pub struct InterfaceSpec {
    pub name: &'static str,
    pub methods: &'static [MethodSpec],
}

impl InterfaceSpec {
    /// An interface is remote only if every method declares the rpc-failure
    /// kind; skeleton and stub construction both reject anything else.
    pub fn check_remote(&self) -> DfsResult<()> {
        for method in self.methods {
            if !method.errors.contains(&ERR_RPC) {
                return Err(DfsError::InvalidParam(format!(
                    "{}::{} does not declare the rpc failure kind",
                    self.name, method.name
                )));
            }
        }
        Ok(())
    }

    /// Resolves a method by name and parameter-type descriptors.
    pub fn find_method(&self, name: &str, param_types: &[String]) -> Option<&MethodSpec> {
        self.methods.iter().find(|m| {
            m.name == name
                && m.param_types.len() == param_types.len()
                && m.param_types.iter().zip(param_types).all(|(a, b)| a == b)
        })
    }
}

/// Server-side target of a skeleton.
///
/// An implementation decodes the argument list for one of its interface's
/// methods, invokes the backing object, and encodes the result. The error it
/// returns travels back to the stub unchanged, whether it was raised by the
/// backing object or by argument decoding.
#[async_trait]
pub trait RpcDispatch: Send + Sync {
    async fn invoke(&self, method: &str, args: &[Value]) -> DfsResult<Value>;
}
