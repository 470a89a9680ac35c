use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use dfs_lib::{DfsError, DfsResult, Path};
use dfs_rpc::RpcDispatch;

use crate::clients::{CommandClient, StorageClient};
use crate::interfaces::{Command, Registration, Service, Storage};
use crate::encode_value;

/// Decodes one positional argument. A missing argument is a dispatch
/// failure; an explicit null is the caller's fault and comes back as
/// invalid-param, as does any value of the wrong shape.
fn arg<T: DeserializeOwned>(args: &[Value], index: usize) -> DfsResult<T> {
    let value = args
        .get(index)
        .ok_or_else(|| DfsError::Rpc(format!("missing argument {}", index)))?;
    if value.is_null() {
        return Err(DfsError::InvalidParam(format!("argument {} is null", index)));
    }
    serde_json::from_value(value.clone())
        .map_err(|e| DfsError::InvalidParam(format!("argument {}: {}", index, e)))
}

fn unknown(interface: &str, method: &str) -> DfsError {
    DfsError::Rpc(format!("no dispatch for {}::{}", interface, method))
}

/// Serves a [`Storage`] implementation behind a skeleton.
pub struct StorageDispatch<T>(pub Arc<T>);

#[async_trait]
impl<T: Storage + 'static> RpcDispatch for StorageDispatch<T> {
    async fn invoke(&self, method: &str, args: &[Value]) -> DfsResult<Value> {
        match method {
            "size" => {
                let file: Path = arg(args, 0)?;
                encode_value(&self.0.size(&file).await?)
            }
            "read" => {
                let file: Path = arg(args, 0)?;
                let offset: i64 = arg(args, 1)?;
                let length: i64 = arg(args, 2)?;
                encode_value(&self.0.read(&file, offset, length).await?)
            }
            "write" => {
                let file: Path = arg(args, 0)?;
                let offset: i64 = arg(args, 1)?;
                let data: Vec<u8> = arg(args, 2)?;
                self.0.write(&file, offset, data).await?;
                encode_value(&())
            }
            other => Err(unknown("Storage", other)),
        }
    }
}

/// Serves a [`Command`] implementation behind a skeleton.
pub struct CommandDispatch<T>(pub Arc<T>);

#[async_trait]
impl<T: Command + 'static> RpcDispatch for CommandDispatch<T> {
    async fn invoke(&self, method: &str, args: &[Value]) -> DfsResult<Value> {
        match method {
            "create" => {
                let file: Path = arg(args, 0)?;
                encode_value(&self.0.create(&file).await?)
            }
            "delete" => {
                let path: Path = arg(args, 0)?;
                encode_value(&self.0.delete(&path).await?)
            }
            other => Err(unknown("Command", other)),
        }
    }
}

/// Serves a [`Service`] implementation behind a skeleton.
pub struct ServiceDispatch<T>(pub Arc<T>);

#[async_trait]
impl<T: Service + 'static> RpcDispatch for ServiceDispatch<T> {
    async fn invoke(&self, method: &str, args: &[Value]) -> DfsResult<Value> {
        match method {
            "is_directory" => {
                let path: Path = arg(args, 0)?;
                encode_value(&self.0.is_directory(&path).await?)
            }
            "list" => {
                let directory: Path = arg(args, 0)?;
                encode_value(&self.0.list(&directory).await?)
            }
            "create_file" => {
                let file: Path = arg(args, 0)?;
                encode_value(&self.0.create_file(&file).await?)
            }
            "create_directory" => {
                let directory: Path = arg(args, 0)?;
                encode_value(&self.0.create_directory(&directory).await?)
            }
            "delete" => {
                let path: Path = arg(args, 0)?;
                encode_value(&self.0.delete(&path).await?)
            }
            "get_storage" => {
                let file: Path = arg(args, 0)?;
                encode_value(&self.0.get_storage(&file).await?)
            }
            other => Err(unknown("Service", other)),
        }
    }
}

/// Serves a [`Registration`] implementation behind a skeleton.
pub struct RegistrationDispatch<T>(pub Arc<T>);

#[async_trait]
impl<T: Registration + 'static> RpcDispatch for RegistrationDispatch<T> {
    async fn invoke(&self, method: &str, args: &[Value]) -> DfsResult<Value> {
        match method {
            "register" => {
                let storage: StorageClient = arg(args, 0)?;
                let command: CommandClient = arg(args, 1)?;
                let files: Vec<Path> = arg(args, 2)?;
                encode_value(&self.0.register(storage, command, files).await?)
            }
            other => Err(unknown("Registration", other)),
        }
    }
}
