use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use dfs_lib::{DfsResult, Path};
use dfs_rpc::{Skeleton, StubTarget};

use crate::interfaces::{
    Command, Registration, Service, Storage, COMMAND_SPEC, REGISTRATION_SPEC, SERVICE_SPEC,
    STORAGE_SPEC,
};
use crate::{decode_value, encode_value};

/// Stub for the client-facing storage interface.
///
/// Remote methods travel to the skeleton the stub points at; equality,
/// hashing, and display come from the interface name and address alone.
/// Stubs serialize as their target, so one received over the wire keeps the
/// same remote address and behaves identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageClient {
    target: StubTarget,
}

impl StorageClient {
    pub fn from_addr(host: &str, port: u16) -> DfsResult<Self> {
        Ok(Self {
            target: StubTarget::from_addr(&STORAGE_SPEC, host, port)?,
        })
    }

    pub fn from_skeleton(skeleton: &Skeleton) -> DfsResult<Self> {
        Ok(Self {
            target: StubTarget::from_skeleton(&STORAGE_SPEC, skeleton)?,
        })
    }

    pub fn from_skeleton_with_hostname(skeleton: &Skeleton, hostname: &str) -> DfsResult<Self> {
        Ok(Self {
            target: StubTarget::from_skeleton_with_hostname(&STORAGE_SPEC, skeleton, hostname)?,
        })
    }

    pub fn target(&self) -> &StubTarget {
        &self.target
    }
}

impl fmt::Display for StorageClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.target.fmt(f)
    }
}

#[async_trait]
impl Storage for StorageClient {
    async fn size(&self, file: &Path) -> DfsResult<u64> {
        let value = self
            .target
            .call(&STORAGE_SPEC, "size", vec![encode_value(file)?])
            .await?;
        decode_value(value)
    }

    async fn read(&self, file: &Path, offset: i64, length: i64) -> DfsResult<Vec<u8>> {
        let value = self
            .target
            .call(
                &STORAGE_SPEC,
                "read",
                vec![
                    encode_value(file)?,
                    encode_value(&offset)?,
                    encode_value(&length)?,
                ],
            )
            .await?;
        decode_value(value)
    }

    async fn write(&self, file: &Path, offset: i64, data: Vec<u8>) -> DfsResult<()> {
        let value = self
            .target
            .call(
                &STORAGE_SPEC,
                "write",
                vec![
                    encode_value(file)?,
                    encode_value(&offset)?,
                    encode_value(&data)?,
                ],
            )
            .await?;
        decode_value(value)
    }
}

/// Stub for the naming-facing storage command interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandClient {
    target: StubTarget,
}

impl CommandClient {
    pub fn from_addr(host: &str, port: u16) -> DfsResult<Self> {
        Ok(Self {
            target: StubTarget::from_addr(&COMMAND_SPEC, host, port)?,
        })
    }

    pub fn from_skeleton(skeleton: &Skeleton) -> DfsResult<Self> {
        Ok(Self {
            target: StubTarget::from_skeleton(&COMMAND_SPEC, skeleton)?,
        })
    }

    pub fn from_skeleton_with_hostname(skeleton: &Skeleton, hostname: &str) -> DfsResult<Self> {
        Ok(Self {
            target: StubTarget::from_skeleton_with_hostname(&COMMAND_SPEC, skeleton, hostname)?,
        })
    }

    pub fn target(&self) -> &StubTarget {
        &self.target
    }
}

impl fmt::Display for CommandClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.target.fmt(f)
    }
}

#[async_trait]
impl Command for CommandClient {
    async fn create(&self, file: &Path) -> DfsResult<bool> {
        let value = self
            .target
            .call(&COMMAND_SPEC, "create", vec![encode_value(file)?])
            .await?;
        decode_value(value)
    }

    async fn delete(&self, path: &Path) -> DfsResult<bool> {
        let value = self
            .target
            .call(&COMMAND_SPEC, "delete", vec![encode_value(path)?])
            .await?;
        decode_value(value)
    }
}

/// Stub for the naming server's client-facing service interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceClient {
    target: StubTarget,
}

impl ServiceClient {
    pub fn from_addr(host: &str, port: u16) -> DfsResult<Self> {
        Ok(Self {
            target: StubTarget::from_addr(&SERVICE_SPEC, host, port)?,
        })
    }

    pub fn target(&self) -> &StubTarget {
        &self.target
    }
}

impl fmt::Display for ServiceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.target.fmt(f)
    }
}

#[async_trait]
impl Service for ServiceClient {
    async fn is_directory(&self, path: &Path) -> DfsResult<bool> {
        let value = self
            .target
            .call(&SERVICE_SPEC, "is_directory", vec![encode_value(path)?])
            .await?;
        decode_value(value)
    }

    async fn list(&self, directory: &Path) -> DfsResult<Vec<String>> {
        let value = self
            .target
            .call(&SERVICE_SPEC, "list", vec![encode_value(directory)?])
            .await?;
        decode_value(value)
    }

    async fn create_file(&self, file: &Path) -> DfsResult<bool> {
        let value = self
            .target
            .call(&SERVICE_SPEC, "create_file", vec![encode_value(file)?])
            .await?;
        decode_value(value)
    }

    async fn create_directory(&self, directory: &Path) -> DfsResult<bool> {
        let value = self
            .target
            .call(
                &SERVICE_SPEC,
                "create_directory",
                vec![encode_value(directory)?],
            )
            .await?;
        decode_value(value)
    }

    async fn delete(&self, path: &Path) -> DfsResult<bool> {
        let value = self
            .target
            .call(&SERVICE_SPEC, "delete", vec![encode_value(path)?])
            .await?;
        decode_value(value)
    }

    async fn get_storage(&self, file: &Path) -> DfsResult<StorageClient> {
        let value = self
            .target
            .call(&SERVICE_SPEC, "get_storage", vec![encode_value(file)?])
            .await?;
        decode_value(value)
    }
}

/// Stub for the naming server's registration interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationClient {
    target: StubTarget,
}

impl RegistrationClient {
    pub fn from_addr(host: &str, port: u16) -> DfsResult<Self> {
        Ok(Self {
            target: StubTarget::from_addr(&REGISTRATION_SPEC, host, port)?,
        })
    }

    pub fn target(&self) -> &StubTarget {
        &self.target
    }
}

impl fmt::Display for RegistrationClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.target.fmt(f)
    }
}

#[async_trait]
impl Registration for RegistrationClient {
    async fn register(
        &self,
        storage: StorageClient,
        command: CommandClient,
        files: Vec<Path>,
    ) -> DfsResult<Vec<Path>> {
        let value = self
            .target
            .call(
                &REGISTRATION_SPEC,
                "register",
                vec![
                    encode_value(&storage)?,
                    encode_value(&command)?,
                    encode_value(&files)?,
                ],
            )
            .await?;
        decode_value(value)
    }
}

/// The stub pair identifying one registered storage server. Equality is
/// structural over both members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerStubs {
    pub storage: StorageClient,
    pub command: CommandClient,
}
