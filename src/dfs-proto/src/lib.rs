mod clients;
mod dispatch;
mod interfaces;

pub use clients::{CommandClient, RegistrationClient, ServerStubs, ServiceClient, StorageClient};
pub use dispatch::{CommandDispatch, RegistrationDispatch, ServiceDispatch, StorageDispatch};
pub use interfaces::{
    types, Command, Registration, Service, Storage, COMMAND_SPEC, ERR_INVALID_PARAM,
    ERR_INVALID_STATE, ERR_IO, ERR_NOT_FOUND, ERR_OUT_OF_BOUNDS, REGISTRATION_SPEC, SERVICE_SPEC,
    STORAGE_SPEC,
};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use dfs_lib::{DfsError, DfsResult};

/// Well-known naming server ports. Storage servers pick ephemeral ports
/// unless configured.
pub mod ports {
    pub const SERVICE_PORT: u16 = 6000;
    pub const REGISTRATION_PORT: u16 = 6001;
}

/// Encodes one argument or return value for the wire.
pub fn encode_value<T: Serialize>(value: &T) -> DfsResult<Value> {
    serde_json::to_value(value).map_err(|e| DfsError::Rpc(format!("encode value: {}", e)))
}

/// Decodes one argument or return value from the wire.
pub fn decode_value<T: DeserializeOwned>(value: Value) -> DfsResult<T> {
    serde_json::from_value(value).map_err(|e| DfsError::Rpc(format!("decode value: {}", e)))
}
