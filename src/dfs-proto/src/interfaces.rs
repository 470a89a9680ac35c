use async_trait::async_trait;

use dfs_lib::{DfsResult, Path};
use dfs_rpc::{InterfaceSpec, MethodSpec, ERR_RPC};

use crate::clients::{CommandClient, StorageClient};

/// Parameter-type descriptors carried in requests and matched against
/// interface specs on the server side.
pub mod types {
    pub const PATH: &str = "path";
    pub const LONG: &str = "long";
    pub const BYTES: &str = "bytes";
    pub const STORAGE_STUB: &str = "storage_stub";
    pub const COMMAND_STUB: &str = "command_stub";
    pub const PATH_LIST: &str = "path[]";
}

pub const ERR_NOT_FOUND: &str = "not-found";
pub const ERR_OUT_OF_BOUNDS: &str = "out-of-bounds";
pub const ERR_IO: &str = "io";
pub const ERR_INVALID_PARAM: &str = "invalid-param";
pub const ERR_INVALID_STATE: &str = "invalid-state";

/// Client-facing storage operations: the data interface.
#[async_trait]
pub trait Storage: Send + Sync {
    /// The length of a file in bytes. Fails with not-found if the path is
    /// missing or refers to a directory.
    async fn size(&self, file: &Path) -> DfsResult<u64>;

    /// Reads exactly `length` bytes starting at `offset`.
    async fn read(&self, file: &Path, offset: i64, length: i64) -> DfsResult<Vec<u8>>;

    /// Writes `data` at `offset`, extending the file when needed. Bytes
    /// outside the written range are preserved.
    async fn write(&self, file: &Path, offset: i64, data: Vec<u8>) -> DfsResult<()>;
}

/// Storage mutations reserved for the naming server: the command interface.
#[async_trait]
pub trait Command: Send + Sync {
    /// Creates an empty file, creating missing ancestor directories first.
    /// Returns false for the root, an existing path, or a local I/O failure.
    async fn create(&self, file: &Path) -> DfsResult<bool>;

    /// Recursively removes a file or directory subtree, then prunes empty
    /// ancestor directories up to but not including the storage root.
    /// Returns false for the root or a missing path.
    async fn delete(&self, path: &Path) -> DfsResult<bool>;
}

/// Filesystem operations clients perform against the naming server.
#[async_trait]
pub trait Service: Send + Sync {
    /// True iff the path refers to a directory. Fails with not-found if the
    /// path does not exist.
    async fn is_directory(&self, path: &Path) -> DfsResult<bool>;

    /// The entries of a directory, in no particular order.
    async fn list(&self, directory: &Path) -> DfsResult<Vec<String>>;

    /// Creates a file on some registered storage server and records it in
    /// the tree. Returns false if the path is the root or already exists.
    async fn create_file(&self, file: &Path) -> DfsResult<bool>;

    /// Creates a directory in the tree. No storage server is involved.
    async fn create_directory(&self, directory: &Path) -> DfsResult<bool>;

    /// Deletes a file or directory subtree, commanding every storage server
    /// that owns a file in it. The root cannot be deleted.
    async fn delete(&self, path: &Path) -> DfsResult<bool>;

    /// The stub for the storage server hosting a file.
    async fn get_storage(&self, file: &Path) -> DfsResult<StorageClient>;
}

/// The one-time handshake a storage server performs with the naming server.
#[async_trait]
pub trait Registration: Send + Sync {
    /// Merges `files` into the naming tree and returns the paths the caller
    /// must delete locally because they are already claimed.
    async fn register(
        &self,
        storage: StorageClient,
        command: CommandClient,
        files: Vec<Path>,
    ) -> DfsResult<Vec<Path>>;
}

pub static STORAGE_SPEC: InterfaceSpec = InterfaceSpec {
    name: "Storage",
    methods: &[
        MethodSpec {
            name: "size",
            param_types: &[types::PATH],
            errors: &[ERR_RPC, ERR_NOT_FOUND],
        },
        MethodSpec {
            name: "read",
            param_types: &[types::PATH, types::LONG, types::LONG],
            errors: &[ERR_RPC, ERR_NOT_FOUND, ERR_OUT_OF_BOUNDS, ERR_IO],
        },
        MethodSpec {
            name: "write",
            param_types: &[types::PATH, types::LONG, types::BYTES],
            errors: &[ERR_RPC, ERR_NOT_FOUND, ERR_OUT_OF_BOUNDS, ERR_IO],
        },
    ],
};

pub static COMMAND_SPEC: InterfaceSpec = InterfaceSpec {
    name: "Command",
    methods: &[
        MethodSpec {
            name: "create",
            param_types: &[types::PATH],
            errors: &[ERR_RPC, ERR_INVALID_PARAM],
        },
        MethodSpec {
            name: "delete",
            param_types: &[types::PATH],
            errors: &[ERR_RPC, ERR_INVALID_PARAM],
        },
    ],
};

pub static SERVICE_SPEC: InterfaceSpec = InterfaceSpec {
    name: "Service",
    methods: &[
        MethodSpec {
            name: "is_directory",
            param_types: &[types::PATH],
            errors: &[ERR_RPC, ERR_NOT_FOUND],
        },
        MethodSpec {
            name: "list",
            param_types: &[types::PATH],
            errors: &[ERR_RPC, ERR_NOT_FOUND],
        },
        MethodSpec {
            name: "create_file",
            param_types: &[types::PATH],
            errors: &[ERR_RPC, ERR_NOT_FOUND, ERR_INVALID_STATE, ERR_INVALID_PARAM],
        },
        MethodSpec {
            name: "create_directory",
            param_types: &[types::PATH],
            errors: &[ERR_RPC, ERR_NOT_FOUND, ERR_INVALID_PARAM],
        },
        MethodSpec {
            name: "delete",
            param_types: &[types::PATH],
            errors: &[ERR_RPC, ERR_NOT_FOUND],
        },
        MethodSpec {
            name: "get_storage",
            param_types: &[types::PATH],
            errors: &[ERR_RPC, ERR_NOT_FOUND],
        },
    ],
};

pub static REGISTRATION_SPEC: InterfaceSpec = InterfaceSpec {
    name: "Registration",
    methods: &[MethodSpec {
        name: "register",
        param_types: &[types::STORAGE_STUB, types::COMMAND_STUB, types::PATH_LIST],
        errors: &[ERR_RPC, ERR_INVALID_PARAM, ERR_INVALID_STATE],
    }],
};
