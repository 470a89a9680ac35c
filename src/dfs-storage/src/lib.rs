mod storage_server;

pub use storage_server::StorageServer;

#[cfg(test)]
mod storage_server_tests;
