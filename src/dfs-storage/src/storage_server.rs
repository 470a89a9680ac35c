use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tokio::sync::Mutex;

use dfs_lib::{DfsError, DfsResult, Path};
use dfs_proto::{
    Command, CommandClient, CommandDispatch, Registration, RegistrationClient, Storage,
    StorageClient, StorageDispatch, COMMAND_SPEC, STORAGE_SPEC,
};
use dfs_rpc::Skeleton;

struct Skeletons {
    storage: Skeleton,
    command: Skeleton,
}

/// A storage server: file bytes on the local filesystem under a root
/// directory, served through two skeletons on separate ports, the data
/// interface for clients and the command interface for the naming server.
///
/// Every public operation runs under one instance-level lock, so operations
/// on a given server are serialized; different servers are independent.
pub struct StorageServer {
    root: PathBuf,
    storage_port: Option<u16>,
    command_port: Option<u16>,
    op_lock: Mutex<()>,
    skeletons: Mutex<Option<Skeletons>>,
}

impl StorageServer {
    /// Creates a storage server over a local directory. With `None` ports,
    /// the system picks free ones at `start`.
    pub fn new(
        root: &std::path::Path,
        storage_port: Option<u16>,
        command_port: Option<u16>,
    ) -> DfsResult<Arc<Self>> {
        if root.as_os_str().is_empty() {
            return Err(DfsError::InvalidParam(
                "storage root is empty".to_string(),
            ));
        }
        let root = std::path::absolute(root)?;
        Ok(Arc::new(Self {
            root,
            storage_port,
            command_port,
            op_lock: Mutex::new(()),
            skeletons: Mutex::new(None),
        }))
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Starts both skeletons and registers with the naming server.
    ///
    /// The stubs handed to the naming server carry `hostname`, the
    /// externally visible name of this host. Registration returns the paths
    /// another server already owns; those are deleted locally, and empty
    /// directories under the root are pruned afterwards.
    pub async fn start(
        self: &Arc<Self>,
        hostname: &str,
        naming: &RegistrationClient,
    ) -> DfsResult<()> {
        if hostname.is_empty() {
            return Err(DfsError::InvalidParam("hostname is empty".to_string()));
        }
        let meta = fs::metadata(&self.root).await.map_err(|_| {
            DfsError::NotFound(format!(
                "storage root does not exist: {}",
                self.root.display()
            ))
        })?;
        if !meta.is_dir() {
            return Err(DfsError::NotFound(format!(
                "storage root is not a directory: {}",
                self.root.display()
            )));
        }

        let mut slot = self.skeletons.lock().await;
        if slot.is_some() {
            return Err(DfsError::Rpc(
                "storage server has already been started".to_string(),
            ));
        }

        let storage = Skeleton::new(
            &STORAGE_SPEC,
            Arc::new(StorageDispatch(self.clone())),
            self.storage_port
                .map(|port| SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))),
        )?;
        let command = Skeleton::new(
            &COMMAND_SPEC,
            Arc::new(CommandDispatch(self.clone())),
            self.command_port
                .map(|port| SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))),
        )?;
        storage.start().await?;
        command.start().await?;

        let storage_stub = StorageClient::from_skeleton_with_hostname(&storage, hostname)?;
        let command_stub = CommandClient::from_skeleton_with_hostname(&command, hostname)?;
        let files = Path::list(&self.root).await?;
        info!(
            "storage server at {} registering {} file(s)",
            self.root.display(),
            files.len()
        );

        let duplicates = naming.register(storage_stub, command_stub, files).await?;
        info!("{} duplicate file(s) to delete locally", duplicates.len());
        for duplicate in &duplicates {
            self.delete(duplicate).await?;
        }
        self.sweep_empty_directories().await?;

        *slot = Some(Skeletons { storage, command });
        Ok(())
    }

    /// Stops both skeletons. In-flight operations run to completion.
    pub async fn stop(&self) {
        if let Some(skeletons) = self.skeletons.lock().await.as_ref() {
            skeletons.storage.stop();
            skeletons.command.stop();
        }
    }

    pub async fn storage_addr(&self) -> DfsResult<SocketAddr> {
        match self.skeletons.lock().await.as_ref() {
            Some(s) => s.storage.bound_addr(),
            None => Err(DfsError::InvalidState(
                "storage server is not started".to_string(),
            )),
        }
    }

    pub async fn command_addr(&self) -> DfsResult<SocketAddr> {
        match self.skeletons.lock().await.as_ref() {
            Some(s) => s.command.bound_addr(),
            None => Err(DfsError::InvalidState(
                "storage server is not started".to_string(),
            )),
        }
    }

    /// Removes every directory under the root that holds no files, deepest
    /// first so directories of empty directories collapse too.
    async fn sweep_empty_directories(&self) -> DfsResult<()> {
        let mut directories = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_dir() {
                    pending.push(entry.path());
                }
            }
            if dir != self.root {
                directories.push(dir);
            }
        }
        directories.sort_by_key(|d| std::cmp::Reverse(d.components().count()));

        for dir in directories {
            let mut entries = fs::read_dir(&dir).await?;
            let empty = entries.next_entry().await?.is_none();
            drop(entries);
            if empty {
                fs::remove_dir(&dir).await?;
            }
        }
        Ok(())
    }

    /// Walks parents upward from a just-deleted path, removing each while it
    /// is an empty directory, stopping at the root. Pruning failures are
    /// logged and end the walk; they never fail the delete that triggered
    /// the pruning.
    async fn prune_ancestors(&self, path: &Path) {
        let mut dir = match path.parent() {
            Ok(dir) => dir,
            Err(_) => return,
        };
        while !dir.is_root() {
            let local = dir.to_file(&self.root);
            match fs::metadata(&local).await {
                Ok(meta) if meta.is_dir() => {}
                _ => break,
            }
            let empty = match fs::read_dir(&local).await {
                Ok(mut entries) => match entries.next_entry().await {
                    Ok(next) => next.is_none(),
                    Err(e) => {
                        warn!("prune {}: {}", dir, e);
                        break;
                    }
                },
                Err(e) => {
                    warn!("prune {}: {}", dir, e);
                    break;
                }
            };
            if !empty {
                break;
            }
            if let Err(e) = fs::remove_dir(&local).await {
                warn!("prune {}: {}", dir, e);
                break;
            }
            dir = match dir.parent() {
                Ok(parent) => parent,
                Err(_) => break,
            };
        }
    }
}

fn not_found(path: &Path) -> DfsError {
    DfsError::NotFound(format!(
        "file cannot be found or refers to a directory: {}",
        path
    ))
}

#[async_trait]
impl Storage for StorageServer {
    async fn size(&self, file: &Path) -> DfsResult<u64> {
        let _guard = self.op_lock.lock().await;
        let local = file.to_file(&self.root);
        let meta = fs::metadata(&local).await.map_err(|_| not_found(file))?;
        if meta.is_dir() {
            return Err(not_found(file));
        }
        Ok(meta.len())
    }

    async fn read(&self, file: &Path, offset: i64, length: i64) -> DfsResult<Vec<u8>> {
        let _guard = self.op_lock.lock().await;
        let local = file.to_file(&self.root);
        let meta = fs::metadata(&local).await.map_err(|_| not_found(file))?;
        if meta.is_dir() {
            return Err(not_found(file));
        }
        if offset < 0 || length < 0 {
            return Err(DfsError::OutOfBounds(format!(
                "negative offset or length: offset {}, length {}",
                offset, length
            )));
        }
        let end = offset.checked_add(length).ok_or_else(|| {
            DfsError::OutOfBounds(format!("offset {} + length {} overflows", offset, length))
        })?;
        if end as u64 > meta.len() {
            return Err(DfsError::OutOfBounds(format!(
                "range {}..{} exceeds file length {}",
                offset,
                end,
                meta.len()
            )));
        }

        let mut f = File::open(&local).await?;
        f.seek(SeekFrom::Start(offset as u64)).await?;
        let mut buffer = vec![0u8; length as usize];
        // read_exact loops over short reads; bounds were checked above, so
        // hitting EOF here is a genuine I/O failure
        f.read_exact(&mut buffer).await?;
        Ok(buffer)
    }

    async fn write(&self, file: &Path, offset: i64, data: Vec<u8>) -> DfsResult<()> {
        let _guard = self.op_lock.lock().await;
        if offset < 0 {
            return Err(DfsError::OutOfBounds(format!(
                "negative offset: {}",
                offset
            )));
        }
        let local = file.to_file(&self.root);
        let meta = fs::metadata(&local).await.map_err(|_| not_found(file))?;
        if meta.is_dir() {
            return Err(not_found(file));
        }
        if meta.permissions().readonly() {
            return Err(DfsError::Io(format!("file is not writable: {}", file)));
        }

        // open without truncation; bytes outside the written range survive,
        // and a seek past EOF extends the file
        let mut f = OpenOptions::new().write(true).open(&local).await?;
        f.seek(SeekFrom::Start(offset as u64)).await?;
        f.write_all(&data).await?;
        f.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Command for StorageServer {
    async fn create(&self, file: &Path) -> DfsResult<bool> {
        let _guard = self.op_lock.lock().await;
        if file.is_root() {
            return Ok(false);
        }
        let local = file.to_file(&self.root);
        if fs::metadata(&local).await.is_ok() {
            return Ok(false);
        }
        if let Some(parent) = local.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                warn!("create {}: ancestors failed: {}", file, e);
                return Ok(false);
            }
        }
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&local)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!("create {} failed: {}", file, e);
                Ok(false)
            }
        }
    }

    async fn delete(&self, path: &Path) -> DfsResult<bool> {
        let _guard = self.op_lock.lock().await;
        if path.is_root() {
            return Ok(false);
        }
        let local = path.to_file(&self.root);
        let meta = match fs::metadata(&local).await {
            Ok(meta) => meta,
            Err(_) => return Ok(false),
        };
        let removed = if meta.is_dir() {
            fs::remove_dir_all(&local).await
        } else {
            fs::remove_file(&local).await
        };
        if let Err(e) = removed {
            warn!("delete {} failed: {}", path, e);
            return Ok(false);
        }
        self.prune_ancestors(path).await;
        Ok(true)
    }
}
