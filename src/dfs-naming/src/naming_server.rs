use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use rand::Rng;
use tokio::sync::{Mutex, RwLock};

use dfs_lib::{DfsError, DfsResult, Path};
use dfs_proto::{
    Command, CommandClient, Registration, RegistrationDispatch, ServerStubs, Service,
    ServiceDispatch, StorageClient, REGISTRATION_SPEC, SERVICE_SPEC,
};
use dfs_rpc::Skeleton;

use crate::path_tree::PathNode;

struct NamingState {
    root: PathNode,
    registry: Vec<ServerStubs>,
}

struct Skeletons {
    service: Skeleton,
    registration: Skeleton,
}

/// The naming server: the global directory tree plus the two skeletons it
/// is reachable through.
///
/// Readers (`is_directory`, `list`, `get_storage`) traverse under the read
/// lock. Writers (`create_file`, `create_directory`, `delete`, `register`)
/// hold the write lock for their whole operation, including the storage
/// commands they issue, so registration's duplicate detection and insertion
/// are atomic with respect to each other.
pub struct NamingServer {
    service_port: u16,
    registration_port: u16,
    state: RwLock<NamingState>,
    skeletons: Mutex<Option<Skeletons>>,
}

impl NamingServer {
    /// Creates the server unstarted. Port 0 lets the system choose, which is
    /// mainly useful in tests; deployments use the well-known ports in
    /// `dfs_proto::ports`.
    pub fn new(service_port: u16, registration_port: u16) -> Arc<Self> {
        Arc::new(Self {
            service_port,
            registration_port,
            state: RwLock::new(NamingState {
                root: PathNode::new_directory(),
                registry: Vec::new(),
            }),
            skeletons: Mutex::new(None),
        })
    }

    /// Starts the service and registration skeletons. The server cannot be
    /// started twice.
    pub async fn start(self: &Arc<Self>) -> DfsResult<()> {
        let mut slot = self.skeletons.lock().await;
        if slot.is_some() {
            return Err(DfsError::Rpc(
                "naming server has already been started".to_string(),
            ));
        }
        let service = Skeleton::new(
            &SERVICE_SPEC,
            Arc::new(ServiceDispatch(self.clone())),
            Some(SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.service_port))),
        )?;
        let registration = Skeleton::new(
            &REGISTRATION_SPEC,
            Arc::new(RegistrationDispatch(self.clone())),
            Some(SocketAddr::from((
                Ipv4Addr::UNSPECIFIED,
                self.registration_port,
            ))),
        )?;
        service.start().await?;
        registration.start().await?;
        info!(
            "naming server up: service on {}, registration on {}",
            service.bound_addr()?,
            registration.bound_addr()?
        );
        *slot = Some(Skeletons {
            service,
            registration,
        });
        Ok(())
    }

    /// Stops both skeletons. In-flight operations run to completion.
    pub async fn stop(&self) {
        if let Some(skeletons) = self.skeletons.lock().await.as_ref() {
            skeletons.service.stop();
            skeletons.registration.stop();
        }
    }

    pub async fn service_addr(&self) -> DfsResult<SocketAddr> {
        match self.skeletons.lock().await.as_ref() {
            Some(s) => s.service.bound_addr(),
            None => Err(DfsError::InvalidState(
                "naming server is not started".to_string(),
            )),
        }
    }

    pub async fn registration_addr(&self) -> DfsResult<SocketAddr> {
        match self.skeletons.lock().await.as_ref() {
            Some(s) => s.registration.bound_addr(),
            None => Err(DfsError::InvalidState(
                "naming server is not started".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Service for NamingServer {
    async fn is_directory(&self, path: &Path) -> DfsResult<bool> {
        let state = self.state.read().await;
        Ok(!state.root.find(path)?.is_file())
    }

    async fn list(&self, directory: &Path) -> DfsResult<Vec<String>> {
        let state = self.state.read().await;
        let node = state.root.find(directory)?;
        if node.is_file() {
            return Err(DfsError::NotFound(format!(
                "not a directory: {}",
                directory
            )));
        }
        Ok(node.child_names())
    }

    async fn create_file(&self, file: &Path) -> DfsResult<bool> {
        if file.is_root() {
            return Ok(false);
        }
        let parent = file.parent()?;
        let name = file.last()?.to_string();

        let mut state = self.state.write().await;
        if state.root.find(&parent)?.is_file() {
            return Err(DfsError::NotFound(format!(
                "parent is not a directory: {}",
                parent
            )));
        }
        if state.root.find(file).is_ok() {
            return Ok(false);
        }
        if state.registry.is_empty() {
            return Err(DfsError::InvalidState(
                "no storage servers are registered".to_string(),
            ));
        }

        let pick = rand::rng().random_range(0..state.registry.len());
        let owner = state.registry[pick].clone();
        debug!("placing {} via {}", file, owner.command);
        owner.command.create(file).await?;
        state
            .root
            .find_mut(&parent)?
            .insert_child(&name, PathNode::new_file(owner))?;
        Ok(true)
    }

    async fn create_directory(&self, directory: &Path) -> DfsResult<bool> {
        if directory.is_root() {
            return Ok(false);
        }
        let parent = directory.parent()?;
        let name = directory.last()?.to_string();

        let mut state = self.state.write().await;
        if state.root.find(&parent)?.is_file() {
            return Err(DfsError::NotFound(format!(
                "parent is not a directory: {}",
                parent
            )));
        }
        if state.root.find(directory).is_ok() {
            return Ok(false);
        }
        state
            .root
            .find_mut(&parent)?
            .insert_child(&name, PathNode::new_directory())?;
        Ok(true)
    }

    async fn delete(&self, path: &Path) -> DfsResult<bool> {
        if path.is_root() {
            return Ok(false);
        }
        let parent = path.parent()?;
        let name = path.last()?.to_string();

        let mut state = self.state.write().await;
        let mut files = Vec::new();
        state.root.find(path)?.collect_files(path, &mut files);
        // every owning server is commanded for every file-leaf it holds
        for (file, owner) in &files {
            owner.command.delete(file).await?;
        }
        state.root.find_mut(&parent)?.remove_child(&name);
        Ok(true)
    }

    async fn get_storage(&self, file: &Path) -> DfsResult<StorageClient> {
        let state = self.state.read().await;
        match state.root.find(file)?.owner() {
            Some(stubs) => Ok(stubs.storage.clone()),
            None => Err(DfsError::NotFound(format!("not a file: {}", file))),
        }
    }
}

#[async_trait]
impl Registration for NamingServer {
    async fn register(
        &self,
        storage: StorageClient,
        command: CommandClient,
        files: Vec<Path>,
    ) -> DfsResult<Vec<Path>> {
        let stubs = ServerStubs { storage, command };

        let mut state = self.state.write().await;
        if state.registry.contains(&stubs) {
            return Err(DfsError::InvalidState(
                "storage server is already registered".to_string(),
            ));
        }
        state.registry.push(stubs.clone());
        info!(
            "registered storage server {} ({} file(s) offered)",
            stubs.storage,
            files.len()
        );

        let mut duplicates = Vec::new();
        for file in &files {
            if file.is_root() {
                continue;
            }
            // first walk: a file-leaf already present at the full path makes
            // this offer a duplicate the caller must delete
            if let Ok(node) = state.root.find(file) {
                if node.is_file() {
                    duplicates.push(file.clone());
                }
            }
            // second walk: insert what is missing; an existing final
            // component of any kind blocks the insert, as does descending
            // into another server's file
            let mut node = &mut state.root;
            let depth = file.depth();
            for (i, component) in file.components().enumerate() {
                if node.is_file() {
                    break;
                }
                let is_last = i + 1 == depth;
                node = node.child_or_insert_with(component, || {
                    if is_last {
                        PathNode::new_file(stubs.clone())
                    } else {
                        PathNode::new_directory()
                    }
                });
            }
        }
        Ok(duplicates)
    }
}
