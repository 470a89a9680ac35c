use std::collections::HashMap;

use dfs_lib::{DfsError, DfsResult, Path};
use dfs_proto::ServerStubs;

/// One node of the in-memory naming tree.
///
/// A node is a file-leaf iff it carries an owning storage server; a
/// directory never does, and a file-leaf never has children.
#[derive(Debug)]
pub(crate) struct PathNode {
    children: HashMap<String, PathNode>,
    owner: Option<ServerStubs>,
}

impl PathNode {
    pub fn new_directory() -> Self {
        Self {
            children: HashMap::new(),
            owner: None,
        }
    }

    pub fn new_file(owner: ServerStubs) -> Self {
        Self {
            children: HashMap::new(),
            owner: Some(owner),
        }
    }

    pub fn is_file(&self) -> bool {
        self.owner.is_some()
    }

    pub fn owner(&self) -> Option<&ServerStubs> {
        self.owner.as_ref()
    }

    pub fn child_names(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }

    /// Walks component-by-component; not-found on the first missing one.
    pub fn find(&self, path: &Path) -> DfsResult<&PathNode> {
        let mut node = self;
        for component in path.components() {
            node = node
                .children
                .get(component)
                .ok_or_else(|| DfsError::NotFound(format!("no such path: {}", path)))?;
        }
        Ok(node)
    }

    pub fn find_mut(&mut self, path: &Path) -> DfsResult<&mut PathNode> {
        let mut node = self;
        for component in path.components() {
            node = node
                .children
                .get_mut(component)
                .ok_or_else(|| DfsError::NotFound(format!("no such path: {}", path)))?;
        }
        Ok(node)
    }

    pub fn insert_child(&mut self, name: &str, child: PathNode) -> DfsResult<()> {
        if self.is_file() {
            return Err(DfsError::InvalidState(
                "cannot add a child to a file".to_string(),
            ));
        }
        if self.children.contains_key(name) {
            return Err(DfsError::InvalidState(format!(
                "child already exists: {}",
                name
            )));
        }
        self.children.insert(name.to_string(), child);
        Ok(())
    }

    /// Descends into a child, inserting it first if missing. The caller must
    /// have checked that this node is not a file-leaf.
    pub fn child_or_insert_with(
        &mut self,
        name: &str,
        make: impl FnOnce() -> PathNode,
    ) -> &mut PathNode {
        self.children.entry(name.to_string()).or_insert_with(make)
    }

    pub fn remove_child(&mut self, name: &str) -> Option<PathNode> {
        self.children.remove(name)
    }

    /// Collects (file path, owner) for every file-leaf in the subtree rooted
    /// here, where `prefix` addresses this node.
    pub fn collect_files(&self, prefix: &Path, out: &mut Vec<(Path, ServerStubs)>) {
        if let Some(owner) = &self.owner {
            out.push((prefix.clone(), owner.clone()));
            return;
        }
        for (name, child) in &self.children {
            // child names came from validated Paths, so extending cannot fail
            if let Ok(path) = prefix.child(name) {
                child.collect_files(&path, out);
            }
        }
    }
}
