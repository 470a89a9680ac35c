mod naming_server;
mod path_tree;

pub use naming_server::NamingServer;
