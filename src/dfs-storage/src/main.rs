use std::env;
use std::path::PathBuf;

use log::{error, info};
use serde::Deserialize;

use dfs_lib::DfsResult;
use dfs_proto::{ports, RegistrationClient};
use dfs_storage::StorageServer;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct StorageConfig {
    hostname: String,
    naming_host: String,
    naming_port: u16,
    storage_port: Option<u16>,
    command_port: Option<u16>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".to_string(),
            naming_host: "127.0.0.1".to_string(),
            naming_port: ports::REGISTRATION_PORT,
            storage_port: None,
            command_port: None,
        }
    }
}

#[derive(Debug, Clone)]
struct RunOptions {
    root: PathBuf,
    config_path: Option<PathBuf>,
    hostname: Option<String>,
    naming: Option<(String, u16)>,
    storage_port: Option<u16>,
    command_port: Option<u16>,
}

fn usage() -> String {
    format!(
        "usage: dfs-storage <root> [--config <path>] [--naming <host:port>]\n\
         \x20                      [--hostname <name>] [--storage-port <port>] [--command-port <port>]\n\
         defaults: naming 127.0.0.1:{}, ephemeral storage and command ports",
        ports::REGISTRATION_PORT
    )
}

fn parse_host_port(value: &str) -> Result<(String, u16), String> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("expected host:port, got {}", value))?;
    if host.is_empty() {
        return Err(format!("expected host:port, got {}", value));
    }
    let port = port.parse().map_err(|_| format!("invalid port: {}", port))?;
    Ok((host.to_string(), port))
}

fn parse_args() -> Result<RunOptions, String> {
    let args = env::args().skip(1).collect::<Vec<String>>();
    if args.is_empty() || args[0] == "-h" || args[0] == "--help" {
        return Err(usage());
    }

    let mut options = RunOptions {
        root: PathBuf::from(args[0].clone()),
        config_path: None,
        hostname: None,
        naming: None,
        storage_port: None,
        command_port: None,
    };

    let mut i = 1usize;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| "missing value for --config".to_string())?;
                options.config_path = Some(PathBuf::from(value));
            }
            "--naming" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| "missing value for --naming".to_string())?;
                options.naming = Some(parse_host_port(value)?);
            }
            "--hostname" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| "missing value for --hostname".to_string())?;
                options.hostname = Some(value.clone());
            }
            "--storage-port" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| "missing value for --storage-port".to_string())?;
                options.storage_port =
                    Some(value.parse().map_err(|_| format!("invalid port: {}", value))?);
            }
            "--command-port" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| "missing value for --command-port".to_string())?;
                options.command_port =
                    Some(value.parse().map_err(|_| format!("invalid port: {}", value))?);
            }
            other => {
                return Err(format!("unknown argument: {}\n{}", other, usage()));
            }
        }
        i += 1;
    }
    Ok(options)
}

fn load_config(options: &RunOptions) -> Result<StorageConfig, String> {
    let mut config = match &options.config_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("read {}: {}", path.display(), e))?;
            serde_json::from_str(&text).map_err(|e| format!("parse {}: {}", path.display(), e))?
        }
        None => StorageConfig::default(),
    };
    if let Some(hostname) = &options.hostname {
        config.hostname = hostname.clone();
    }
    if let Some((host, port)) = &options.naming {
        config.naming_host = host.clone();
        config.naming_port = *port;
    }
    if let Some(port) = options.storage_port {
        config.storage_port = Some(port);
    }
    if let Some(port) = options.command_port {
        config.command_port = Some(port);
    }
    Ok(config)
}

async fn run(root: PathBuf, config: StorageConfig) -> DfsResult<()> {
    let naming = RegistrationClient::from_addr(&config.naming_host, config.naming_port)?;
    let server = StorageServer::new(&root, config.storage_port, config.command_port)?;
    server.start(&config.hostname, &naming).await?;
    info!(
        "storage server running over {}; press ctrl-c to stop",
        server.root().display()
    );
    tokio::signal::ctrl_c().await?;
    server.stop().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let (root, config) = match parse_args()
        .and_then(|options| load_config(&options).map(|config| (options.root, config)))
    {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(1);
        }
    };

    if let Err(err) = run(root, config).await {
        error!("storage server failed: {}", err);
        std::process::exit(1);
    }
}
