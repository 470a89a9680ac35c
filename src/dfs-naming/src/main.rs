use std::env;
use std::path::PathBuf;

use log::{error, info};
use serde::Deserialize;

use dfs_lib::DfsResult;
use dfs_naming::NamingServer;
use dfs_proto::ports;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct NamingConfig {
    service_port: u16,
    registration_port: u16,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            service_port: ports::SERVICE_PORT,
            registration_port: ports::REGISTRATION_PORT,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct RunOptions {
    config_path: Option<PathBuf>,
    service_port: Option<u16>,
    registration_port: Option<u16>,
}

fn usage() -> String {
    format!(
        "usage: dfs-naming [--config <path>] [--service-port <port>] [--registration-port <port>]\n\
         defaults: service port {}, registration port {}",
        ports::SERVICE_PORT,
        ports::REGISTRATION_PORT
    )
}

fn parse_args() -> Result<RunOptions, String> {
    let args = env::args().skip(1).collect::<Vec<String>>();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        return Err(usage());
    }

    let mut options = RunOptions::default();
    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| "missing value for --config".to_string())?;
                options.config_path = Some(PathBuf::from(value));
            }
            "--service-port" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| "missing value for --service-port".to_string())?;
                options.service_port =
                    Some(value.parse().map_err(|_| format!("invalid port: {}", value))?);
            }
            "--registration-port" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| "missing value for --registration-port".to_string())?;
                options.registration_port =
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

fn load_config(options: &RunOptions) -> Result<NamingConfig, String> {
    let mut config = match &options.config_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("read {}: {}", path.display(), e))?;
            serde_json::from_str(&text).map_err(|e| format!("parse {}: {}", path.display(), e))?
        }
        None => NamingConfig::default(),
    };
    if let Some(port) = options.service_port {
        config.service_port = port;
    }
    if let Some(port) = options.registration_port {
        config.registration_port = port;
    }
    Ok(config)
}

async fn run(config: NamingConfig) -> DfsResult<()> {
    let server = NamingServer::new(config.service_port, config.registration_port);
    server.start().await?;
    info!("naming server running; press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    server.stop().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let config = match parse_args().and_then(|options| load_config(&options)) {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(1);
        }
    };

    if let Err(err) = run(config).await {
        error!("naming server failed: {}", err);
        std::process::exit(1);
    }
}
