//! Runs a management endpoint until interrupted.
//!
//! Usage:
//!
//! ```text
//! management_endpoint <config-path>
//! ```
//!
//! The JSON file at `config-path` must deserialise into an
//! [`EndpointConfig`]. A representative file is:
//!
//! ```json
//! {
//!   "host": "203.0.113.10",
//!   "registry_port": 7114,
//!   "connector_port": 7115,
//!   "context": "demo",
//!   "domain": "demo.domain"
//! }
//! ```
//!
//! Set `MANAGEMENT_LOG_FORMAT=json` for JSON log lines and `RUST_LOG` to
//! override the log filter.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use management_endpoint::endpoint::{
    domain::EndpointConfig,
    services::{ManagementEndpointError, TcpManagementEndpoint},
};
use management_endpoint::logging::{LogFormat, LoggingError, init_logging};
use std::env;
use std::io;
use std::sync::OnceLock;
use thiserror::Error;
use tokio::runtime::Builder;
use tokio::sync::Mutex;
use tracing::info;

const LOG_FORMAT_ENV: &str = "MANAGEMENT_LOG_FORMAT";

static ENDPOINT: OnceLock<Mutex<TcpManagementEndpoint>> = OnceLock::new();

#[derive(Debug, Error)]
enum RunError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("failed to read endpoint config {path}")]
    ConfigRead {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse endpoint config {path}")]
    ConfigParse {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to initialise logging")]
    Logging(#[from] LoggingError),
    #[error("runtime init failed")]
    RuntimeInit(#[source] io::Error),
    #[error("failed to wait for interrupt")]
    Signal(#[source] io::Error),
    #[error(transparent)]
    Endpoint(#[from] ManagementEndpointError),
}

/// Process-wide endpoint shared by every subsystem of this binary.
fn endpoint() -> &'static Mutex<TcpManagementEndpoint> {
    ENDPOINT.get_or_init(|| Mutex::new(TcpManagementEndpoint::tcp()))
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    run(env::args_os().skip(1)).map_err(Into::into)
}

fn run(mut args: impl Iterator<Item = std::ffi::OsString>) -> Result<(), RunError> {
    let config_path = args
        .next()
        .ok_or_else(|| RunError::InvalidArgs("missing config path argument".to_owned()))?
        .into_string()
        .map(Utf8PathBuf::from)
        .map_err(|_| RunError::InvalidArgs("config path is not valid UTF-8".to_owned()))?;
    if let Some(extra) = args.next() {
        return Err(RunError::InvalidArgs(format!(
            "unexpected extra argument: {}",
            extra.to_string_lossy()
        )));
    }

    let format = env::var(LOG_FORMAT_ENV)
        .unwrap_or_default()
        .parse::<LogFormat>()?;
    init_logging(format)?;

    let config = load_config(&config_path)?;
    build_runtime()?.block_on(serve(config))
}

fn load_config(path: &Utf8Path) -> Result<EndpointConfig, RunError> {
    let contents = read_config_file(path).map_err(|source| RunError::ConfigRead {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| RunError::ConfigParse {
        path: path.to_owned(),
        source,
    })
}

fn read_config_file(path: &Utf8Path) -> io::Result<String> {
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "config path has no file name")
    })?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    dir.read_to_string(file_name)
}

fn build_runtime() -> Result<tokio::runtime::Runtime, RunError> {
    Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(RunError::RuntimeInit)
}

async fn serve(config: EndpointConfig) -> Result<(), RunError> {
    {
        let mut running = endpoint().lock().await;
        running.configure(config)?;
        let address = running.start().await?;
        info!(%address, "accepting management clients; press Ctrl-C to stop");
    }

    tokio::signal::ctrl_c().await.map_err(RunError::Signal)?;
    endpoint().lock().await.shutdown().await?;
    Ok(())
}
