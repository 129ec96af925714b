mod auth;
mod config;
mod http;
mod logger;
mod playoffs;
mod state;
mod store;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use hyper::StatusCode;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::Config;
use crate::state::State;

#[derive(Debug, Parser)]
#[command(version, about = "The playoff server for the courtside league")]
struct Args {
    /// Path to the configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::from_file(&args.config).await {
        Ok(config) => config.with_environment(),
        Err(err) => {
            eprintln!("Failed to load config from {:?}: {}", args.config, err);
            return ExitCode::FAILURE;
        }
    };

    logger::init(config.loglevel);
    log::info!("Using config: {:?}", config);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), Error> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::task::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    let bind = config.bind;

    let state = State::new(config, shutdown_rx)?;
    state.store.create_tables().await?;

    http::bind(bind, state).await
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Store(#[from] sqlx::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Hyper(#[from] hyper::Error),
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("invalid token")]
    InvalidToken,
    #[error("{0}")]
    StatusCodeError(#[from] StatusCodeError),
}

/// An error that maps directly onto an HTTP response with the contained
/// status code and message.
#[derive(Clone, Debug, Error)]
#[error("{code}: {message}")]
pub struct StatusCodeError {
    pub code: StatusCode,
    pub message: String,
}

impl StatusCodeError {
    fn new(code: StatusCode) -> Self {
        Self {
            message: code
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
            code,
        }
    }

    /// Replaces the default message of the error.
    pub fn message<T>(mut self, message: T) -> Self
    where
        T: ToString,
    {
        self.message = message.to_string();
        self
    }

    /// 400 Bad Request
    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST)
    }

    /// 401 Unauthorized
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED)
    }

    /// 404 Not Found
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    /// 405 Method Not Allowed
    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED)
    }

    /// 408 Request Timeout
    pub fn request_timeout() -> Self {
        Self::new(StatusCode::REQUEST_TIMEOUT)
    }

    /// 409 Conflict
    pub fn conflict() -> Self {
        Self::new(StatusCode::CONFLICT)
    }

    /// 411 Length Required
    pub fn length_required() -> Self {
        Self::new(StatusCode::LENGTH_REQUIRED)
    }

    /// 413 Payload Too Large
    pub fn payload_too_large() -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE)
    }

    /// 501 Not Implemented
    pub fn not_implemented() -> Self {
        Self::new(StatusCode::NOT_IMPLEMENTED)
    }
}
