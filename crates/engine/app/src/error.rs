//! Errors that end an application run

use thiserror::Error;

use system::OptionsError;
use xr::XrError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid options: {0}")]
    Options(#[from] OptionsError),

    #[error("startup failed: {0}")]
    Startup(#[source] XrError),

    #[error("session restart failed: {0}")]
    Restart(#[source] XrError),

    #[error("frame loop panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
