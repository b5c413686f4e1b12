//! App crate - startup and frame loop for XR session clients
//!
//! # Modules
//!
//! - [`cli`]: Command line arguments shared by XR binaries
//! - [`startup`]: Lifecycle phase sequencing at startup and on restart
//! - [`runner`]: The frame loop that drives a [`xr::Program`]
//! - [`error`]: Errors that end a run

pub mod cli;
pub mod error;
pub mod runner;
pub mod startup;

pub use cli::CommonArgs;
pub use error::{AppError, Result};
pub use runner::{run_guarded, FrameLoop, LoopConfig, LoopExit, DEFAULT_THROTTLE};
