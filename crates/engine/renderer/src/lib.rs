//! Graphics backends for the session controller
//!
//! - [`HeadlessGraphics`]: CPU rendering into image buffers, no GPU needed
//! - [`CubePipeline`]: the wireframe cube pipeline it draws with

pub mod headless;
pub mod wireframe;

pub use headless::{HeadlessGraphics, HEADLESS_PLUGIN};
pub use wireframe::{CubePipeline, BACKGROUND};
