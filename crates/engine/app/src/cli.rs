//! Command line argument processing for XR applications
//!
//! [`CommonArgs`] carries the session options and the debug switches every
//! binary shares. Flatten it into the binary's own argument struct:
//!
//! ```ignore
//! use app::cli::CommonArgs;
//! use clap::Parser;
//!
//! #[derive(Parser)]
//! struct Args {
//!     #[command(flatten)]
//!     common: CommonArgs,
//! }
//!
//! let args = Args::parse();
//! let options = args.common.resolve_options()?;
//! ```

use std::path::PathBuf;

use clap::Args;
use system::properties::{load_options, EnvProperties, OptionsError, PropertySource, TomlProperties};
use xr::types::{BlendMode, FormFactor, ViewConfiguration};
use xr::Options;

use crate::runner::LoopConfig;

/// Command line arguments shared by all XR applications
///
/// Use `#[command(flatten)]` to include these in your own argument struct.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Graphics plugin to render with
    #[arg(long, value_name = "PLUGIN")]
    pub graphics: Option<String>,

    /// Form factor of the device (Hmd, Handheld)
    #[arg(long, value_name = "FORM_FACTOR")]
    pub form_factor: Option<FormFactor>,

    /// View configuration (Stereo, Mono)
    #[arg(long, value_name = "VIEWS")]
    pub view_configuration: Option<ViewConfiguration>,

    /// Environment blend mode (Opaque, Additive, AlphaBlend)
    #[arg(long, value_name = "MODE")]
    pub blend_mode: Option<BlendMode>,

    /// Enable plane tracking
    #[arg(long)]
    pub plane_tracking: bool,

    /// Load options from a TOML file
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run N frame-loop iterations then exit
    #[arg(long, value_name = "FRAMES")]
    pub frames: Option<u64>,

    /// Save the last rendered view images to this directory on exit
    #[arg(long, value_name = "DIR")]
    pub capture: Option<PathBuf>,

    /// Do not register reference images for marker tracking
    #[arg(long)]
    pub no_markers: bool,
}

impl CommonArgs {
    /// Apply the command line overrides to `options`
    pub fn apply_to(&self, mut options: Options) -> Options {
        if let Some(ref plugin) = self.graphics {
            options.graphics_plugin = plugin.clone();
        }
        if let Some(form_factor) = self.form_factor {
            options = options.with_form_factor(form_factor);
        }
        if let Some(view_configuration) = self.view_configuration {
            options = options.with_view_configuration(view_configuration);
        }
        if let Some(blend_mode) = self.blend_mode {
            options = options.with_blend_mode(blend_mode);
        }
        if self.plane_tracking {
            options = options.with_plane_tracking(true);
        }
        options
    }

    /// Resolve options from the config file, the environment and the
    /// command line, in increasing priority
    pub fn resolve_options(&self) -> Result<Options, OptionsError> {
        let file = self.config.as_ref().map(TomlProperties::load).transpose()?;
        let env = EnvProperties;

        let mut sources: Vec<&dyn PropertySource> = Vec::new();
        if let Some(ref file) = file {
            sources.push(file);
        }
        sources.push(&env);

        let options = load_options(&sources)?;
        Ok(self.apply_to(options))
    }

    /// Get the config path if specified
    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config.as_ref()
    }

    /// Check if the iteration bound is set
    pub fn is_bounded(&self) -> bool {
        self.frames.is_some()
    }

    /// Frame loop configuration with the `--frames` bound applied
    pub fn loop_config(&self) -> LoopConfig {
        let config = LoopConfig::default();
        match self.frames {
            Some(frames) => config.with_max_iterations(frames),
            None => config,
        }
    }
}
