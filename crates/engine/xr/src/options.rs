//! Options the controller is created with

use serde::{Deserialize, Serialize};

use crate::types::{BlendMode, FormFactor, ViewConfiguration};

/// Graphics plugin used when none is configured
pub const DEFAULT_GRAPHICS_PLUGIN: &str = "Headless";

/// Runtime configuration of one controller
///
/// Field names follow the property keys (`debug.xr.graphicsPlugin`, ...),
/// so a TOML file can use the same spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Name of the graphics backend to render with
    pub graphics_plugin: String,
    pub form_factor: FormFactor,
    pub view_configuration: ViewConfiguration,
    /// Preferred blend mode; the runtime's first mode is used if unsupported
    pub blend_mode: BlendMode,
    /// Run plane detection every frame
    pub plane_tracking: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            graphics_plugin: DEFAULT_GRAPHICS_PLUGIN.to_string(),
            form_factor: FormFactor::default(),
            view_configuration: ViewConfiguration::default(),
            blend_mode: BlendMode::default(),
            plane_tracking: false,
        }
    }
}

impl Options {
    pub fn with_form_factor(mut self, form_factor: FormFactor) -> Self {
        self.form_factor = form_factor;
        self
    }

    pub fn with_view_configuration(mut self, view_configuration: ViewConfiguration) -> Self {
        self.view_configuration = view_configuration;
        self
    }

    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    pub fn with_plane_tracking(mut self, enabled: bool) -> Self {
        self.plane_tracking = enabled;
        self
    }
}
