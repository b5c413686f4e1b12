//! Option properties
//!
//! Options are read from key/value properties named `debug.xr.<option>`.
//! A property may come from the environment (`XR_GRAPHICS_PLUGIN`, ...), an
//! in-memory map or a TOML file. [`load_options`] layers sources so later
//! ones override earlier ones.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use xr::options::{Options, DEFAULT_GRAPHICS_PLUGIN};
use xr::types::{BlendMode, FormFactor, ViewConfiguration};

/// Prefix shared by every option property
pub const PROPERTY_PREFIX: &str = "debug.xr.";

pub const GRAPHICS_PLUGIN: &str = "graphicsPlugin";
pub const FORM_FACTOR: &str = "formFactor";
pub const VIEW_CONFIGURATION: &str = "viewConfiguration";
pub const BLEND_MODE: &str = "blendMode";
pub const PLANE_TRACKING: &str = "planeTracking";

/// Errors raised while loading options
#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value {value:?} for {option} (expected {expected})")]
    Invalid {
        option: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Full property key of an option
pub fn property_key(option: &str) -> String {
    format!("{PROPERTY_PREFIX}{option}")
}

/// A read-only set of properties
pub trait PropertySource {
    /// Value of a full property key such as `debug.xr.formFactor`
    fn property(&self, key: &str) -> Option<String>;

    /// Name used in log lines
    fn describe(&self) -> String;
}

/// Properties taken from environment variables
///
/// `debug.xr.graphicsPlugin` maps to `XR_GRAPHICS_PLUGIN`.
#[derive(Debug, Clone, Default)]
pub struct EnvProperties;

impl EnvProperties {
    pub fn variable_name(key: &str) -> String {
        let option = key.strip_prefix(PROPERTY_PREFIX).unwrap_or(key);
        let mut name = String::from("XR_");
        for (i, c) in option.chars().enumerate() {
            if c.is_ascii_uppercase() && i > 0 {
                name.push('_');
            }
            name.push(c.to_ascii_uppercase());
        }
        name
    }
}

impl PropertySource for EnvProperties {
    fn property(&self, key: &str) -> Option<String> {
        std::env::var(Self::variable_name(key))
            .ok()
            .filter(|v| !v.is_empty())
    }

    fn describe(&self) -> String {
        "environment".to_string()
    }
}

/// Properties held in memory
#[derive(Debug, Clone, Default)]
pub struct MapProperties(HashMap<String, String>);

impl MapProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option by its short name
    pub fn with(mut self, option: &str, value: impl Into<String>) -> Self {
        self.0.insert(property_key(option), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }
}

impl PropertySource for MapProperties {
    fn property(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }

    fn describe(&self) -> String {
        format!("{} overrides", self.0.len())
    }
}

/// Properties from a TOML file
///
/// Options may sit at the top level (`formFactor = "Hmd"`) or under a
/// `[debug.xr]` table.
#[derive(Debug, Clone)]
pub struct TomlProperties {
    path: PathBuf,
    table: toml::Table,
}

impl TomlProperties {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let path = path.as_ref().to_path_buf();
        let text = std::fs::read_to_string(&path).map_err(|source| OptionsError::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse(path, &text)
    }

    pub fn parse(path: PathBuf, text: &str) -> Result<Self, OptionsError> {
        let table = text
            .parse::<toml::Table>()
            .map_err(|source| OptionsError::Toml {
                path: path.clone(),
                source,
            })?;
        Ok(Self { path, table })
    }

    fn lookup(&self, option: &str) -> Option<&toml::Value> {
        let nested = self
            .table
            .get("debug")
            .and_then(|debug| debug.get("xr"))
            .and_then(|xr| xr.get(option));
        nested.or_else(|| self.table.get(option))
    }
}

impl PropertySource for TomlProperties {
    fn property(&self, key: &str) -> Option<String> {
        let option = key.strip_prefix(PROPERTY_PREFIX)?;
        match self.lookup(option)? {
            toml::Value::String(s) => Some(s.clone()),
            toml::Value::Boolean(b) => Some(b.to_string()),
            toml::Value::Integer(i) => Some(i.to_string()),
            other => {
                tracing::warn!("Ignoring non-scalar {} in {}: {}", key, self.path.display(), other);
                None
            }
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

fn parse_enum<T: FromStr>(
    option: &'static str,
    value: &str,
    expected: &'static str,
) -> Result<T, OptionsError> {
    value.trim().parse().map_err(|_| OptionsError::Invalid {
        option,
        value: value.to_string(),
        expected,
    })
}

fn parse_bool(option: &'static str, value: &str) -> Result<bool, OptionsError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        _ => Err(OptionsError::Invalid {
            option,
            value: value.to_string(),
            expected: "true|false",
        }),
    }
}

/// Overlay one source onto `options`; returns whether it set the plugin
fn apply_source(options: &mut Options, source: &dyn PropertySource) -> Result<bool, OptionsError> {
    let get = |option: &str| source.property(&property_key(option));

    let plugin_set = match get(GRAPHICS_PLUGIN) {
        Some(plugin) => {
            options.graphics_plugin = plugin.trim().to_string();
            true
        }
        None => false,
    };
    if let Some(value) = get(FORM_FACTOR) {
        options.form_factor = parse_enum::<FormFactor>(FORM_FACTOR, &value, "Hmd|Handheld")?;
    }
    if let Some(value) = get(VIEW_CONFIGURATION) {
        options.view_configuration =
            parse_enum::<ViewConfiguration>(VIEW_CONFIGURATION, &value, "Stereo|Mono")?;
    }
    if let Some(value) = get(BLEND_MODE) {
        options.blend_mode =
            parse_enum::<BlendMode>(BLEND_MODE, &value, "Opaque|Additive|AlphaBlend")?;
    }
    if let Some(value) = get(PLANE_TRACKING) {
        options.plane_tracking = parse_bool(PLANE_TRACKING, &value)?;
    }
    Ok(plugin_set)
}

/// Build options from sources, lowest priority first
///
/// Without a `graphicsPlugin` property the default plugin is used and the
/// usage is logged.
pub fn load_options(sources: &[&dyn PropertySource]) -> Result<Options, OptionsError> {
    let mut options = Options::default();
    let mut plugin_set = false;
    for source in sources {
        tracing::debug!("Reading options from {}", source.describe());
        plugin_set |= apply_source(&mut options, *source)?;
    }

    if !plugin_set {
        tracing::warn!(
            "{} not set; defaulting to {}",
            property_key(GRAPHICS_PLUGIN),
            DEFAULT_GRAPHICS_PLUGIN
        );
        show_help();
    }
    Ok(options)
}

/// Log how options are set
pub fn show_help() {
    for (option, values) in [
        (GRAPHICS_PLUGIN, DEFAULT_GRAPHICS_PLUGIN),
        (FORM_FACTOR, "Hmd|Handheld"),
        (VIEW_CONFIGURATION, "Stereo|Mono"),
        (BLEND_MODE, "Opaque|Additive|AlphaBlend"),
        (PLANE_TRACKING, "true|false"),
    ] {
        let key = property_key(option);
        tracing::info!(
            "setprop {} {}  (or {}={})",
            key,
            values,
            EnvProperties::variable_name(&key),
            values
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_env_variable_names() {
        assert_eq!(
            EnvProperties::variable_name("debug.xr.graphicsPlugin"),
            "XR_GRAPHICS_PLUGIN"
        );
        assert_eq!(
            EnvProperties::variable_name("debug.xr.viewConfiguration"),
            "XR_VIEW_CONFIGURATION"
        );
        assert_eq!(EnvProperties::variable_name("formFactor"), "XR_FORM_FACTOR");
    }

    #[test]
    fn test_defaults_without_sources() {
        let options = load_options(&[]).unwrap();
        assert_eq!(options, Options::default());
    }

    #[test]
    fn test_map_values_are_case_insensitive() {
        let props = MapProperties::new()
            .with(FORM_FACTOR, "handheld")
            .with(VIEW_CONFIGURATION, "MONO")
            .with(BLEND_MODE, "AlphaBlend")
            .with(PLANE_TRACKING, "on");
        let options = load_options(&[&props]).unwrap();
        assert_eq!(options.form_factor, FormFactor::Handheld);
        assert_eq!(options.view_configuration, ViewConfiguration::Mono);
        assert_eq!(options.blend_mode, BlendMode::AlphaBlend);
        assert!(options.plane_tracking);
    }

    #[test]
    fn test_invalid_value_is_reported() {
        let props = MapProperties::new().with(BLEND_MODE, "Multiply");
        let err = load_options(&[&props]).unwrap_err();
        assert!(matches!(
            err,
            OptionsError::Invalid {
                option: BLEND_MODE,
                ..
            }
        ));
        assert!(err.to_string().contains("Opaque|Additive|AlphaBlend"));
    }

    #[test]
    fn test_later_sources_override() {
        let base = MapProperties::new()
            .with(GRAPHICS_PLUGIN, "Vulkan")
            .with(FORM_FACTOR, "Handheld");
        let top = MapProperties::new().with(FORM_FACTOR, "Hmd");
        let options = load_options(&[&base, &top]).unwrap();
        assert_eq!(options.graphics_plugin, "Vulkan");
        assert_eq!(options.form_factor, FormFactor::Hmd);
    }

    #[test]
    fn test_toml_file_top_level_and_nested() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "graphicsPlugin = \"Headless\"\nplaneTracking = true\n\n[debug.xr]\nformFactor = \"Handheld\""
        )
        .unwrap();

        let props = TomlProperties::load(file.path()).unwrap();
        assert_eq!(
            props.property("debug.xr.planeTracking").as_deref(),
            Some("true")
        );
        let options = load_options(&[&props]).unwrap();
        assert_eq!(options.form_factor, FormFactor::Handheld);
        assert!(options.plane_tracking);
    }

    #[test]
    fn test_saved_options_load_back() {
        let options = Options::default()
            .with_form_factor(FormFactor::Handheld)
            .with_blend_mode(BlendMode::Additive)
            .with_plane_tracking(true);
        let text = toml::to_string(&options).unwrap();
        assert!(text.contains("planeTracking = true"));

        let props = TomlProperties::parse(PathBuf::from("saved.toml"), &text).unwrap();
        assert_eq!(load_options(&[&props]).unwrap(), options);
    }

    #[test]
    fn test_toml_errors_name_the_file() {
        let err = TomlProperties::parse(PathBuf::from("bad.toml"), "formFactor = ").unwrap_err();
        assert!(matches!(err, OptionsError::Toml { .. }));
        assert!(err.to_string().contains("bad.toml"));

        let missing = TomlProperties::load("/nonexistent/xr.toml").unwrap_err();
        assert!(matches!(missing, OptionsError::Io { .. }));
    }
}
