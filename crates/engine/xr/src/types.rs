//! Plain value types shared between the controller and the runtime seam
//!
//! Everything in here is `Copy` or cheaply cloneable and carries no runtime
//! resources. Handles are opaque ids handed out by an [`XrRuntime`].
//!
//! [`XrRuntime`]: crate::runtime::XrRuntime

use glam::{Mat4, Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::XrError;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

handle!(
    /// Runtime instance handle
    InstanceHandle
);
handle!(
    /// Selected system (form factor + view configuration)
    SystemId
);
handle!(
    /// Live session handle
    SessionHandle
);
handle!(
    /// Swapchain handle, one per view
    SwapchainHandle
);
handle!(
    /// Reference space the views and detections are located in
    SpaceHandle
);
handle!(
    /// Action set created for the session
    ActionSetHandle
);
handle!(
    /// Marker tracker created through the marker extension
    MarkerTrackerHandle
);
handle!(
    /// Plane tracker created through the plane-detection extension
    PlaneTrackerHandle
);
handle!(
    /// Render target owned by the graphics backend
    RenderTargetId
);
handle!(
    /// Identity of a tracked marker, stable across frames
    MarkerId
);
handle!(
    /// Identity of a tracked plane, stable across frames
    PlaneId
);

/// Device class the system is selected for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FormFactor {
    /// Head-mounted display
    #[default]
    Hmd,
    /// Handheld display (phone / tablet AR)
    Handheld,
}

/// Layout of the views rendered each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ViewConfiguration {
    /// Single view
    Mono,
    /// One view per eye
    #[default]
    Stereo,
}

impl ViewConfiguration {
    /// Number of views the configuration is expected to expose
    pub const fn view_count(&self) -> usize {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

/// How rendered layers are composed with the physical environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    Opaque,
    Additive,
    AlphaBlend,
}

macro_rules! named_enum {
    ($ty:ident, $what:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Canonical option name
            pub const fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $ty {
            type Err = XrError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($name) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(XrError::InvalidOption {
                    option: $what,
                    value: s.to_string(),
                })
            }
        }
    };
}

named_enum!(FormFactor, "formFactor", { Hmd => "Hmd", Handheld => "Handheld" });
named_enum!(ViewConfiguration, "viewConfiguration", { Mono => "Mono", Stereo => "Stereo" });
named_enum!(BlendMode, "blendMode", {
    Opaque => "Opaque",
    Additive => "Additive",
    AlphaBlend => "AlphaBlend",
});

/// Session state as reported by the runtime
///
/// The application never picks a state; it only mirrors what the runtime
/// reports through [`RuntimeEvent::SessionStateChanged`].
///
/// [`RuntimeEvent::SessionStateChanged`]: crate::runtime::RuntimeEvent::SessionStateChanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Unknown,
    Idle,
    Ready,
    Synchronized,
    Visible,
    Focused,
    Stopping,
    LossPending,
    Exiting,
}

impl SessionState {
    /// States in which a begun session may submit frames
    pub const fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Ready | Self::Synchronized | Self::Visible | Self::Focused
        )
    }
}

/// Rigid transform: orientation then translation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub orientation: Quat,
    pub position: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Self = Self {
        orientation: Quat::IDENTITY,
        position: Vec3::ZERO,
    };

    pub fn new(orientation: Quat, position: Vec3) -> Self {
        Self {
            orientation,
            position,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::new(Quat::IDENTITY, position)
    }

    /// Pose as a world-from-local matrix
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }
}

/// Field of view as four half-angles in radians (left/down are negative)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fov {
    pub angle_left: f32,
    pub angle_right: f32,
    pub angle_up: f32,
    pub angle_down: f32,
}

impl Fov {
    /// Symmetric FOV with the given full horizontal and vertical angles
    pub fn symmetric(horizontal: f32, vertical: f32) -> Self {
        Self {
            angle_left: -horizontal * 0.5,
            angle_right: horizontal * 0.5,
            angle_up: vertical * 0.5,
            angle_down: -vertical * 0.5,
        }
    }

    /// Off-axis right-handed projection with a [0, 1] depth range
    pub fn projection(&self, near: f32, far: f32) -> Mat4 {
        let left = self.angle_left.tan() * near;
        let right = self.angle_right.tan() * near;
        let up = self.angle_up.tan() * near;
        let down = self.angle_down.tan() * near;

        let width = right - left;
        let height = up - down;
        let depth = far - near;

        Mat4::from_cols_array(&[
            2.0 * near / width,
            0.0,
            0.0,
            0.0,
            0.0,
            2.0 * near / height,
            0.0,
            0.0,
            (right + left) / width,
            (up + down) / height,
            -far / depth,
            -1.0,
            0.0,
            0.0,
            -(far * near) / depth,
            0.0,
        ])
    }
}

/// Located view for one eye (or the single mono view)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    pub pose: Pose,
    pub fov: Fov,
}

/// Recommended and maximum geometry of one view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewConfigView {
    pub recommended_width: u32,
    pub recommended_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub recommended_sample_count: u32,
    pub max_sample_count: u32,
}

/// Pixel extent of a swapchain or render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Application identity passed to the runtime at instance creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInfo {
    pub name: String,
    pub version: u32,
    pub engine_name: String,
}

/// Timing returned by wait-frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameState {
    /// Predicted display time in nanoseconds
    pub predicted_display_time: i64,
    /// Predicted display period in nanoseconds
    pub predicted_display_period: i64,
    pub should_render: bool,
}

/// Snapshot of the input actions after a sync
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ActionSnapshot {
    /// The quit action was pressed this frame
    pub quit: bool,
    /// Grip pose of each hand when tracked (left, right)
    pub hands: [Option<Pose>; 2],
}

/// One reference image for marker recognition
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerImage {
    pub label: String,
    pub width: u32,
    pub height: u32,
    /// Tightly packed 8-bit grayscale pixels
    pub pixels: Vec<u8>,
    /// Physical size in meters
    pub physical_size: Vec2,
}

impl MarkerImage {
    pub fn new(
        label: impl Into<String>,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        physical_size: Vec2,
    ) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            pixels,
            physical_size,
        }
    }

    /// Synthetic checkerboard marker, handy for demos and tests
    pub fn checkerboard(label: impl Into<String>, cells: u32, physical_width: f32) -> Self {
        let size = cells.max(1) * 8;
        let pixels = (0..size * size)
            .map(|i| {
                let (x, y) = (i % size / 8, i / size / 8);
                if (x + y) % 2 == 0 { 0 } else { 255 }
            })
            .collect();
        Self::new(label, size, size, pixels, Vec2::splat(physical_width))
    }
}

/// Raw marker detection reported by the runtime for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerDetection {
    pub id: MarkerId,
    /// Index into the marker database of the image that matched
    pub database_index: usize,
    pub pose: Pose,
}

/// Plane classification reported by the plane-detection extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneOrientation {
    HorizontalUp,
    HorizontalDown,
    Vertical,
    Arbitrary,
}

/// Raw plane detection reported by the runtime for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneDetection {
    pub id: PlaneId,
    pub pose: Pose,
    /// Width and depth of the plane bounds in meters
    pub extent: Vec2,
    pub orientation: PlaneOrientation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_names_round_trip_case_insensitively() {
        assert_eq!("hmd".parse::<FormFactor>().unwrap(), FormFactor::Hmd);
        assert_eq!(
            "HANDHELD".parse::<FormFactor>().unwrap(),
            FormFactor::Handheld
        );
        assert_eq!(
            "alphablend".parse::<BlendMode>().unwrap(),
            BlendMode::AlphaBlend
        );
        assert_eq!(
            "Mono".parse::<ViewConfiguration>().unwrap(),
            ViewConfiguration::Mono
        );
        assert_eq!(BlendMode::Additive.to_string(), "Additive");
    }

    #[test]
    fn test_unknown_option_value_is_rejected() {
        let err = "Tripod".parse::<FormFactor>().unwrap_err();
        assert!(err.to_string().contains("formFactor"));
    }

    #[test]
    fn test_view_counts() {
        assert_eq!(ViewConfiguration::Mono.view_count(), 1);
        assert_eq!(ViewConfiguration::Stereo.view_count(), 2);
    }

    #[test]
    fn test_active_states() {
        assert!(!SessionState::Idle.is_active());
        assert!(SessionState::Ready.is_active());
        assert!(SessionState::Focused.is_active());
        assert!(!SessionState::Stopping.is_active());
        assert!(!SessionState::LossPending.is_active());
    }

    #[test]
    fn test_symmetric_projection_maps_center_to_origin() {
        let fov = Fov::symmetric(90f32.to_radians(), 90f32.to_radians());
        let proj = fov.projection(0.05, 100.0);
        let clip = proj * glam::Vec4::new(0.0, 0.0, -1.0, 1.0);
        let ndc = clip / clip.w;
        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_checkerboard_marker_dimensions() {
        let marker = MarkerImage::checkerboard("board", 4, 0.2);
        assert_eq!(marker.width, 32);
        assert_eq!(marker.pixels.len(), 32 * 32);
        assert_eq!(marker.physical_size, Vec2::splat(0.2));
        assert_eq!(marker.pixels[0], 0);
        assert_eq!(marker.pixels[8], 255);
    }
}
