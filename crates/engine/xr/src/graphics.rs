//! Graphics backend contract
//!
//! The controller never touches GPU objects directly. It asks the backend
//! which swapchain formats it can render to, hands it the images of each
//! swapchain once, and then submits one view at a time.

use glam::{Mat4, Quat, Vec3};

use crate::error::Result;
use crate::types::{Extent2D, InstanceHandle, Pose, RenderTargetId, SystemId};

/// Instance extension for sessions without a GPU graphics binding
pub const HEADLESS_EXTENSION: &str = "XR_MND_headless";

/// `GL_SRGB8_ALPHA8`
pub const FORMAT_SRGB8_ALPHA8: i64 = 0x8C43;
/// `GL_RGBA8`
pub const FORMAT_RGBA8: i64 = 0x8058;

/// One drawable cube: model transform plus a uniform scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeInstance {
    pub model: Mat4,
    pub scale: f32,
}

impl CubeInstance {
    pub fn new(model: Mat4, scale: f32) -> Self {
        Self { model, scale }
    }

    pub fn at_pose(pose: &Pose, scale: f32) -> Self {
        Self::new(pose.to_mat4(), scale)
    }

    pub fn at_position(position: Vec3, scale: f32) -> Self {
        Self::new(Mat4::from_rotation_translation(Quat::IDENTITY, position), scale)
    }

    /// Model matrix with the uniform scale folded in
    pub fn scaled_model(&self) -> Mat4 {
        self.model * Mat4::from_scale(Vec3::splat(self.scale))
    }

    pub fn position(&self) -> Vec3 {
        self.model.w_axis.truncate()
    }
}

/// Swapchain images handed to the backend when a render target is created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTargetDesc {
    pub format: i64,
    pub extent: Extent2D,
    /// Native image handles in swapchain order
    pub images: Vec<u64>,
}

/// Draw data for one view
#[derive(Debug, Clone, Copy)]
pub struct ViewSubmission<'a> {
    pub projection: Mat4,
    pub view: Mat4,
    pub cubes: &'a [CubeInstance],
}

/// Rendering backend the controller renders through
pub trait GraphicsBackend {
    /// Name used by the `graphicsPlugin` option
    fn name(&self) -> &str;

    /// Instance extensions this backend needs to bind to a session
    fn instance_extensions(&self) -> Vec<String>;

    /// Create the rendering device for the selected system
    fn initialize_device(&mut self, instance: InstanceHandle, system: SystemId) -> Result<()>;

    /// Formats the backend can render into, most preferred first
    fn supported_swapchain_formats(&self) -> &[i64];

    /// Pick the swapchain color format among those the runtime offers
    fn select_color_format(&self, runtime_formats: &[i64]) -> Option<i64> {
        self.supported_swapchain_formats()
            .iter()
            .copied()
            .find(|format| runtime_formats.contains(format))
    }

    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> Result<RenderTargetId>;

    fn destroy_render_target(&mut self, target: RenderTargetId);

    /// Render one view into the given swapchain image
    fn render_view(
        &mut self,
        target: RenderTargetId,
        image_index: u32,
        submission: &ViewSubmission<'_>,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_model_applies_uniform_scale() {
        let cube = CubeInstance::at_position(Vec3::new(1.0, 2.0, 3.0), 0.5);
        let corner = cube.scaled_model().transform_point3(Vec3::ONE);
        assert_eq!(corner, Vec3::new(1.5, 2.5, 3.5));
        assert_eq!(cube.position(), Vec3::new(1.0, 2.0, 3.0));
    }
}
