//! Headless graphics backend
//!
//! Renders into CPU-side `RgbaImage` buffers, one per swapchain image, so
//! the session controller can run without a GPU context. The last image
//! rendered into each target can be saved as PNG for inspection, including
//! targets of a session that has already been torn down.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use image::RgbaImage;
use xr::graphics::{
    GraphicsBackend, RenderTargetDesc, ViewSubmission, FORMAT_RGBA8, FORMAT_SRGB8_ALPHA8,
    HEADLESS_EXTENSION,
};
use xr::types::{InstanceHandle, RenderTargetId, SystemId};
use xr::{Result, XrError};

use crate::wireframe::CubePipeline;

/// Name selected by the `graphicsPlugin` option
pub const HEADLESS_PLUGIN: &str = "Headless";

struct RenderTarget {
    desc: RenderTargetDesc,
    images: Vec<RgbaImage>,
    last_rendered: Option<u32>,
}

/// CPU wireframe renderer bound to swapchain images
pub struct HeadlessGraphics {
    formats: Vec<i64>,
    device: Option<(InstanceHandle, SystemId)>,
    pipeline: CubePipeline,
    targets: HashMap<RenderTargetId, RenderTarget>,
    /// Last rendered image of destroyed targets, until new targets appear
    retired: BTreeMap<RenderTargetId, RgbaImage>,
    next_target: u64,
    views_rendered: u64,
}

impl Default for HeadlessGraphics {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessGraphics {
    pub fn new() -> Self {
        Self {
            formats: vec![FORMAT_SRGB8_ALPHA8, FORMAT_RGBA8],
            device: None,
            pipeline: CubePipeline::new(),
            targets: HashMap::new(),
            retired: BTreeMap::new(),
            next_target: 1,
            views_rendered: 0,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.device.is_some()
    }

    pub fn render_target_count(&self) -> usize {
        self.targets.len()
    }

    /// Views rendered since creation
    pub fn views_rendered(&self) -> u64 {
        self.views_rendered
    }

    pub fn pipeline(&self) -> &CubePipeline {
        &self.pipeline
    }

    /// Swapchain image `index` of a render target
    pub fn image(&self, target: RenderTargetId, index: u32) -> Option<&RgbaImage> {
        self.targets
            .get(&target)
            .and_then(|t| t.images.get(index as usize))
    }

    /// The image most recently rendered into a target
    pub fn last_image(&self, target: RenderTargetId) -> Option<&RgbaImage> {
        match self.targets.get(&target) {
            Some(t) => t.last_rendered.and_then(|i| t.images.get(i as usize)),
            None => self.retired.get(&target),
        }
    }

    /// Save the last rendered image of every target as `view_<n>.png`
    ///
    /// Targets are numbered in creation order. Returns the written paths.
    pub fn save_captures(&self, dir: &Path) -> image::ImageResult<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let mut ids: Vec<_> = self
            .targets
            .keys()
            .chain(self.retired.keys())
            .copied()
            .collect();
        ids.sort();

        let mut written = Vec::new();
        for (view, id) in ids.into_iter().enumerate() {
            let Some(image) = self.last_image(id) else {
                continue;
            };
            let path = dir.join(format!("view_{}.png", view));
            image.save(&path)?;
            tracing::info!("Saved view {} capture to {}", view, path.display());
            written.push(path);
        }
        Ok(written)
    }
}

impl GraphicsBackend for HeadlessGraphics {
    fn name(&self) -> &str {
        HEADLESS_PLUGIN
    }

    fn instance_extensions(&self) -> Vec<String> {
        vec![HEADLESS_EXTENSION.to_string()]
    }

    fn initialize_device(&mut self, instance: InstanceHandle, system: SystemId) -> Result<()> {
        tracing::info!("Headless device for {} on {}", system, instance);
        self.device = Some((instance, system));
        Ok(())
    }

    fn supported_swapchain_formats(&self) -> &[i64] {
        &self.formats
    }

    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> Result<RenderTargetId> {
        if self.device.is_none() {
            return Err(XrError::Graphics("device not initialized".to_string()));
        }
        if !self.formats.contains(&desc.format) {
            return Err(XrError::Graphics(format!(
                "unsupported color format {:#x}",
                desc.format
            )));
        }
        if desc.images.is_empty() || desc.extent.width == 0 || desc.extent.height == 0 {
            return Err(XrError::Graphics(format!(
                "empty render target {}x{} with {} images",
                desc.extent.width,
                desc.extent.height,
                desc.images.len()
            )));
        }

        if self.targets.is_empty() {
            self.retired.clear();
        }
        let id = RenderTargetId(self.next_target);
        self.next_target += 1;
        let images = desc
            .images
            .iter()
            .map(|_| RgbaImage::new(desc.extent.width, desc.extent.height))
            .collect();
        tracing::debug!(
            "Render target {}: {}x{} over {} images",
            id,
            desc.extent.width,
            desc.extent.height,
            desc.images.len()
        );
        self.targets.insert(
            id,
            RenderTarget {
                desc: desc.clone(),
                images,
                last_rendered: None,
            },
        );
        Ok(id)
    }

    fn destroy_render_target(&mut self, target: RenderTargetId) {
        let Some(mut removed) = self.targets.remove(&target) else {
            tracing::warn!("Destroying unknown render target {}", target);
            return;
        };
        if let Some(index) = removed.last_rendered {
            let image = removed.images.swap_remove(index as usize);
            self.retired.insert(target, image);
        }
    }

    fn render_view(
        &mut self,
        target: RenderTargetId,
        image_index: u32,
        submission: &ViewSubmission<'_>,
    ) -> Result<()> {
        let Some(render_target) = self.targets.get_mut(&target) else {
            return Err(XrError::Graphics(format!("unknown render target {}", target)));
        };
        let image_count = render_target.desc.images.len();
        let Some(image) = render_target.images.get_mut(image_index as usize) else {
            return Err(XrError::Graphics(format!(
                "image index {} out of range for {} images",
                image_index, image_count
            )));
        };

        self.pipeline.draw(image, submission);
        render_target.last_rendered = Some(image_index);
        self.views_rendered += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};
    use xr::graphics::CubeInstance;
    use xr::types::{Extent2D, Fov};

    fn initialized() -> HeadlessGraphics {
        let mut graphics = HeadlessGraphics::new();
        graphics
            .initialize_device(InstanceHandle(1), SystemId(2))
            .unwrap();
        graphics
    }

    fn desc(format: i64) -> RenderTargetDesc {
        RenderTargetDesc {
            format,
            extent: Extent2D::new(48, 32),
            images: vec![10, 11, 12],
        }
    }

    #[test]
    fn test_render_target_requires_device() {
        let mut graphics = HeadlessGraphics::new();
        assert!(matches!(
            graphics.create_render_target(&desc(FORMAT_RGBA8)),
            Err(XrError::Graphics(_))
        ));
    }

    #[test]
    fn test_prefers_srgb_format() {
        let graphics = HeadlessGraphics::new();
        assert_eq!(
            graphics.select_color_format(&[FORMAT_RGBA8, FORMAT_SRGB8_ALPHA8]),
            Some(FORMAT_SRGB8_ALPHA8)
        );
        assert_eq!(graphics.select_color_format(&[0x1234]), None);
    }

    #[test]
    fn test_render_view_writes_selected_image() {
        let mut graphics = initialized();
        let target = graphics.create_render_target(&desc(FORMAT_RGBA8)).unwrap();
        let cubes = [CubeInstance::at_position(Vec3::new(0.0, 0.0, -2.0), 0.5)];
        let submission = ViewSubmission {
            projection: Fov::symmetric(1.6, 1.2).projection(0.05, 100.0),
            view: Mat4::IDENTITY,
            cubes: &cubes,
        };

        graphics.render_view(target, 1, &submission).unwrap();
        assert_eq!(graphics.views_rendered(), 1);
        assert!(graphics.last_image(target).is_some());

        let untouched = graphics.image(target, 0).unwrap();
        assert!(untouched.pixels().all(|p| p.0 == [0, 0, 0, 0]));

        assert!(graphics.render_view(target, 3, &submission).is_err());
        graphics.destroy_render_target(target);
        assert_eq!(graphics.render_target_count(), 0);
    }

    #[test]
    fn test_save_captures_writes_png_per_target() {
        let dir = tempfile::tempdir().unwrap();
        let mut graphics = initialized();
        let left = graphics.create_render_target(&desc(FORMAT_RGBA8)).unwrap();
        let _right = graphics.create_render_target(&desc(FORMAT_RGBA8)).unwrap();
        let submission = ViewSubmission {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            cubes: &[],
        };
        graphics.render_view(left, 0, &submission).unwrap();

        // Only the target that rendered produces a file
        let written = graphics.save_captures(dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("view_0.png")]);
        let reloaded = image::open(&written[0]).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (48, 32));
    }

    #[test]
    fn test_destroyed_targets_stay_capturable_until_next_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut graphics = initialized();
        let target = graphics.create_render_target(&desc(FORMAT_RGBA8)).unwrap();
        let submission = ViewSubmission {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            cubes: &[],
        };
        graphics.render_view(target, 2, &submission).unwrap();
        graphics.destroy_render_target(target);

        assert!(graphics.last_image(target).is_some());
        assert_eq!(graphics.save_captures(dir.path()).unwrap().len(), 1);

        let _next = graphics.create_render_target(&desc(FORMAT_RGBA8)).unwrap();
        assert!(graphics.last_image(target).is_none());
    }
}
