//! Per-view swapchains and the render targets bound to them

use crate::error::{Result, XrError};
use crate::graphics::{GraphicsBackend, RenderTargetDesc};
use crate::runtime::{SwapchainCreateInfo, XrRuntime};
use crate::types::{
    Extent2D, RenderTargetId, SessionHandle, SwapchainHandle, SystemId, ViewConfigView,
    ViewConfiguration,
};

/// One view's ring of images
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Swapchain {
    pub handle: SwapchainHandle,
    pub width: u32,
    pub height: u32,
    /// Native image handles, in the order the runtime indexes them
    pub images: Vec<u64>,
    /// Set by `allocate_render_targets`
    pub render_target: Option<RenderTargetId>,
}

impl Swapchain {
    pub fn extent(&self) -> Extent2D {
        Extent2D::new(self.width, self.height)
    }
}

/// All swapchains of one session, in view order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainSet {
    color_format: i64,
    views: Vec<ViewConfigView>,
    swapchains: Vec<Swapchain>,
}

impl SwapchainSet {
    /// Create one swapchain per view of the configuration
    ///
    /// Fails when no format is shared with the graphics backend or the
    /// configuration reports no views. Swapchains created before a failure
    /// are destroyed again.
    pub fn create<R, G>(
        runtime: &mut R,
        graphics: &G,
        system: SystemId,
        session: SessionHandle,
        view_configuration: ViewConfiguration,
    ) -> Result<Self>
    where
        R: XrRuntime + ?Sized,
        G: GraphicsBackend + ?Sized,
    {
        let runtime_formats = runtime.enumerate_swapchain_formats(session)?;
        tracing::debug!("Runtime swapchain formats: {:?}", runtime_formats);

        let color_format = graphics
            .select_color_format(&runtime_formats)
            .ok_or(XrError::NoCompatibleSwapchainFormat)?;

        let views = runtime.enumerate_view_configuration_views(system, view_configuration)?;
        if views.is_empty() {
            return Err(XrError::NoViews);
        }
        if views.len() != view_configuration.view_count() {
            tracing::warn!(
                "{} view configuration reported {} views, expected {}",
                view_configuration,
                views.len(),
                view_configuration.view_count()
            );
        }

        let mut set = Self {
            color_format,
            views: views.clone(),
            swapchains: Vec::with_capacity(views.len()),
        };

        for (index, view) in views.iter().enumerate() {
            let info = SwapchainCreateInfo {
                format: color_format,
                extent: Extent2D::new(view.recommended_width, view.recommended_height),
                sample_count: view.recommended_sample_count,
                array_size: 1,
                mip_count: 1,
            };

            let created = runtime.create_swapchain(session, &info).and_then(|handle| {
                match runtime.enumerate_swapchain_images(handle) {
                    Ok(images) => Ok((handle, images)),
                    Err(e) => {
                        runtime.destroy_swapchain(handle);
                        Err(e)
                    }
                }
            });

            let (handle, images) = match created {
                Ok(created) => created,
                Err(e) => {
                    set.destroy_swapchains(runtime);
                    return Err(e);
                }
            };

            tracing::info!(
                "Created swapchain {} for view {}: {}x{} format {} ({} images)",
                handle,
                index,
                view.recommended_width,
                view.recommended_height,
                color_format,
                images.len()
            );

            set.swapchains.push(Swapchain {
                handle,
                width: view.recommended_width,
                height: view.recommended_height,
                images,
                render_target: None,
            });
        }

        Ok(set)
    }

    pub fn color_format(&self) -> i64 {
        self.color_format
    }

    pub fn views(&self) -> &[ViewConfigView] {
        &self.views
    }

    pub fn swapchains(&self) -> &[Swapchain] {
        &self.swapchains
    }

    pub fn len(&self) -> usize {
        self.swapchains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.swapchains.is_empty()
    }

    /// Bind a graphics render target to every swapchain
    pub fn allocate_render_targets<G>(&mut self, graphics: &mut G) -> Result<()>
    where
        G: GraphicsBackend + ?Sized,
    {
        for swapchain in &mut self.swapchains {
            if swapchain.render_target.is_some() {
                continue;
            }
            let desc = RenderTargetDesc {
                format: self.color_format,
                extent: swapchain.extent(),
                images: swapchain.images.clone(),
            };
            swapchain.render_target = Some(graphics.create_render_target(&desc)?);
        }
        Ok(())
    }

    /// Release render targets and swapchains
    pub fn destroy<R, G>(mut self, runtime: &mut R, graphics: &mut G)
    where
        R: XrRuntime + ?Sized,
        G: GraphicsBackend + ?Sized,
    {
        for swapchain in &mut self.swapchains {
            if let Some(target) = swapchain.render_target.take() {
                graphics.destroy_render_target(target);
            }
        }
        self.destroy_swapchains(runtime);
    }

    fn destroy_swapchains<R>(&mut self, runtime: &mut R)
    where
        R: XrRuntime + ?Sized,
    {
        for swapchain in self.swapchains.drain(..) {
            runtime.destroy_swapchain(swapchain.handle);
        }
    }
}
