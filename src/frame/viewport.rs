// Window-size derived state
//
// Recomputed by the orchestrator on every swapchain recreation and handed to
// the backend through `FrameTarget`, instead of being read from globals.

use ash::vk;
use glam::Mat4;

const FOV_Y_DEGREES: f32 = 60.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub extent: vk::Extent2D,
    pub aspect_ratio: f32,
    /// Right-handed perspective with Y flipped for Vulkan clip space.
    /// Nothing in the clear + blit frame draws geometry yet.
    #[allow(dead_code)]
    pub projection: Mat4,
}

impl Viewport {
    pub fn new(extent: vk::Extent2D) -> Self {
        let aspect_ratio = extent.width as f32 / extent.height.max(1) as f32;
        let mut projection =
            Mat4::perspective_rh(FOV_Y_DEGREES.to_radians(), aspect_ratio, Z_NEAR, Z_FAR);
        projection.y_axis.y *= -1.0;

        Self {
            extent,
            aspect_ratio,
            projection,
        }
    }

    pub fn vk_viewport(&self) -> vk::Viewport {
        vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    pub fn scissor(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }
    }
}
