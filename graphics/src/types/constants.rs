//! Constant buffer layouts.
//!
//! These blocks are copied byte-for-byte into upload buffers at fixed
//! offsets. The pipeline never interprets their contents.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use static_assertions::const_assert_eq;

/// Per-frame data shared by every technique.
///
/// Written once per frame into the recorder's current frame slot.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameConstants {
    /// World to view transform.
    pub view: Mat4,
    /// View to clip transform.
    pub projection: Mat4,
    /// Clip to view transform, used to rebuild positions from depth.
    pub inverse_projection: Mat4,
    /// Camera position in world space (w unused).
    pub eye_position: Vec4,
    /// Monotonic frame index.
    pub frame_index: u32,
    /// Seconds since the previous frame.
    pub delta_time: f32,
    /// Seconds since the renderer started.
    pub total_time: f32,
    _padding: u32,
}

impl FrameConstants {
    /// Build frame constants from camera matrices and timing.
    pub fn new(view: Mat4, projection: Mat4, eye_position: Vec4) -> Self {
        Self {
            view,
            projection,
            inverse_projection: projection.inverse(),
            eye_position,
            frame_index: 0,
            delta_time: 0.0,
            total_time: 0.0,
            _padding: 0,
        }
    }

    /// Set the timing fields.
    pub fn with_time(mut self, frame_index: u32, delta_time: f32, total_time: f32) -> Self {
        self.frame_index = frame_index;
        self.delta_time = delta_time;
        self.total_time = total_time;
        self
    }
}

impl Default for FrameConstants {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec4::ZERO)
    }
}

/// Per-instance transform data, uploaded once at recorder construction.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    /// Object to world transform.
    pub world: Mat4,
    /// Inverse transpose of `world`, for normals.
    pub inverse_transpose_world: Mat4,
}

impl ObjectConstants {
    /// Derive the normal matrix from a world transform.
    pub fn from_world(world: Mat4) -> Self {
        Self {
            world,
            inverse_transpose_world: world.inverse().transpose(),
        }
    }
}

/// Scalar material parameters, uploaded once at recorder construction.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialConstants {
    /// Linear base color (alpha unused).
    pub base_color: Vec4,
    pub metalness: f32,
    pub smoothness: f32,
    /// Displacement scale for height mapped techniques.
    pub height_scale: f32,
    _padding: f32,
}

impl MaterialConstants {
    /// Create material constants.
    pub fn new(base_color: Vec4, metalness: f32, smoothness: f32, height_scale: f32) -> Self {
        Self {
            base_color,
            metalness,
            smoothness,
            height_scale,
            _padding: 0.0,
        }
    }
}

/// Parameters of the ambient occlusion technique.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct AmbientOcclusionConstants {
    /// Number of kernel samples taken per pixel.
    pub sample_count: u32,
    /// Sampling hemisphere radius in view space.
    pub radius: f32,
    /// Exponent applied to the final occlusion term.
    pub power: f32,
    /// Size of the tiled noise texture in texels.
    pub noise_size: f32,
    /// Render target size in pixels.
    pub target_size: [f32; 2],
    _padding: [f32; 2],
}

impl AmbientOcclusionConstants {
    /// Create ambient occlusion parameters for a target of the given size.
    pub fn new(sample_count: u32, radius: f32, power: f32, target_size: [f32; 2]) -> Self {
        Self {
            sample_count,
            radius,
            power,
            noise_size: 4.0,
            target_size,
            _padding: [0.0; 2],
        }
    }
}

impl Default for AmbientOcclusionConstants {
    fn default() -> Self {
        Self::new(16, 1.0, 2.0, [1920.0, 1080.0])
    }
}

const_assert_eq!(std::mem::size_of::<FrameConstants>(), 224);
const_assert_eq!(std::mem::size_of::<ObjectConstants>(), 128);
const_assert_eq!(std::mem::size_of::<MaterialConstants>(), 32);
const_assert_eq!(std::mem::size_of::<AmbientOcclusionConstants>(), 32);
