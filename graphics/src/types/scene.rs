//! Read-only scene inputs handed to recorders at construction.
//!
//! Produced by the scene/asset loading layer. Recorders copy the scalar parts
//! into constant buffers and forward the handles; nothing else is interpreted.

use bitflags::bitflags;
use glam::{Mat4, Vec4};

use super::handles::{BufferHandle, TextureHandle};
use crate::GraphicsError;
use crate::types::handles::require;

bitflags! {
    /// Material texture inputs a geometry technique samples.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureSlots: u32 {
        /// Base color map.
        const COLOR = 1 << 0;
        /// Tangent space normal map.
        const NORMAL = 1 << 1;
        /// Height map for displacement.
        const HEIGHT = 1 << 2;
    }
}

impl Default for TextureSlots {
    fn default() -> Self {
        Self::empty()
    }
}

/// Vertex/index buffers of one mesh plus the world transforms of its instances.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryData {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_count: u32,
    /// One entry per drawn instance.
    pub world_matrices: Vec<Mat4>,
}

impl GeometryData {
    /// Create geometry with a single instance at the origin.
    pub fn new(vertex_buffer: BufferHandle, index_buffer: BufferHandle, index_count: u32) -> Self {
        Self {
            vertex_buffer,
            index_buffer,
            index_count,
            world_matrices: vec![Mat4::IDENTITY],
        }
    }

    /// Replace the instance transforms.
    pub fn with_instances(mut self, world_matrices: Vec<Mat4>) -> Self {
        self.world_matrices = world_matrices;
        self
    }

    pub(crate) fn validate(&self, what: &str) -> Result<(), GraphicsError> {
        require(self.vertex_buffer, &format!("{what}.vertex_buffer"))?;
        require(self.index_buffer, &format!("{what}.index_buffer"))?;
        if self.index_count == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "{what}.index_count must be non-zero"
            )));
        }
        if self.world_matrices.is_empty() {
            return Err(GraphicsError::InvalidParameter(format!(
                "{what} has no instances"
            )));
        }
        Ok(())
    }
}

/// Scalar material parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialProperties {
    pub base_color: Vec4,
    pub metalness: f32,
    pub smoothness: f32,
    pub height_scale: f32,
}

impl Default for MaterialProperties {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            metalness: 0.0,
            smoothness: 0.5,
            height_scale: 0.0,
        }
    }
}

/// Material texture handles. Unused slots stay `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaterialTextures {
    pub color: Option<TextureHandle>,
    pub normal: Option<TextureHandle>,
    pub height: Option<TextureHandle>,
}

impl MaterialTextures {
    /// Slots that carry a texture.
    pub fn slots(&self) -> TextureSlots {
        let mut slots = TextureSlots::empty();
        slots.set(TextureSlots::COLOR, self.color.is_some());
        slots.set(TextureSlots::NORMAL, self.normal.is_some());
        slots.set(TextureSlots::HEIGHT, self.height.is_some());
        slots
    }

    /// Collect the handles for `required` slots in slot order.
    ///
    /// Fails if a required slot is missing or null.
    pub(crate) fn collect(
        &self,
        required: TextureSlots,
        what: &str,
    ) -> Result<Vec<TextureHandle>, GraphicsError> {
        let mut handles = Vec::with_capacity(required.bits().count_ones() as usize);
        for (slot, texture, name) in [
            (TextureSlots::COLOR, self.color, "color"),
            (TextureSlots::NORMAL, self.normal, "normal"),
            (TextureSlots::HEIGHT, self.height, "height"),
        ] {
            if !required.contains(slot) {
                continue;
            }
            let texture = texture.unwrap_or(TextureHandle::NULL);
            handles.push(require(texture, &format!("{what}.textures.{name}"))?);
        }
        Ok(handles)
    }
}

/// One opaque drawable work item: mesh, material and textures.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawableItem {
    pub geometry: GeometryData,
    pub material: MaterialProperties,
    pub textures: MaterialTextures,
}

impl DrawableItem {
    /// Create a drawable from geometry with the default material.
    pub fn new(geometry: GeometryData) -> Self {
        Self {
            geometry,
            material: MaterialProperties::default(),
            textures: MaterialTextures::default(),
        }
    }

    /// Set the material parameters.
    pub fn with_material(mut self, material: MaterialProperties) -> Self {
        self.material = material;
        self
    }

    /// Set the material textures.
    pub fn with_textures(mut self, textures: MaterialTextures) -> Self {
        self.textures = textures;
        self
    }
}

/// Render targets written by the geometry pass and read by lighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GBufferTargets {
    /// RGB base color, A metalness.
    pub color_metalness: TextureHandle,
    /// RGB encoded normal, A smoothness.
    pub normal_smoothness: TextureHandle,
    pub depth: TextureHandle,
}

impl GBufferTargets {
    pub(crate) fn validate(&self) -> Result<(), GraphicsError> {
        require(self.color_metalness, "gbuffer.color_metalness")?;
        require(self.normal_smoothness, "gbuffer.normal_smoothness")?;
        require(self.depth, "gbuffer.depth")?;
        Ok(())
    }
}

/// Image based lighting inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnvironmentMaps {
    /// Cube map drawn behind all geometry.
    pub sky_box: TextureHandle,
    pub diffuse_irradiance: TextureHandle,
    pub specular_pre_convolved: TextureHandle,
}

impl EnvironmentMaps {
    pub(crate) fn validate(&self) -> Result<(), GraphicsError> {
        require(self.sky_box, "environment.sky_box")?;
        require(self.diffuse_irradiance, "environment.diffuse_irradiance")?;
        require(self.specular_pre_convolved, "environment.specular_pre_convolved")?;
        Ok(())
    }
}

/// Every texture the frame renders into, created by the asset layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameTargets {
    pub gbuffer: GBufferTargets,
    /// Raw ambient occlusion term.
    pub ambient_occlusion: TextureHandle,
    /// Ambient occlusion after the blur.
    pub ambient_occlusion_blurred: TextureHandle,
    /// Rotation noise sampled by the occlusion kernel.
    pub ambient_occlusion_noise: TextureHandle,
    /// HDR light accumulation target.
    pub lighting: TextureHandle,
    /// Presentable back buffer.
    pub back_buffer: TextureHandle,
}
