//! G-buffer fill.

use super::{
    CommandListRecorder, DESCRIPTOR_TABLE_SLOT, MATERIAL_CONSTANTS_SLOT, OBJECT_CONSTANTS_SLOT,
    RecorderCore, texture_table,
};
use crate::backend::PipelineDescriptor;
use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::resources::UploadBuffer;
use crate::scheduler::CommandListSink;
use crate::types::{
    BufferHandle, DescriptorHandle, DrawableItem, FrameConstants, GBufferTargets, Handle,
    MaterialConstants, MaterialTextures, ObjectConstants, TextureSlots,
};

/// Geometry shading variant, chosen by which material textures are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeometryTechnique {
    /// Constant base color only.
    Color,
    /// Base color map.
    ColorMapping,
    /// Constant base color with a normal map.
    Normal,
    /// Base color and normal maps.
    ColorNormal,
    /// Base color, normal and height maps (displacement).
    Height,
}

impl GeometryTechnique {
    /// Every technique, in recording order.
    pub const ALL: [GeometryTechnique; 5] = [
        Self::Color,
        Self::ColorMapping,
        Self::Normal,
        Self::ColorNormal,
        Self::Height,
    ];

    /// Material textures the technique samples.
    pub fn required_textures(self) -> TextureSlots {
        match self {
            Self::Color => TextureSlots::empty(),
            Self::ColorMapping => TextureSlots::COLOR,
            Self::Normal => TextureSlots::NORMAL,
            Self::ColorNormal => TextureSlots::COLOR | TextureSlots::NORMAL,
            Self::Height => TextureSlots::all(),
        }
    }

    /// The richest technique `textures` can feed.
    ///
    /// A height map is only used together with color and normal maps.
    pub fn select(textures: &MaterialTextures) -> Self {
        let slots = textures.slots();
        Self::ALL
            .into_iter()
            .rev()
            .find(|technique| slots.contains(technique.required_textures()))
            .unwrap_or(Self::Color)
    }

    /// Pipeline (and registry) name.
    pub fn pipeline_label(self) -> &'static str {
        match self {
            Self::Color => "geometry_color",
            Self::ColorMapping => "geometry_color_mapping",
            Self::Normal => "geometry_normal",
            Self::ColorNormal => "geometry_color_normal",
            Self::Height => "geometry_height",
        }
    }
}

/// One drawable, resolved at construction.
#[derive(Debug, Clone, Copy)]
struct DrawRecord {
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    index_count: u32,
    first_object: u32,
    instance_count: u32,
    material: u32,
    textures: Option<DescriptorHandle>,
}

/// Draws every drawable of one [`GeometryTechnique`] into the G-buffer.
///
/// Object transforms and material constants never change after load, so they
/// are uploaded once; only the frame constants rotate over the frame slots.
pub struct GeometryRecorder {
    core: RecorderCore,
    technique: GeometryTechnique,
    gbuffer: GBufferTargets,
    draws: Vec<DrawRecord>,
    objects: UploadBuffer,
    materials: UploadBuffer,
}

impl GeometryRecorder {
    pub fn new(
        context: &GraphicsContext,
        technique: GeometryTechnique,
        items: &[DrawableItem],
        gbuffer: GBufferTargets,
    ) -> Result<Self, GraphicsError> {
        let name = technique.pipeline_label();
        if items.is_empty() {
            return Err(GraphicsError::InvalidParameter(format!(
                "{name} recorder has no drawables"
            )));
        }
        gbuffer.validate()?;

        let required = technique.required_textures();
        let mut texture_sets = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let what = format!("{name}.items[{i}]");
            item.geometry.validate(&what)?;
            texture_sets.push(item.textures.collect(required, &what)?);
        }

        let backend = context.backend();
        let instance_count: usize = items.iter().map(|i| i.geometry.world_matrices.len()).sum();
        let objects =
            UploadBuffer::for_type::<ObjectConstants>(backend.clone(), instance_count as u32)?;
        let materials =
            UploadBuffer::for_type::<MaterialConstants>(backend.clone(), items.len() as u32)?;

        let mut draws = Vec::with_capacity(items.len());
        let mut next_object = 0u32;
        for (index, (item, textures)) in items.iter().zip(texture_sets).enumerate() {
            let first_object = next_object;
            for world in &item.geometry.world_matrices {
                objects.write(next_object, &ObjectConstants::from_world(*world))?;
                next_object += 1;
            }

            let material = &item.material;
            materials.write(
                index as u32,
                &MaterialConstants::new(
                    material.base_color,
                    material.metalness,
                    material.smoothness,
                    material.height_scale,
                ),
            )?;

            let textures = if textures.is_empty() {
                None
            } else {
                Some(texture_table(context, &textures)?)
            };

            draws.push(DrawRecord {
                vertex_buffer: item.geometry.vertex_buffer,
                index_buffer: item.geometry.index_buffer,
                index_count: item.geometry.index_count,
                first_object,
                instance_count: next_object - first_object,
                material: index as u32,
                textures,
            });
        }

        let core = RecorderCore::new(
            context,
            name,
            &PipelineDescriptor::new(name, 2).with_depth(),
        )?;

        log::debug!(
            "{}: {} drawables, {} instances",
            name,
            draws.len(),
            instance_count
        );

        Ok(Self {
            core,
            technique,
            gbuffer,
            draws,
            objects,
            materials,
        })
    }

    pub fn technique(&self) -> GeometryTechnique {
        self.technique
    }

    /// Number of drawables.
    pub fn draw_count(&self) -> usize {
        self.draws.len()
    }

    /// Total instances drawn per frame.
    pub fn instance_count(&self) -> u32 {
        self.draws.iter().map(|d| d.instance_count).sum()
    }
}

impl CommandListRecorder for GeometryRecorder {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn record_and_push_command_lists(
        &mut self,
        constants: &FrameConstants,
        sink: &CommandListSink,
    ) -> Result<(), GraphicsError> {
        crate::profile_scope!("geometry_recorder");
        let gbuffer = self.gbuffer;
        let mut recording = self.core.begin_frame(constants)?;

        recording.set_render_targets(
            &[gbuffer.color_metalness, gbuffer.normal_smoothness],
            Some(gbuffer.depth),
        )?;
        for draw in &self.draws {
            recording.set_geometry(draw.vertex_buffer, draw.index_buffer)?;
            recording.set_constant_buffer(
                MATERIAL_CONSTANTS_SLOT,
                self.materials.handle(),
                self.materials.element_offset(draw.material),
            )?;
            if let Some(table) = draw.textures {
                recording.set_descriptor_table(DESCRIPTOR_TABLE_SLOT, table)?;
            }
            for object in draw.first_object..draw.first_object + draw.instance_count {
                recording.set_constant_buffer(
                    OBJECT_CONSTANTS_SLOT,
                    self.objects.handle(),
                    self.objects.element_offset(object),
                )?;
                recording.draw_indexed(draw.index_count, 1)?;
            }
        }

        RecorderCore::finish(recording, sink)
    }

    fn validate_data(&self) -> bool {
        self.core.validate_data()
            && !self.objects.handle().is_null()
            && !self.materials.handle().is_null()
            && !self.gbuffer.color_metalness.is_null()
            && !self.gbuffer.normal_smoothness.is_null()
            && !self.gbuffer.depth.is_null()
            && self.draws.iter().all(|d| {
                !d.vertex_buffer.is_null()
                    && !d.index_buffer.is_null()
                    && d.textures.is_none_or(|t| !t.is_null())
            })
    }
}

/// Clears the G-buffer targets. Recorded in its own stage before geometry.
pub struct GBufferClearRecorder {
    core: RecorderCore,
    gbuffer: GBufferTargets,
}

impl GBufferClearRecorder {
    /// Color targets are cleared to transparent black, depth to the far plane.
    pub const CLEAR_COLOR: [f32; 4] = [0.0; 4];
    pub const CLEAR_DEPTH: f32 = 1.0;

    pub fn new(context: &GraphicsContext, gbuffer: GBufferTargets) -> Result<Self, GraphicsError> {
        gbuffer.validate()?;
        let core = RecorderCore::new(
            context,
            "gbuffer_clear",
            &PipelineDescriptor::new("gbuffer_clear", 2).with_depth(),
        )?;
        Ok(Self { core, gbuffer })
    }
}

impl CommandListRecorder for GBufferClearRecorder {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn record_and_push_command_lists(
        &mut self,
        constants: &FrameConstants,
        sink: &CommandListSink,
    ) -> Result<(), GraphicsError> {
        let gbuffer = self.gbuffer;
        let mut recording = self.core.begin_frame(constants)?;
        recording.clear_render_target(gbuffer.color_metalness, Self::CLEAR_COLOR)?;
        recording.clear_render_target(gbuffer.normal_smoothness, Self::CLEAR_COLOR)?;
        recording.clear_depth(gbuffer.depth, Self::CLEAR_DEPTH)?;
        RecorderCore::finish(recording, sink)
    }

    fn validate_data(&self) -> bool {
        self.core.validate_data()
            && !self.gbuffer.color_metalness.is_null()
            && !self.gbuffer.normal_smoothness.is_null()
            && !self.gbuffer.depth.is_null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::GpuCommand;
    use crate::recorder::test_support::*;
    use crate::types::{MaterialProperties, TextureHandle};
    use glam::{Mat4, Vec3, Vec4};

    #[test]
    fn test_select_technique() {
        let color = Some(TextureHandle::new(1));
        let normal = Some(TextureHandle::new(2));
        let height = Some(TextureHandle::new(3));

        let cases = [
            (None, None, None, GeometryTechnique::Color),
            (color, None, None, GeometryTechnique::ColorMapping),
            (None, normal, None, GeometryTechnique::Normal),
            (color, normal, None, GeometryTechnique::ColorNormal),
            (color, normal, height, GeometryTechnique::Height),
            (None, None, height, GeometryTechnique::Color),
        ];
        for (color, normal, height, expected) in cases {
            let textures = MaterialTextures {
                color,
                normal,
                height,
            };
            assert_eq!(GeometryTechnique::select(&textures), expected);
        }
    }

    #[test]
    fn test_records_one_draw_per_instance() {
        let (backend, context) = context(2);
        let gbuffer = gbuffer(&backend);
        let items = vec![
            item(),
            DrawableItem::new(
                mesh().with_instances(vec![Mat4::IDENTITY, Mat4::from_translation(Vec3::X)]),
            )
            .with_material(MaterialProperties {
                base_color: Vec4::new(1.0, 0.0, 0.0, 1.0),
                ..Default::default()
            }),
        ];
        let mut recorder =
            GeometryRecorder::new(&context, GeometryTechnique::Color, &items, gbuffer).unwrap();
        assert!(recorder.validate_data());
        assert_eq!(recorder.draw_count(), 2);
        assert_eq!(recorder.instance_count(), 3);

        let (queue, sink) = sink();
        recorder
            .record_and_push_command_lists(&FrameConstants::default(), &sink)
            .unwrap();
        assert_eq!(drain(&queue).len(), 1);

        let draws = backend
            .commands(recorder.core.command_list.handle())
            .into_iter()
            .filter(|c| matches!(c, GpuCommand::DrawIndexed { .. }))
            .count();
        assert_eq!(draws, 3);
    }

    #[test]
    fn test_textured_technique_builds_tables() {
        let (backend, context) = context(2);
        let gbuffer = gbuffer(&backend);
        let textures = MaterialTextures {
            color: Some(texture(&backend, "albedo")),
            normal: Some(texture(&backend, "normal")),
            height: None,
        };
        let items = vec![item().with_textures(textures)];
        let recorder =
            GeometryRecorder::new(&context, GeometryTechnique::ColorNormal, &items, gbuffer)
                .unwrap();

        let table = recorder.draws[0].textures.unwrap();
        assert_eq!(backend.descriptor_table(table).unwrap().len(), 2);
    }

    #[test]
    fn test_null_inputs_rejected() {
        let (backend, context) = context(2);
        let gbuffer = gbuffer(&backend);

        let items = vec![item()];
        let err = GeometryRecorder::new(&context, GeometryTechnique::ColorMapping, &items, gbuffer)
            .err()
            .unwrap();
        assert_eq!(
            err,
            GraphicsError::InvalidHandle(
                "geometry_color_mapping.items[0].textures.color is null".to_string()
            )
        );

        let mut bad = gbuffer;
        bad.depth = TextureHandle::NULL;
        let err = GeometryRecorder::new(&context, GeometryTechnique::Color, &items, bad)
            .err()
            .unwrap();
        assert_eq!(
            err,
            GraphicsError::InvalidHandle("gbuffer.depth is null".to_string())
        );

        assert!(matches!(
            GeometryRecorder::new(&context, GeometryTechnique::Color, &[], gbuffer),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_clear_recorder() {
        let (backend, context) = context(3);
        let mut recorder = GBufferClearRecorder::new(&context, gbuffer(&backend)).unwrap();
        let (queue, sink) = sink();
        for _ in 0..4 {
            recorder
                .record_and_push_command_lists(&FrameConstants::default(), &sink)
                .unwrap();
        }
        assert!(recorder.validate_data());
        assert_eq!(drain(&queue), vec![5; 4]);
    }
}
