//! Standard deferred passes.
//!
//! Each builder wires the recorders of one pass into barrier-separated
//! stages. `ordering` is the barrier used after stages whose output a later
//! stage samples. The G-buffer clear is only followed by writes to the same
//! targets and the final composite has no consumer, so both order by
//! submission.

use std::collections::BTreeMap;

use super::{PassOrdering, PassStage, RenderPass};
use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::recorder::{
    AmbientLightRecorder, AmbientOcclusionRecorder, BlurRecorder, EnvironmentLightRecorder,
    GBufferClearRecorder, GeometryRecorder, GeometryTechnique, SkyBoxRecorder,
    ToneMappingRecorder,
};
use crate::types::{
    AmbientOcclusionConstants, DrawableItem, EnvironmentMaps, FrameTargets, GBufferTargets,
    GeometryData,
};

/// G-buffer clear, then one geometry recorder per technique in use.
///
/// Items are grouped by [`GeometryTechnique::select`], so every technique
/// present in the scene records in parallel with the others.
pub fn geometry_pass(
    context: &GraphicsContext,
    items: &[DrawableItem],
    gbuffer: GBufferTargets,
    ordering: PassOrdering,
) -> Result<RenderPass, GraphicsError> {
    let clear = PassStage::new("gbuffer_clear", PassOrdering::Submission)
        .with_recorder(GBufferClearRecorder::new(context, gbuffer)?);

    let mut groups: BTreeMap<GeometryTechnique, Vec<DrawableItem>> = BTreeMap::new();
    for item in items {
        groups
            .entry(GeometryTechnique::select(&item.textures))
            .or_default()
            .push(item.clone());
    }

    let mut geometry = PassStage::new("geometry", ordering);
    for (technique, items) in &groups {
        log::debug!("Geometry technique {:?}: {} items", technique, items.len());
        geometry.push_recorder(Box::new(GeometryRecorder::new(
            context, *technique, items, gbuffer,
        )?));
    }

    Ok(RenderPass::new("geometry")
        .with_stage(clear)
        .with_stage(geometry))
}

/// Ambient occlusion, its blur, then the ambient composite.
///
/// With `occlusion_enabled` false only the composite runs, without sampling
/// the occlusion term.
pub fn ambient_pass(
    context: &GraphicsContext,
    targets: &FrameTargets,
    parameters: AmbientOcclusionConstants,
    occlusion_enabled: bool,
    ordering: PassOrdering,
) -> Result<RenderPass, GraphicsError> {
    let mut pass = RenderPass::new("ambient");

    let occlusion = if occlusion_enabled {
        pass.push_stage(
            PassStage::new("ambient_occlusion", ordering).with_recorder(
                AmbientOcclusionRecorder::new(
                    context,
                    targets.gbuffer,
                    targets.ambient_occlusion,
                    targets.ambient_occlusion_noise,
                    parameters,
                )?,
            ),
        );
        pass.push_stage(PassStage::new("blur", ordering).with_recorder(BlurRecorder::new(
            context,
            targets.ambient_occlusion,
            targets.ambient_occlusion_blurred,
        )?));
        Some(targets.ambient_occlusion_blurred)
    } else {
        None
    };

    pass.push_stage(
        PassStage::new("ambient_light", ordering).with_recorder(AmbientLightRecorder::new(
            context,
            targets.gbuffer,
            occlusion,
            targets.lighting,
        )?),
    );
    Ok(pass)
}

/// Image based lighting accumulated into the lighting target.
pub fn environment_light_pass(
    context: &GraphicsContext,
    targets: &FrameTargets,
    maps: &EnvironmentMaps,
    ordering: PassOrdering,
) -> Result<RenderPass, GraphicsError> {
    let recorder = EnvironmentLightRecorder::new(context, targets.gbuffer, maps, targets.lighting)?;
    let stage = PassStage::new("environment_light", ordering).with_recorder(recorder);
    Ok(RenderPass::new("environment_light").with_stage(stage))
}

/// Sky box into the lighting target. The stage is empty when disabled.
pub fn sky_box_pass(
    context: &GraphicsContext,
    targets: &FrameTargets,
    mesh: &GeometryData,
    maps: &EnvironmentMaps,
    enabled: bool,
    ordering: PassOrdering,
) -> Result<RenderPass, GraphicsError> {
    let mut stage = PassStage::new("sky_box", ordering);
    if enabled {
        stage.push_recorder(Box::new(SkyBoxRecorder::new(
            context,
            mesh,
            maps.sky_box,
            targets.lighting,
            targets.gbuffer.depth,
        )?));
    }
    Ok(RenderPass::new("sky_box").with_stage(stage))
}

/// Final composite of the lighting target into the back buffer.
pub fn tone_mapping_pass(
    context: &GraphicsContext,
    targets: &FrameTargets,
) -> Result<RenderPass, GraphicsError> {
    let recorder = ToneMappingRecorder::new(context, targets.lighting, targets.back_buffer)?;
    let stage = PassStage::new("tone_mapping", PassOrdering::Submission).with_recorder(recorder);
    Ok(RenderPass::new("tone_mapping").with_stage(stage))
}
