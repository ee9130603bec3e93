//! Synthetic scene: a grid of cubes under an orbiting camera.

use deferred_graphics::types::BufferHandle;
use deferred_graphics::{
    AmbientOcclusionConstants, DrawableItem, DummyBackend, EnvironmentMaps, FrameConstants,
    FrameTargets, FrameTime, GBufferTargets, GeometryData, MaterialProperties, MaterialTextures,
    SceneDescription, SceneSource,
};
use glam::{Mat4, Vec3, Vec4};

const ORBIT_RADIUS: f32 = 24.0;
const ORBIT_SPEED: f32 = 0.5;
const TARGET_SIZE: [f32; 2] = [1920.0, 1080.0];

/// Cubes on a square grid. Materials cycle through every texture combination
/// so that each geometry technique gets work.
pub struct OrbitScene {
    description: SceneDescription,
}

impl OrbitScene {
    /// Create the scene's textures and render targets on `backend`.
    pub fn new(backend: &DummyBackend, objects: usize) -> Self {
        let texture = |label: &str| backend.create_texture(label);

        let targets = FrameTargets {
            gbuffer: GBufferTargets {
                color_metalness: texture("gbuffer.color_metalness"),
                normal_smoothness: texture("gbuffer.normal_smoothness"),
                depth: texture("gbuffer.depth"),
            },
            ambient_occlusion: texture("ambient_occlusion"),
            ambient_occlusion_blurred: texture("ambient_occlusion_blurred"),
            ambient_occlusion_noise: texture("ambient_occlusion_noise"),
            lighting: texture("lighting"),
            back_buffer: texture("back_buffer"),
        };
        let environment = EnvironmentMaps {
            sky_box: texture("sky_box"),
            diffuse_irradiance: texture("diffuse_irradiance"),
            specular_pre_convolved: texture("specular_pre_convolved"),
        };

        let color = texture("bricks.color");
        let normal = texture("bricks.normal");
        let height = texture("bricks.height");
        let materials = [
            MaterialTextures::default(),
            MaterialTextures {
                color: Some(color),
                ..Default::default()
            },
            MaterialTextures {
                normal: Some(normal),
                ..Default::default()
            },
            MaterialTextures {
                color: Some(color),
                normal: Some(normal),
                height: None,
            },
            MaterialTextures {
                color: Some(color),
                normal: Some(normal),
                height: Some(height),
            },
        ];

        let side = (objects as f32).sqrt().ceil().max(1.0) as usize;
        let items = (0..objects)
            .map(|i| {
                let (x, z) = ((i % side) as f32, (i / side) as f32);
                let offset = (side as f32 - 1.0) * 0.5;
                let world = Mat4::from_translation(Vec3::new(
                    (x - offset) * 3.0,
                    0.0,
                    (z - offset) * 3.0,
                ));
                let shade = (i % 7) as f32 / 6.0;
                DrawableItem::new(cube().with_instances(vec![world]))
                    .with_material(MaterialProperties {
                        base_color: Vec4::new(shade, 0.5, 1.0 - shade, 1.0),
                        metalness: (i % 2) as f32,
                        smoothness: 0.5,
                        height_scale: 0.05,
                    })
                    .with_textures(materials[i % materials.len()])
            })
            .collect();

        Self {
            description: SceneDescription {
                items,
                environment,
                sky_box_mesh: cube(),
                targets,
                ambient_occlusion: AmbientOcclusionConstants::new(16, 0.5, 2.0, TARGET_SIZE),
            },
        }
    }
}

impl SceneSource for OrbitScene {
    fn description(&self) -> &SceneDescription {
        &self.description
    }

    fn update(&mut self, time: &FrameTime) -> FrameConstants {
        let angle = time.total_time * ORBIT_SPEED;
        let eye = Vec3::new(angle.cos() * ORBIT_RADIUS, 8.0, angle.sin() * ORBIT_RADIUS);
        let aspect = TARGET_SIZE[0] / TARGET_SIZE[1];
        FrameConstants::new(
            Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y),
            Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, aspect, 0.1, 200.0),
            eye.extend(1.0),
        )
    }
}

/// Unit cube. The simulated GPU never reads buffer contents, so the handles
/// only need to be non-null.
fn cube() -> GeometryData {
    GeometryData::new(BufferHandle::new(0), BufferHandle::new(1), 36)
}
