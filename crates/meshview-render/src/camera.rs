//! Camera, trackball controls and lights.

use std::rc::Rc;

use glam::{Mat4, Vec3};
use serde::Serialize;

use meshview_core::{CameraOptions, ControlOptions, ResourceId, ResourceKind, Result, SharedLedger};

use crate::materials::Material;

/// `(position, up, target)` of a view, enough to reproduce it.
pub type CameraParams = (Vec3, Vec3, Vec3);

/// A perspective camera.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    #[serde(skip)]
    id: ResourceId,
    pub position: Vec3,
    pub up: Vec3,
    /// Point the camera is aimed at.
    pub look_at: Vec3,
    pub aspect: f32,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(ledger: &SharedLedger, options: &CameraOptions, aspect: f32) -> Self {
        Self {
            id: ledger.acquire(ResourceKind::Camera),
            position: options.position,
            up: options.up,
            look_at: Vec3::ZERO,
            aspect,
            fov: options.fov,
            near: options.near,
            far: options.far,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Aims the camera at `target`.
    pub fn look_at(&mut self, target: Vec3) {
        self.look_at = target;
    }

    /// Returns the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.look_at, self.up)
    }
}

/// Trackball controls driving the camera.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Controls {
    #[serde(skip)]
    id: ResourceId,
    pub target: Vec3,
    pub static_moving: bool,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    /// Arrow material whose target-depth uniform follows the camera.
    #[serde(skip)]
    pub shader_material: Option<Rc<Material>>,
}

impl Controls {
    pub fn new(ledger: &SharedLedger, options: &ControlOptions) -> Self {
        Self {
            id: ledger.acquire(ResourceKind::Controls),
            target: Vec3::ZERO,
            static_moving: options.static_moving,
            rotate_speed: options.rotate_speed,
            zoom_speed: options.zoom_speed,
            pan_speed: options.pan_speed,
            shader_material: None,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }
}

/// Light types in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum LightKind {
    /// Point light parented to the camera so it follows the view.
    Point { position: Vec3 },
    Ambient,
}

#[derive(Debug, Clone, Serialize)]
pub struct Light {
    #[serde(skip)]
    id: ResourceId,
    #[serde(flatten)]
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
}

impl Light {
    pub fn new(ledger: &SharedLedger, kind: LightKind, intensity: f32) -> Self {
        Self {
            id: ledger.acquire(ResourceKind::Light),
            kind,
            color: Vec3::ONE,
            intensity,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }
}

/// Distance from the camera to the controls target.
pub fn target_depth(camera: &Camera, controls: &Controls) -> f32 {
    (camera.position - controls.target).length()
}

/// Releases camera, controls and lights.
pub fn dispose_view(
    ledger: &SharedLedger,
    camera: &Camera,
    controls: &Controls,
    lights: &[Light],
) -> Result<()> {
    ledger.release(camera.id)?;
    ledger.release(controls.id)?;
    for light in lights {
        ledger.release(light.id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshview_core::ResourceLedger;

    #[test]
    fn test_target_depth() {
        let ledger = ResourceLedger::shared();
        let camera = Camera::new(&ledger, &CameraOptions::default(), 1.0);
        let mut controls = Controls::new(&ledger, &ControlOptions::default());
        assert_eq!(target_depth(&camera, &controls), 5.0);
        controls.target = Vec3::new(0.0, 0.0, 2.0);
        assert_eq!(target_depth(&camera, &controls), 3.0);
    }

    #[test]
    fn test_view_matrix_looks_at_target() {
        let ledger = ResourceLedger::shared();
        let mut camera = Camera::new(&ledger, &CameraOptions::default(), 1.0);
        camera.look_at(Vec3::ZERO);
        let p = camera.view_matrix().transform_point3(Vec3::ZERO);
        // Target lies straight ahead along -Z in view space.
        assert!(p.x.abs() < 1e-6 && p.y.abs() < 1e-6);
        assert!((p.z + 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_dispose_view() {
        let ledger = ResourceLedger::shared();
        let camera = Camera::new(&ledger, &CameraOptions::default(), 1.0);
        let controls = Controls::new(&ledger, &ControlOptions::default());
        let lights = [Light::new(&ledger, LightKind::Ambient, 0.5)];
        dispose_view(&ledger, &camera, &controls, &lights).unwrap();
        assert_eq!(ledger.live_count(), 0);
    }
}
