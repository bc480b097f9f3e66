//! Configuration options for a viewer.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Per-viewer configuration options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerOptions {
    /// Renderer width in pixels.
    pub width: u32,

    /// Renderer height in pixels.
    pub height: u32,

    /// Pause rendering while a frame is being rebuilt, redrawing once at the end.
    pub avoid_redraw_flicker: bool,

    /// Vector field arrow size in pixels.
    pub arrow_size: f32,

    /// Color map used for scalar fields that do not name one.
    pub color_map: String,

    /// Background color.
    pub background_color: Vec3,

    /// Intensity of the point light attached to the camera.
    pub point_light_intensity: f32,

    /// Intensity of the ambient light.
    pub ambient_light_intensity: f32,

    /// Camera defaults.
    pub camera: CameraOptions,

    /// Trackball control speeds.
    pub controls: ControlOptions,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            avoid_redraw_flicker: false,
            arrow_size: 60.0,
            color_map: "viridis".to_string(),
            background_color: Vec3::new(1.0, 1.0, 1.0),
            point_light_intensity: 0.6,
            ambient_light_intensity: 0.5,
            camera: CameraOptions::default(),
            controls: ControlOptions::default(),
        }
    }
}

impl ViewerOptions {
    /// Creates options with the given renderer size and defaults elsewhere.
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Loads options from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parses options from a JSON string. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Width over height, guarding against a zero height.
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Initial camera placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraOptions {
    pub position: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            up: Vec3::Y,
            fov: 50.0,
            near: 0.1,
            far: 2000.0,
        }
    }
}

/// Trackball control settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlOptions {
    pub static_moving: bool,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
}

impl Default for ControlOptions {
    fn default() -> Self {
        Self {
            static_moving: true,
            rotate_speed: 2.0,
            zoom_speed: 2.0,
            pan_speed: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = ViewerOptions::default();
        assert_eq!(opts.width, 512);
        assert_eq!(opts.height, 512);
        assert_eq!(opts.arrow_size, 60.0);
        assert!(!opts.avoid_redraw_flicker);
        assert_eq!(opts.camera.position, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(opts.controls.rotate_speed, 2.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let opts = ViewerOptions::from_json(r#"{"width": 800, "avoid_redraw_flicker": true}"#)
            .unwrap();
        assert_eq!(opts.width, 800);
        assert_eq!(opts.height, 512);
        assert!(opts.avoid_redraw_flicker);
        assert_eq!(opts.color_map, "viridis");
    }

    #[test]
    fn test_load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.json");
        std::fs::write(&path, r#"{"height": 240, "color_map": "coolwarm"}"#).unwrap();

        let opts = ViewerOptions::from_json_file(&path).unwrap();
        assert_eq!(opts.height, 240);
        assert_eq!(opts.width, 512);
        assert_eq!(opts.color_map, "coolwarm");

        let missing = ViewerOptions::from_json_file(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(crate::MeshViewError::IoError(_))));
    }

    #[test]
    fn test_aspect_zero_height() {
        let opts = ViewerOptions::with_size(300, 0);
        assert_eq!(opts.aspect(), 300.0);
    }
}
