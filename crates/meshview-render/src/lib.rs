//! Scene backend for meshview-rs.
//!
//! This crate holds the retained scene a viewer edits and exports, including:
//! - Buffer attributes and geometries with ledger-tracked lifetimes
//! - The material library and texture maps
//! - Scalar and vector fields, color maps and arrow glyphs
//! - Camera, lights, morph target animation and the HTML scene document

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Mesh sizes and image dimensions stay far below f32 precision limits
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
// Descriptors legitimately carry several boolean flags
#![allow(clippy::struct_excessive_bools)]

pub mod animation;
pub mod buffer;
pub mod camera;
pub mod color_maps;
pub mod export;
pub mod fields;
pub mod materials;
pub mod scene;
pub mod texture_map;
pub mod vector_render;

pub use animation::{
    flattening_track, AnimationAction, AnimationClip, Interpolation, LoopMode, NumberKeyframeTrack,
};
pub use buffer::{BufferAttribute, BufferGeometry, GeometryBinding, Ownership};
pub use camera::{Camera, CameraParams, Controls, Light, LightKind};
pub use color_maps::{ColorMap, ColorMapRegistry};
pub use export::SceneDocument;
pub use fields::{ArrowAlignment, DomainType, ScalarField, VectorField};
pub use materials::{
    Material, MaterialDescriptor, MaterialKey, MaterialKind, MaterialLibrary, RuntimeUniforms,
    GHOST_OPACITY,
};
pub use scene::{GroupKind, MeshKind, Renderer, Scene, SceneMesh};
pub use texture_map::{padded_size, TextureId, TextureMap, TextureSampling};
pub use vector_render::{set_arrow_alpha, ArrowGlyphs, ArrowUniforms};
