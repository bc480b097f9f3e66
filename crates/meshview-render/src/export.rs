//! Serializable scene documents and standalone HTML export.
//!
//! A [`SceneDocument`] is the renderable handle of a viewer: everything the browser
//! engine needs to rebuild the displayed scene. Attribute arrays are stored as
//! base64 little-endian bytes and textures as base64 PNG.

use std::collections::BTreeMap;
use std::path::Path;

use base64::Engine as _;
use glam::Vec3;
use serde::Serialize;

use meshview_core::{AttributeData, ModelTransform, ResourceId, Result};

use crate::animation::AnimationAction;
use crate::buffer::{BufferAttribute, BufferGeometry};
use crate::camera::{Camera, Light};
use crate::materials::{Material, MaterialDescriptor, RuntimeUniforms};
use crate::scene::{GroupKind, MeshKind, Scene};
use crate::texture_map::{TextureMap, TextureSampling};

const THREE_VERSION: &str = "0.160.0";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererDoc {
    pub width: u32,
    pub height: u32,
    pub background: Vec3,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlsDoc {
    pub target: Vec3,
    pub static_moving: bool,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDoc {
    pub array_type: &'static str,
    pub item_size: usize,
    pub count: usize,
    /// Base64 of the little-endian array bytes.
    pub data: String,
}

impl AttributeDoc {
    fn new(data: &AttributeData) -> Self {
        Self {
            array_type: data.array_type(),
            item_size: data.item_size(),
            count: data.count(),
            data: base64::engine::general_purpose::STANDARD.encode(data.as_bytes()),
        }
    }

    fn from_buffer(attr: &BufferAttribute) -> Self {
        Self::new(attr.data())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryDoc {
    pub id: u64,
    pub attributes: BTreeMap<&'static str, AttributeDoc>,
    pub morph_attributes: BTreeMap<&'static str, Vec<AttributeDoc>>,
}

impl GeometryDoc {
    fn new(geom: &BufferGeometry) -> Self {
        Self {
            id: geom.id().raw(),
            attributes: geom
                .attributes()
                .map(|(k, a)| (k.name(), AttributeDoc::from_buffer(a)))
                .collect(),
            morph_attributes: geom
                .morph_attributes()
                .map(|(k, targets)| (k.name(), targets.iter().map(AttributeDoc::from_buffer).collect()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialDoc {
    pub id: u64,
    #[serde(flatten)]
    pub descriptor: MaterialDescriptor,
    pub uniforms: RuntimeUniforms,
}

impl MaterialDoc {
    fn new(mat: &Material) -> Self {
        Self {
            id: mat.id().raw(),
            descriptor: mat.descriptor().clone(),
            uniforms: mat.uniforms(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureDoc {
    pub id: u64,
    pub size: u32,
    pub sampling: TextureSampling,
    /// Base64 PNG of the padded image.
    pub png: String,
}

impl TextureDoc {
    fn new(tex: &TextureMap) -> Result<Self> {
        Ok(Self {
            id: tex.id().raw(),
            size: tex.size(),
            sampling: tex.sampling(),
            png: base64::engine::general_purpose::STANDARD.encode(tex.to_png()?),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshDoc {
    pub id: u64,
    pub kind: MeshKind,
    pub geometry: u64,
    pub material: u64,
    pub ghost: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationDoc {
    pub target: u64,
    #[serde(flatten)]
    pub action: serde_json::Value,
}

/// Everything needed to rebuild the displayed scene in the browser.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDocument {
    pub renderer: RendererDoc,
    pub camera: Camera,
    pub controls: ControlsDoc,
    pub lights: Vec<Light>,
    pub transform: ModelTransform,
    pub geometries: Vec<GeometryDoc>,
    pub materials: Vec<MaterialDoc>,
    pub textures: Vec<TextureDoc>,
    pub meshes: Vec<MeshDoc>,
    pub animation: Option<AnimationDoc>,
}

impl SceneDocument {
    /// Captures the meshes attached to the live and ghost groups.
    ///
    /// `textures` lists the texture maps materials may refer to; only referenced
    /// ones are embedded.
    pub fn capture(scene: &Scene, textures: &[&TextureMap]) -> Result<Self> {
        let mut geometries: BTreeMap<ResourceId, GeometryDoc> = BTreeMap::new();
        let mut materials: BTreeMap<ResourceId, MaterialDoc> = BTreeMap::new();
        let mut meshes = Vec::new();

        let attached = scene
            .children(GroupKind::Ghost)
            .iter()
            .map(|&id| (id, true))
            .chain(scene.children(GroupKind::Live).iter().map(|&id| (id, false)));
        for (id, ghost) in attached {
            let Some(mesh) = scene.mesh(id) else {
                continue;
            };
            let geom_id = mesh.geometry.geometry;
            if let Some(geom) = scene.geometry(geom_id) {
                geometries.entry(geom_id).or_insert_with(|| GeometryDoc::new(geom));
            }
            materials
                .entry(mesh.material.id())
                .or_insert_with(|| MaterialDoc::new(&mesh.material));
            meshes.push(MeshDoc {
                id: id.raw(),
                kind: mesh.kind,
                geometry: geom_id.raw(),
                material: mesh.material.id().raw(),
                ghost,
            });
        }

        let texture_docs = textures
            .iter()
            .filter(|tex| materials.values().any(|m| m.descriptor.texture == Some(tex.id())))
            .map(|tex| TextureDoc::new(tex))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            renderer: RendererDoc {
                width: scene.renderer.width,
                height: scene.renderer.height,
                background: scene.background,
            },
            camera: scene.camera.clone(),
            controls: ControlsDoc {
                target: scene.controls.target,
                static_moving: scene.controls.static_moving,
                rotate_speed: scene.controls.rotate_speed,
                zoom_speed: scene.controls.zoom_speed,
                pan_speed: scene.controls.pan_speed,
            },
            lights: scene.lights.clone(),
            transform: scene.transform,
            geometries: geometries.into_values().collect(),
            materials: materials.into_values().collect(),
            textures: texture_docs,
            meshes,
            animation: None,
        })
    }

    /// Attaches an animation to the document.
    pub fn with_animation(mut self, action: &AnimationAction) -> Result<Self> {
        self.animation = Some(AnimationDoc {
            target: action.target.raw(),
            action: serde_json::to_value(action)?,
        });
        Ok(self)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Renders a standalone HTML page that rebuilds the scene with three.js.
    pub fn to_html(&self) -> Result<String> {
        // Keep the payload from closing its script element early.
        let json = self.to_json()?.replace("</", "<\\/");
        Ok(HTML_TEMPLATE
            .replace("{{THREE_VERSION}}", THREE_VERSION)
            .replace("{{SCENE_JSON}}", &json))
    }

    pub fn write_html(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_html()?)?;
        log::info!("exported scene to {}", path.display());
        Ok(())
    }
}

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>meshview</title>
<script type="importmap">
{ "imports": {
    "three": "https://unpkg.com/three@{{THREE_VERSION}}/build/three.module.js",
    "three/addons/": "https://unpkg.com/three@{{THREE_VERSION}}/examples/jsm/"
} }
</script>
</head>
<body style="margin:0">
<div id="meshview"></div>
<script type="application/json" id="meshview-scene">{{SCENE_JSON}}</script>
<script type="module">
import * as THREE from 'three';
import { TrackballControls } from 'three/addons/controls/TrackballControls.js';

const doc = JSON.parse(document.getElementById('meshview-scene').textContent);

function decode(attr) {
  const bytes = Uint8Array.from(atob(attr.data), c => c.charCodeAt(0));
  const Ctor = attr.arrayType === 'Uint32Array' ? Uint32Array : Float32Array;
  return new Ctor(bytes.buffer);
}

const textures = {};
for (const t of doc.textures) {
  const tex = new THREE.TextureLoader().load('data:image/png;base64,' + t.png);
  tex.wrapS = THREE.ClampToEdgeWrapping;
  tex.magFilter = THREE.LinearFilter;
  tex.minFilter = THREE.LinearMipMapLinearFilter;
  tex.generateMipmaps = t.sampling.generateMipmaps;
  tex.flipY = t.sampling.flipY;
  textures[t.id] = tex;
}

const geometries = {};
for (const g of doc.geometries) {
  const geom = new THREE.BufferGeometry();
  for (const [name, attr] of Object.entries(g.attributes)) {
    const buf = new THREE.BufferAttribute(decode(attr), attr.itemSize);
    if (name === 'index') geom.setIndex(buf); else geom.setAttribute(name, buf);
  }
  for (const [name, targets] of Object.entries(g.morphAttributes)) {
    geom.morphAttributes[name] = targets.map(a => new THREE.BufferAttribute(decode(a), a.itemSize));
  }
  geometries[g.id] = geom;
}

function makeMaterial(m) {
  const args = { transparent: m.transparent || m.uniforms.transparent, opacity: m.opacity };
  if (m.vertexColors) args.vertexColors = true;
  if (m.texture !== null) args.map = textures[m.texture];
  if (m.color) args.color = new THREE.Color(...m.color);
  if (m.doubleSided) args.side = THREE.DoubleSide;
  if (m.polygonOffset) Object.assign(args, { polygonOffset: true, polygonOffsetFactor: m.polygonOffset[0], polygonOffsetUnits: m.polygonOffset[1] });
  switch (m.kind) {
    case 'Lambert': return new THREE.MeshLambertMaterial(args);
    case 'LineBasic': return new THREE.LineBasicMaterial(args);
    case 'Wireframe': return new THREE.MeshBasicMaterial({ ...args, wireframe: true });
    case 'Points': return new THREE.PointsMaterial({ ...args, size: m.uniforms.pointSize, sizeAttenuation: m.sizeAttenuation });
    default: return new THREE.LineBasicMaterial({ vertexColors: true, transparent: true });
  }
}
const materials = {};
for (const m of doc.materials) materials[m.id] = m;

function arrowSegments(geom, m) {
  const base = geom.getAttribute('position').array;
  const vec = geom.getAttribute('arrowVector').array;
  const col = geom.getAttribute('arrowColor').array;
  const u = m.uniforms.arrow;
  const scale = u.arrowSizePxX / u.rendererWidth * u.targetDepth;
  const n = base.length / 3;
  const pos = new Float32Array(n * 6), rgba = new Float32Array(n * 8);
  for (let i = 0; i < n; i++) {
    const len = Math.hypot(vec[3*i], vec[3*i+1], vec[3*i+2]) || 1;
    for (let c = 0; c < 3; c++) {
      const d = vec[3*i+c] / len * scale;
      const start = base[3*i+c] + u.arrowAlignment * d;
      pos[6*i+c] = start; pos[6*i+3+c] = start + d;
    }
    for (let c = 0; c < 4; c++) { rgba[8*i+c] = col[4*i+c]; rgba[8*i+4+c] = col[4*i+c]; }
  }
  const g = new THREE.BufferGeometry();
  g.setAttribute('position', new THREE.BufferAttribute(pos, 3));
  g.setAttribute('color', new THREE.BufferAttribute(rgba, 4));
  return g;
}

const objects = new THREE.Group();
objects.scale.setScalar(doc.transform.scale);
objects.position.set(...doc.transform.position);
const meshObjects = {};
for (const m of doc.meshes) {
  const geom = geometries[m.geometry], mat = materials[m.material];
  let obj;
  switch (m.kind) {
    case 'LineSegments': obj = new THREE.LineSegments(geom, makeMaterial(mat)); break;
    case 'Points': obj = new THREE.Points(geom, makeMaterial(mat)); break;
    case 'Arrows': obj = new THREE.LineSegments(arrowSegments(geom, mat), makeMaterial(mat)); break;
    default: obj = new THREE.Mesh(geom, makeMaterial(mat));
  }
  if (mat.morphTargets) obj.morphTargetInfluences = [0];
  meshObjects[m.id] = obj;
  objects.add(obj);
}

const scene = new THREE.Scene();
scene.background = new THREE.Color(...doc.renderer.background);
const c = doc.camera;
const camera = new THREE.PerspectiveCamera(c.fov, c.aspect, c.near, c.far);
camera.position.set(...c.position);
camera.up.set(...c.up);
for (const l of doc.lights) {
  const color = new THREE.Color(...l.color);
  if (l.type === 'Point') { const p = new THREE.PointLight(color, l.intensity); p.position.set(...l.position); camera.add(p); }
  else scene.add(new THREE.AmbientLight(color, l.intensity));
}
scene.add(objects, camera);

const renderer = new THREE.WebGLRenderer({ antialias: true });
renderer.setSize(doc.renderer.width, doc.renderer.height);
document.getElementById('meshview').appendChild(renderer.domElement);
const controls = new TrackballControls(camera, renderer.domElement);
controls.target.set(...doc.controls.target);
controls.staticMoving = doc.controls.staticMoving;
controls.rotateSpeed = doc.controls.rotateSpeed;
controls.zoomSpeed = doc.controls.zoomSpeed;
controls.panSpeed = doc.controls.panSpeed;
camera.lookAt(controls.target);

let mixer = null;
if (doc.animation) {
  const target = meshObjects[doc.animation.target];
  mixer = new THREE.AnimationMixer(target);
  const tracks = doc.animation.clip.tracks.map(t => new THREE.NumberKeyframeTrack(
    t.name, t.times, t.values,
    t.interpolation === 'Smooth' ? THREE.InterpolateSmooth : t.interpolation === 'Discrete' ? THREE.InterpolateDiscrete : THREE.InterpolateLinear));
  const action = mixer.clipAction(new THREE.AnimationClip(doc.animation.clip.name, -1, tracks));
  action.loop = { Once: THREE.LoopOnce, Repeat: THREE.LoopRepeat, PingPong: THREE.LoopPingPong }[doc.animation.loopMode];
  action.play();
}

const clock = new THREE.Clock();
renderer.setAnimationLoop(() => {
  if (mixer) mixer.update(clock.getDelta());
  controls.update();
  renderer.render(scene, camera);
});
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::GeometryBinding;
    use crate::materials::MaterialLibrary;
    use meshview_core::{AttributeKey, ResourceLedger, ViewerOptions};

    fn scene_with_mesh() -> (Scene, MaterialLibrary) {
        let ledger = ResourceLedger::shared();
        let mut scene = Scene::new(ledger.clone(), &ViewerOptions::default());
        let mut lib = MaterialLibrary::new(ledger.clone(), false);
        let geom = scene.create_geometry();
        scene.geometry_mut(geom).unwrap().insert_attribute(
            AttributeKey::Position,
            BufferAttribute::new(&ledger, AttributeData::from_vec3(&[Vec3::ZERO, Vec3::X, Vec3::Y])),
        );
        let mesh = scene.create_mesh(MeshKind::Mesh, GeometryBinding::owned(geom), lib.material(false, None));
        scene.attach(GroupKind::Live, mesh).unwrap();
        (scene, lib)
    }

    #[test]
    fn test_capture_attached_meshes() {
        let (scene, _lib) = scene_with_mesh();
        let doc = SceneDocument::capture(&scene, &[]).unwrap();
        assert_eq!(doc.meshes.len(), 1);
        assert_eq!(doc.geometries.len(), 1);
        assert_eq!(doc.materials.len(), 1);
        let pos = &doc.geometries[0].attributes["position"];
        assert_eq!(pos.count, 3);
        assert_eq!(pos.item_size, 3);
        assert!(!doc.meshes[0].ghost);
    }

    #[test]
    fn test_html_embeds_scene() {
        let (scene, _lib) = scene_with_mesh();
        let html = SceneDocument::capture(&scene, &[]).unwrap().to_html().unwrap();
        assert!(html.contains("meshview-scene"));
        assert!(html.contains("\"kind\":\"Mesh\""));
        assert!(!html.contains("{{SCENE_JSON}}"));
    }
}
