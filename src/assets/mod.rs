//! Packaged asset loading: binary glTF product models and the panoramic HDR
//! environment image. Model loads run off the frame loop, so the import
//! result is a plain `Send` structure; the scene graph with its shared
//! material handles is wired up on the main thread (`ModelImport::into_scene`).

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use glam::Vec3;

use crate::scene::{Geometry, Material, MaterialBinding, NodeKind, SceneGraph, SceneNode};

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to import glTF {path}: {source}")]
    Gltf {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("model {path} contains no drawable nodes")]
    EmptyScene { path: String },
    #[error("failed to decode HDR environment {path}: {source}")]
    Hdr {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Packaged model directory convention, relative to the manifest dir.
pub fn model_path(asset_file: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("assets")
        .join("models")
        .join(asset_file)
}

/// The single packaged environment panorama.
pub fn hdri_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("assets")
        .join("hdri")
        .join("studio_small_09_1k.hdr")
}

/// Thread-transferable import result. Material sharing is still expressed as
/// indices here; handles only exist once the graph is built on the main thread.
#[derive(Debug, Clone)]
pub struct ModelImport {
    pub source: String,
    pub materials: Vec<Material>,
    pub nodes: Vec<ImportedNode>,
}

#[derive(Debug, Clone)]
pub struct ImportedNode {
    pub name: String,
    pub position: Vec3,
    pub mesh: Option<ImportedMesh>,
}

#[derive(Debug, Clone)]
pub struct ImportedMesh {
    pub mesh_index: usize,
    /// One entry per primitive; `None` selects the asset's default material.
    pub material_indices: Vec<Option<usize>>,
}

impl ModelImport {
    /// Build the runtime scene graph. One handle is created per source
    /// material and shared by every node that references it, which is exactly
    /// the aliasing the part-color engine's clone-before-mutate rule guards.
    pub fn into_scene(self) -> SceneGraph {
        let handles: Vec<_> = self
            .materials
            .into_iter()
            .map(|material| Rc::new(RefCell::new(material)))
            .collect();
        let default_handle = Rc::new(RefCell::new(Material::new("default")));

        let mut graph = SceneGraph::new(self.source);
        for node in self.nodes {
            let kind = match node.mesh {
                Some(mesh) if !mesh.material_indices.is_empty() => {
                    let mut bound: Vec<_> = mesh
                        .material_indices
                        .iter()
                        .map(|index| match index {
                            Some(i) => handles
                                .get(*i)
                                .cloned()
                                .unwrap_or_else(|| default_handle.clone()),
                            None => default_handle.clone(),
                        })
                        .collect();
                    let binding = if bound.len() == 1 {
                        MaterialBinding::Single(bound.remove(0))
                    } else {
                        MaterialBinding::List(bound)
                    };
                    NodeKind::Mesh {
                        geometry: Geometry::Imported { mesh_index: mesh.mesh_index },
                        binding,
                    }
                }
                _ => NodeKind::Other,
            };
            graph.push(SceneNode {
                name: node.name,
                position: node.position,
                kind,
            });
        }
        graph
    }
}

/// Import a packaged glTF/GLB model into the transferable representation.
pub fn load_model(path: &Path) -> Result<ModelImport, AssetError> {
    let display = path.display().to_string();
    let (document, _buffers, _images) = gltf::import(path).map_err(|source| AssetError::Gltf {
        path: display.clone(),
        source,
    })?;

    let materials = document
        .materials()
        .enumerate()
        .map(|(index, material)| {
            let pbr = material.pbr_metallic_roughness();
            let mut out = Material::new(
                material
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("material_{index}")),
            );
            out.base_color = pbr.base_color_factor();
            out.roughness = pbr.roughness_factor();
            out.metalness = pbr.metallic_factor();
            out
        })
        .collect();

    let mut nodes = Vec::new();
    let mut drawable = 0usize;
    for node in document.nodes() {
        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node_{}", node.index()));
        let (translation, _rotation, _scale) = node.transform().decomposed();
        let position = Vec3::from(translation);
        let mesh = node.mesh().map(|mesh| ImportedMesh {
            mesh_index: mesh.index(),
            material_indices: mesh
                .primitives()
                .map(|primitive| primitive.material().index())
                .collect(),
        });
        if mesh.is_some() {
            drawable += 1;
        }
        nodes.push(ImportedNode { name, position, mesh });
    }

    if drawable == 0 {
        return Err(AssetError::EmptyScene { path: display });
    }

    log::info!(
        "Imported model {display}: {} nodes ({} drawable), {} materials",
        nodes.len(),
        drawable,
        document.materials().len()
    );
    Ok(ModelImport {
        source: display,
        materials,
        nodes,
    })
}

/// Decoded Radiance-HDR panorama for the environment background.
#[derive(Debug, Clone)]
pub struct HdriImage {
    pub width: u32,
    pub height: u32,
    /// Interleaved linear RGB.
    pub pixels: Vec<f32>,
}

impl HdriImage {
    pub fn mean_luminance(&self) -> f32 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        let sum: f32 = self
            .pixels
            .chunks_exact(3)
            .map(|rgb| 0.2126 * rgb[0] + 0.7152 * rgb[1] + 0.0722 * rgb[2])
            .sum();
        sum / (self.pixels.len() / 3) as f32
    }
}

pub fn load_hdri(path: &Path) -> Result<HdriImage, AssetError> {
    let display = path.display().to_string();
    let decoded = image::open(path)
        .map_err(|source| AssetError::Hdr {
            path: display,
            source,
        })?
        .into_rgb32f();
    let (width, height) = decoded.dimensions();
    Ok(HdriImage {
        width,
        height,
        pixels: decoded.into_raw(),
    })
}
