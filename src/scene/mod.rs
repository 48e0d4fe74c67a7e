//! Scene description shared between the asset loader, the part-color engine
//! and the render seam. Material descriptors loaded from one asset are
//! structurally shared between nodes (one handle per source material), so
//! mutation always goes through clone-before-mutate (see `parts`).

pub mod parts;

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;

use crate::settings::{color, Settings};

pub type MaterialHandle = Rc<RefCell<Material>>;

/// Surface-material descriptor as the rendering engine consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// RGBA base color factor.
    pub base_color: [f32; 4],
    pub roughness: f32,
    pub metalness: f32,
    /// True once this copy was cloned for exclusive ownership by one node.
    /// Only owned copies may be mutated.
    pub owned: bool,
    /// Signals the renderer to re-upload the material on the next frame.
    pub needs_refresh: bool,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            roughness: 1.0,
            metalness: 0.0,
            owned: false,
            needs_refresh: false,
        }
    }

    /// Deep copy tagged as exclusively owned by the node that requested it.
    pub fn clone_owned(&self) -> Self {
        Self {
            owned: true,
            ..self.clone()
        }
    }
}

/// Per-node material shape, classified once at load time instead of via
/// runtime type checks on every traversal.
#[derive(Debug, Clone)]
pub enum MaterialBinding {
    Single(MaterialHandle),
    List(Vec<MaterialHandle>),
}

impl MaterialBinding {
    pub fn handles_mut(&mut self) -> impl Iterator<Item = &mut MaterialHandle> {
        match self {
            MaterialBinding::Single(handle) => std::slice::from_mut(handle).iter_mut(),
            MaterialBinding::List(handles) => handles.as_mut_slice().iter_mut(),
        }
    }

    pub fn handles(&self) -> impl Iterator<Item = &MaterialHandle> {
        match self {
            MaterialBinding::Single(handle) => std::slice::from_ref(handle).iter(),
            MaterialBinding::List(handles) => handles.as_slice().iter(),
        }
    }
}

/// Geometry reference the engine resolves to actual buffers. The placeholder
/// scene uses analytic primitives; imported assets reference their mesh.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Cylinder { radius: f32, height: f32 },
    Cuboid { extent: [f32; 3] },
    Sphere { radius: f32 },
    Torus { radius: f32, tube: f32 },
    Imported { mesh_index: usize },
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Mesh {
        geometry: Geometry,
        binding: MaterialBinding,
    },
    /// Grouping/empty/camera nodes; carried for completeness, never recolored.
    Other,
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub position: Vec3,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    /// Where the graph came from (asset path or "placeholder").
    pub source: String,
    nodes: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            nodes: Vec::new(),
        }
    }

    pub fn push(&mut self, node: SceneNode) {
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [SceneNode] {
        &mut self.nodes
    }

    pub fn mesh_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node.kind, NodeKind::Mesh { .. }))
            .count()
    }
}

const PLACEHOLDER_SOURCE: &str = "placeholder";

/// Deterministic synthetic stand-in shown while the real asset is loading or
/// has failed. Node names follow the 4-part naming convention so the part
/// controls keep doing something visible; materials are built per node and
/// already owned, with the currently configured colors baked in.
pub fn placeholder_scene(settings: &Settings) -> SceneGraph {
    let mut graph = SceneGraph::new(PLACEHOLDER_SOURCE);
    let parts: [(&str, Vec3, Geometry, &str); 4] = [
        (
            "Part1002",
            Vec3::ZERO,
            Geometry::Cylinder { radius: 0.8, height: 2.0 },
            &settings.part1_color,
        ),
        (
            "Part2002",
            Vec3::new(3.0, 0.0, 0.0),
            Geometry::Cuboid { extent: [1.5, 1.5, 1.5] },
            &settings.part2_color,
        ),
        (
            "Part3004",
            Vec3::new(-3.0, 0.0, 0.0),
            Geometry::Sphere { radius: 1.0 },
            &settings.part3_color,
        ),
        (
            "Part4004",
            Vec3::new(0.0, 3.0, 0.0),
            Geometry::Torus { radius: 0.8, tube: 0.2 },
            &settings.part4_color,
        ),
    ];

    for (name, position, geometry, part_color) in parts {
        let mut material = Material::new(format!("{name}_mat"));
        material.owned = true;
        material.roughness = settings.roughness.clamp(0.0, 1.0);
        material.metalness = settings.metalness.clamp(0.0, 1.0);
        if let Some([r, g, b]) = color::parse_hex(part_color) {
            material.base_color = [r, g, b, 1.0];
        }
        graph.push(SceneNode {
            name: name.to_string(),
            position,
            kind: NodeKind::Mesh {
                geometry,
                binding: MaterialBinding::Single(Rc::new(RefCell::new(material))),
            },
        });
    }
    graph
}

pub fn is_placeholder(graph: &SceneGraph) -> bool {
    graph.source == PLACEHOLDER_SOURCE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_deterministic() {
        let settings = Settings::defaults();
        let a = placeholder_scene(&settings);
        let b = placeholder_scene(&settings);
        assert_eq!(a.nodes().len(), 4);
        assert_eq!(a.mesh_count(), 4);
        let names: Vec<_> = a.nodes().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["Part1002", "Part2002", "Part3004", "Part4004"]);
        assert_eq!(
            b.nodes().iter().map(|n| n.position).collect::<Vec<_>>(),
            a.nodes().iter().map(|n| n.position).collect::<Vec<_>>(),
        );
        assert!(is_placeholder(&a));
    }

    #[test]
    fn placeholder_uses_configured_part_colors() {
        let mut settings = Settings::defaults();
        settings.part2_color = "#ff0000".to_string();
        let graph = placeholder_scene(&settings);
        let NodeKind::Mesh { binding, .. } = &graph.nodes()[1].kind else {
            panic!("expected mesh node");
        };
        let material = binding.handles().next().unwrap().borrow();
        assert!(material.owned);
        assert!((material.base_color[0] - 1.0).abs() < 1e-6);
        assert!(material.base_color[1].abs() < 1e-6);
    }

    #[test]
    fn clone_owned_tags_the_copy_only() {
        let shared = Material::new("shared");
        let owned = shared.clone_owned();
        assert!(!shared.owned);
        assert!(owned.owned);
        assert_eq!(owned.base_color, shared.base_color);
    }
}
