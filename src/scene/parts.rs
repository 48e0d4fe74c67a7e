//! Part-color resolution: one traversal that binds configured part colors to
//! recognized sub-objects and applies the global material parameters, without
//! ever mutating a material that is still shared between nodes.

use std::cell::RefCell;
use std::rc::Rc;

use crate::model::ModelVariant;
use crate::scene::{MaterialHandle, NodeKind, SceneGraph};
use crate::settings::{color, Settings};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionStats {
    pub nodes_visited: usize,
    pub materials_updated: usize,
    pub parts_colored: usize,
    pub skipped: usize,
}

/// Apply roughness/metalness and per-part color overrides to every drawable
/// node of the scene. A failure on one node or material descriptor is logged
/// and skipped; the rest of the traversal continues.
pub fn resolve_part_colors(
    scene: &mut SceneGraph,
    variant: &ModelVariant,
    settings: &Settings,
) -> ResolutionStats {
    let mut stats = ResolutionStats::default();
    for node in scene.nodes_mut() {
        stats.nodes_visited += 1;
        let part = variant.match_part(&node.name);
        let binding = match &mut node.kind {
            NodeKind::Mesh { binding, .. } => binding,
            NodeKind::Other => continue,
        };
        for handle in binding.handles_mut() {
            apply_to_material(handle, node.name.as_str(), part, settings, &mut stats);
        }
    }
    stats
}

fn apply_to_material(
    handle: &mut MaterialHandle,
    node_name: &str,
    part: Option<crate::model::PartId>,
    settings: &Settings,
    stats: &mut ResolutionStats,
) {
    // Clone-before-mutate: the original handle may back other nodes loaded
    // from the same asset. Ownership is acquired exactly once per node slot.
    if !handle.borrow().owned {
        let clone = handle.borrow().clone_owned();
        *handle = Rc::new(RefCell::new(clone));
    }
    let mut material = handle.borrow_mut();

    apply_unit_param(&mut material.roughness, settings.roughness, "roughness", node_name);
    apply_unit_param(&mut material.metalness, settings.metalness, "metalness", node_name);

    if let Some(part) = part {
        let configured = settings.part_color(part);
        if !configured.is_empty() {
            match color::parse_hex(configured) {
                Some([r, g, b]) => {
                    let alpha = material.base_color[3];
                    material.base_color = [r, g, b, alpha];
                    stats.parts_colored += 1;
                }
                None => {
                    log::warn!(
                        "Skipping color for node {node_name:?}: unparsable value {configured:?}"
                    );
                    stats.skipped += 1;
                }
            }
        }
    }

    material.needs_refresh = true;
    stats.materials_updated += 1;
}

/// Clamp into [0,1]; non-finite input leaves the previous value untouched.
fn apply_unit_param(target: &mut f32, value: f32, label: &str, node_name: &str) {
    if value.is_finite() {
        *target = value.clamp(0.0, 1.0);
    } else {
        log::warn!("Keeping previous {label} on {node_name:?}: non-finite input");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelCatalog;
    use crate::scene::{Geometry, Material, MaterialBinding, SceneNode};

    fn mesh_node(name: &str, binding: MaterialBinding) -> SceneNode {
        SceneNode {
            name: name.to_string(),
            position: glam::Vec3::ZERO,
            kind: NodeKind::Mesh {
                geometry: Geometry::Imported { mesh_index: 0 },
                binding,
            },
        }
    }

    fn shared(material: Material) -> MaterialHandle {
        Rc::new(RefCell::new(material))
    }

    fn four_part_variant() -> ModelVariant {
        ModelCatalog::builtin().get("4-part.glb").unwrap().clone()
    }

    #[test]
    fn pattern_matching_assigns_slots() {
        let mut settings = Settings::defaults();
        settings.part1_color = "#ff0000".to_string();
        settings.part4_color = "#0000ff".to_string();
        let mut scene = SceneGraph::new("test");
        scene.push(mesh_node(
            "Part1002_mesh",
            MaterialBinding::Single(shared(Material::new("a"))),
        ));
        scene.push(mesh_node(
            "part4004",
            MaterialBinding::Single(shared(Material::new("b"))),
        ));
        scene.push(mesh_node(
            "unrelated_prop",
            MaterialBinding::Single(shared(Material::new("c"))),
        ));

        let stats = resolve_part_colors(&mut scene, &four_part_variant(), &settings);
        assert_eq!(stats.nodes_visited, 3);
        assert_eq!(stats.parts_colored, 2);
        assert_eq!(stats.skipped, 0);

        let colors: Vec<[f32; 4]> = scene
            .nodes()
            .iter()
            .map(|node| {
                let NodeKind::Mesh { binding, .. } = &node.kind else { unreachable!() };
                binding.handles().next().unwrap().borrow().base_color
            })
            .collect();
        assert_eq!(colors[0], [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(colors[1], [0.0, 0.0, 1.0, 1.0]);
        // Unmatched node keeps its base color but still receives the global params.
        assert_eq!(colors[2], [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn shared_originals_are_never_mutated() {
        let settings = Settings::defaults();
        let original = shared(Material::new("shared_mat"));
        let mut scene = SceneGraph::new("test");
        scene.push(mesh_node("Part1002", MaterialBinding::Single(original.clone())));
        scene.push(mesh_node("Part2002", MaterialBinding::Single(original.clone())));

        resolve_part_colors(&mut scene, &four_part_variant(), &settings);

        let before = original.borrow();
        assert!(!before.owned);
        assert!(!before.needs_refresh);
        assert_eq!(before.base_color, [1.0, 1.0, 1.0, 1.0]);

        for node in scene.nodes() {
            let NodeKind::Mesh { binding, .. } = &node.kind else { unreachable!() };
            let handle = binding.handles().next().unwrap();
            assert!(!Rc::ptr_eq(handle, &original));
            let clone = handle.borrow();
            assert!(clone.owned);
            assert!(clone.needs_refresh);
        }
    }

    #[test]
    fn already_owned_material_is_not_recloned() {
        let settings = Settings::defaults();
        let mut owned = Material::new("m");
        owned.owned = true;
        let handle = shared(owned);
        let mut scene = SceneGraph::new("test");
        scene.push(mesh_node("Part1002", MaterialBinding::Single(handle.clone())));
        resolve_part_colors(&mut scene, &four_part_variant(), &settings);
        let NodeKind::Mesh { binding, .. } = &scene.nodes()[0].kind else { unreachable!() };
        assert!(Rc::ptr_eq(binding.handles().next().unwrap(), &handle));
    }

    #[test]
    fn material_lists_are_processed_per_descriptor() {
        let mut settings = Settings::defaults();
        settings.part3_color = "#00ff00".to_string();
        let mut scene = SceneGraph::new("test");
        scene.push(mesh_node(
            "Part3004_multi",
            MaterialBinding::List(vec![shared(Material::new("a")), shared(Material::new("b"))]),
        ));
        let stats = resolve_part_colors(&mut scene, &four_part_variant(), &settings);
        assert_eq!(stats.materials_updated, 2);
        assert_eq!(stats.parts_colored, 2);
    }

    #[test]
    fn global_params_clamped_and_non_finite_retained() {
        let mut settings = Settings::defaults();
        settings.roughness = 7.0;
        settings.metalness = f32::NAN;
        let handle = shared(Material {
            metalness: 0.25,
            ..Material::new("m")
        });
        let mut scene = SceneGraph::new("test");
        scene.push(mesh_node("whatever", MaterialBinding::Single(handle)));
        resolve_part_colors(&mut scene, &four_part_variant(), &settings);
        let NodeKind::Mesh { binding, .. } = &scene.nodes()[0].kind else { unreachable!() };
        let material = binding.handles().next().unwrap().borrow();
        assert_eq!(material.roughness, 1.0);
        assert_eq!(material.metalness, 0.25);
    }

    #[test]
    fn bad_color_skips_node_but_traversal_continues() {
        let mut settings = Settings::defaults();
        settings.part1_color = "#nothex".to_string();
        settings.part2_color = "#123456".to_string();
        let mut scene = SceneGraph::new("test");
        scene.push(mesh_node("Part1002", MaterialBinding::Single(shared(Material::new("a")))));
        scene.push(mesh_node("Part2002", MaterialBinding::Single(shared(Material::new("b")))));
        let stats = resolve_part_colors(&mut scene, &four_part_variant(), &settings);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.parts_colored, 1);
        assert_eq!(stats.materials_updated, 2);
    }

    #[test]
    fn empty_configured_color_leaves_slot_alone() {
        let mut settings = Settings::defaults();
        settings.part1_color = String::new();
        let mut scene = SceneGraph::new("test");
        scene.push(mesh_node("Part1002", MaterialBinding::Single(shared(Material::new("a")))));
        let stats = resolve_part_colors(&mut scene, &four_part_variant(), &settings);
        assert_eq!(stats.parts_colored, 0);
        let NodeKind::Mesh { binding, .. } = &scene.nodes()[0].kind else { unreachable!() };
        assert_eq!(binding.handles().next().unwrap().borrow().base_color, [1.0; 4]);
    }

    #[test]
    fn non_mesh_nodes_are_ignored() {
        let settings = Settings::defaults();
        let mut scene = SceneGraph::new("test");
        scene.push(SceneNode {
            name: "Part1002_null".to_string(),
            position: glam::Vec3::ZERO,
            kind: NodeKind::Other,
        });
        let stats = resolve_part_colors(&mut scene, &four_part_variant(), &settings);
        assert_eq!(stats.nodes_visited, 1);
        assert_eq!(stats.materials_updated, 0);
    }

    #[test]
    fn two_part_variant_ignores_four_part_names() {
        let settings = Settings::defaults();
        let variant = ModelCatalog::builtin().get("2-part.glb").unwrap().clone();
        let mut scene = SceneGraph::new("test");
        scene.push(mesh_node("Part3004", MaterialBinding::Single(shared(Material::new("a")))));
        let stats = resolve_part_colors(&mut scene, &variant, &settings);
        assert_eq!(stats.parts_colored, 0);
        assert_eq!(variant.match_part("Part3004"), None);
    }
}
