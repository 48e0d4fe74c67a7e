//! Model-variant registry: which packaged assets exist, which part-color
//! slots each one uses, and the node-name patterns that bind a slot to the
//! asset's sub-objects. The pattern table is configuration data, not code;
//! source assets are inconsistent about casing and separators, so each slot
//! carries every spelling observed in the wild.

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PartId {
    Part1,
    Part2,
    Part3,
    Part4,
}

impl PartId {
    pub fn label(self) -> &'static str {
        match self {
            PartId::Part1 => "Part1 Color",
            PartId::Part2 => "Part2 Color",
            PartId::Part3 => "Part3 Color",
            PartId::Part4 => "Part4 Color",
        }
    }
}

/// One bindable color slot: checked against node names in declaration order,
/// first slot with a matching pattern wins.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PartSlot {
    pub slot: PartId,
    pub patterns: Vec<String>,
}

impl PartSlot {
    fn new(slot: PartId, patterns: &[&str]) -> Self {
        Self {
            slot,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Case-insensitive substring match against a node name.
    pub fn matches(&self, node_name: &str) -> bool {
        let name = node_name.to_lowercase();
        self.patterns
            .iter()
            .any(|pattern| name.contains(&pattern.to_lowercase()))
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelVariant {
    /// Catalog key, also the value of `selectedModel` in settings.
    pub id: String,
    /// Human-readable name for the model picker.
    pub label: String,
    /// File name under the packaged model directory.
    pub asset_file: String,
    pub part_slots: Vec<PartSlot>,
}

impl ModelVariant {
    /// Resolve a node name to its part slot, if any.
    pub fn match_part(&self, node_name: &str) -> Option<PartId> {
        self.part_slots
            .iter()
            .find(|slot| slot.matches(node_name))
            .map(|slot| slot.slot)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelCatalog {
    variants: Vec<ModelVariant>,
}

impl ModelCatalog {
    /// The two packaged variants. Not assumed exhaustive; new assets add a
    /// catalog entry, not new code paths.
    pub fn builtin() -> Self {
        Self {
            variants: vec![
                ModelVariant {
                    id: "4-part.glb".to_string(),
                    label: "4-Part Model".to_string(),
                    asset_file: "4-part.glb".to_string(),
                    part_slots: vec![
                        PartSlot::new(PartId::Part1, &["part1002"]),
                        PartSlot::new(PartId::Part2, &["part2002"]),
                        PartSlot::new(PartId::Part3, &["part3004"]),
                        PartSlot::new(PartId::Part4, &["part4004"]),
                    ],
                },
                ModelVariant {
                    id: "2-part.glb".to_string(),
                    label: "2-Part Model".to_string(),
                    asset_file: "2-part.glb".to_string(),
                    part_slots: vec![
                        PartSlot::new(PartId::Part1, &["part1.006", "part1006"]),
                        PartSlot::new(PartId::Part2, &["part2.006", "part2006"]),
                    ],
                },
            ],
        }
    }

    pub fn variants(&self) -> &[ModelVariant] {
        &self.variants
    }

    pub fn get(&self, id: &str) -> Option<&ModelVariant> {
        self.variants.iter().find(|variant| variant.id == id)
    }

    /// Lookup that never fails: an unknown id falls back to the first
    /// catalog entry with a warning.
    pub fn get_or_fallback(&self, id: &str) -> &ModelVariant {
        self.get(id).unwrap_or_else(|| {
            log::warn!("Unknown model id {id:?}; falling back to {:?}", self.variants[0].id);
            &self.variants[0]
        })
    }

    pub fn ids(&self) -> Vec<String> {
        self.variants.iter().map(|variant| variant.id.clone()).collect()
    }
}
