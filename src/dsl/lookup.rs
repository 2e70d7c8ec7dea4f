//! Static game data the semantic pass validates against: registries of known
//! ids and the compound schema of their entries.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{ResourceLocation, TypeKey};
use crate::error::BuildError;
use crate::project::read_json;

pub const ITEM_REGISTRY: &str = "item";
pub const ENTITY_REGISTRY: &str = "entity_type";

pub trait DataLookup {
    /// Whether `id` is registered. `None` when the registry itself is unknown,
    /// in which case no check is made.
    fn has_entry(&self, registry: &str, id: &ResourceLocation) -> Option<bool>;

    /// Every id of a registry, for suggestions.
    fn keys_of(&self, registry: &str) -> Vec<String>;

    /// Compound keys and value types accepted by an entry.
    fn schema_of(&self, registry: &str, id: &ResourceLocation) -> Option<IndexMap<String, TypeKey>>;
}

/// A lookup that knows nothing; every data check is skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

impl DataLookup for NoLookup {
    fn has_entry(&self, _: &str, _: &ResourceLocation) -> Option<bool> {
        None
    }

    fn keys_of(&self, _: &str) -> Vec<String> {
        Vec::new()
    }

    fn schema_of(&self, _: &str, _: &ResourceLocation) -> Option<IndexMap<String, TypeKey>> {
        None
    }
}

/// JSON-backed registry:
///
/// ```json
/// {"entries": {"item": ["minecraft:diamond"]},
///  "schemas": {"entity_type": {"minecraft:zombie": {"NoAI": "byte"}}}}
/// ```
///
/// Ids without a namespace mean `minecraft:`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticRegistry {
    pub entries: IndexMap<String, Vec<String>>,
    pub schemas: IndexMap<String, IndexMap<String, IndexMap<String, String>>>,
}

impl StaticRegistry {
    pub fn load(path: &Path) -> Result<Self, BuildError> {
        let registry: StaticRegistry = read_json(path)?;
        debug!(
            path = %path.display(),
            registries = registry.entries.len(),
            schemas = registry.schemas.len(),
            "Loaded static registry"
        );
        Ok(registry)
    }
}

impl DataLookup for StaticRegistry {
    fn has_entry(&self, registry: &str, id: &ResourceLocation) -> Option<bool> {
        let entries = self.entries.get(registry)?;
        Some(entries.iter().any(|e| ResourceLocation::parse(e) == *id))
    }

    fn keys_of(&self, registry: &str) -> Vec<String> {
        self.entries.get(registry).cloned().unwrap_or_default()
    }

    fn schema_of(&self, registry: &str, id: &ResourceLocation) -> Option<IndexMap<String, TypeKey>> {
        let (_, fields) = self
            .schemas
            .get(registry)?
            .iter()
            .find(|(entry, _)| ResourceLocation::parse(entry) == *id)?;
        // Unknown type names are dropped rather than rejected.
        Some(
            fields
                .iter()
                .filter_map(|(key, ty)| Some((key.clone(), TypeKey::from_name(ty)?)))
                .collect(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registry() -> StaticRegistry {
        serde_json::from_str(
            r#"{
                "entries": {"item": ["minecraft:diamond", "stick"]},
                "schemas": {"entity_type": {"zombie": {"NoAI": "byte", "Health": "float", "Odd": "blob"}}}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn entries_match_with_default_namespace() {
        let reg = registry();
        assert_eq!(reg.has_entry(ITEM_REGISTRY, &ResourceLocation::parse("diamond")), Some(true));
        assert_eq!(reg.has_entry(ITEM_REGISTRY, &ResourceLocation::parse("minecraft:stick")), Some(true));
        assert_eq!(reg.has_entry(ITEM_REGISTRY, &ResourceLocation::parse("pack:gem")), Some(false));
        assert_eq!(reg.has_entry(ENTITY_REGISTRY, &ResourceLocation::parse("zombie")), None);
    }

    #[test]
    fn schema_types_resolve_by_name() {
        let schema = registry()
            .schema_of(ENTITY_REGISTRY, &ResourceLocation::parse("minecraft:zombie"))
            .unwrap();
        assert_eq!(schema.get("NoAI"), Some(&TypeKey::Byte));
        assert_eq!(schema.get("Health"), Some(&TypeKey::Float));
        assert!(!schema.contains_key("Odd"));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, r#"{"entries": {"item": ["apple"]}}"#).unwrap();
        let reg = StaticRegistry::load(&path).unwrap();
        assert_eq!(reg.keys_of(ITEM_REGISTRY), vec!["apple"]);
        assert!(reg.schemas.is_empty());
    }

    #[test]
    fn no_lookup_skips_everything() {
        let id = ResourceLocation::parse("diamond");
        assert_eq!(NoLookup.has_entry(ITEM_REGISTRY, &id), None);
        assert!(NoLookup.schema_of(ITEM_REGISTRY, &id).is_none());
    }
}
