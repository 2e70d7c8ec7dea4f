use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::dsl::types::ResourceLocation;
use crate::error::BuildError;
use crate::paths;

// ── Project ─────────────────────────────────────────────────────────

/// Function tags the compiler populates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionTag {
    Load,
    Tick,
}

impl FunctionTag {
    pub fn name(self) -> &'static str {
        match self {
            FunctionTag::Load => "load",
            FunctionTag::Tick => "tick",
        }
    }

    pub fn from_annotation(name: &str) -> Option<FunctionTag> {
        match name {
            "load" => Some(FunctionTag::Load),
            "tick" => Some(FunctionTag::Tick),
            _ => None,
        }
    }
}

/// Command lists and tags produced by one build, keyed by namespaced id.
/// Insertion order is preserved so output is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Project {
    pub namespace: String,
    functions: IndexMap<ResourceLocation, Vec<String>>,
    tags: IndexMap<&'static str, Vec<ResourceLocation>>,
}

#[derive(Serialize)]
struct TagFile {
    values: Vec<String>,
}

impl Project {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            functions: IndexMap::new(),
            tags: IndexMap::new(),
        }
    }

    /// Add or replace a command list.
    pub fn add_function(&mut self, id: ResourceLocation, lines: Vec<String>) {
        self.functions.insert(id, lines);
    }

    pub fn function(&self, id: &ResourceLocation) -> Option<&[String]> {
        self.functions.get(id).map(Vec::as_slice)
    }

    pub fn function_mut(&mut self, id: &ResourceLocation) -> Option<&mut Vec<String>> {
        self.functions.get_mut(id)
    }

    pub fn remove_function(&mut self, id: &ResourceLocation) -> Option<Vec<String>> {
        self.functions.shift_remove(id)
    }

    pub fn functions(&self) -> impl Iterator<Item = (&ResourceLocation, &Vec<String>)> {
        self.functions.iter()
    }

    pub fn functions_mut(&mut self) -> impl Iterator<Item = (&ResourceLocation, &mut Vec<String>)> {
        self.functions.iter_mut()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Register `id` in a function tag. Registering twice is a no-op.
    pub fn tag(&mut self, tag: FunctionTag, id: ResourceLocation) {
        let entries = self.tags.entry(tag.name()).or_default();
        if !entries.contains(&id) {
            entries.push(id);
        }
    }

    /// Put `id` first in a tag.
    pub fn tag_first(&mut self, tag: FunctionTag, id: ResourceLocation) {
        let entries = self.tags.entry(tag.name()).or_default();
        entries.retain(|e| *e != id);
        entries.insert(0, id);
    }

    pub fn tagged(&self, tag: FunctionTag) -> &[ResourceLocation] {
        self.tags.get(tag.name()).map(Vec::as_slice).unwrap_or_default()
    }

    /// Drop tag entries whose function no longer exists.
    pub fn retain_tagged(&mut self) {
        let functions = &self.functions;
        for entries in self.tags.values_mut() {
            entries.retain(|id| functions.contains_key(id));
        }
    }

    /// Write every command list and non-empty tag through `sink`.
    pub fn emit(&self, sink: &mut dyn EmissionSink) -> Result<(), BuildError> {
        for (id, lines) in &self.functions {
            sink.write_asset(
                &id.namespace,
                paths::FUNCTION_CATEGORY,
                &id.path,
                paths::FUNCTION_EXTENSION,
                &lines.join("\n"),
            )?;
        }
        for (name, entries) in &self.tags {
            if entries.is_empty() {
                continue;
            }
            let file = TagFile {
                values: entries.iter().map(ToString::to_string).collect(),
            };
            let json = serde_json::to_string_pretty(&file)?;
            sink.write_asset(
                paths::TAG_NAMESPACE,
                paths::FUNCTION_TAG_CATEGORY,
                name,
                paths::TAG_EXTENSION,
                &json,
            )?;
        }
        Ok(())
    }
}

// ── Emission ────────────────────────────────────────────────────────

/// Destination for generated assets.
pub trait EmissionSink {
    fn write_asset(
        &mut self,
        namespace: &str,
        category: &str,
        path: &str,
        extension: &str,
        content: &str,
    ) -> Result<(), BuildError>;
}

/// Writes `<root>/data/<namespace>/<category>/<path>.<extension>`.
#[derive(Debug, Clone)]
pub struct FsEmitter {
    root: PathBuf,
    written: usize,
}

impl FsEmitter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: 0,
        }
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl EmissionSink for FsEmitter {
    fn write_asset(
        &mut self,
        namespace: &str,
        category: &str,
        path: &str,
        extension: &str,
        content: &str,
    ) -> Result<(), BuildError> {
        let target = paths::asset_path(&self.root, namespace, category, path, extension);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        atomic_write(&target, content.as_bytes())?;
        debug!(path = %target.display(), bytes = content.len(), "wrote asset");
        self.written += 1;
        Ok(())
    }
}

/// Collects assets in memory, keyed by `namespace/category/path.extension`.
#[derive(Debug, Clone, Default)]
pub struct MemoryEmitter {
    pub assets: IndexMap<String, String>,
}

impl MemoryEmitter {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.assets.get(key).map(String::as_str)
    }
}

impl EmissionSink for MemoryEmitter {
    fn write_asset(
        &mut self,
        namespace: &str,
        category: &str,
        path: &str,
        extension: &str,
        content: &str,
    ) -> Result<(), BuildError> {
        self.assets
            .insert(format!("{namespace}/{category}/{path}.{extension}"), content.to_string());
        Ok(())
    }
}

// ── File helpers ────────────────────────────────────────────────────

/// Per-file mutex map to serialize concurrent writes to the same path.
static FILE_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Atomically write bytes to a file using write-to-temp-then-rename.
///
/// A per-file lock keeps concurrent builds into the same directory from
/// racing on the `.tmp` sibling. The lock entry is dropped once no other
/// writer holds it, so the map only holds paths being written.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), BuildError> {
    let lock = FILE_LOCKS
        .lock()
        .entry(path.to_path_buf())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone();
    let result = {
        let _guard = lock.lock();
        write_via_tmp(path, data)
    };

    let mut locks = FILE_LOCKS.lock();
    // The map and this call hold the only references.
    if Arc::strong_count(&lock) == 2 {
        locks.remove(path);
    }
    result
}

fn write_via_tmp(path: &Path, data: &[u8]) -> Result<(), BuildError> {
    let mut tmp_name = OsString::from(path.file_name().unwrap_or_default());
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(&tmp_name);

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, BuildError> {
    let data = fs::read_to_string(path)?;
    let value = serde_json::from_str(&data)?;
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn id(path: &str) -> ResourceLocation {
        ResourceLocation::new("pack", path)
    }

    #[test]
    fn emit_writes_functions_and_tags() {
        let mut project = Project::new("pack");
        project.add_function(id("main"), vec!["say a".into(), "say b".into()]);
        project.add_function(id("loop"), vec!["say tick".into()]);
        project.tag(FunctionTag::Load, id("main"));
        project.tag(FunctionTag::Tick, id("loop"));
        project.tag(FunctionTag::Tick, id("loop"));

        let mut sink = MemoryEmitter::default();
        project.emit(&mut sink).unwrap();

        assert_eq!(sink.get("pack/function/main.mcfunction"), Some("say a\nsay b"));
        let tick: serde_json::Value =
            serde_json::from_str(sink.get("minecraft/tags/function/tick.json").unwrap()).unwrap();
        assert_eq!(tick, serde_json::json!({ "values": ["pack:loop"] }));
    }

    #[test]
    fn tag_first_moves_to_front() {
        let mut project = Project::new("pack");
        project.tag(FunctionTag::Load, id("main"));
        project.tag(FunctionTag::Load, id("init"));
        project.tag_first(FunctionTag::Load, id("init"));
        assert_eq!(project.tagged(FunctionTag::Load), [id("init"), id("main")]);
    }

    #[test]
    fn retain_tagged_drops_missing_functions() {
        let mut project = Project::new("pack");
        project.add_function(id("kept"), vec!["say hi".into()]);
        project.tag(FunctionTag::Tick, id("kept"));
        project.tag(FunctionTag::Tick, id("gone"));
        project.retain_tagged();
        assert_eq!(project.tagged(FunctionTag::Tick), [id("kept")]);
    }

    #[test]
    fn atomic_write_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        assert!(!dir.path().join("out.txt.tmp").exists());
    }

    #[test]
    fn atomic_write_releases_its_lock_entry() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..8).map(|i| dir.path().join(format!("f{i}.txt"))).collect();
        std::thread::scope(|scope| {
            for path in &paths {
                scope.spawn(move || atomic_write(path, b"x").unwrap());
            }
        });
        let _ = atomic_write(&dir.path().join("missing/f.txt"), b"x");

        let locks = FILE_LOCKS.lock();
        assert!(paths.iter().all(|p| !locks.contains_key(p)));
        assert!(!locks.contains_key(&dir.path().join("missing/f.txt")));
    }

    #[test]
    fn fs_emitter_lays_out_data_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut emitter = FsEmitter::new(dir.path());
        emitter
            .write_asset("pack", "function", "__generated__/and_0", "mcfunction", "say x")
            .unwrap();
        let expected = dir.path().join("data/pack/function/__generated__/and_0.mcfunction");
        assert_eq!(fs::read_to_string(expected).unwrap(), "say x");
        assert_eq!(emitter.written(), 1);
    }
}
