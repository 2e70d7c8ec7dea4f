#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::fs;
use std::path::{Path, PathBuf};

use datascript::dsl::types::ResourceLocation;
use datascript::settings::BuildSettings;
use datascript::{compile_files, write_project};

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

fn settings(out: &Path) -> BuildSettings {
    BuildSettings {
        namespace: "arena".into(),
        objective: "ar".into(),
        output_dir: out.to_path_buf(),
        ..BuildSettings::default()
    }
}

fn tag_values(out: &Path, tag: &str) -> Vec<String> {
    let text = fs::read_to_string(out.join(format!("data/minecraft/tags/function/{tag}.json"))).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    json["values"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

#[test]
fn builds_a_pack_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("build");
    let game = write(
        dir.path(),
        "game.ds",
        "var round = 1\n@tick\nfunction tick_round {\n  if round > 0 && round < 10 { say \"playing\" }\n}\n",
    );
    let util = write(dir.path(), "util.ds", "@load\nfunction greet { say \"hello\" }\n");

    let outcome = compile_files(&[game, util], &settings(&out)).unwrap();
    assert_eq!(outcome.error_count(), 0);
    let project = &outcome.project;
    let written = write_project(project, &out).unwrap();
    assert_eq!(written, project.function_count() + 2);

    let main = fs::read_to_string(out.join("data/arena/function/main.mcfunction")).unwrap();
    assert_eq!(main, "scoreboard players set $round ar 1");
    let init = fs::read_to_string(out.join("data/arena/function/__generated__/init.mcfunction")).unwrap();
    assert_eq!(init, "scoreboard objectives add ar dummy");
    assert!(out.join("data/arena/function/tick_round.mcfunction").exists());
    assert!(out.join("data/arena/function/__generated__/and_0.mcfunction").exists());

    assert_eq!(
        tag_values(&out, "load"),
        ["arena:__generated__/init", "arena:greet", "arena:main"]
    );
    assert_eq!(tag_values(&out, "tick"), ["arena:tick_round"]);
}

#[test]
fn errors_are_reported_per_file_and_the_rest_still_builds() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("build");
    let good = write(dir.path(), "good.ds", "say \"fine\"\n");
    let bad = write(dir.path(), "bad.ds", "var k = 1\nk += \"text\"\n");

    let outcome = compile_files(&[good, bad], &settings(&out)).unwrap();
    assert_eq!(outcome.error_count(), 1);
    assert!(outcome.reports[0].diagnostics.errors.is_empty());
    let rendered = outcome.reports[1].rendered();
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].contains("bad.ds: [type] line 2:"));

    assert_eq!(
        outcome.project.function(&ResourceLocation::new("arena", "main")).unwrap(),
        ["say fine", "scoreboard players set $k ar 1"]
    );
    write_project(&outcome.project, &out).unwrap();
    let main = fs::read_to_string(out.join("data/arena/function/main.mcfunction")).unwrap();
    assert_eq!(main, "say fine\nscoreboard players set $k ar 1");
}

#[test]
fn missing_source_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = compile_files(&[dir.path().join("absent.ds")], &settings(dir.path()));
    assert!(matches!(result, Err(datascript::error::BuildError::Io(_))));
}

#[test]
fn registry_warnings_do_not_block_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let registry = write(dir.path(), "registry.json", r#"{"entries": {"item": ["diamond"]}}"#);
    let source = write(dir.path(), "loot.ds", "give @a minecraft:diamond\ngive @a minecraft:ruby\n");
    let settings = BuildSettings {
        registry: Some(registry),
        ..settings(&dir.path().join("build"))
    };

    let outcome = compile_files(&[source], &settings).unwrap();
    let project = &outcome.project;
    let warnings = &outcome.reports[0].diagnostics.errors;
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message, "Unknown item `minecraft:ruby`");
    assert_eq!(project.function_count(), 2);
}
