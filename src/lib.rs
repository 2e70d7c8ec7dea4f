pub mod dsl;
pub mod error;
pub mod paths;
pub mod project;
pub mod settings;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use dsl::compiler::Compiler;
use dsl::error::{DiagnosticSink, Diagnostics};
use dsl::lookup::{DataLookup, NoLookup, StaticRegistry};
use error::BuildError;
use project::{FsEmitter, Project};
use settings::BuildSettings;

/// Diagnostics of one source file, with the text they point into.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub path: PathBuf,
    pub source: String,
    pub diagnostics: Diagnostics,
}

impl SourceReport {
    /// Every diagnostic rendered as `path: [kind] line L:C: message`.
    pub fn rendered(&self) -> Vec<String> {
        self.diagnostics
            .errors
            .iter()
            .map(|e| format!("{}: {}", self.path.display(), e.format_with_source(&self.source)))
            .collect()
    }
}

/// Outcome of compiling a set of sources into one namespace.
#[derive(Debug)]
pub struct BuildOutcome {
    pub reports: Vec<SourceReport>,
    /// Generated from the best-effort trees, even when a report has errors.
    pub project: Project,
}

impl BuildOutcome {
    pub fn error_count(&self) -> usize {
        self.reports.iter().map(|r| r.diagnostics.error_count()).sum()
    }
}

/// The registry named by the settings, or a lookup that skips data checks.
pub fn load_lookup(settings: &BuildSettings) -> Result<Box<dyn DataLookup>, BuildError> {
    Ok(match &settings.registry {
        Some(path) => Box::new(StaticRegistry::load(path)?),
        None => Box::new(NoLookup),
    })
}

/// Compile every file into one project. All files are checked before any
/// commands are generated. Errors are reported per file and never stop
/// generation; the caller decides whether to write the result.
pub fn compile_files(files: &[PathBuf], settings: &BuildSettings) -> Result<BuildOutcome, BuildError> {
    let lookup = load_lookup(settings)?;
    let mut reports = Vec::with_capacity(files.len());
    let mut scripts = Vec::with_capacity(files.len());
    for path in files {
        let source = std::fs::read_to_string(path)?;
        let (script, diagnostics) = dsl::analyze(&source, lookup.as_ref());
        debug!(path = %path.display(), diagnostics = diagnostics.errors.len(), "Checked file");
        reports.push(SourceReport { path: path.clone(), source, diagnostics });
        scripts.push(script);
    }
    let mut compiler = Compiler::new(settings.compile_options());
    for (script, report) in scripts.iter().zip(reports.iter_mut()) {
        for error in compiler.add_script(script) {
            report.diagnostics.report(error);
        }
    }
    let project = compiler.finish();
    Ok(BuildOutcome { reports, project })
}

/// Write a project under `out_dir`; returns how many files were written.
pub fn write_project(project: &Project, out_dir: &Path) -> Result<usize, BuildError> {
    let mut emitter = FsEmitter::new(out_dir);
    project.emit(&mut emitter)?;
    info!(
        namespace = %project.namespace,
        functions = project.function_count(),
        files = emitter.written(),
        out = %out_dir.display(),
        "Build finished"
    );
    Ok(emitter.written())
}
