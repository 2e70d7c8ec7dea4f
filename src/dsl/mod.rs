#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod ast;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod error;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod lexer;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod parser;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod types;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod builtins;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod condition;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod lookup;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod semantic;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod compiler;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod optimize;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod vm;

use tracing::debug;

use crate::project::Project;
use ast::Script;
use compiler::{CompileOptions, Compiler};
use error::{DiagnosticSink, Diagnostics};
use lookup::DataLookup;

/// Result of compiling one source. The project is always produced from the
/// best-effort tree; callers decide what errors in `diagnostics` mean.
#[derive(Debug)]
pub struct Compilation {
    pub project: Project,
    pub diagnostics: Diagnostics,
}

/// Lex, parse and check a source without generating commands.
pub fn analyze(source: &str, lookup: &dyn DataLookup) -> (Script, Diagnostics) {
    let mut diagnostics = Diagnostics::default();
    let (tokens, lex_errors) = lexer::lex(source);
    debug!(tokens = tokens.len(), errors = lex_errors.len(), "Lexed source");
    for error in lex_errors {
        diagnostics.report(error);
    }

    let script = parser::parse(tokens, &mut diagnostics);
    debug!(statements = script.body.len(), diagnostics = diagnostics.errors.len(), "Parsed source");

    let checked = semantic::check(&script, lookup);
    debug!(diagnostics = checked.errors.len(), "Checked source");
    diagnostics.extend(checked);
    (script, diagnostics)
}

/// Compile a source string into a project:
/// source → lex → parse → check → generate → optimize.
///
/// Front-end errors do not stop generation: nodes that failed to resolve
/// produce no commands and the rest of the script still compiles.
pub fn compile_source(source: &str, options: &CompileOptions, lookup: &dyn DataLookup) -> Compilation {
    let (script, mut diagnostics) = analyze(source, lookup);
    let mut compiler = Compiler::new(options.clone());
    let errors = compiler.add_script(&script);
    let project = compiler.finish();
    debug!(functions = project.function_count(), errors = errors.len(), "Generated commands");
    for error in errors {
        diagnostics.report(error);
    }
    Compilation { project, diagnostics }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dsl::lookup::{NoLookup, StaticRegistry};
    use crate::dsl::types::ResourceLocation;

    fn options() -> CompileOptions {
        CompileOptions {
            namespace: "demo".into(),
            ..CompileOptions::default()
        }
    }

    fn main_of(result: &Compilation) -> Vec<String> {
        result
            .project
            .function(&ResourceLocation::new("demo", "main"))
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    #[test]
    fn valid_source_produces_a_project() {
        let result = compile_source("var k = 1\nsay \"hi\"", &options(), &NoLookup);
        assert!(result.diagnostics.errors.is_empty());
        assert_eq!(main_of(&result), ["scoreboard players set $k datascript 1", "say hi"]);
    }

    #[test]
    fn front_end_errors_still_generate_the_rest() {
        let result = compile_source("say \"hi\"\nmissing += 1\nsay \"after\"", &options(), &NoLookup);
        assert!(result.diagnostics.has_errors());
        assert_eq!(main_of(&result), ["say hi", "say after"]);

        let result = compile_source("var k = 1\nk += \"x\"\nsay \"after\"", &options(), &NoLookup);
        assert!(result.diagnostics.has_errors());
        assert_eq!(main_of(&result), ["scoreboard players set $k datascript 1", "say after"]);
    }

    #[test]
    fn generation_is_total_over_broken_trees() {
        let src = "say \"a\"\nvar n = nope + 1\nlet s: int = \"text\"\nif x > { say \"never\" }\nfunction f { say \"one\" }\nfunction f { say \"two\" }\nq *= @a\ngive @s\nsay \"z\"";
        let result = compile_source(src, &options(), &NoLookup);
        assert!(result.diagnostics.error_count() >= 4);
        let main = main_of(&result);
        assert_eq!(main.first().map(String::as_str), Some("say a"));
        assert_eq!(main.last().map(String::as_str), Some("say z"));
        assert!(main.iter().all(|line| !line.contains("never")));
        assert!(result.project.function(&ResourceLocation::new("demo", "f")).is_some());
    }

    #[test]
    fn generation_errors_are_reported() {
        let result = compile_source("var k = 1\nsay k", &options(), &NoLookup);
        assert_eq!(result.diagnostics.error_count(), 1);
        assert_eq!(main_of(&result), ["scoreboard players set $k datascript 1"]);
    }

    #[test]
    fn warnings_still_build() {
        let registry: StaticRegistry = serde_json::from_str(r#"{"entries": {"item": ["diamond"]}}"#).unwrap();
        let result = compile_source("give @s minecraft:gem", &options(), &registry);
        assert!(!result.diagnostics.has_errors());
        assert_eq!(result.diagnostics.errors.len(), 1);
        assert_eq!(main_of(&result), ["give @s minecraft:gem"]);
    }
}
