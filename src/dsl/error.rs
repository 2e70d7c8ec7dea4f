use serde::Serialize;

use super::ast::Span;

/// A compilation diagnostic with source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileError {
    pub message: String,
    pub span: Span,
    pub kind: ErrorKind,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Lexer,
    Parser,
    Type,
    Semantic,
    Compiler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl CompileError {
    fn new(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            kind,
            severity: Severity::Error,
        }
    }

    pub fn lexer(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Lexer, message, span)
    }

    pub fn parser(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Parser, message, span)
    }

    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Type, message, span)
    }

    pub fn semantic(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Semantic, message, span)
    }

    pub fn compiler(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Compiler, message, span)
    }

    /// Downgrade to a warning. Warnings never fail a build.
    pub fn warning(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Format the error with source context.
    pub fn format_with_source(&self, source: &str) -> String {
        let (line, col) = offset_to_line_col(source, self.span.start);
        format!(
            "[{}] line {}:{}: {}{}",
            match self.kind {
                ErrorKind::Lexer => "lexer",
                ErrorKind::Parser => "parser",
                ErrorKind::Type => "type",
                ErrorKind::Semantic => "semantic",
                ErrorKind::Compiler => "compiler",
            },
            line,
            col,
            if self.is_error() { "" } else { "warning: " },
            self.message,
        )
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CompileError {}

/// Candidate completions for a source range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub span: Span,
    pub candidates: Vec<String>,
}

/// Where the pipeline reports diagnostics and completion candidates.
///
/// Suggestions are always computed; consumers decide whether a cursor falls
/// inside the span.
pub trait DiagnosticSink {
    fn report(&mut self, error: CompileError);

    fn suggest(&mut self, span: Span, candidates: Vec<String>);
}

/// In-memory sink used by the CLI and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub errors: Vec<CompileError>,
    pub suggestions: Vec<Suggestion>,
}

impl Diagnostics {
    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(CompileError::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.errors.iter().filter(|e| e.is_error()).count()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.errors.extend(other.errors);
        self.suggestions.extend(other.suggestions);
    }

    /// Candidates whose span contains `offset`.
    pub fn suggestions_at(&self, offset: usize) -> impl Iterator<Item = &Suggestion> {
        self.suggestions
            .iter()
            .filter(move |s| s.span.start <= offset && offset <= s.span.end)
    }
}

impl DiagnosticSink for Diagnostics {
    fn report(&mut self, error: CompileError) {
        self.errors.push(error);
    }

    fn suggest(&mut self, span: Span, candidates: Vec<String>) {
        if !candidates.is_empty() {
            self.suggestions.push(Suggestion { span, candidates });
        }
    }
}

pub fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_and_column_are_one_based() {
        assert_eq!(offset_to_line_col("ab\ncd", 0), (1, 1));
        assert_eq!(offset_to_line_col("ab\ncd", 4), (2, 2));
    }

    #[test]
    fn format_marks_warnings() {
        let err = CompileError::semantic("Unknown item `x`", Span::new(3, 4)).warning();
        assert_eq!(
            err.format_with_source("say x"),
            "[semantic] line 1:4: warning: Unknown item `x`"
        );
        assert!(!err.is_error());
    }

    #[test]
    fn empty_suggestions_are_dropped() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.suggest(Span::new(0, 1), Vec::new());
        diagnostics.suggest(Span::new(2, 5), vec!["kills".into()]);
        assert_eq!(diagnostics.suggestions.len(), 1);
        assert_eq!(diagnostics.suggestions_at(3).count(), 1);
        assert_eq!(diagnostics.suggestions_at(0).count(), 0);
    }
}
