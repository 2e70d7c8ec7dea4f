use serde::Serialize;

/// Process-level failures of a build. Compiler diagnostics are reported
/// separately through [`crate::dsl::error::CompileError`].
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Build failed with {errors} error(s)")]
    Compile { errors: usize },
}

impl Serialize for BuildError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(BuildError::Compile { errors: 2 }.to_string(), "Build failed with 2 error(s)");
        assert_eq!(
            BuildError::Config("namespace must not be empty".into()).to_string(),
            "Invalid configuration: namespace must not be empty"
        );
    }

    #[test]
    fn io_errors_convert() {
        let err: BuildError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, BuildError::Io(_)));
        assert_eq!(serde_json::to_string(&err).unwrap_or_default(), "\"I/O error: gone\"");
    }
}
