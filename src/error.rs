use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KdeDevError {
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("{0}")]
    Precondition(String),
    #[error("failed to run command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error(
        "error running command: {command}\nexit code: {status_code}\nerror output: {stderr}"
    )]
    CommandFailed {
        command: String,
        status_code: i32,
        stderr: String,
    },
    #[error(
        "the file '{}' does not exist in the development container; run `kde-dev init` first",
        path.display()
    )]
    NotInitialized { path: PathBuf },
    #[error("no Exec= line found in {}", path.display())]
    MissingExecLine { path: PathBuf },
    #[error("interrupted by user")]
    Interrupted,
    #[error("{step} failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<KdeDevError>,
    },
}

impl KdeDevError {
    /// Strips step wrappers to reach the error that actually occurred.
    pub fn root(&self) -> &KdeDevError {
        match self {
            KdeDevError::Step { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self.root(), KdeDevError::Interrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failure_names_command_code_and_stderr() {
        let err = KdeDevError::CommandFailed {
            command: "sudo mkdir -p /var/local/kde-dev/home".to_string(),
            status_code: 1,
            stderr: "permission denied".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("sudo mkdir -p /var/local/kde-dev/home"));
        assert!(text.contains("exit code: 1"));
        assert!(text.contains("permission denied"));
    }

    #[test]
    fn root_unwraps_nested_steps() {
        let err = KdeDevError::Step {
            step: "outer",
            source: Box::new(KdeDevError::Step {
                step: "inner",
                source: Box::new(KdeDevError::Interrupted),
            }),
        };
        assert!(err.is_interrupted());
        assert!(err.to_string().starts_with("outer failed: inner failed"));
    }
}
