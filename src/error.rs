//! Error types for each step of a rootfs extraction.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Failures of a run, one variant per step.
///
/// Everything except [`PullerError::ContainerRemove`] aborts the run.
#[derive(Error, Debug)]
pub enum PullerError {
    /// image string is empty or has more than one `:`
    #[error("invalid image name {image:?}: {reason}")]
    InvalidReference { image: String, reason: String },

    /// the runtime reported an error while pulling, or the transport broke
    #[error("failed to pull image {image:?}: {source}")]
    PullFailed {
        image: String,
        #[source]
        source: RuntimeError,
    },

    /// rootfs path is not a directory or cannot be created
    #[error("invalid rootfs directory {}: {reason}", .path.display())]
    DestinationInvalid { path: PathBuf, reason: String },

    #[error("failed to create container {name:?} from image {image:?}: {source}")]
    ContainerCreate {
        name: String,
        image: String,
        #[source]
        source: RuntimeError,
    },

    #[error("failed to export container {container_id:?}: {source}")]
    Export {
        container_id: String,
        #[source]
        source: RuntimeError,
    },

    #[error("failed to untar the content of container {container_id:?}: {source}")]
    Unpack {
        container_id: String,
        #[source]
        source: UnpackError,
    },

    /// cleanup only; logged, never fatal
    #[error("unable to remove the temporary container {container_id:?}: {source}")]
    ContainerRemove {
        container_id: String,
        #[source]
        source: RuntimeError,
    },
}

impl PullerError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PullerError::ContainerRemove { .. })
    }
}

/// Failures reported by a [`crate::runtime::ContainerRuntime`].
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("failed to execute `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program} {command}` exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("stream error: {0}")]
    Stream(#[from] io::Error),

    /// error message embedded in the runtime's own output
    #[error("{0}")]
    Reported(String),
}

/// Failures while turning an archive stream into a directory tree.
#[derive(Error, Debug)]
pub enum UnpackError {
    #[error("malformed archive: {0}")]
    Archive(#[source] io::Error),

    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("refusing to unpack entry {}: {reason}", .path.display())]
    UnsafePath { path: PathBuf, reason: &'static str },
}

impl UnpackError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        UnpackError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_remove_is_non_fatal() {
        let remove = PullerError::ContainerRemove {
            container_id: "abc".to_string(),
            source: RuntimeError::Reported("gone".to_string()),
        };
        assert!(!remove.is_fatal());

        let export = PullerError::Export {
            container_id: "abc".to_string(),
            source: RuntimeError::Reported("boom".to_string()),
        };
        assert!(export.is_fatal());
    }

    #[test]
    fn test_messages_name_step_and_cause() {
        let err = PullerError::PullFailed {
            image: "alpine:3".to_string(),
            source: RuntimeError::Reported("manifest unknown".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "failed to pull image \"alpine:3\": manifest unknown"
        );

        let err = PullerError::DestinationInvalid {
            path: PathBuf::from("/tmp/file"),
            reason: "path is not a directory".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid rootfs directory /tmp/file: path is not a directory"
        );
    }
}
