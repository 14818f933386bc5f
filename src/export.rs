use std::io;
use std::path::Path;

use log::debug;

use crate::error::{PullerError, RuntimeError, UnpackError};
use crate::runtime::ContainerRuntime;
use crate::unpack::{unpack, UnpackStats};

/// Streams a container's filesystem from the runtime into a directory.
pub struct FilesystemExporter<R: ContainerRuntime> {
    runtime: R,
}

impl<R: ContainerRuntime> FilesystemExporter<R> {
    pub fn new(runtime: R) -> Self {
        Self { runtime }
    }

    /// Exports `container_id` and unpacks it into `dest`.
    ///
    /// The export stream is read to its end after the archive is unpacked so
    /// a late runtime failure is still reported, and it is dropped (closed) on
    /// every return path. A runtime failure carried by the stream is an
    /// export error even when the unpacker is the one that hit it.
    pub fn export(&self, container_id: &str, dest: &Path) -> Result<UnpackStats, PullerError> {
        let export_failed = |source: RuntimeError| PullerError::Export {
            container_id: container_id.to_string(),
            source,
        };
        let unpack_failed = |source: UnpackError| PullerError::Unpack {
            container_id: container_id.to_string(),
            source,
        };

        debug!("Exporting container {:?} to {}", container_id, dest.display());
        let mut stream = self
            .runtime
            .export_container(container_id)
            .map_err(export_failed)?;

        let stats = unpack(&mut stream, dest).map_err(|err| match err {
            UnpackError::Archive(source) => match take_runtime_failure(source) {
                Ok(runtime) => export_failed(runtime),
                Err(source) => unpack_failed(UnpackError::Archive(source)),
            },
            UnpackError::Io {
                action,
                path,
                source,
            } => match take_runtime_failure(source) {
                Ok(runtime) => export_failed(runtime),
                Err(source) => unpack_failed(UnpackError::Io {
                    action,
                    path,
                    source,
                }),
            },
            other => unpack_failed(other),
        })?;

        // Trailing zero blocks after the end-of-archive marker.
        let trailing = io::copy(&mut stream, &mut io::sink()).map_err(|e| {
            export_failed(take_runtime_failure(e).unwrap_or_else(RuntimeError::Stream))
        })?;
        if trailing > 0 {
            debug!("Discarded {} trailing bytes of the export stream", trailing);
        }

        Ok(stats)
    }
}

/// Runtime streams report their own failures as `io::Error::other(RuntimeError)`.
fn take_runtime_failure(err: io::Error) -> Result<RuntimeError, io::Error> {
    if !err.get_ref().is_some_and(|inner| inner.is::<RuntimeError>()) {
        return Err(err);
    }
    let kind = err.kind();
    match err.into_inner().map(|inner| inner.downcast::<RuntimeError>()) {
        Some(Ok(runtime)) => Ok(*runtime),
        Some(Err(inner)) => Err(io::Error::new(kind, inner)),
        None => Err(io::Error::from(kind)),
    }
}
