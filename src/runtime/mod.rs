//! The container runtime this tool drives.
//!
//! [`ContainerRuntime`] is the seam between the extraction pipeline and the
//! daemon that owns images and containers. [`CliRuntime`] implements it on top
//! of a Docker-compatible command line client; tests substitute their own.

mod cli;

pub use cli::{CliRuntime, Engine};

use std::io::Read;

use crate::error::RuntimeError;
use crate::pull::PullStream;
use crate::reference::ImageReference;

/// The four runtime operations an extraction needs.
pub trait ContainerRuntime {
    /// Short identifier used in log lines.
    fn name(&self) -> &str;

    /// Starts pulling `reference` and returns its progress messages.
    ///
    /// The stream ends when the pull is over. Dropping it early must release
    /// the underlying connection or process.
    fn pull_image(&self, reference: &ImageReference) -> Result<PullStream, RuntimeError>;

    /// Creates (never starts) a container named `name` from `image`, with
    /// `command` as its entrypoint. Returns the runtime-assigned id.
    fn create_container(
        &self,
        name: &str,
        image: &str,
        command: &[&str],
    ) -> Result<String, RuntimeError>;

    /// Returns the container filesystem as a tar stream.
    ///
    /// Reaching end of stream surfaces any late runtime failure as an I/O
    /// error. Dropping the reader releases the stream.
    fn export_container(&self, container_id: &str) -> Result<Box<dyn Read>, RuntimeError>;

    /// Force-removes the container.
    fn remove_container(&self, container_id: &str) -> Result<(), RuntimeError>;
}

impl<T: ContainerRuntime + ?Sized> ContainerRuntime for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn pull_image(&self, reference: &ImageReference) -> Result<PullStream, RuntimeError> {
        (**self).pull_image(reference)
    }

    fn create_container(
        &self,
        name: &str,
        image: &str,
        command: &[&str],
    ) -> Result<String, RuntimeError> {
        (**self).create_container(name, image, command)
    }

    fn export_container(&self, container_id: &str) -> Result<Box<dyn Read>, RuntimeError> {
        (**self).export_container(container_id)
    }

    fn remove_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        (**self).remove_container(container_id)
    }
}
