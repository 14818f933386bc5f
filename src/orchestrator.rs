//! End-to-end "image → rootfs directory" pipeline.
//!
//! [`RootfsExtractor::run`] walks the stages in order:
//! 1. **Pull** the image through the runtime, failing on the first reported error.
//! 2. **Validate** (or create) the destination directory.
//! 3. **Create** a disposable container from the image under a random name.
//! 4. **Export** the container's filesystem and unpack it into the destination.
//! 5. **Remove** the container. This happens on every path once step 3 has
//!    succeeded; a removal failure is only a warning and never replaces the
//!    outcome of the export.
//!
//! Nothing is retried. The first fatal error ends the run.

use std::path::{Path, PathBuf};

use log::debug;

use crate::container::EphemeralContainer;
use crate::destination::ensure_rootfs_dir;
use crate::error::PullerError;
use crate::export::FilesystemExporter;
use crate::notifier::Notifier;
use crate::pull::ImagePuller;
use crate::reference::ImageReference;
use crate::runtime::ContainerRuntime;
use crate::unpack::UnpackStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Pulling,
    Pulled,
    ContainerCreating,
    ContainerCreated,
    Exporting,
    Done,
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub reference: ImageReference,
    /// Id of the disposable container, used for both creation and removal.
    pub container_id: String,
    pub rootfs_dir: PathBuf,
    pub stats: UnpackStats,
}

pub struct RootfsExtractor<R: ContainerRuntime> {
    runtime: R,
    notifier: Notifier,
}

impl<R: ContainerRuntime> RootfsExtractor<R> {
    pub fn new(runtime: R, notifier: Notifier) -> Self {
        Self { runtime, notifier }
    }

    /// Pulls `image` and materializes its root filesystem under `rootfs_dir`.
    pub fn run(&self, image: &str, rootfs_dir: &Path) -> Result<ExtractionReport, PullerError> {
        let mut stage = Stage::Idle;

        advance(&mut stage, Stage::Pulling);
        self.notifier.info(&format!("Starting to pull image {:?}", image));
        let reference = ImagePuller::new(&self.runtime).pull(image)?;
        advance(&mut stage, Stage::Pulled);
        self.notifier.info(&format!("Successfully pulled image {:?}", image));

        let rootfs_dir = ensure_rootfs_dir(rootfs_dir)?;

        advance(&mut stage, Stage::ContainerCreating);
        let container = EphemeralContainer::create(&self.runtime, &reference.to_string())?;
        let container_id = container.id().to_string();
        advance(&mut stage, Stage::ContainerCreated);
        self.notifier.info(&format!(
            "Successfully created a temporary container {:?}",
            container_id
        ));

        advance(&mut stage, Stage::Exporting);
        let exported = FilesystemExporter::new(&self.runtime).export(&container_id, &rootfs_dir);

        match container.remove() {
            Ok(()) => self
                .notifier
                .info(&format!("Successfully removed container {:?}", container_id)),
            Err(err) if !err.is_fatal() => self.notifier.warn(&err.to_string()),
            // Never replaces an export failure.
            Err(err) => {
                exported?;
                return Err(err);
            }
        }

        let stats = exported?;
        advance(&mut stage, Stage::Done);
        self.notifier.finish(&format!(
            "Successfully exported container to {}",
            rootfs_dir.display()
        ));

        Ok(ExtractionReport {
            reference,
            container_id,
            rootfs_dir,
            stats,
        })
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!("{:?} -> {:?}", stage, next);
    *stage = next;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_moves_stage() {
        let mut stage = Stage::Idle;
        advance(&mut stage, Stage::Pulling);
        assert_eq!(stage, Stage::Pulling);
    }
}
