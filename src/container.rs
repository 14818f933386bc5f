//! Disposable containers used only to snapshot an image's filesystem.

use log::{info, warn};
use uuid::Uuid;

use crate::error::PullerError;
use crate::runtime::ContainerRuntime;

/// Entrypoint given to the container. It is never run; it only satisfies the
/// runtime's validation of `create`.
pub const INERT_COMMAND: &[&str] = &["ls"];

/// A created, never-started container that is force-removed exactly once.
///
/// Call [`EphemeralContainer::remove`] to remove it and observe the result.
/// If the value is dropped first (an early `?` return or a panic), the drop
/// performs the removal and logs a failure as a warning.
pub struct EphemeralContainer<'r, R: ContainerRuntime + ?Sized> {
    runtime: &'r R,
    name: String,
    id: Option<String>,
}

impl<'r, R: ContainerRuntime + ?Sized> EphemeralContainer<'r, R> {
    /// Creates a container from `image` under a fresh random name.
    pub fn create(runtime: &'r R, image: &str) -> Result<Self, PullerError> {
        Self::create_named(runtime, &Uuid::new_v4().to_string(), image)
    }

    pub fn create_named(runtime: &'r R, name: &str, image: &str) -> Result<Self, PullerError> {
        let id = runtime
            .create_container(name, image, INERT_COMMAND)
            .map_err(|source| PullerError::ContainerCreate {
                name: name.to_string(),
                image: image.to_string(),
                source,
            })?;

        Ok(Self {
            runtime,
            name: name.to_string(),
            id: Some(id),
        })
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Force-removes the container. Failures are [`PullerError::ContainerRemove`].
    pub fn remove(mut self) -> Result<(), PullerError> {
        match self.id.take() {
            Some(id) => remove_container(self.runtime, id),
            None => Ok(()),
        }
    }
}

fn remove_container<R: ContainerRuntime + ?Sized>(
    runtime: &R,
    container_id: String,
) -> Result<(), PullerError> {
    runtime
        .remove_container(&container_id)
        .map_err(|source| PullerError::ContainerRemove {
            container_id,
            source,
        })
}

impl<R: ContainerRuntime + ?Sized> Drop for EphemeralContainer<'_, R> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            match remove_container(self.runtime, id.clone()) {
                Ok(()) => info!("Successfully removed container {:?}", id),
                Err(err) => warn!("{}", err),
            }
        }
    }
}
