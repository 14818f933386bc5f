pub mod container;
pub mod destination;
pub mod error;
pub mod export;
pub mod flusher;
pub mod notifier;
pub mod orchestrator;
pub mod pull;
pub mod reference;
pub mod runtime;
pub mod unpack;

// Re-exports for easy access
pub use container::EphemeralContainer;
pub use error::{PullerError, RuntimeError, UnpackError};
pub use export::FilesystemExporter;
pub use notifier::Notifier;
pub use orchestrator::{ExtractionReport, RootfsExtractor, Stage};
pub use pull::{ImagePuller, PullMessage, PullStream};
pub use reference::ImageReference;
pub use runtime::{CliRuntime, ContainerRuntime};
pub use unpack::{unpack, UnpackStats};
