//! Driving an image pull to completion.

use log::{debug, info};

use crate::error::{PullerError, RuntimeError};
use crate::reference::ImageReference;
use crate::runtime::ContainerRuntime;

/// One unit of pull progress. Only the embedded error is acted upon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullMessage {
    status: String,
    error: Option<String>,
}

impl PullMessage {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: String::new(),
            error: Some(message.into()),
        }
    }

    pub fn text(&self) -> &str {
        &self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Lazy, finite progress messages of a single pull. Not restartable.
pub type PullStream = Box<dyn Iterator<Item = Result<PullMessage, RuntimeError>>>;

/// Parses an image string and pulls it through a [`ContainerRuntime`].
pub struct ImagePuller<R: ContainerRuntime> {
    runtime: R,
}

impl<R: ContainerRuntime> ImagePuller<R> {
    pub fn new(runtime: R) -> Self {
        Self { runtime }
    }

    /// Pulls `image` (`name[:tag]`) and returns the parsed reference.
    ///
    /// Every progress message is consumed until the stream closes. The first
    /// message carrying an error aborts the pull; the stream is dropped at
    /// that point, which releases it without reading the rest.
    pub fn pull(&self, image: &str) -> Result<ImageReference, PullerError> {
        let reference = ImageReference::parse(image)?;
        let failed = |source: RuntimeError| PullerError::PullFailed {
            image: image.to_string(),
            source,
        };

        info!("Pulling {} via {}", reference, self.runtime.name());
        let stream = self.runtime.pull_image(&reference).map_err(failed)?;

        let mut messages = 0usize;
        for message in stream {
            let message = message.map_err(failed)?;
            if let Some(error) = message.error_message() {
                return Err(failed(RuntimeError::Reported(error.to_string())));
            }
            messages += 1;
            debug!("pull {}: {}", reference, message.text());
        }

        debug!("Pull of {} finished after {} messages", reference, messages);
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Read;
    use std::rc::Rc;

    /// Runtime whose pull replays canned messages and counts how many were read.
    struct ScriptedPull {
        messages: Vec<Result<PullMessage, String>>,
        consumed: Rc<Cell<usize>>,
        refuse: bool,
    }

    impl ScriptedPull {
        fn new(messages: Vec<Result<PullMessage, String>>) -> Self {
            Self {
                messages,
                consumed: Rc::new(Cell::new(0)),
                refuse: false,
            }
        }
    }

    impl ContainerRuntime for ScriptedPull {
        fn name(&self) -> &str {
            "scripted"
        }

        fn pull_image(&self, _reference: &ImageReference) -> Result<PullStream, RuntimeError> {
            if self.refuse {
                return Err(RuntimeError::Reported("daemon unreachable".to_string()));
            }
            let consumed = Rc::clone(&self.consumed);
            let messages = self.messages.clone();
            Ok(Box::new(messages.into_iter().map(move |message| {
                consumed.set(consumed.get() + 1);
                message.map_err(RuntimeError::Reported)
            })))
        }

        fn create_container(&self, _: &str, _: &str, _: &[&str]) -> Result<String, RuntimeError> {
            unreachable!("pull never creates containers")
        }

        fn export_container(&self, _: &str) -> Result<Box<dyn Read>, RuntimeError> {
            unreachable!("pull never exports")
        }

        fn remove_container(&self, _: &str) -> Result<(), RuntimeError> {
            unreachable!("pull never removes")
        }
    }

    #[test]
    fn test_pull_consumes_whole_stream() {
        let runtime = ScriptedPull::new(vec![
            Ok(PullMessage::status("Pulling from library/alpine")),
            Ok(PullMessage::status("Digest: sha256:abc")),
            Ok(PullMessage::status("Status: Downloaded newer image")),
        ]);
        let consumed = Rc::clone(&runtime.consumed);

        let reference = ImagePuller::new(&runtime).pull("alpine:3.19").unwrap();
        assert_eq!(reference, ImageReference::new("alpine", "3.19"));
        assert_eq!(consumed.get(), 3);
    }

    #[test]
    fn test_pull_stops_at_first_embedded_error() {
        let runtime = ScriptedPull::new(vec![
            Ok(PullMessage::status("Pulling fs layer")),
            Ok(PullMessage::error("manifest unknown")),
            Ok(PullMessage::status("never read")),
        ]);
        let consumed = Rc::clone(&runtime.consumed);

        let err = ImagePuller::new(&runtime).pull("repo/app:1.2").unwrap_err();
        match err {
            PullerError::PullFailed { image, source } => {
                assert_eq!(image, "repo/app:1.2");
                assert_eq!(source.to_string(), "manifest unknown");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(consumed.get(), 2);
    }

    #[test]
    fn test_pull_transport_error_is_pull_failure() {
        let runtime = ScriptedPull::new(vec![
            Ok(PullMessage::status("Pulling fs layer")),
            Err("connection reset".to_string()),
        ]);

        let err = ImagePuller::new(&runtime).pull("alpine").unwrap_err();
        assert!(matches!(err, PullerError::PullFailed { .. }));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_pull_refused_by_runtime() {
        let mut runtime = ScriptedPull::new(Vec::new());
        runtime.refuse = true;

        let err = ImagePuller::new(&runtime).pull("alpine").unwrap_err();
        assert!(err.to_string().contains("daemon unreachable"));
    }

    #[test]
    fn test_invalid_reference_never_reaches_runtime() {
        let mut runtime = ScriptedPull::new(Vec::new());
        runtime.refuse = true;

        let err = ImagePuller::new(&runtime).pull("a:b:c").unwrap_err();
        assert!(matches!(err, PullerError::InvalidReference { .. }));
    }

    #[test]
    fn test_empty_stream_is_success() {
        let runtime = ScriptedPull::new(Vec::new());
        assert!(ImagePuller::new(&runtime).pull("busybox").is_ok());
    }
}
