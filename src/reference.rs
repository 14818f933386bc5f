use std::fmt;
use std::str::FromStr;

use crate::error::PullerError;

/// Name/tag pair identifying the image to pull.
///
/// Parsed from a single `name[:tag]` string. An empty tag means the registry
/// default (usually `latest`) is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    name: String,
    tag: String,
}

impl ImageReference {
    /// Splits `name[:tag]` on `:`.
    ///
    /// Fails if the name is empty or the input has more than one colon. A registry with
    /// an explicit port (`host:5000/app`) therefore cannot be expressed, which
    /// matches the single-separator format this tool accepts.
    pub fn parse(image: &str) -> Result<Self, PullerError> {
        let chunks: Vec<&str> = image.split(':').collect();
        match chunks.as_slice() {
            [""] | ["", _] => Err(PullerError::InvalidReference {
                image: image.to_string(),
                reason: "image name must be non-empty".to_string(),
            }),
            [name] => Ok(Self::new(*name, "")),
            [name, tag] => Ok(Self::new(*name, *tag)),
            _ => Err(PullerError::InvalidReference {
                image: image.to_string(),
                reason: "expected <image:tag>".to_string(),
            }),
        }
    }

    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Empty when the registry default applies.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn has_tag(&self) -> bool {
        !self.tag.is_empty()
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_tag() {
            write!(f, "{}:{}", self.name, self.tag)
        } else {
            f.write_str(&self.name)
        }
    }
}

impl FromStr for ImageReference {
    type Err = PullerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_and_tag() {
        let reference = ImageReference::parse("repo/app:1.2").unwrap();
        assert_eq!(reference.name(), "repo/app");
        assert_eq!(reference.tag(), "1.2");
        assert_eq!(reference.to_string(), "repo/app:1.2");
    }

    #[test]
    fn test_parse_without_tag() {
        let reference = ImageReference::parse("alpine").unwrap();
        assert_eq!(reference.name(), "alpine");
        assert_eq!(reference.tag(), "");
        assert!(!reference.has_tag());
        assert_eq!(reference.to_string(), "alpine");
    }

    #[test]
    fn test_parse_trailing_colon_keeps_empty_tag() {
        let reference = ImageReference::parse("busybox:").unwrap();
        assert_eq!(reference.name(), "busybox");
        assert!(!reference.has_tag());
    }

    #[test]
    fn test_parse_rejects_empty() {
        let err = ImageReference::parse("").unwrap_err();
        assert!(matches!(err, PullerError::InvalidReference { .. }));
        assert!(err.to_string().contains("non-empty"));
    }

    #[test]
    fn test_parse_rejects_tag_without_name() {
        let err = ImageReference::parse(":latest").unwrap_err();
        assert!(matches!(err, PullerError::InvalidReference { .. }));
        assert!(err.to_string().contains("non-empty"));
    }

    #[test]
    fn test_parse_rejects_two_colons() {
        let err = ImageReference::parse("registry:5000/app:1.0").unwrap_err();
        assert!(matches!(err, PullerError::InvalidReference { .. }));
        assert!(err.to_string().contains("registry:5000/app:1.0"));
    }

    #[test]
    fn test_from_str() {
        let reference: ImageReference = "nginx:1.21".parse().unwrap();
        assert_eq!(reference, ImageReference::new("nginx", "1.21"));
    }
}
