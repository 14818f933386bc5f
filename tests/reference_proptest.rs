//! Property-based tests for image reference parsing

use image_puller::{ImageReference, PullerError};
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_name_and_tag_round_trip(
        name in "[a-z0-9][a-z0-9./_-]{0,30}",
        tag in "[A-Za-z0-9_.-]{0,20}",
    ) {
        let image = if tag.is_empty() { name.clone() } else { format!("{name}:{tag}") };
        let reference = ImageReference::parse(&image).unwrap();

        prop_assert_eq!(reference.name(), name.as_str());
        prop_assert_eq!(reference.tag(), tag.as_str());
        prop_assert_eq!(reference.to_string(), image);
    }

    #[test]
    fn test_single_colon_always_parses(image in "[^:]{1,20}:[^:]{0,20}") {
        let reference = ImageReference::parse(&image).unwrap();
        let (name, tag) = image.split_once(':').unwrap();
        prop_assert_eq!(reference.name(), name);
        prop_assert_eq!(reference.tag(), tag);
    }

    #[test]
    fn test_tag_without_name_is_rejected(tag in "[^:]{0,20}") {
        let result = ImageReference::parse(&format!(":{tag}"));
        prop_assert!(matches!(result, Err(PullerError::InvalidReference { .. })), "expected InvalidReference, got {:?}", result);
    }

    #[test]
    fn test_two_or_more_colons_are_rejected(
        parts in prop::collection::vec("[^:]{0,10}", 3..6)
    ) {
        let image = parts.join(":");
        let result = ImageReference::parse(&image);
        prop_assert!(matches!(result, Err(PullerError::InvalidReference { .. })), "expected InvalidReference, got {:?}", result);
    }
}
