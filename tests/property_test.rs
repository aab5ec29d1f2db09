//! Property-based checks for the pure functions: slug idempotence,
//! enricher determinism, and path normalisation.

use proptest::prelude::*;

use taskwing::infrastructure::git::slugify;
use taskwing::services::{deviation_rate, normalize_path, TaskEnricher};

proptest! {
    #[test]
    fn slugify_is_idempotent(input in ".{0,120}") {
        let once = slugify(&input, 50);
        prop_assert_eq!(slugify(&once, 50), once);
    }

    #[test]
    fn slug_is_bounded_and_well_formed(input in ".{0,200}") {
        let slug = slugify(&input, 50);
        prop_assert!(slug.len() <= 50);
        prop_assert!(!slug.starts_with('-'));
        prop_assert!(!slug.ends_with('-'));
        prop_assert!(!slug.contains("--"));
        prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn enricher_is_deterministic(title in "[a-zA-Z ]{0,80}", description in "[a-zA-Z ]{0,200}") {
        let enricher = TaskEnricher::default();
        let a = enricher.enrich(&title, &description);
        let b = enricher.enrich(&title, &description);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn keywords_respect_configured_cap(text in "[a-z ]{0,400}") {
        let enricher = TaskEnricher::default();
        let enrichment = enricher.enrich(&text, "");
        prop_assert!(enrichment.keywords.len() <= 10);
    }

    #[test]
    fn normalization_is_idempotent(path in "[a-zA-Z0-9_./-]{0,60}") {
        let once = normalize_path(&path);
        prop_assert_eq!(normalize_path(&once), once);
    }

    #[test]
    fn deviation_rate_is_a_rate(
        expected in proptest::collection::vec("[a-z]{1,8}", 0..6),
        actual in proptest::collection::vec("[a-z]{1,8}", 0..6),
    ) {
        let rate = deviation_rate(&expected, &actual);
        prop_assert!((0.0..=1.0).contains(&rate));
    }
}

#[test]
fn normalize_variants_agree() {
    assert_eq!(normalize_path("./a/b"), normalize_path("a/b"));
    assert_eq!(normalize_path("a//b"), normalize_path("a/b"));
}

#[test]
fn identical_sets_have_zero_rate() {
    let files = vec!["a.rs".to_string(), "b.rs".to_string()];
    assert!((deviation_rate(&files, &files) - 0.0).abs() < f64::EPSILON);
}
