//! Tests for the Retry Detector (C4).

use super::*;

mod attribute_name_matching {
    use super::*;

    #[test]
    fn recognizes_known_attribute_case_insensitively() {
        assert!(is_known_retry_attribute("retry"));
        assert!(is_known_retry_attribute("RetryFact"));
        assert!(is_known_retry_attribute("FLAKYTEST"));
    }

    #[test]
    fn rejects_unrelated_attribute_names() {
        assert!(!is_known_retry_attribute("Fact"));
        assert!(!is_known_retry_attribute("Theory"));
    }
}

mod display_name_parsing {
    use super::*;

    #[test]
    fn parses_attempt_with_total() {
        let pos = detect_from_display_name("AddTwo (attempt 2 of 3)").unwrap();
        assert_eq!(pos.attempt_number, 2);
        assert_eq!(pos.max_retries, Some(3));
    }

    #[test]
    fn parses_attempt_without_total() {
        let pos = detect_from_display_name("AddTwo (attempt 4)").unwrap();
        assert_eq!(pos.attempt_number, 4);
        assert_eq!(pos.max_retries, None);
    }

    #[test]
    fn parses_bracketed_retry_form() {
        let pos = detect_from_display_name("AddTwo [Retry 2/5]").unwrap();
        assert_eq!(pos.attempt_number, 2);
        assert_eq!(pos.max_retries, Some(5));
    }

    #[test]
    fn non_retried_display_name_yields_none() {
        assert_eq!(detect_from_display_name("AddTwo(2, 3)"), None);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let pos = detect_from_display_name("AddTwo (ATTEMPT 1)").unwrap();
        assert_eq!(pos.attempt_number, 1);
    }
}

mod sequence_tracking {
    use super::*;

    #[test]
    fn tracks_highest_attempt_seen_per_fingerprint() {
        let tracker = RetrySequenceTracker::new();
        assert_eq!(tracker.observe("fp-1", 1), 1);
        assert_eq!(tracker.observe("fp-1", 3), 3);
        assert_eq!(tracker.observe("fp-1", 2), 3);
    }

    #[test]
    fn fingerprints_are_tracked_independently() {
        let tracker = RetrySequenceTracker::new();
        tracker.observe("fp-1", 5);
        assert_eq!(tracker.observe("fp-2", 1), 1);
    }
}

/// A minimal fixture descriptor exercising [`DetectRetryMetadata`]'s
/// default-returns-None and pattern-matched paths, standing in for a
/// real framework adapter's own descriptor type.
mod descriptor_tests {
    use super::*;
    use crate::Outcome;

    struct FixtureDescriptor {
        display_name: &'static str,
        retry_attribute_name: Option<&'static str>,
        attempt_number: Option<u32>,
        max_retries: Option<u32>,
    }

    impl RetryDescriptor for FixtureDescriptor {
        fn display_name(&self) -> &str {
            self.display_name
        }

        fn retry_attribute_name(&self) -> Option<&str> {
            self.retry_attribute_name
        }

        fn attempt_number(&self) -> Option<u32> {
            self.attempt_number
        }

        fn max_retries(&self) -> Option<u32> {
            self.max_retries
        }

        fn delay_between_retries(&self) -> std::time::Duration {
            std::time::Duration::from_secs(0)
        }

        fn retry_reason(&self) -> Option<String> {
            None
        }
    }

    fn non_retried() -> FixtureDescriptor {
        FixtureDescriptor {
            display_name: "AddTwo(2, 3)",
            retry_attribute_name: None,
            attempt_number: None,
            max_retries: None,
        }
    }

    #[test]
    fn first_attempt_with_no_recognized_signal_returns_none() {
        let detector: RetryDetector<FixtureDescriptor> = RetryDetector::new();
        let descriptor = non_retried();
        assert_eq!(detector.detect(&descriptor, "fp-1", Outcome::Passed), None);
    }

    #[test]
    fn unknown_attribute_name_alone_is_not_a_retry_signal() {
        let detector: RetryDetector<FixtureDescriptor> = RetryDetector::new();
        let descriptor = FixtureDescriptor {
            retry_attribute_name: Some("Fact"),
            ..non_retried()
        };
        assert_eq!(detector.detect(&descriptor, "fp-1", Outcome::Passed), None);
    }

    #[test]
    fn known_attribute_name_yields_retry_metadata() {
        let detector: RetryDetector<FixtureDescriptor> = RetryDetector::new();
        let descriptor = FixtureDescriptor {
            retry_attribute_name: Some("RetryFact"),
            attempt_number: Some(2),
            max_retries: Some(3),
            ..non_retried()
        };
        let metadata = detector.detect(&descriptor, "fp-1", Outcome::Passed).unwrap();
        assert_eq!(metadata.attempt_number, 2);
        assert_eq!(metadata.max_retries, 3);
        assert!(metadata.passed_on_retry);
        assert_eq!(metadata.retry_attribute_name, "RetryFact");
    }

    #[test]
    fn display_name_pattern_is_the_fallback_signal() {
        let detector: RetryDetector<FixtureDescriptor> = RetryDetector::new();
        let descriptor = FixtureDescriptor {
            display_name: "AddTwo (attempt 2 of 4)",
            ..non_retried()
        };
        let metadata = detector.detect(&descriptor, "fp-1", Outcome::Failed).unwrap();
        assert_eq!(metadata.attempt_number, 2);
        assert_eq!(metadata.max_retries, 4);
        assert!(!metadata.passed_on_retry);
    }

    #[test]
    fn descriptor_attempt_counter_takes_priority_over_display_name() {
        let detector: RetryDetector<FixtureDescriptor> = RetryDetector::new();
        let descriptor = FixtureDescriptor {
            display_name: "AddTwo (attempt 9)",
            attempt_number: Some(2),
            ..non_retried()
        };
        let metadata = detector.detect(&descriptor, "fp-1", Outcome::Passed).unwrap();
        assert_eq!(metadata.attempt_number, 2);
    }

    #[test]
    fn max_retries_falls_back_to_the_highest_attempt_observed_so_far() {
        let detector: RetryDetector<FixtureDescriptor> = RetryDetector::new();
        let first = FixtureDescriptor {
            attempt_number: Some(1),
            ..non_retried()
        };
        let second = FixtureDescriptor {
            attempt_number: Some(3),
            ..non_retried()
        };
        detector.detect(&first, "fp-1", Outcome::Failed);
        let metadata = detector.detect(&second, "fp-1", Outcome::Passed).unwrap();
        assert_eq!(metadata.max_retries, 2);
    }
}
