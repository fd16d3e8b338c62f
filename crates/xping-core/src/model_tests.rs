//! Tests for the data model (spec.md §3).

use super::*;
use crate::Outcome;

fn sample_environment_info() -> EnvironmentInfo {
    EnvironmentInfo {
        machine_name: "build-agent-1".to_string(),
        operating_system: "linux".to_string(),
        runtime_version: "1.80.0".to_string(),
        framework: "xping-sdk".to_string(),
        environment_name: "CI".to_string(),
        is_ci_environment: true,
        network_metrics: None,
        custom_properties: HashMap::new(),
    }
}

mod retry_metadata_invariant {
    use super::*;

    #[test]
    fn first_attempt_never_reports_passed_on_retry() {
        let retry = RetryMetadata::new(
            1,
            3,
            Outcome::Passed,
            Duration::from_millis(0),
            None,
            "Retry",
        );
        assert!(!retry.passed_on_retry);
    }

    #[test]
    fn later_passing_attempt_reports_passed_on_retry() {
        let retry = RetryMetadata::new(
            2,
            3,
            Outcome::Passed,
            Duration::from_secs(1),
            Some("flaky".to_string()),
            "Retry",
        );
        assert!(retry.passed_on_retry);
    }

    #[test]
    fn later_failing_attempt_does_not_report_passed_on_retry() {
        let retry = RetryMetadata::new(
            2,
            3,
            Outcome::Failed,
            Duration::from_secs(1),
            None,
            "Retry",
        );
        assert!(!retry.passed_on_retry);
    }
}

mod test_metadata {
    use super::*;

    #[test]
    fn set_attribute_is_last_write_wins() {
        let mut metadata = TestMetadata::default();
        metadata.set_attribute("owner", "team-a");
        metadata.set_attribute("owner", "team-b");
        assert_eq!(
            metadata.custom_attributes.get("owner"),
            Some(&"team-b".to_string())
        );
    }

    #[test]
    fn default_metadata_has_no_entries() {
        let metadata = TestMetadata::default();
        assert!(metadata.categories.is_empty());
        assert!(metadata.tags.is_empty());
        assert!(metadata.custom_attributes.is_empty());
        assert!(metadata.description.is_none());
    }
}

mod test_session {
    use super::*;

    #[test]
    fn new_session_starts_uncompleted_with_fresh_id() {
        let session = TestSession::new(sample_environment_info());
        assert!(session.completed_at.is_none());
        assert!(session.total_tests_expected.is_none());
    }

    #[test]
    fn each_session_gets_a_distinct_id() {
        let a = TestSession::new(sample_environment_info());
        let b = TestSession::new(sample_environment_info());
        assert_ne!(a.session_id, b.session_id);
    }
}

mod duration_serialization {
    use super::*;

    #[test]
    fn round_trips_through_json_as_millis() {
        let retry = RetryMetadata::new(
            2,
            3,
            Outcome::Passed,
            Duration::from_millis(1500),
            None,
            "Retry",
        );
        let json = serde_json::to_value(&retry).unwrap();
        assert_eq!(json["delayBetweenRetries"], serde_json::json!(1500));
    }
}
