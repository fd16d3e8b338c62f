//! Tests for Configuration (spec.md §3, §6).

use super::*;
use serial_test::serial;

fn valid_config() -> Configuration {
    Configuration {
        api_endpoint: "https://ingest.xping.dev".to_string(),
        api_key: ApiKey::new("secret-key"),
        project_id: "proj-1".to_string(),
        ..Configuration::default()
    }
}

mod validation {
    use super::*;

    #[test]
    fn defaults_alone_fail_validation_on_missing_key_and_endpoint() {
        let config = Configuration::default();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let mut config = valid_config();
        config.api_key = ApiKey::new("");
        assert!(matches!(
            config.validate(),
            Err(ValidationError::Required { field }) if field == "apiKey"
        ));
    }

    #[test]
    fn empty_project_id_is_rejected() {
        let mut config = valid_config();
        config.project_id = String::new();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::Required { field }) if field == "projectId"
        ));
    }

    #[test]
    fn non_http_endpoint_scheme_is_rejected() {
        let mut config = valid_config();
        config.api_endpoint = "ftp://example.com".to_string();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidFormat { field, .. }) if field == "apiEndpoint"
        ));
    }

    #[test]
    fn malformed_endpoint_url_is_rejected() {
        let mut config = valid_config();
        config.api_endpoint = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn batch_size_zero_is_rejected() {
        let mut config = valid_config();
        config.batch_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::OutOfRange { field, .. }) if field == "batchSize"
        ));
    }

    #[test]
    fn batch_size_over_1000_is_rejected() {
        let mut config = valid_config();
        config.batch_size = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn max_retries_over_10_is_rejected() {
        let mut config = valid_config();
        config.max_retries = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn sampling_rate_out_of_bounds_is_rejected() {
        let mut config = valid_config();
        config.sampling_rate = 1.5;
        assert!(config.validate().is_err());

        config.sampling_rate = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn sampling_rate_boundary_values_are_accepted() {
        let mut config = valid_config();
        config.sampling_rate = 0.0;
        assert!(config.validate().is_ok());
        config.sampling_rate = 1.0;
        assert!(config.validate().is_ok());
    }
}

mod defaults {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Configuration::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.flush_interval, Duration::from_secs(30));
        assert_eq!(config.environment, "Local");
        assert!(config.auto_detect_ci_environment);
        assert!(config.enabled);
        assert!(config.capture_stack_traces);
        assert!(config.enable_compression);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(2));
        assert_eq!(config.sampling_rate, 1.0);
        assert_eq!(config.upload_timeout, Duration::from_secs(30));
        assert!(config.collect_network_metrics);
        assert!(!config.enable_offline_queue);
    }
}

mod env_loading {
    use super::*;

    #[test]
    #[serial]
    fn env_vars_override_defaults() {
        std::env::set_var("XPING_APIENDPOINT", "https://ingest.example.com");
        std::env::set_var("XPING_APIKEY", "key-from-env");
        std::env::set_var("XPING_PROJECTID", "proj-env");
        std::env::set_var("XPING_BATCHSIZE", "50");

        let config = Configuration::load().unwrap();
        assert_eq!(config.api_endpoint, "https://ingest.example.com");
        assert_eq!(config.api_key.expose(), "key-from-env");
        assert_eq!(config.project_id, "proj-env");
        assert_eq!(config.batch_size, 50);

        std::env::remove_var("XPING_APIENDPOINT");
        std::env::remove_var("XPING_APIKEY");
        std::env::remove_var("XPING_PROJECTID");
        std::env::remove_var("XPING_BATCHSIZE");
    }

    #[test]
    #[serial]
    fn unparsable_numeric_env_var_retains_default() {
        std::env::set_var("XPING_APIENDPOINT", "https://ingest.example.com");
        std::env::set_var("XPING_APIKEY", "key");
        std::env::set_var("XPING_PROJECTID", "proj");
        std::env::set_var("XPING_BATCHSIZE", "not-a-number");

        let config = Configuration::load().unwrap();
        assert_eq!(config.batch_size, 100);

        std::env::remove_var("XPING_APIENDPOINT");
        std::env::remove_var("XPING_APIKEY");
        std::env::remove_var("XPING_PROJECTID");
        std::env::remove_var("XPING_BATCHSIZE");
    }

    #[test]
    #[serial]
    fn missing_required_fields_fail_load() {
        std::env::remove_var("XPING_APIENDPOINT");
        std::env::remove_var("XPING_APIKEY");
        std::env::remove_var("XPING_PROJECTID");

        assert!(Configuration::load().is_err());
    }

    #[test]
    fn iso8601_seconds_form_parses() {
        assert_eq!(parse_iso8601_seconds("PT30S"), Some(30));
        assert_eq!(parse_iso8601_seconds("garbage"), None);
    }
}

mod secrecy {
    use super::*;

    #[test]
    fn debug_output_never_contains_api_key() {
        let config = valid_config();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn serialized_output_never_contains_api_key() {
        let config = valid_config();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret-key"));
    }
}
