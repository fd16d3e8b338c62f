//! Tests for the Uploader contract (C6).

use super::*;

mod upload_result_constructors {
    use super::*;

    #[test]
    fn success_carries_status_and_receipt() {
        let result = UploadResult::success(5, Some("receipt-1".to_string()));
        assert!(result.success);
        assert_eq!(result.status_code, Some(200));
        assert_eq!(result.receipt_id, Some("receipt-1".to_string()));
        assert_eq!(result.execution_count, 5);
    }

    #[test]
    fn failure_carries_message_and_no_receipt() {
        let result = UploadResult::failure(3, "server unavailable");
        assert!(!result.success);
        assert!(result.receipt_id.is_none());
        assert_eq!(result.error_message, Some("server unavailable".to_string()));
        assert_eq!(result.execution_count, 3);
    }

    #[test]
    fn serializes_with_camel_case_keys_and_omits_absent_fields() {
        let result = UploadResult::failure(0, "boom");
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("executionCount").is_some());
        assert!(json.get("statusCode").is_none());
        assert!(json.get("receiptId").is_none());
    }
}

mod trait_object_safety {
    use super::*;
    use crate::model::EnvironmentInfo;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct AlwaysSucceeds;

    #[async_trait]
    impl Uploader for AlwaysSucceeds {
        async fn upload_session(&self, _session: &TestSession) -> UploadResult {
            UploadResult::success(0, None)
        }

        async fn upload_batch(&self, _session: &TestSession, executions: &[TestExecution]) -> UploadResult {
            UploadResult::success(executions.len() as u64, Some("r1".to_string()))
        }

        async fn close(&self) {}
    }

    #[tokio::test]
    async fn uploader_is_usable_as_a_trait_object() {
        let uploader: Arc<dyn Uploader> = Arc::new(AlwaysSucceeds);
        let session = TestSession::new(EnvironmentInfo {
            machine_name: "m".to_string(),
            operating_system: "linux".to_string(),
            runtime_version: "1.0".to_string(),
            framework: "xping-sdk".to_string(),
            environment_name: "Local".to_string(),
            is_ci_environment: false,
            network_metrics: None,
            custom_properties: HashMap::new(),
        });

        let result = uploader.upload_session(&session).await;
        assert!(result.success);
        uploader.close().await;
    }
}
