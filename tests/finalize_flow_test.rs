//! Finalize Flow Integration Tests
//!
//! Drives the verifier against stored objects and checks that provider
//! ground truth, not declared values, decides the outcome.
//!
//! ## Test Coverage
//!
//! - Clean objects finalize with observed size and type
//! - Missing objects report not-found before any policy judgement
//! - Violations use finalize-phase reason codes and leave the object stored
//! - Per-request bounds narrow but never widen configured policy
//! - Finalize is idempotent
//! - Objects stored without a content type fail the type check
//! - Provider outages surface as retryable errors

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use consignr::error::UploadError;
    use consignr::finalize::{FinalizeRequest, FinalizeVerifier};
    use consignr::keys::ObjectKey;
    use consignr::policy::Constraints;
    use consignr::storage::{InMemoryObjectStore, ObjectStat, ObjectStore, StorageError};
    use mockall::mock;
    use std::sync::Arc;
    use std::time::Duration;

    mock! {
        pub Store {}

        #[async_trait]
        impl ObjectStore for Store {
            async fn issue_write_capability(
                &self,
                key: &ObjectKey,
                content_type: &str,
                ttl: Duration,
            ) -> Result<String, StorageError>;

            async fn inspect_object(
                &self,
                key: &ObjectKey,
            ) -> Result<Option<ObjectStat>, StorageError>;
        }
    }

    fn image_constraints() -> Constraints {
        Constraints::new(10 * 1024 * 1024, vec!["image/".to_string()])
    }

    fn stored_key(store: &InMemoryObjectStore, size: i64, content_type: &str) -> ObjectKey {
        let key = ObjectKey::from_string(format!("uploads/avatar/{}", uuid::Uuid::new_v4()));
        store.put_object(&key, size, content_type);
        key
    }

    // ========================================================================
    // TEST: Happy Path
    // ========================================================================

    #[tokio::test]
    async fn test_clean_object_finalizes_with_observed_attributes() {
        let store = InMemoryObjectStore::new();
        let key = stored_key(&store, 2_048, "image/png");
        let verifier = FinalizeVerifier::new(Arc::new(store), image_constraints());

        let finalized = verifier.finalize(&FinalizeRequest::new(key.clone())).await.unwrap();

        assert_eq!(finalized.key, key);
        assert_eq!(finalized.size_bytes, 2_048);
        assert_eq!(finalized.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_finalize_is_idempotent() {
        let store = InMemoryObjectStore::new();
        let key = stored_key(&store, 2_048, "image/png");
        let verifier = FinalizeVerifier::new(Arc::new(store), image_constraints());

        let first = verifier.finalize(&FinalizeRequest::new(key.clone())).await.unwrap();
        let second = verifier.finalize(&FinalizeRequest::new(key)).await.unwrap();
        assert_eq!(first, second);
    }

    // ========================================================================
    // TEST: Missing Object
    // ========================================================================

    #[tokio::test]
    async fn test_missing_object_is_not_found_before_policy() {
        let store = InMemoryObjectStore::new();
        // Constraints nothing could satisfy; not-found must still win
        let verifier = FinalizeVerifier::new(
            Arc::new(store),
            Constraints::new(1, vec!["no-such-prefix/".to_string()]),
        );

        let key = ObjectKey::from_string("uploads/avatar/never-written".to_string());
        let err = verifier.finalize(&FinalizeRequest::new(key)).await.unwrap_err();

        assert!(matches!(err, UploadError::NotFound { .. }));
        assert_eq!(err.reason(), "not-found");
    }

    // ========================================================================
    // TEST: Violations
    // ========================================================================

    #[tokio::test]
    async fn test_oversize_object_is_rejected_and_retained() {
        let store = InMemoryObjectStore::new();
        let key = stored_key(&store, 11 * 1024 * 1024, "image/png");
        let verifier = FinalizeVerifier::new(Arc::new(store.clone()), image_constraints());

        let err = verifier.finalize(&FinalizeRequest::new(key)).await.unwrap_err();

        assert!(matches!(err, UploadError::PolicyViolation(_)));
        assert_eq!(err.reason(), "size-exceeded");
        // The violating object stays put for offline cleanup
        assert_eq!(store.object_count(), 1);
    }

    #[tokio::test]
    async fn test_disallowed_type_is_a_type_mismatch() {
        let store = InMemoryObjectStore::new();
        let key = stored_key(&store, 2_048, "application/zip");
        let verifier = FinalizeVerifier::new(Arc::new(store), image_constraints());

        let err = verifier.finalize(&FinalizeRequest::new(key)).await.unwrap_err();
        assert_eq!(err.reason(), "type-mismatch");
    }

    #[tokio::test]
    async fn test_expected_prefix_tightens_the_type_check() {
        let store = InMemoryObjectStore::new();
        // Passes configured policy (image/) but not the caller's prefix
        let key = stored_key(&store, 2_048, "image/gif");
        let verifier = FinalizeVerifier::new(Arc::new(store), image_constraints());

        let request = FinalizeRequest::new(key).with_expected_mime_prefix("image/png");
        let err = verifier.finalize(&request).await.unwrap_err();
        assert_eq!(err.reason(), "type-mismatch");
    }

    #[tokio::test]
    async fn test_typeless_object_fails_the_type_check() {
        let mut store = MockStore::new();
        store.expect_inspect_object().returning(|_| {
            Ok(Some(ObjectStat {
                size_bytes: 2_048,
                content_type: None,
            }))
        });
        let verifier = FinalizeVerifier::new(Arc::new(store), image_constraints());

        let key = ObjectKey::from_string("uploads/avatar/untyped".to_string());
        let err = verifier.finalize(&FinalizeRequest::new(key)).await.unwrap_err();
        assert_eq!(err.reason(), "type-mismatch");
    }

    // ========================================================================
    // TEST: Narrowing
    // ========================================================================

    #[tokio::test]
    async fn test_request_bound_narrows_the_size_limit() {
        let store = InMemoryObjectStore::new();
        let key = stored_key(&store, 5_000, "image/png");
        let verifier = FinalizeVerifier::new(Arc::new(store), image_constraints());

        let request = FinalizeRequest::new(key).with_max_size(4_096);
        let err = verifier.finalize(&request).await.unwrap_err();
        assert_eq!(err.reason(), "size-exceeded");
    }

    #[tokio::test]
    async fn test_request_bound_cannot_widen_the_size_limit() {
        let store = InMemoryObjectStore::new();
        let key = stored_key(&store, 11 * 1024 * 1024, "image/png");
        let verifier = FinalizeVerifier::new(Arc::new(store), image_constraints());

        // Asking for more than policy allows changes nothing
        let request = FinalizeRequest::new(key).with_max_size(100 * 1024 * 1024);
        let err = verifier.finalize(&request).await.unwrap_err();
        assert_eq!(err.reason(), "size-exceeded");
    }

    // ========================================================================
    // TEST: Provider Failure
    // ========================================================================

    #[tokio::test]
    async fn test_inspection_failure_is_a_retryable_provider_error() {
        let mut store = MockStore::new();
        store
            .expect_inspect_object()
            .returning(|_| Err(StorageError::Unavailable("timed out".to_string())));
        let verifier = FinalizeVerifier::new(Arc::new(store), image_constraints());

        let key = ObjectKey::from_string("uploads/avatar/unreachable".to_string());
        let err = verifier.finalize(&FinalizeRequest::new(key)).await.unwrap_err();

        assert!(matches!(err, UploadError::ProviderUnavailable(_)));
        assert!(err.is_retryable());
    }
}
