//! Mirror failover and rate-limit retry, exercised against in-memory registries.

use std::time::Duration;

use regwatch_registry::{MirroredRegistry, Registry, RetryPolicy, RetryingRegistry};
use regwatch_test::{digest, FakeRegistry, Failure, Operation};

const REPO: &str = "library/alpine";

fn origin() -> FakeRegistry {
    FakeRegistry::new("index.docker.io")
        .with_tag("3.19", digest("3.19"))
        .with_tag("latest", digest("3.19"))
}

// =============================================================================
// Mirror Failover Tests
// =============================================================================

#[tokio::test]
async fn test_mirror_answer_skips_origin() {
    let mirror = FakeRegistry::new("mirror.example.com").with_tag("latest", digest("cached"));
    let registry = MirroredRegistry::new(origin(), Some(mirror));

    let found = registry.resolve_digest(REPO, "latest").await.unwrap();

    assert_eq!(found, digest("cached"));
    assert!(registry.origin().calls().is_empty());
}

#[tokio::test]
async fn test_mirror_error_falls_back_to_origin() {
    let mirror = FakeRegistry::new("mirror.example.com").failing(Failure::Unavailable);
    let registry = MirroredRegistry::new(origin(), Some(mirror));

    let found = registry.resolve_digest(REPO, "latest").await.unwrap();

    assert_eq!(found, digest("3.19"));
    assert_eq!(registry.mirror().unwrap().call_count(Operation::ResolveDigest), 1);
    assert_eq!(registry.origin().call_count(Operation::ResolveDigest), 1);
}

#[tokio::test]
async fn test_mirror_miss_falls_back_to_origin() {
    let mirror = FakeRegistry::new("mirror.example.com").with_tag("edge", digest("edge"));
    let registry = MirroredRegistry::new(origin(), Some(mirror));

    assert_eq!(
        registry.resolve_digest(REPO, "latest").await.unwrap(),
        digest("3.19")
    );
}

#[tokio::test]
async fn test_empty_mirror_tag_list_falls_back_to_origin() {
    let mirror = FakeRegistry::new("mirror.example.com");
    let registry = MirroredRegistry::new(origin(), Some(mirror));

    assert_eq!(
        registry.list_tags(REPO).await.unwrap(),
        vec!["3.19", "latest"]
    );
}

#[tokio::test]
async fn test_origin_failure_is_returned() {
    let mirror = FakeRegistry::new("mirror.example.com").failing(Failure::Unavailable);
    let origin = FakeRegistry::new("index.docker.io").failing(Failure::Unauthorized);
    let registry = MirroredRegistry::new(origin, Some(mirror));

    let err = registry.list_tags(REPO).await.unwrap_err();
    assert!(err.to_string().contains("UNAUTHORIZED"));
}

#[tokio::test]
async fn test_origin_not_found_is_preserved() {
    let registry = MirroredRegistry::new(origin(), None::<FakeRegistry>);

    let err = registry.resolve_digest(REPO, "missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_without_mirror_only_origin_is_used() {
    let registry = MirroredRegistry::new(origin(), None::<FakeRegistry>);

    assert_eq!(registry.name(), "index.docker.io");
    assert_eq!(
        registry.fetch_config(REPO, "3.19").await.unwrap(),
        b"{}".to_vec()
    );
    assert_eq!(registry.origin().calls().len(), 1);
}

// =============================================================================
// Retry Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_rate_limited_calls_are_retried() {
    let registry = RetryingRegistry::new(origin().rate_limited(2), RetryPolicy::default());
    let started = tokio::time::Instant::now();

    let tags = registry.list_tags(REPO).await.unwrap();

    assert_eq!(tags, vec!["3.19", "latest"]);
    assert_eq!(registry.inner().call_count(Operation::ListTags), 3);
    // Two one-second Retry-After hints.
    assert_eq!(started.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_retry_gives_up_after_policy_attempts() {
    let registry = RetryingRegistry::new(origin().rate_limited(100), RetryPolicy::default());

    let err = registry.resolve_digest(REPO, "latest").await.unwrap_err();

    assert!(err.is_rate_limited());
    assert_eq!(registry.inner().call_count(Operation::ResolveDigest), 5);
}

#[tokio::test(start_paused = true)]
async fn test_other_errors_are_not_retried() {
    let registry = RetryingRegistry::new(
        origin().with_failure(Operation::FetchManifest, Failure::Unavailable),
        RetryPolicy::default(),
    );

    assert!(registry.fetch_manifest(REPO, "latest").await.is_err());
    assert_eq!(registry.inner().call_count(Operation::FetchManifest), 1);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_mirror_retries_fall_back_to_origin() {
    let mirror = RetryingRegistry::new(
        FakeRegistry::new("mirror.example.com").rate_limited(100),
        RetryPolicy::default(),
    );
    let origin = RetryingRegistry::new(origin(), RetryPolicy::default());
    let registry = MirroredRegistry::new(origin, Some(mirror));

    let found = registry.resolve_digest(REPO, "latest").await.unwrap();

    assert_eq!(found, digest("3.19"));
    assert_eq!(
        registry
            .mirror()
            .unwrap()
            .inner()
            .call_count(Operation::ResolveDigest),
        5
    );
}
