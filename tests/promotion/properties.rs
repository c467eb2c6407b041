//! End-to-end properties of promote and rollback.

use std::collections::BTreeSet;
use std::sync::Arc;

use artifact_promote::interfaces::{FileType, StorageService};
use artifact_promote::{PromoteRequest, PromoteResult};

use crate::common::*;

fn assert_disjoint(result: &PromoteResult) {
    assert!(result.pending_paths.is_disjoint(&result.completed_paths));
    assert!(result.pending_paths.is_disjoint(&result.skipped_paths));
    assert!(result.completed_paths.is_disjoint(&result.skipped_paths));
}

#[tokio::test]
async fn test_empty_paths_promotes_whole_listing() {
    let world = World::new().await;
    let listing: BTreeSet<String> = world
        .storage
        .list(&staging(), true, FileType::File)
        .await
        .unwrap()
        .into_iter()
        .collect();

    let result = world
        .orchestrator()
        .promote(PromoteRequest::new(staging(), releases()))
        .await
        .unwrap();

    assert!(result.succeeded());
    assert_disjoint(&result);
    let accounted: BTreeSet<String> = result
        .completed_paths
        .union(&result.skipped_paths)
        .cloned()
        .collect();
    assert_eq!(accounted, listing);
}

#[tokio::test]
async fn test_metadata_always_skipped() {
    let world = World::new().await;
    let result = world
        .orchestrator()
        .promote(PromoteRequest::new(staging(), releases()).with_fail_when_exists(true))
        .await
        .unwrap();

    assert!(result.succeeded());
    assert_eq!(result.completed_paths, set(&[JAR, POM]));
    assert_eq!(result.skipped_paths, set(&[JAR_SHA1, METADATA, METADATA_MD5]));
    for path in [JAR_SHA1, METADATA, METADATA_MD5] {
        assert!(world.storage.content(&releases(), path).await.is_none());
    }
}

#[tokio::test]
async fn test_metadata_skipped_even_into_read_only_target() {
    let world = World::new().await;
    world.storage.set_read_only(&releases(), true).await;

    let result = world
        .orchestrator()
        .promote(
            PromoteRequest::new(staging(), releases())
                .with_paths([METADATA, METADATA_MD5, JAR_SHA1])
                .with_fail_when_exists(true),
        )
        .await
        .unwrap();

    assert!(result.succeeded());
    assert_eq!(result.skipped_paths, set(&[METADATA, METADATA_MD5, JAR_SHA1]));
    assert!(result.pending_paths.is_empty() && result.completed_paths.is_empty());
    assert_eq!(world.storage.copy_calls().await, 0);
}

#[tokio::test]
async fn test_dry_run_is_a_no_op() {
    let world = World::new().await;
    let source_before = world.storage.snapshot(&staging()).await;

    let result = world
        .orchestrator()
        .promote(
            PromoteRequest::new(staging(), releases())
                .with_dry_run(true)
                .with_purge_source(true),
        )
        .await
        .unwrap();

    assert!(result.succeeded());
    assert_eq!(result.pending_paths, set(&[JAR, POM]));
    assert!(result.completed_paths.is_empty());
    assert!(world.storage.snapshot(&releases()).await.is_empty());
    assert_eq!(world.storage.snapshot(&staging()).await, source_before);
}

#[tokio::test]
async fn test_collision_without_fail_when_exists_keeps_first_content() {
    let world = World::new().await;
    world.storage.insert(&releases(), JAR, "first").await;

    let result = world
        .orchestrator()
        .promote(PromoteRequest::new(staging(), releases()).with_paths([JAR, POM]))
        .await
        .unwrap();

    assert!(result.succeeded());
    assert_eq!(result.completed_paths, set(&[POM]));
    assert_eq!(result.skipped_paths, set(&[JAR]));
    assert_eq!(world.storage.content(&releases(), JAR).await.unwrap(), b"first");
}

#[tokio::test]
async fn test_collision_with_fail_when_exists_leaves_no_partial_write() {
    let world = World::new().await;
    world.storage.insert(&releases(), POM, "first").await;

    let result = world
        .orchestrator()
        .promote(
            PromoteRequest::new(staging(), releases())
                .with_paths([JAR, POM])
                .with_fail_when_exists(true),
        )
        .await
        .unwrap();

    assert!(!result.succeeded());
    assert!(result.completed_paths.is_empty());
    assert_eq!(result.pending_paths, set(&[JAR, POM]));
    assert!(world.storage.content(&releases(), JAR).await.is_none());
    assert_eq!(world.storage.content(&releases(), POM).await.unwrap(), b"first");
}

#[tokio::test]
async fn test_failed_transfer_keeps_metadata_skipped() {
    let world = World::new().await;
    world.storage.insert(&releases(), POM, "first").await;

    let result = world
        .orchestrator()
        .promote(
            PromoteRequest::new(staging(), releases())
                .with_paths([JAR, POM, METADATA, JAR_SHA1])
                .with_fail_when_exists(true),
        )
        .await
        .unwrap();

    assert!(!result.succeeded());
    assert_disjoint(&result);
    assert_eq!(result.pending_paths, set(&[JAR, POM]));
    assert_eq!(result.skipped_paths, set(&[METADATA, JAR_SHA1]));
    assert!(result.completed_paths.is_empty());
    assert!(world.storage.content(&releases(), METADATA).await.is_none());
}

#[tokio::test]
async fn test_promote_then_rollback_restores_both_sides() {
    let world = World::new().await;
    world.storage.insert(&releases(), "existing/x/1/x-1.jar", "x").await;
    let target_before = world.storage.snapshot(&releases()).await;
    let source_before = world.storage.snapshot(&staging()).await;

    let orchestrator = world.orchestrator();
    let promoted = orchestrator
        .promote(PromoteRequest::new(staging(), releases()).with_purge_source(true))
        .await
        .unwrap();
    assert!(promoted.succeeded());
    assert!(world.storage.content(&staging(), JAR).await.is_none());

    let rolled_back = orchestrator.rollback(promoted).await;

    assert!(rolled_back.succeeded());
    assert_disjoint(&rolled_back);
    assert_eq!(rolled_back.pending_paths, set(&[JAR, POM]));
    assert!(rolled_back.completed_paths.is_empty());
    assert_eq!(world.storage.snapshot(&releases()).await, target_before);
    assert_eq!(world.storage.snapshot(&staging()).await, source_before);
}

#[tokio::test]
async fn test_overlapping_fail_when_exists_promotions_conflict() {
    let world = World::new().await;
    let gated = Arc::new(GatedStorage::new(Arc::clone(&world.storage)));
    let orchestrator = Arc::new(world.orchestrator_over(Arc::clone(&gated) as _));

    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            orchestrator
                .promote(
                    PromoteRequest::new(staging(), releases())
                        .with_paths([JAR, POM])
                        .with_fail_when_exists(true),
                )
                .await
        })
    };
    gated.entered().await;

    let second = orchestrator
        .promote(
            PromoteRequest::new(staging(), releases())
                .with_paths([POM])
                .with_fail_when_exists(true)
                .with_tracking_id("second"),
        )
        .await
        .unwrap();

    assert!(second.error.as_deref().unwrap().contains("Conflict detected"));
    assert!(second.completed_paths.is_empty());
    assert!(world.storage.snapshot(&releases()).await.is_empty());

    gated.open();
    let first = first.await.unwrap().unwrap();
    assert!(first.succeeded());
    assert_eq!(first.completed_paths, set(&[JAR, POM]));
    assert_eq!(world.storage.copy_calls().await, 1);
}

#[tokio::test]
async fn test_overlap_without_fail_when_exists_is_not_guarded() {
    let world = World::new().await;
    let gated = Arc::new(GatedStorage::new(Arc::clone(&world.storage)));
    let orchestrator = Arc::new(world.orchestrator_over(Arc::clone(&gated) as _));

    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            orchestrator
                .promote(PromoteRequest::new(staging(), releases()).with_paths([JAR]))
                .await
        })
    };
    gated.entered().await;

    let second = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            orchestrator
                .promote(PromoteRequest::new(staging(), releases()).with_paths([JAR]))
                .await
        })
    };
    gated.entered().await;
    gated.open();

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert!(first.succeeded() && second.succeeded());
    assert_eq!(world.storage.copy_calls().await, 2);
}
