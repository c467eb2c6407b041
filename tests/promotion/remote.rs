//! Re-hydration of uncached content from remote sources.

use artifact_promote::{PromoteRequest, StoreKey};

use crate::common::*;

fn central() -> StoreKey {
    StoreKey::remote("maven", "central")
}

fn origin() -> StoreKey {
    StoreKey::hosted("maven", "central-origin")
}

async fn remote_world() -> World {
    let world = World::new().await;
    world.repositories.register(&central()).await;
    world.storage.create(&central()).await;
    for path in [JAR, POM, JAR_SHA1] {
        world.storage.insert(&origin(), path, format!("upstream {}", path)).await;
    }
    world.content.link_upstream(&central(), &origin()).await;
    world
}

#[tokio::test]
async fn test_uncached_paths_are_fetched_before_copy() {
    let world = remote_world().await;
    world.storage.insert(&central(), POM, format!("upstream {}", POM)).await;

    let result = world
        .orchestrator()
        .with_remote_batch_size(1)
        .promote(PromoteRequest::new(central(), releases()).with_paths([JAR, POM, JAR_SHA1]))
        .await
        .unwrap();

    assert!(result.succeeded());
    assert_eq!(result.completed_paths, set(&[JAR, POM]));
    assert_eq!(result.skipped_paths, set(&[JAR_SHA1]));

    let fetched: Vec<String> = world
        .content
        .fetched()
        .await
        .into_iter()
        .map(|(_, path)| path)
        .collect();
    assert_eq!(fetched, vec![JAR.to_string()]);
    assert_eq!(
        world.storage.content(&releases(), JAR).await.unwrap(),
        format!("upstream {}", JAR).into_bytes()
    );
}

#[tokio::test]
async fn test_checksum_is_skipped_as_metadata_and_never_fetched() {
    let world = remote_world().await;

    let result = world
        .orchestrator()
        .promote(PromoteRequest::new(central(), releases()).with_paths([JAR_SHA1]))
        .await
        .unwrap();

    assert!(result.succeeded());
    assert_eq!(result.skipped_paths, set(&[JAR_SHA1]));
    assert!(world.content.fetched().await.is_empty());
    assert!(world.storage.content(&central(), JAR_SHA1).await.is_none());
}

#[tokio::test]
async fn test_failed_refetch_surfaces_as_transfer_error() {
    let world = remote_world().await;
    let missing = "org/gone/1.0/gone-1.0.jar";

    let result = world
        .orchestrator()
        .promote(PromoteRequest::new(central(), releases()).with_paths([JAR, missing]))
        .await
        .unwrap();

    assert!(result.error.as_deref().unwrap().contains(missing));
    assert!(result.completed_paths.is_empty());
    assert!(world.storage.content(&releases(), JAR).await.is_none());
}
