//! Tests for the registry's generation clock and snapshot flattening.

use std::sync::Arc;

use crate::asset::AssetSource;
use crate::asset::Generation;
use crate::asset::LoadedAsset;
use crate::asset::SourceError;
use crate::asset::StaticSource;
use crate::registry::Registry;

fn source(names: &[&str]) -> Arc<StaticSource> {
    let assets = names
        .iter()
        .map(|n| LoadedAsset::data(*n, n.as_bytes().to_vec()))
        .collect();
    Arc::new(StaticSource::new(assets))
}

struct FailingSource;

#[async_trait::async_trait]
impl AssetSource for FailingSource {
    async fn load(&self) -> Result<Vec<LoadedAsset>, SourceError> {
        Err(SourceError("feed unreachable".into()))
    }
}

#[tokio::test]
async fn set_bumps_generation() {
    let registry = Registry::new();
    assert_eq!(registry.generation(), Generation(0));

    registry.set("sdk", source(&["a"])).await;
    assert_eq!(registry.generation(), Generation(1));

    // Replacing the same key is still an effective mutation.
    registry.set("sdk", source(&["b"])).await;
    assert_eq!(registry.generation(), Generation(2));
}

#[tokio::test]
async fn remove_bumps_only_when_present() {
    let registry = Registry::new();
    registry.set("sdk", source(&["a"])).await;
    let before = registry.generation();

    assert!(!registry.remove("missing").await);
    assert_eq!(registry.generation(), before);

    assert!(registry.remove("sdk").await);
    assert_eq!(registry.generation(), Generation(before.0 + 1));
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn snapshot_preserves_registration_order() {
    let registry = Registry::new();
    registry.set("first", source(&["a", "b"])).await;
    registry.set("second", source(&["c"])).await;

    let snapshot = registry.snapshot().await.unwrap();
    let names: Vec<&str> = snapshot.assets().iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert_eq!(snapshot.generation(), Generation(2));
}

#[tokio::test]
async fn replacement_keeps_registration_slot() {
    let registry = Registry::new();
    registry.set("first", source(&["a"])).await;
    registry.set("second", source(&["b"])).await;
    registry.set("first", source(&["a2"])).await;

    let snapshot = registry.snapshot().await.unwrap();
    let names: Vec<&str> = snapshot.assets().iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["a2", "b"]);
}

#[tokio::test]
async fn snapshot_reports_failing_group() {
    let registry = Registry::new();
    registry.set("good", source(&["a"])).await;
    registry.set("bad", Arc::new(FailingSource)).await;

    let err = registry.snapshot().await.unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("bad"), "missing key in: {}", rendered);
    assert!(rendered.contains("feed unreachable"), "missing cause in: {}", rendered);
}

#[tokio::test]
async fn snapshot_lookup_shadows_earlier_groups() {
    let registry = Registry::new();
    let base = vec![
        LoadedAsset::data("shared", b"old".to_vec()),
        LoadedAsset::data("only-base", b"x".to_vec()),
    ];
    let over = vec![LoadedAsset::data("shared", b"new".to_vec())];
    registry.set("base", Arc::new(StaticSource::new(base))).await;
    registry.set("override", Arc::new(StaticSource::new(over))).await;

    let snapshot = registry.snapshot().await.unwrap();
    // Both entries are present in the flattened view; lookup sees the later one.
    assert_eq!(snapshot.len(), 3);
    let hit = snapshot.get("shared").unwrap();
    assert_eq!(hit.bytes.as_slice(), b"new");
    assert!(snapshot.get("only-base").is_some());
    assert!(snapshot.get("missing").is_none());
}
