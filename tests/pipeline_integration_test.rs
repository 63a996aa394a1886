//! End-to-end pipeline tests: every build runs synchronously on the inline
//! executor against in-memory stores and a URL-routed mock fetcher, so each
//! test drives a full rebuild and asserts on the terminal status plus the
//! materialized tasks.

mod common;

use std::sync::Arc;

use serde_json::json;

use challenge_core::config::PipelineConfig;
use challenge_core::models::{
    BuildStatus, Challenge, CreationSource, OsmElementType, TaskPriority,
};
use challenge_core::orchestration::{ChallengeBuildOrchestrator, InlineExecutor, RebuildOutcome};
use challenge_core::rules::RuleNode;
use challenge_core::stores::memory::{MemoryChallengeStore, MemoryTaskStore};
use common::MockFetcher;

const OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

struct Harness {
    challenges: Arc<MemoryChallengeStore>,
    tasks: Arc<MemoryTaskStore>,
    fetcher: Arc<MockFetcher>,
    orchestrator: ChallengeBuildOrchestrator,
}

fn harness(max_tasks: usize) -> Harness {
    let config = PipelineConfig {
        max_tasks_per_challenge: max_tasks,
        ..PipelineConfig::default()
    };
    let challenges = Arc::new(MemoryChallengeStore::new());
    let tasks = Arc::new(MemoryTaskStore::new());
    let fetcher = Arc::new(MockFetcher::new());
    let orchestrator = ChallengeBuildOrchestrator::new(
        config,
        challenges.clone(),
        tasks.clone(),
        fetcher.clone(),
        Arc::new(InlineExecutor),
    );
    Harness {
        challenges,
        tasks,
        fetcher,
        orchestrator,
    }
}

fn feature(id: &str, lon: f64, lat: f64) -> serde_json::Value {
    json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": [lon, lat] },
        "properties": { "id": id, "highway": "residential" }
    })
}

fn collection(count: usize) -> String {
    let features: Vec<_> = (0..count)
        .map(|i| feature(&format!("feature-{i}"), i as f64, i as f64))
        .collect();
    json!({ "type": "FeatureCollection", "features": features }).to_string()
}

fn inline_challenge(id: i64, payload: String) -> Challenge {
    let mut challenge = Challenge::new(id, "inline");
    challenge.creation_source = Some(CreationSource::InlineGeoJson(payload));
    challenge
}

#[tokio::test]
async fn test_line_delimited_payload_with_one_bad_line_is_partially_loaded() {
    let h = harness(100);
    // Line index 1 is brace-delimited but not valid JSON
    let payload = format!(
        "{}\n{}\n{}",
        feature("a", 1.0, 1.0),
        "{\"type\": \"Feature\", broken}",
        feature("c", 3.0, 3.0),
    );
    h.challenges.insert(inline_challenge(1, payload));

    let outcome = h.orchestrator.rebuild_tasks(1, false).await.unwrap();
    assert_eq!(outcome, RebuildOutcome::Scheduled);

    let (status, message) = h.challenges.status_of(1).unwrap();
    assert_eq!(status, BuildStatus::PartiallyLoaded);
    assert!(message.unwrap().contains('1'));
    assert_eq!(h.tasks.tasks_for(1).len(), 2);
}

#[tokio::test]
async fn test_feature_collection_builds_ready() {
    let h = harness(100);
    h.challenges.insert(inline_challenge(1, collection(3)));

    h.orchestrator.rebuild_tasks(1, false).await.unwrap();

    let (status, message) = h.challenges.status_of(1).unwrap();
    assert_eq!(status, BuildStatus::Ready);
    assert_eq!(message, None);
    let tasks = h.tasks.tasks_for(1);
    assert_eq!(tasks.len(), 3);
    assert_eq!(tasks[0].name, "feature-0");
    assert_eq!(h.challenges.refresh_log(), vec![(1, false)]);
}

#[tokio::test]
async fn test_feature_without_geometry_degrades_to_partially_loaded() {
    let h = harness(100);
    let payload = json!({
        "type": "FeatureCollection",
        "features": [
            feature("a", 1.0, 1.0),
            { "type": "Feature", "geometry": null, "properties": { "id": "b" } },
        ]
    })
    .to_string();
    h.challenges.insert(inline_challenge(1, payload));

    h.orchestrator.rebuild_tasks(1, false).await.unwrap();

    let (status, message) = h.challenges.status_of(1).unwrap();
    assert_eq!(status, BuildStatus::PartiallyLoaded);
    assert!(message.unwrap().contains("1 of 2"));
    assert_eq!(h.tasks.tasks_for(1).len(), 1);
}

#[tokio::test]
async fn test_capacity_exceeded_fails_with_zero_tasks() {
    let h = harness(5);
    h.challenges.insert(inline_challenge(1, collection(6)));

    h.orchestrator.rebuild_tasks(1, false).await.unwrap();

    let (status, message) = h.challenges.status_of(1).unwrap();
    assert_eq!(status, BuildStatus::Failed);
    assert!(message.unwrap().contains("limit is 5"));
    assert!(h.tasks.tasks_for(1).is_empty());
}

#[tokio::test]
async fn test_capacity_boundary_is_inclusive() {
    let h = harness(5);
    h.challenges.insert(inline_challenge(1, collection(5)));

    h.orchestrator.rebuild_tasks(1, false).await.unwrap();

    let (status, _) = h.challenges.status_of(1).unwrap();
    assert_eq!(status, BuildStatus::Ready);
    assert_eq!(h.tasks.tasks_for(1).len(), 5);
}

#[tokio::test]
async fn test_reingestion_updates_in_place() {
    let h = harness(100);
    h.challenges.insert(inline_challenge(1, collection(4)));

    h.orchestrator.rebuild_tasks(1, false).await.unwrap();
    h.orchestrator.rebuild_tasks(1, false).await.unwrap();

    let (status, _) = h.challenges.status_of(1).unwrap();
    assert_eq!(status, BuildStatus::Ready);
    // Names are stable, so the second run upserts instead of duplicating
    assert_eq!(h.tasks.tasks_for(1).len(), 4);
}

#[tokio::test]
async fn test_rebuild_while_building_is_rejected() {
    let h = harness(100);
    let mut challenge = inline_challenge(1, collection(1));
    challenge.build_status = BuildStatus::Building;
    h.challenges.insert(challenge);

    let outcome = h.orchestrator.rebuild_tasks(1, false).await.unwrap();
    assert_eq!(outcome, RebuildOutcome::AlreadyBuilding);
    assert!(h.tasks.tasks_for(1).is_empty());
}

#[tokio::test]
async fn test_rebuild_without_source_is_a_no_op() {
    let h = harness(100);
    h.challenges.insert(Challenge::new(1, "sourceless"));

    let outcome = h.orchestrator.rebuild_tasks(1, false).await.unwrap();
    assert_eq!(outcome, RebuildOutcome::NoSource);
    let (status, _) = h.challenges.status_of(1).unwrap();
    assert_eq!(status, BuildStatus::NotApplicable);
}

#[tokio::test]
async fn test_remote_single_document() {
    let h = harness(100);
    let url = "https://example.org/data.geojson";
    h.fetcher
        .route(url, 200, Some("application/json"), &collection(2));
    let mut challenge = Challenge::new(1, "remote");
    challenge.creation_source = Some(CreationSource::RemoteGeoJson(url.to_string()));
    h.challenges.insert(challenge);

    h.orchestrator.rebuild_tasks(1, false).await.unwrap();

    let (status, _) = h.challenges.status_of(1).unwrap();
    assert_eq!(status, BuildStatus::Ready);
    assert_eq!(h.tasks.tasks_for(1).len(), 2);
}

#[tokio::test]
async fn test_remote_fetch_failure_on_first_page_fails_the_build() {
    let h = harness(100);
    let url = "https://example.org/missing.geojson";
    let mut challenge = Challenge::new(1, "remote");
    challenge.creation_source = Some(CreationSource::RemoteGeoJson(url.to_string()));
    h.challenges.insert(challenge);

    h.orchestrator.rebuild_tasks(1, false).await.unwrap();

    let (status, message) = h.challenges.status_of(1).unwrap();
    assert_eq!(status, BuildStatus::Failed);
    assert!(message.unwrap().contains(url));
}

#[tokio::test]
async fn test_pagination_stops_at_first_missing_page() {
    let h = harness(100);
    h.fetcher.route(
        "https://example.org/page/1",
        200,
        Some("application/json"),
        &json!({ "type": "FeatureCollection", "features": [feature("p1", 1.0, 1.0)] })
            .to_string(),
    );
    h.fetcher.route(
        "https://example.org/page/2",
        200,
        Some("application/json"),
        &json!({ "type": "FeatureCollection", "features": [feature("p2", 2.0, 2.0)] })
            .to_string(),
    );
    // Page 3 is unrouted: the fetch fails and pagination ends there

    let mut challenge = Challenge::new(1, "paginated");
    challenge.creation_source = Some(CreationSource::RemoteGeoJson(
        "https://example.org/page/{page}".to_string(),
    ));
    h.challenges.insert(challenge);

    h.orchestrator.rebuild_tasks(1, false).await.unwrap();

    let (status, _) = h.challenges.status_of(1).unwrap();
    assert_eq!(status, BuildStatus::Ready);
    assert_eq!(h.tasks.tasks_for(1).len(), 2);
    assert_eq!(
        h.fetcher.requested_urls(),
        vec![
            "https://example.org/page/1",
            "https://example.org/page/2",
            "https://example.org/page/3",
        ]
    );
}

#[tokio::test]
async fn test_pagination_ends_on_empty_body() {
    let h = harness(100);
    h.fetcher.route(
        "https://example.org/page/1",
        200,
        Some("application/json"),
        &json!({ "type": "FeatureCollection", "features": [feature("p1", 1.0, 1.0)] })
            .to_string(),
    );
    h.fetcher
        .route("https://example.org/page/2", 200, Some("application/json"), "");

    let mut challenge = Challenge::new(1, "paginated");
    challenge.creation_source = Some(CreationSource::RemoteGeoJson(
        "https://example.org/page/{page}".to_string(),
    ));
    h.challenges.insert(challenge);

    h.orchestrator.rebuild_tasks(1, false).await.unwrap();

    let (status, _) = h.challenges.status_of(1).unwrap();
    assert_eq!(status, BuildStatus::Ready);
    assert_eq!(h.tasks.tasks_for(1).len(), 1);
}

fn overpass_challenge(id: i64) -> Challenge {
    let mut challenge = Challenge::new(id, "overpass");
    challenge.creation_source = Some(CreationSource::OverpassQuery(
        "node[amenity=drinking_water];out;".to_string(),
    ));
    challenge
}

#[tokio::test]
async fn test_overpass_build_with_priority_recomputation() {
    let h = harness(100);
    let body = json!({
        "elements": [
            { "type": "node", "id": 1, "lat": 1.0, "lon": 2.0,
              "tags": { "highway": "primary" } },
            { "type": "node", "id": 2, "lat": 3.0, "lon": 4.0,
              "tags": { "highway": "residential" } },
        ]
    })
    .to_string();
    h.fetcher
        .route(OVERPASS_URL, 200, Some("application/json"), &body);

    let mut challenge = overpass_challenge(1);
    challenge.high_priority_rule = Some(RuleNode::Leaf {
        key: None,
        operator: "equal".to_string(),
        value: "highway.primary".to_string(),
        value_type: "string".to_string(),
    });
    challenge.default_priority = TaskPriority::Low;
    h.challenges.insert(challenge);

    h.orchestrator.rebuild_tasks(1, false).await.unwrap();

    let (status, _) = h.challenges.status_of(1).unwrap();
    assert_eq!(status, BuildStatus::Ready);
    let tasks = h.tasks.tasks_for(1);
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].name, "1");
    assert_eq!(tasks[0].priority, TaskPriority::High);
    assert_eq!(tasks[1].priority, TaskPriority::Low);
    // Node coordinates land in GeoJSON (lon, lat) order
    assert!(tasks[0].geometry_collection.contains("[2.0,1.0]"));
}

#[tokio::test]
async fn test_overpass_non_json_content_type_fails_with_hint() {
    let h = harness(100);
    h.fetcher
        .route(OVERPASS_URL, 200, Some("text/csv"), "id,lat,lon\n1,0,0");
    h.challenges.insert(overpass_challenge(1));

    h.orchestrator.rebuild_tasks(1, false).await.unwrap();

    let (status, message) = h.challenges.status_of(1).unwrap();
    assert_eq!(status, BuildStatus::Failed);
    assert!(message.unwrap().contains("text/csv"));
    assert!(h.tasks.tasks_for(1).is_empty());
}

#[tokio::test]
async fn test_overpass_target_type_mismatch_fails_the_batch() {
    let h = harness(100);
    let body = json!({
        "elements": [
            { "type": "way", "id": 1,
              "geometry": [{ "lat": 0.0, "lon": 0.0 }, { "lat": 1.0, "lon": 1.0 }] },
        ]
    })
    .to_string();
    h.fetcher
        .route(OVERPASS_URL, 200, Some("application/json"), &body);

    let mut challenge = overpass_challenge(1);
    challenge.overpass_target_type = Some(OsmElementType::Node);
    h.challenges.insert(challenge);

    h.orchestrator.rebuild_tasks(1, false).await.unwrap();

    let (status, message) = h.challenges.status_of(1).unwrap();
    assert_eq!(status, BuildStatus::Failed);
    assert!(message.unwrap().contains("way"));
}

#[tokio::test]
async fn test_overpass_element_without_geometry_is_partially_loaded() {
    let h = harness(100);
    let body = json!({
        "elements": [
            { "type": "node", "id": 1, "lat": 1.0, "lon": 2.0 },
            { "type": "way", "id": 2, "tags": { "highway": "service" } },
        ]
    })
    .to_string();
    h.fetcher
        .route(OVERPASS_URL, 200, Some("application/json"), &body);
    h.challenges.insert(overpass_challenge(1));

    h.orchestrator.rebuild_tasks(1, false).await.unwrap();

    let (status, message) = h.challenges.status_of(1).unwrap();
    assert_eq!(status, BuildStatus::PartiallyLoaded);
    assert!(message.unwrap().contains("1 of 2"));
    assert_eq!(h.tasks.tasks_for(1).len(), 1);
}

#[tokio::test]
async fn test_replacement_rebuild_removes_incomplete_tasks_first() {
    let h = harness(100);
    h.challenges.insert(inline_challenge(1, collection(2)));

    h.orchestrator.rebuild_tasks(1, false).await.unwrap();
    let kept_id = h.tasks.tasks_for(1)[0].id;
    h.tasks.mark_complete(kept_id);

    // Replace the source with a disjoint set of features
    let replacement = json!({
        "type": "FeatureCollection",
        "features": [feature("replacement", 9.0, 9.0)]
    })
    .to_string();
    h.challenges.insert(inline_challenge(1, replacement));

    h.orchestrator.rebuild_tasks(1, true).await.unwrap();

    let names: Vec<String> = h
        .tasks
        .tasks_for(1)
        .into_iter()
        .map(|task| task.name)
        .collect();
    // The completed task survives, the incomplete one is gone
    assert_eq!(names, vec!["feature-0", "replacement"]);
}

#[tokio::test]
async fn test_unknown_challenge_is_a_store_error() {
    let h = harness(100);
    assert!(h.orchestrator.rebuild_tasks(404, false).await.is_err());
}
