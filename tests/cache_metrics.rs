use std::collections::HashSet;
use std::time::Duration;

use httpmock::MockServer;
use metrics_util::debugging::DebuggingRecorder;
use patientdesk::application::list_query::ListQueryParams;
use patientdesk::application::repos::PatientGateway;
use patientdesk::cache::{CacheConfig, KeyFilter, QueryCache, QueryKey, Resource, loader};
use patientdesk::config::ApiSettings;
use patientdesk::infra::api::ApiClient;
use patientdesk::infra::telemetry;
use url::Url;
use uuid::Uuid;

#[tokio::test]
async fn cache_and_client_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let config = CacheConfig {
        max_entries: 1,
        ..CacheConfig::default()
    };
    let cache: QueryCache<String> = QueryCache::new("metrics", Duration::from_secs(30), &config);
    let slow = loader(|| async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok("value".to_string())
    });

    // miss + coalesced
    let first = QueryKey::patient(Uuid::new_v4());
    tokio::join!(
        cache.fetch(first.clone(), slow.clone()),
        cache.fetch(first.clone(), slow.clone()),
    );
    // hit
    cache.fetch(first.clone(), slow.clone()).await;
    // evict
    let second = QueryKey::patient(Uuid::new_v4());
    cache.fetch(second, slow.clone()).await;
    // invalidated
    cache.invalidate(|key| KeyFilter::Resource(Resource::Patient).matches(key));

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/api/patients");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"items":[],"total":0,"limit":20,"offset":0}"#);
        })
        .await;
    let api = ApiClient::new(&ApiSettings {
        base_url: Url::parse(&server.url("/api/")).expect("base url"),
        timeout: Duration::from_secs(2),
    })
    .expect("client");
    api.list_patients(&ListQueryParams::default())
        .await
        .expect("empty page");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "patientdesk_cache_hit_total",
        "patientdesk_cache_miss_total",
        "patientdesk_cache_coalesced_total",
        "patientdesk_cache_evict_total",
        "patientdesk_cache_invalidated_total",
        "patientdesk_cache_load_ms",
        "patientdesk_api_request_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
