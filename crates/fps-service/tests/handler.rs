use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::{mpsc, Arc};

use fps_core::{PolicyCustomization, SetEntry, Site};
use fps_service::{
    FilePersistence, FirstPartySetsHandler, HandlerConfig, InMemorySitesToClearStore, SitesToClearStore,
};
use pretty_assertions::assert_eq;
use serde_json::json;

const COMPONENT_SETS: &str = r#"
{"owner": "https://owner.test", "members": ["https://b.test"], "ccTLDs": {"https://b.test": ["https://b.cctld"]}}
{"owner": "https://x.test", "members": ["https://y.test"]}
"#;

fn site(origin: &str) -> Site {
    Site::canonicalize(origin, false).unwrap()
}

fn config_in(dir: &Path) -> HandlerConfig {
    let component = dir.join("sets.json");
    fs::write(&component, COMPONENT_SETS).unwrap();
    HandlerConfig {
        component_sets_path: Some(component),
        persisted_sets_path: Some(dir.join("persisted_sets.json")),
        ..HandlerConfig::default()
    }
}

fn build(config: HandlerConfig) -> (FirstPartySetsHandler, Arc<InMemorySitesToClearStore>) {
    let store = Arc::new(InMemorySitesToClearStore::new());
    let handler = FirstPartySetsHandler::new(config, Arc::new(FilePersistence), store.clone());
    (handler, store)
}

#[tokio::test]
async fn init_loads_component_sets() {
    let dir = tempfile::tempdir().unwrap();
    let (handler, _) = build(config_in(dir.path()));
    handler.init().await;

    let sets = handler.wait_for_sets().await;
    assert_eq!(sets.sets.len(), 5);
    assert_eq!(sets.aliases.get(&site("https://b.cctld")), Some(&site("https://b.test")));

    let owner = handler.find_owner(&site("https://b.cctld"), &PolicyCustomization::new());
    assert_eq!(owner.map(|entry| entry.owner().clone()), Some(site("https://owner.test")));
}

#[tokio::test]
async fn manual_set_overrides_component_sets() {
    let dir = tempfile::tempdir().unwrap();
    let config = HandlerConfig {
        manual_set: Some("https://m.test, https://y.test".to_string()),
        ..config_in(dir.path())
    };
    let (handler, _) = build(config);
    handler.init().await;

    let sets = handler.wait_for_sets().await;
    assert_eq!(sets.sets.get(&site("https://y.test")).map(SetEntry::owner), Some(&site("https://m.test")));
    // x.test lost its only member.
    assert!(!sets.sets.contains_key(&site("https://x.test")));
}

#[tokio::test]
async fn second_public_sets_are_ignored() {
    let (handler, _) = build(HandlerConfig::default());
    handler.set_manually_specified_set("");
    handler
        .set_public_first_party_sets(br#"{"owner": "https://a.test", "members": ["https://b.test"]}"#.to_vec())
        .await;
    handler
        .set_public_first_party_sets(br#"{"owner": "https://c.test", "members": ["https://d.test"]}"#.to_vec())
        .await;

    let sets = handler.wait_for_sets().await;
    assert!(sets.sets.contains_key(&site("https://a.test")));
    assert!(!sets.sets.contains_key(&site("https://c.test")));
}

#[tokio::test]
async fn policy_queries_wait_for_sets() {
    let (handler, _) = build(HandlerConfig::default());
    let policy = json!({
        "replacements": [{"owner": "https://new.test", "members": ["https://b.test"]}],
        "additions": []
    });

    let (tx, rx) = mpsc::channel();
    let pending = handler.get_customization_for_policy(&policy, move |customization| {
        tx.send(customization).unwrap();
    });
    assert!(pending.is_none());

    handler.set_manually_specified_set("");
    handler
        .set_public_first_party_sets(br#"{"owner": "https://a.test", "members": ["https://b.test"]}"#.to_vec())
        .await;

    let customization = rx.try_recv().unwrap();
    assert_eq!(
        customization,
        PolicyCustomization::from([
            (site("https://new.test"), Some(SetEntry::primary(site("https://new.test")))),
            (site("https://b.test"), Some(SetEntry::associated(site("https://new.test"), None))),
            (site("https://a.test"), None),
        ])
    );
    assert_eq!(handler.customization_for_policy(&policy).await, customization);
    assert_eq!(handler.find_owner(&site("https://a.test"), &customization), None);
}

#[tokio::test]
async fn clears_sites_that_left_their_set() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    fs::write(
        config.persisted_sets_path.as_ref().unwrap(),
        r#"{"https://a.test": "https://owner.test", "https://b.test": "https://owner.test"}"#,
    )
    .unwrap();

    let (handler, store) = build(config);
    handler.init().await;

    let no_policy = PolicyCustomization::new();
    let cleared = handler
        .clear_site_data_on_changed_sets("profile", &no_policy, &no_policy)
        .await;
    assert_eq!(cleared, BTreeSet::from([site("https://a.test")]));
    assert_eq!(store.fetch_sites_to_clear("profile"), cleared);
}

#[tokio::test]
async fn persisted_sets_feed_the_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let (first_run, _) = build(config.clone());
    first_run.init().await;
    first_run.persist_sets().await;

    let persisted = fs::read_to_string(config.persisted_sets_path.as_ref().unwrap()).unwrap();
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&persisted).unwrap(),
        json!({
            "https://b.test": "https://owner.test",
            "https://b.cctld": "https://owner.test",
            "https://y.test": "https://x.test"
        })
    );

    let (second_run, store) = build(config);
    second_run.init().await;
    let no_policy = PolicyCustomization::new();
    let cleared = second_run
        .clear_site_data_on_changed_sets("profile", &no_policy, &no_policy)
        .await;
    assert!(cleared.is_empty());
    assert_eq!(store.run_count("profile"), 1);
}

#[tokio::test]
async fn disabled_handler_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let config = HandlerConfig {
        enabled: false,
        ..config_in(dir.path())
    };
    let (handler, store) = build(config);
    handler.init().await;

    assert!(handler.wait_for_sets().await.is_empty());
    let policy = json!({"replacements": [{"owner": "https://a.test", "members": ["https://b.test"]}]});
    assert!(handler.customization_for_policy(&policy).await.is_empty());

    let cleared = handler
        .clear_site_data_on_changed_sets("profile", &PolicyCustomization::new(), &PolicyCustomization::new())
        .await;
    assert!(cleared.is_empty());
    assert_eq!(store.run_count("profile"), 0);
}

#[tokio::test]
async fn reset_releases_waiters() {
    let (handler, _) = build(HandlerConfig::default());
    let waiter = tokio::spawn({
        let handler = handler.clone();
        async move { handler.wait_for_sets().await }
    });
    tokio::task::yield_now().await;

    handler.reset_for_testing();
    assert!(waiter.await.unwrap().is_empty());
}

#[test]
fn validates_policy_without_a_handler() {
    let valid = json!({
        "replacements": [{"owner": "https://a.test", "members": ["https://b.test"]}],
        "additions": []
    });
    assert_eq!(FirstPartySetsHandler::validate_enterprise_policy(&valid), None);

    let overlapping = json!({
        "replacements": [{"owner": "https://a.test", "members": ["https://b.test"]}],
        "additions": [{"owner": "https://c.test", "members": ["https://b.test"]}]
    });
    let error = FirstPartySetsHandler::validate_enterprise_policy(&overlapping).unwrap();
    assert_eq!(error.to_string(), "addition set #0: non-disjoint sets");
}
