//! Subscriber propagation across spaces and target encodings.

use crate::common::{current_space, entry, subscription, MTA_ID};
use mta_deployer::models::{AppState, CloudTarget, ConfigurationFilter, ConfigurationTarget};
use mta_deployer::subscriptions::{ConfigurationStore, InMemoryConfigurationStore, SubscriberUpdater};
use mta_deployer::test_helpers::{existing_app, target, FakeClientProvider, FakePlatform, TEST_USER};
use std::sync::Arc;

struct Fixture {
    dev: FakePlatform,
    clients: Arc<FakeClientProvider>,
    store: Arc<InMemoryConfigurationStore>,
}

impl Fixture {
    fn new(dev: FakePlatform, clients: FakeClientProvider) -> Self {
        Self {
            clients: Arc::new(clients.with_client(target(), dev.clone())),
            dev,
            store: Arc::new(InMemoryConfigurationStore::new()),
        }
    }

    fn updater(&self) -> SubscriberUpdater {
        SubscriberUpdater::new(self.clients.clone(), self.store.clone(), TEST_USER)
    }
}

fn web() -> FakePlatform {
    FakePlatform::new().with_application(existing_app("web", AppState::Started, 1, 1))
}

#[tokio::test]
async fn test_legacy_space_subscription_is_resolved() {
    let fixture = Fixture::new(
        web(),
        FakeClientProvider::new().with_space("guid-of-dev", target()),
    );
    let published = fixture
        .store
        .add_entry(entry("api", "1.0.0", current_space()))
        .await
        .unwrap();
    fixture
        .store
        .add_subscription(subscription(
            "web",
            ConfigurationTarget::LegacySpaceId("guid-of-dev".to_string()),
            "api",
            "API",
        ))
        .await
        .unwrap();

    let update = fixture.updater().update_subscribers(&[published], &[]).await.unwrap();
    assert!(update.warnings.is_empty());
    assert_eq!(update.updated.len(), 1);
    assert_eq!(update.updated[0].target, target());
    assert!(fixture.dev.application("web").unwrap().env.contains_key("API"));
}

#[tokio::test]
async fn test_unknown_legacy_space_is_a_warning() {
    let fixture = Fixture::new(web(), FakeClientProvider::new());
    let published = fixture
        .store
        .add_entry(entry("api", "1.0.0", current_space()))
        .await
        .unwrap();
    fixture
        .store
        .add_subscription(subscription(
            "web",
            ConfigurationTarget::LegacySpaceId("vanished".to_string()),
            "api",
            "API",
        ))
        .await
        .unwrap();

    let update = fixture.updater().update_subscribers(&[published], &[]).await.unwrap();
    assert!(update.updated.is_empty());
    assert_eq!(update.warnings.len(), 1);
    assert!(update.warnings[0].contains("space does not exist"));
}

#[tokio::test]
async fn test_deleted_entry_removes_variable() {
    let mut app = existing_app("web", AppState::Started, 1, 1);
    app.env.insert("API".to_string(), "{\"url\":\"stale\"}".to_string());
    app.env.insert("OTHER".to_string(), "kept".to_string());
    let fixture = Fixture::new(FakePlatform::new().with_application(app), FakeClientProvider::new());
    fixture
        .store
        .add_subscription(subscription("web", current_space(), "api", "API"))
        .await
        .unwrap();

    let deleted = entry("api", "1.0.0", current_space()).with_id(99);
    let update = fixture.updater().update_subscribers(&[], &[deleted]).await.unwrap();

    assert_eq!(update.updated.len(), 1);
    let env = fixture.dev.application("web").unwrap().env;
    assert!(!env.contains_key("API"));
    assert_eq!(env["OTHER"], "kept");
}

#[tokio::test]
async fn test_missing_subscriber_and_unchanged_env() {
    let fixture = Fixture::new(web(), FakeClientProvider::new());
    let published = fixture
        .store
        .add_entry(entry("api", "1.0.0", current_space()))
        .await
        .unwrap();
    for app in ["web", "ghost"] {
        fixture
            .store
            .add_subscription(subscription(app, current_space(), "api", "API"))
            .await
            .unwrap();
    }

    let updater = fixture.updater();
    let first = updater.update_subscribers(&[published.clone()], &[]).await.unwrap();
    assert_eq!(first.updated.len(), 1);
    assert!(first.warnings.iter().any(|w| w.contains("\"ghost\"")));

    let second = updater.update_subscribers(&[published], &[]).await.unwrap();
    assert!(second.updated.is_empty());
    assert_eq!(fixture.dev.calls_to("update_application_env"), vec!["web".to_string()]);
}

#[tokio::test]
async fn test_subscriber_with_two_subscriptions_is_reported_once() {
    let fixture = Fixture::new(web(), FakeClientProvider::new());
    let api = fixture
        .store
        .add_entry(entry("api", "1.0.0", current_space()))
        .await
        .unwrap();
    let events = fixture
        .store
        .add_entry(entry("events", "1.0.0", current_space()))
        .await
        .unwrap();
    fixture
        .store
        .add_subscription(subscription("web", current_space(), "api", "API"))
        .await
        .unwrap();
    fixture
        .store
        .add_subscription(subscription("web", current_space(), "events", "EVENTS"))
        .await
        .unwrap();

    let update = fixture.updater().update_subscribers(&[api, events], &[]).await.unwrap();
    assert_eq!(update.updated.len(), 1);
    let env = fixture.dev.application("web").unwrap().env;
    assert!(env.contains_key("API") && env.contains_key("EVENTS"));
}

#[tokio::test]
async fn test_version_range_limits_rendered_entries() {
    let fixture = Fixture::new(web(), FakeClientProvider::new());
    let old = fixture
        .store
        .add_entry(entry("api", "1.4.0", current_space()))
        .await
        .unwrap();
    let new = fixture
        .store
        .add_entry(entry("api", "2.0.0", current_space()))
        .await
        .unwrap();
    let filter = ConfigurationFilter::new()
        .provider_id(format!("{MTA_ID}:api"))
        .version_range("^1.0")
        .unwrap();
    let mut subscribed = subscription("web", current_space(), "api", "API");
    subscribed.filter = filter;
    fixture.store.add_subscription(subscribed).await.unwrap();

    fixture.updater().update_subscribers(&[old, new], &[]).await.unwrap();
    let env = fixture.dev.application("web").unwrap().env;
    assert!(env["API"].contains("1.4.0"));
}

#[tokio::test]
async fn test_restart_reports_unreachable_spaces() {
    let fixture = Fixture::new(web(), FakeClientProvider::new());
    let subscribers = vec![
        mta_deployer::models::Subscriber {
            app_name: "web".to_string(),
            target: target(),
        },
        mta_deployer::models::Subscriber {
            app_name: "jobs".to_string(),
            target: CloudTarget::new("acme", "prod"),
        },
    ];

    let warnings = fixture.updater().restart_subscribers(&subscribers).await;
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("\"jobs\""));
    assert_eq!(fixture.dev.calls_to("start_application"), vec!["web".to_string()]);
    assert_eq!(fixture.clients.requests().len(), 2);
}
