//! End-to-end tests: real prober, notifier, poller and router against the
//! devkit stubs.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use mcwatch_devkit::{StubMode, StubMqttBroker, TestHarness, STUB_APPLICATION_ID};
use mcwatch_kernel::config::{Target, WatchConfig};
use mcwatch_kernel::discord::{self, DiscordClient};
use mcwatch_kernel::format::{OFFLINE_ANNOUNCEMENT, OFFLINE_REPLY};
use mcwatch_kernel::health::WatchHealth;
use mcwatch_kernel::http::{build_router, AppState};
use mcwatch_kernel::models::{Notification, ProbeOutcome};
use mcwatch_kernel::notify::build_notifier;
use mcwatch_kernel::poller::StatusPoller;
use mcwatch_kernel::prober::{Prober, SlpProber};
use mcwatch_kernel::query::StatusQuery;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;

const CHANNEL: &str = "77";

fn config(harness: &TestHarness, extra: &[(&str, &str)]) -> WatchConfig {
    let mut env = harness.env(CHANNEL);
    env.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    WatchConfig::from_lookup(|key| env.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())).unwrap()
}

fn prober(cfg: &WatchConfig) -> Arc<dyn Prober> {
    Arc::new(SlpProber::new(cfg.target.clone(), Duration::from_millis(500)))
}

fn poller(cfg: &WatchConfig, health: WatchHealth) -> StatusPoller {
    let client = DiscordClient::new(&cfg.discord).unwrap();
    StatusPoller::new(prober(cfg), build_notifier(&cfg.sink, &client), health)
}

#[tokio::test]
async fn posts_exactly_the_transitions() {
    let harness = TestHarness::start(StubMode::online(2, 10, &["alex", "steve"])).await.unwrap();
    let cfg = config(&harness, &[]);
    let mut poller = poller(&cfg, WatchHealth::new());

    assert!(poller.run_cycle().await.is_some());
    assert!(poller.run_cycle().await.is_none());
    harness.status.set_mode(StubMode::Closed);
    assert_eq!(poller.run_cycle().await, Some(Notification::Offline));
    assert!(poller.run_cycle().await.is_none());
    harness.status.set_mode(StubMode::online(0, 10, &[]));
    assert!(poller.run_cycle().await.is_some());

    let messages = harness.wait_for_messages(3, 2000).await;
    harness.assert_message_count(3).unwrap();
    assert!(messages.iter().all(|m| m.channel_id == CHANNEL));
    assert!(messages.iter().all(|m| m.authorization.as_deref() == Some("Bot stub-token")));
    assert_eq!(
        messages[0].content,
        "🟢 **Minecraft Server Online**\nPlayers: 2 / 10\nOnline: alex, steve"
    );
    assert_eq!(messages[1].content, OFFLINE_ANNOUNCEMENT);
    assert_eq!(
        messages[2].content,
        "🟢 **Minecraft Server Online**\nPlayers: 0 / 10\nOnline: No player names available."
    );
}

#[tokio::test]
async fn roster_churn_is_not_posted() {
    let harness = TestHarness::start(StubMode::online(2, 10, &["alex", "steve"])).await.unwrap();
    let cfg = config(&harness, &[]);
    let mut poller = poller(&cfg, WatchHealth::new());

    poller.run_cycle().await;
    harness.status.set_mode(StubMode::online(2, 10, &["kai", "noor"]));
    assert!(poller.run_cycle().await.is_none());
    harness.status.set_mode(StubMode::online_anonymous(2, 10));
    assert!(poller.run_cycle().await.is_none());
    harness.assert_message_count(1).unwrap();
}

#[tokio::test]
async fn hung_server_is_bounded_by_timeout() {
    let harness = TestHarness::start(StubMode::Hang).await.unwrap();
    let cfg = config(&harness, &[]);
    let prober = SlpProber::new(cfg.target.clone(), Duration::from_millis(200));

    let started = Instant::now();
    assert!(matches!(prober.probe().await, ProbeOutcome::Failure(_)));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn malformed_answer_is_a_failure() {
    let harness = TestHarness::start(StubMode::Garbage).await.unwrap();
    let cfg = config(&harness, &[]);
    assert!(matches!(prober(&cfg).probe().await, ProbeOutcome::Failure(_)));
}

#[tokio::test]
async fn nothing_listening_is_a_failure() {
    let prober = SlpProber::new(Target::new("127.0.0.1", 1), Duration::from_millis(500));
    assert!(matches!(prober.probe().await, ProbeOutcome::Failure(_)));
}

#[tokio::test]
async fn failed_delivery_is_dropped_not_retried() {
    let harness = TestHarness::start(StubMode::online(1, 5, &["alex"])).await.unwrap();
    let cfg = config(&harness, &[]);
    let health = WatchHealth::new();
    let mut poller = poller(&cfg, health.clone());

    harness.discord.set_failing(true);
    assert!(poller.run_cycle().await.is_some());
    harness.discord.set_failing(false);
    assert!(poller.run_cycle().await.is_none());

    harness.assert_message_count(0).unwrap();
    assert_eq!(health.report().delivery_failures, 1);
    assert_eq!(health.report().poll_cycles, 2);
}

#[tokio::test]
async fn missing_channel_disables_posting_only() {
    let harness = TestHarness::start(StubMode::online(1, 5, &[])).await.unwrap();
    let mut env = harness.env(CHANNEL);
    env.retain(|(k, _)| k != "STATUS_CHANNEL_ID");
    let cfg = WatchConfig::from_lookup(|key| env.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())).unwrap();
    let mut poller = poller(&cfg, WatchHealth::new());

    assert!(poller.run_cycle().await.is_some());
    harness.assert_message_count(0).unwrap();
}

#[tokio::test]
async fn spawned_poller_follows_outage() {
    let harness = TestHarness::start(StubMode::online(3, 20, &["a", "b", "c"])).await.unwrap();
    let cfg = config(&harness, &[]);
    let handle = poller(&cfg, WatchHealth::new()).spawn(Duration::from_millis(30));

    assert_eq!(harness.wait_for_messages(1, 3000).await.len(), 1);
    harness.status.set_mode(StubMode::Closed);
    let messages = harness.wait_for_messages(2, 3000).await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, OFFLINE_ANNOUNCEMENT);

    // steady offline: no heartbeat posts
    tokio::time::sleep(Duration::from_millis(200)).await;
    harness.assert_message_count(2).unwrap();
    handle.abort();
}

#[tokio::test]
async fn queries_racing_the_poller_never_post() {
    let harness = TestHarness::start(StubMode::online(4, 8, &["a", "b", "c", "d"])).await.unwrap();
    let cfg = config(&harness, &[]);
    let handle = poller(&cfg, WatchHealth::new()).spawn(Duration::from_millis(20));
    let query = StatusQuery::new(prober(&cfg));

    let replies = query_concurrently(&query, 16).await;
    assert!(replies
        .iter()
        .all(|r| r == "🟢 **Server Online**\nPlayers: 4 / 8\nOnline: a, b, c, d"));

    harness.wait_for_messages(1, 2000).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    harness.assert_message_count(1).unwrap();
    handle.abort();
}

async fn query_concurrently(query: &StatusQuery, count: usize) -> Vec<String> {
    let tasks: Vec<_> = (0..count)
        .map(|_| {
            let query = query.clone();
            tokio::spawn(async move { query.query_now().await })
        })
        .collect();
    let mut replies = Vec::with_capacity(count);
    for task in tasks {
        replies.push(task.await.unwrap());
    }
    replies
}

#[tokio::test]
async fn mqtt_sink_publishes_transitions() {
    let harness = TestHarness::start(StubMode::online(2, 10, &["alex", "steve"])).await.unwrap();
    let broker = StubMqttBroker::start().await.unwrap();
    let (host, port) = (broker.host(), broker.port().to_string());
    let cfg = config(
        &harness,
        &[
            ("NOTIFY_SINK", "mqtt"),
            ("MQTT_HOST", host.as_str()),
            ("MQTT_PORT", port.as_str()),
            ("MQTT_TOPIC", "mcwatch/test"),
        ],
    );
    let health = WatchHealth::new();
    let mut poller = poller(&cfg, health.clone());

    assert!(poller.run_cycle().await.is_some());
    harness.status.set_mode(StubMode::Closed);
    assert!(poller.run_cycle().await.is_some());
    assert!(poller.run_cycle().await.is_none());

    assert_eq!(broker.wait_for_messages("mcwatch/test", 2, 3000).await.len(), 2);
    let events = broker.json_on("mcwatch/test").unwrap();
    assert_eq!(events[0]["state"], "online");
    assert_eq!(events[0]["online"], 2);
    assert_eq!(events[0]["names"], serde_json::json!(["alex", "steve"]));
    assert_eq!(events[1]["state"], "offline");
    assert_eq!(events[1]["text"], OFFLINE_ANNOUNCEMENT);

    harness.assert_message_count(0).unwrap();
    assert_eq!(health.report().delivery_failures, 0);
}

#[tokio::test]
async fn dead_broker_does_not_stall_the_poller() {
    let harness = TestHarness::start(StubMode::online(1, 5, &["alex"])).await.unwrap();
    let cfg = config(&harness, &[("NOTIFY_SINK", "mqtt"), ("MQTT_HOST", "127.0.0.1"), ("MQTT_PORT", "1")]);
    let health = WatchHealth::new();
    let mut poller = poller(&cfg, health.clone());

    // flip more times than the client can buffer
    for i in 0..24 {
        let mode = if i % 2 == 0 { StubMode::online(1, 5, &["alex"]) } else { StubMode::Closed };
        harness.status.set_mode(mode);
        let cycle = tokio::time::timeout(Duration::from_secs(2), poller.run_cycle()).await;
        assert!(matches!(cycle, Ok(Some(_))), "cycle {i} stalled or missed a transition");
    }

    let report = health.report();
    assert_eq!(report.poll_cycles, 24);
    assert!(report.delivery_failures > 0);
}

#[tokio::test]
async fn players_route_reports_live_state() {
    let harness = TestHarness::start(StubMode::online(1, 4, &["alex"])).await.unwrap();
    let cfg = config(&harness, &[]);
    let router = build_router(AppState {
        query: StatusQuery::new(prober(&cfg)),
        health: WatchHealth::new(),
        interaction_key: None,
    });

    let response = router
        .clone()
        .oneshot(Request::get("/players").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body, "🟢 **Server Online**\nPlayers: 1 / 4\nOnline: alex".as_bytes());

    harness.status.set_mode(StubMode::Closed);
    let response = router
        .oneshot(Request::get("/players").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body, OFFLINE_REPLY.as_bytes());
    harness.assert_message_count(0).unwrap();
}

#[tokio::test]
async fn registers_players_command() {
    let harness = TestHarness::start(StubMode::online(0, 1, &[])).await.unwrap();
    let cfg = config(&harness, &[("GUILD_ID", "555")]);
    let client = DiscordClient::new(&cfg.discord).unwrap();

    assert!(discord::register_players_command(&client, &cfg.discord).await.unwrap());
    let registrations = harness.discord.registrations();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].application_id, STUB_APPLICATION_ID);
    assert_eq!(registrations[0].guild_id, "555");
    assert_eq!(registrations[0].commands[0]["name"], "players");
}

#[tokio::test]
async fn registration_skipped_without_guild() {
    let harness = TestHarness::start(StubMode::online(0, 1, &[])).await.unwrap();
    let cfg = config(&harness, &[]);
    let client = DiscordClient::new(&cfg.discord).unwrap();

    assert!(!discord::register_players_command(&client, &cfg.discord).await.unwrap());
    assert!(harness.discord.registrations().is_empty());
}
