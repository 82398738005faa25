//! Scheduled health monitoring tests

use crate::support::{get, monitor, test_config, unreachable_url, wait_until};
use apimon::health::TickReport;
use apimon::types::health::HealthStatus;
use apimon::types::history::HistoryFilter;
use apimon::{ApiMonitor, MonitorConfig, MonitorEvent};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount(server: &MockServer, route: &str, status: u16, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_delay(delay))
        .mount(server)
        .await;
}

async fn scheduled_count(monitor: &ApiMonitor, endpoint_id: &str) -> usize {
    monitor
        .filter_history(&HistoryFilter {
            scheduled: Some(true),
            endpoint_id: Some(endpoint_id.to_string()),
            ..Default::default()
        })
        .await
        .len()
}

#[tokio::test]
async fn server_error_marks_endpoint_down_and_unreachable_marks_error() {
    let server = MockServer::start().await;
    mount(&server, "/svc-a", 500, Duration::ZERO).await;

    let monitor = monitor();
    monitor
        .register_endpoint("svc-a", get(format!("{}/svc-a", server.uri())))
        .await
        .unwrap();
    monitor
        .register_endpoint("svc-b", get(unreachable_url()))
        .await
        .unwrap();

    let report = monitor.run_health_checks_now().await;
    assert_eq!(report, TickReport { checked: 2, skipped: 0 });

    let a = monitor.get_health("svc-a").await.unwrap();
    assert_eq!(a.status, HealthStatus::Down);
    assert_eq!(a.last_http_status_code, Some(500));
    assert!(a.last_checked_at.is_some());

    let b = monitor.get_health("svc-b").await.unwrap();
    assert_eq!(b.status, HealthStatus::Error);
    assert_eq!(b.last_http_status_code, None);
    assert!(b.last_error.as_deref().is_some_and(|e| !e.is_empty()));

    let stats = monitor.get_stats().await;
    assert_eq!((stats.up, stats.down, stats.error), (0, 1, 1));
    assert_eq!(stats.uptime_percent, 0.0);
    assert_eq!(stats.sample_size, 1);

    assert_eq!(scheduled_count(&monitor, "svc-a").await, 1);
    assert_eq!(scheduled_count(&monitor, "svc-b").await, 1);
}

#[tokio::test]
async fn uptime_counts_only_checked_endpoints() {
    let server = MockServer::start().await;
    mount(&server, "/up", 200, Duration::ZERO).await;
    mount(&server, "/down", 404, Duration::ZERO).await;

    let monitor = monitor();
    assert_eq!(monitor.get_stats().await.uptime_percent, 0.0);

    for id in ["up", "down"] {
        monitor
            .register_endpoint(id, get(format!("{}/{}", server.uri(), id)))
            .await
            .unwrap();
    }
    monitor.run_health_checks_now().await;
    monitor
        .register_endpoint("pending", get(format!("{}/up", server.uri())))
        .await
        .unwrap();

    let stats = monitor.get_stats().await;
    assert_eq!(stats.total, 3);
    assert_eq!(stats.unknown, 1);
    assert_eq!(stats.uptime_percent, 50.0);

    let summary = monitor.get_endpoint_summary("up").await.unwrap();
    assert_eq!(summary.checks, 1);
    assert_eq!(summary.uptime_percent, 100.0);

    let down = monitor.get_health_by_status(HealthStatus::Down).await;
    assert_eq!(down.len(), 1);
    assert_eq!(down[0].endpoint_id, "down");
}

#[tokio::test]
async fn start_runs_an_immediate_check_and_stop_halts_ticks() {
    let server = MockServer::start().await;
    mount(&server, "/health", 200, Duration::ZERO).await;

    let monitor = monitor();
    monitor
        .register_endpoint("svc", get(format!("{}/health", server.uri())))
        .await
        .unwrap();

    monitor.start_monitoring(3600).await.unwrap();
    assert!(monitor.is_monitoring().await);

    let monitor = &monitor;

    let checked = wait_until(Duration::from_secs(3), || async move {
        monitor.get_health("svc").await.map(|e| e.status) == Some(HealthStatus::Up)
    })
    .await;
    assert!(checked, "initial check did not run");

    monitor.stop_monitoring().await;
    monitor.stop_monitoring().await;
    assert!(!monitor.is_monitoring().await);
    assert_eq!(scheduled_count(&monitor, "svc").await, 1);
}

#[tokio::test]
async fn restart_does_not_duplicate_in_flight_checks() {
    let server = MockServer::start().await;
    mount(&server, "/slow", 200, Duration::from_millis(500)).await;

    let monitor = monitor();
    monitor
        .register_endpoint("slow", get(format!("{}/slow", server.uri())))
        .await
        .unwrap();

    let (monitor, server) = (&monitor, &server);
    monitor.start_monitoring(3600).await.unwrap();
    let in_flight = wait_until(Duration::from_secs(2), || async move {
        server
            .received_requests()
            .await
            .is_some_and(|requests| !requests.is_empty())
    })
    .await;
    assert!(in_flight);

    // 実行中のチェックがある状態で再起動（再起動直後のtickはスキップされる）
    monitor.stop_monitoring().await;
    monitor.start_monitoring(3600).await.unwrap();

    let recorded = wait_until(Duration::from_secs(3), || async move {
        scheduled_count(monitor, "slow").await >= 1
    })
    .await;
    assert!(recorded);
    tokio::time::sleep(Duration::from_millis(700)).await;
    monitor.stop_monitoring().await;

    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert_eq!(scheduled_count(&monitor, "slow").await, 1);
}

#[tokio::test]
async fn overlapping_ticks_skip_endpoints_still_in_flight() {
    let server = MockServer::start().await;
    mount(&server, "/slow", 200, Duration::from_millis(400)).await;

    let monitor = monitor();
    monitor
        .register_endpoint("slow", get(format!("{}/slow", server.uri())))
        .await
        .unwrap();

    let (first, second) = tokio::join!(monitor.run_health_checks_now(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        monitor.run_health_checks_now().await
    });

    assert_eq!(first, TickReport { checked: 1, skipped: 0 });
    assert_eq!(second, TickReport { checked: 0, skipped: 1 });
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn status_changes_are_published() {
    let server = MockServer::start().await;
    mount(&server, "/svc-a", 503, Duration::ZERO).await;

    let monitor = monitor();
    monitor
        .register_endpoint("svc-a", get(format!("{}/svc-a", server.uri())))
        .await
        .unwrap();
    let mut events = monitor.subscribe();

    monitor.run_health_checks_now().await;
    monitor.run_health_checks_now().await;

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }

    // 2回目のチェックは状態が変わらないため変化イベントは1件のみ
    assert_eq!(received.len(), 3);
    assert!(matches!(
        &received[0],
        MonitorEvent::CheckCompleted {
            endpoint_id,
            status: HealthStatus::Down,
            http_status_code: Some(503),
            ..
        } if endpoint_id == "svc-a"
    ));
    assert_eq!(
        received[1],
        MonitorEvent::HealthStatusChanged {
            endpoint_id: "svc-a".to_string(),
            old_status: HealthStatus::Unknown,
            new_status: HealthStatus::Down,
        }
    );
    assert!(matches!(
        &received[2],
        MonitorEvent::CheckCompleted {
            status: HealthStatus::Down,
            ..
        }
    ));
}

#[tokio::test]
async fn check_timeout_marks_endpoint_error() {
    let server = MockServer::start().await;
    mount(&server, "/hang", 200, Duration::from_secs(3)).await;

    let monitor = ApiMonitor::new(MonitorConfig {
        check_timeout: Duration::from_millis(200),
        ..test_config()
    })
    .unwrap();
    monitor
        .register_endpoint("hang", get(format!("{}/hang", server.uri())))
        .await
        .unwrap();

    monitor.run_health_checks_now().await;

    let entry = monitor.get_health("hang").await.unwrap();
    assert_eq!(entry.status, HealthStatus::Error);
    assert_eq!(entry.last_error.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn unregistered_endpoints_are_not_checked() {
    let server = MockServer::start().await;
    mount(&server, "/svc", 200, Duration::ZERO).await;

    let monitor = monitor();
    monitor
        .register_endpoint("svc", get(format!("{}/svc", server.uri())))
        .await
        .unwrap();
    monitor.unregister_endpoint("svc").await.unwrap();

    let report = monitor.run_health_checks_now().await;
    assert_eq!(report, TickReport::default());
    assert!(monitor.get_all_health().await.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn slow_endpoint_does_not_delay_others_in_the_same_tick() {
    let server = MockServer::start().await;
    mount(&server, "/slow", 200, Duration::from_millis(1500)).await;
    mount(&server, "/fast", 200, Duration::ZERO).await;

    let monitor = monitor();
    monitor
        .register_endpoint("a-slow", get(format!("{}/slow", server.uri())))
        .await
        .unwrap();
    monitor
        .register_endpoint("b-fast", get(format!("{}/fast", server.uri())))
        .await
        .unwrap();
    let mut events = monitor.subscribe();

    let started = std::time::Instant::now();
    let (report, first) = tokio::join!(monitor.run_health_checks_now(), async {
        let first = loop {
            match events.recv().await.expect("event bus closed") {
                MonitorEvent::CheckCompleted { endpoint_id, .. } => break endpoint_id,
                _ => continue,
            }
        };
        (first, started.elapsed())
    });

    let (first_id, first_at) = first;
    assert_eq!(first_id, "b-fast");
    assert!(
        first_at < Duration::from_millis(1000),
        "fast check finished after {:?}",
        first_at
    );
    assert_eq!(report, TickReport { checked: 2, skipped: 0 });
    assert_eq!(
        monitor.get_health("a-slow").await.map(|e| e.status),
        Some(HealthStatus::Up)
    );
}

#[tokio::test]
async fn re_register_during_check_keeps_health_unknown() {
    let server = MockServer::start().await;
    mount(&server, "/old", 500, Duration::from_millis(400)).await;
    mount(&server, "/new", 200, Duration::ZERO).await;

    let monitor = monitor();
    monitor
        .register_endpoint("svc", get(format!("{}/old", server.uri())))
        .await
        .unwrap();
    let mut events = monitor.subscribe();

    let (report, ()) = tokio::join!(monitor.run_health_checks_now(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        monitor
            .register_endpoint("svc", get(format!("{}/new", server.uri())))
            .await
            .unwrap();
    });
    assert_eq!(report.checked, 1);

    // 古い定義の結果は履歴にのみ残り、ヘルス状態は上書きしない
    let entry = monitor.get_health("svc").await.unwrap();
    assert_eq!(entry.status, HealthStatus::Unknown);
    assert_eq!(entry.last_http_status_code, None);
    assert_eq!(scheduled_count(&monitor, "svc").await, 1);
    assert!(events.try_recv().is_err());

    monitor.run_health_checks_now().await;
    let entry = monitor.get_health("svc").await.unwrap();
    assert_eq!(entry.status, HealthStatus::Up);
    assert_eq!(entry.last_http_status_code, Some(200));
}

#[tokio::test]
async fn unregister_during_check_leaves_no_entry() {
    let server = MockServer::start().await;
    mount(&server, "/svc", 503, Duration::from_millis(400)).await;

    let monitor = monitor();
    monitor
        .register_endpoint("svc", get(format!("{}/svc", server.uri())))
        .await
        .unwrap();

    tokio::join!(monitor.run_health_checks_now(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        monitor.unregister_endpoint("svc").await.unwrap();
    });

    assert!(monitor.get_health("svc").await.is_none());
    assert_eq!(monitor.get_stats().await.total, 0);
    assert_eq!(scheduled_count(&monitor, "svc").await, 1);
}

async fn next_check(events: &mut tokio::sync::broadcast::Receiver<MonitorEvent>) -> HealthStatus {
    loop {
        match events.recv().await.expect("event bus closed") {
            MonitorEvent::CheckCompleted { status, .. } => return status,
            _ => continue,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn ticks_follow_the_interval_until_stopped() {
    let monitor = monitor();
    monitor
        .register_endpoint("svc", get(unreachable_url()))
        .await
        .unwrap();
    let mut events = monitor.subscribe();

    monitor.start_monitoring(60).await.unwrap();
    assert_eq!(next_check(&mut events).await, HealthStatus::Error);

    let before = tokio::time::Instant::now();
    assert_eq!(next_check(&mut events).await, HealthStatus::Error);
    assert!(before.elapsed() >= Duration::from_secs(50));

    monitor.stop_monitoring().await;
    tokio::time::sleep(Duration::from_secs(300)).await;

    let mut remaining = Vec::new();
    while let Ok(event) = events.try_recv() {
        remaining.push(event);
    }
    assert_eq!(remaining, vec![MonitorEvent::MonitoringStopped]);
}
