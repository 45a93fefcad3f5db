//! Integration tests for the sensor exporter.
//!
//! These tests run the full flow from a fake upsd, through the scheduler, to
//! the HTTP exposition endpoint.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use sensor_exporter::{ExporterConfig, builtin_registry};
use sensor_framework::http::create_router;
use sensor_framework::{Scheduler, SharedStore};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceExt;

/// Fake upsd serving the same variables for every UPS name it is asked about.
async fn spawn_upsd(vars: &'static [&'static str]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut stream = BufReader::new(stream);
                let mut request = String::new();
                if stream.read_line(&mut request).await.unwrap_or(0) == 0 {
                    return;
                }
                let Some(ups) = request.trim_end().strip_prefix("LIST VAR ") else {
                    return;
                };

                let mut response = format!("BEGIN LIST VAR {}\r\n", ups);
                for var in vars {
                    response.push_str(&format!("VAR {} {}\r\n", ups, var));
                }
                response.push_str(&format!("END LIST VAR {}\r\n", ups));
                let _ = stream.get_mut().write_all(response.as_bytes()).await;
            });
        }
    });

    addr
}

/// Build and start the scheduler for a JSON5 configuration.
async fn start(config: &str) -> (SharedStore, watch::Sender<bool>) {
    let config = ExporterConfig::parse(config).unwrap();
    let registry = builtin_registry().unwrap();
    let scheduler = Scheduler::build(
        &registry,
        &config.definitions().unwrap(),
        &config.schedule_settings(),
    )
    .unwrap();
    let store = scheduler.store();

    let (tx, rx) = watch::channel(false);
    scheduler.start(rx);
    (store, tx)
}

async fn wait_ready(store: &SharedStore) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !store.is_ready() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

async fn get(store: &SharedStore, uri: &str) -> (StatusCode, String) {
    let response = create_router(store.clone(), "/metrics")
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn count_lines(output: &str, line: &str) -> usize {
    output.lines().filter(|l| *l == line).count()
}

#[tokio::test]
async fn test_full_flow_single_ups() {
    let upsd = spawn_upsd(&[r#"battery.charge "42""#, r#"ups.status "OL CHRG""#]).await;
    let (store, shutdown) = start(&format!(
        r#"{{ collectors: [{{ spec: "upsc,,main@127.0.0.1:{}" }}] }}"#,
        upsd.port()
    ))
    .await;

    wait_ready(&store).await;
    let (status, body) = get(&store, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("# HELP upsc_battery_charge Battery charge (percent)\n"));
    assert!(body.contains("# TYPE upsc_battery_charge gauge\n"));
    assert!(body.contains("upsc_battery_charge{ups=\"main\",host=\"127.0.0.1\"} 42.00\n"));
    assert!(body.contains("upsc_ups_online{ups=\"main\",host=\"127.0.0.1\"} 2.00\n"));
    assert!(body.contains("sensor_exporter_incidents_total 0\n"));
    assert!(body.contains("sensor_exporter_collectors 1\n"));

    shutdown.send(true).unwrap();
}

#[tokio::test]
async fn test_two_instances_share_one_preamble() {
    let upsd = spawn_upsd(&[r#"ups.load "14""#]).await;
    let (store, shutdown) = start(&format!(
        r#"{{
            collectors: [
                {{ spec: "upsc,,alpha@127.0.0.1:{port}" }},
                {{ spec: "upsc,site=lab,bravo@127.0.0.1:{port}" }},
            ],
        }}"#,
        port = upsd.port()
    ))
    .await;

    wait_ready(&store).await;
    let (_, body) = get(&store, "/metrics").await;

    assert_eq!(count_lines(&body, "# TYPE upsc_ups_load gauge"), 1);
    assert_eq!(
        count_lines(&body, "# HELP upsc_ups_load Load on UPS (percent)"),
        1
    );

    // Fragments follow configuration order
    let alpha = body
        .find("upsc_ups_load{ups=\"alpha\",host=\"127.0.0.1\"} 14.00")
        .unwrap();
    let bravo = body.find("upsc_ups_load{site=\"lab\"} 14.00").unwrap();
    assert!(alpha < bravo);

    shutdown.send(true).unwrap();
}

#[tokio::test]
async fn test_unreachable_ups_keeps_endpoint_serving() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap().port();
    drop(listener);
    let upsd = spawn_upsd(&[r#"ups.load "14""#]).await;

    let (store, shutdown) = start(&format!(
        r#"{{
            scrape: {{ timeout_secs: 1 }},
            collectors: [
                {{ spec: "upsc,,gone@127.0.0.1:{}" }},
                {{ spec: "upsc,,main@127.0.0.1:{}" }},
            ],
        }}"#,
        dead,
        upsd.port()
    ))
    .await;

    wait_ready(&store).await;
    let (status, body) = get(&store, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("ups=\"gone\""));
    assert!(body.contains("upsc_ups_load{ups=\"main\",host=\"127.0.0.1\"} 14.00\n"));
    assert!(store.incidents().get() >= 1);

    let (status, _) = get(&store, "/ready").await;
    assert_eq!(status, StatusCode::OK);

    shutdown.send(true).unwrap();
}

#[tokio::test]
async fn test_not_ready_before_first_scrape() {
    let config = ExporterConfig::parse(
        r#"{ scrape: { timeout_secs: 1 }, collectors: [{ spec: "upsc,,main" }] }"#,
    )
    .unwrap();
    let scheduler = Scheduler::build(
        &builtin_registry().unwrap(),
        &config.definitions().unwrap(),
        &config.schedule_settings(),
    )
    .unwrap();

    // Never started, so no scrape has completed
    let (status, _) = get(&scheduler.store(), "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = get(&scheduler.store(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "healthy\n");
}

#[tokio::test]
async fn test_unknown_sensor_type_fails_startup() {
    let config = ExporterConfig::parse(r#"{ collectors: [{ spec: "thermo,,probe1" }] }"#).unwrap();
    let result = Scheduler::build(
        &builtin_registry().unwrap(),
        &config.definitions().unwrap(),
        &config.schedule_settings(),
    );

    let Err(err) = result else {
        panic!("unknown sensor type accepted");
    };
    assert!(err.to_string().contains("thermo"));
}
