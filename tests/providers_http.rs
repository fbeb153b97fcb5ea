// tests/providers_http.rs
//
// Exercises HttpTransport + ProviderClient against a loopback axum stub
// standing in for the provider.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
use serde_json::json;

use enviro_ingest::clock::{RecordingPacer, SystemClock};
use enviro_ingest::config::ProviderConfig;
use enviro_ingest::provider::{Coordinates, FetchError, Fetched, HttpTransport, ProviderClient};
use enviro_ingest::RateLimiter;

type Params = Query<HashMap<String, String>>;

async fn weather(Query(q): Params) -> (StatusCode, Json<serde_json::Value>) {
    // Reject anything that doesn't carry credential + units like the real API would.
    let appid = q.get("appid").map(String::as_str);
    let units = q.get("units").map(String::as_str);
    if appid != Some("k") || units != Some("metric") {
        return (StatusCode::UNAUTHORIZED, Json(json!({"cod": 401})));
    }
    let lat: f64 = q.get("lat").and_then(|v| v.parse().ok()).unwrap_or_default();
    (
        StatusCode::OK,
        Json(json!({
            "main": {"temp": lat, "humidity": 40, "pressure": 1001},
            "wind": {"speed": 1.5}
        })),
    )
}

async fn air_quality(Query(q): Params) -> Json<serde_json::Value> {
    // units must not be sent here
    if q.contains_key("units") {
        return Json(json!({"list": []}));
    }
    Json(json!({"list": [{"main": {"aqi": 4}, "components": {"pm2_5": 88.1}}]}))
}

async fn spawn_stub() -> SocketAddr {
    let app = Router::new()
        .route("/weather", get(weather))
        .route("/air_pollution", get(air_quality))
        .route("/uvi", get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }))
        .route("/forecast", get(|| async { "<html>not json</html>" }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });
    addr
}

fn client_for(addr: SocketAddr, api_key: &str) -> ProviderClient {
    let base = format!("http://{addr}");
    let cfg = ProviderConfig {
        weather_url: format!("{base}/weather"),
        air_quality_url: format!("{base}/air_pollution"),
        uv_index_url: format!("{base}/uvi"),
        forecast_url: format!("{base}/forecast"),
        api_key: api_key.to_string(),
        ..Default::default()
    };
    let transport = HttpTransport::new(Duration::from_secs(5)).expect("http client");
    let limiter = Arc::new(RateLimiter::new(
        60,
        Arc::new(SystemClock),
        Arc::new(RecordingPacer::new()),
    ));
    ProviderClient::new(cfg, Arc::new(transport), limiter)
}

const AT: Coordinates = Coordinates {
    lat: 14.25,
    lon: 77.5,
};

#[tokio::test]
async fn weather_and_air_quality_over_http() {
    let addr = spawn_stub().await;
    let client = client_for(addr, "k");

    let w = client.weather(AT).await.ok().expect("weather ok");
    assert_eq!(w.temperature, 14.25);
    assert_eq!(w.effective_pressure(), Some(1001.0));

    let aq = client.air_quality(AT).await.ok().expect("air quality ok");
    assert_eq!(aq.index, Some(4));
    assert_eq!(aq.pm2_5, Some(88.1));

    assert_eq!(client.limiter().snapshot().await.calls, 2);
}

#[tokio::test]
async fn non_2xx_and_bad_bodies_are_failures() {
    let addr = spawn_stub().await;
    let client = client_for(addr, "k");

    match client.uv_index(AT).await {
        Fetched::Failed(FetchError::Status { status, endpoint }) => {
            assert_eq!(status, 503);
            assert_eq!(endpoint, "uv_index");
        }
        other => panic!("expected status failure, got {other:?}"),
    }

    assert!(matches!(
        client.forecast_precipitation(AT).await,
        Fetched::Failed(FetchError::Decode(_))
    ));
}

#[tokio::test]
async fn wrong_credential_is_a_failure_not_a_panic() {
    let addr = spawn_stub().await;
    let client = client_for(addr, "wrong");

    assert!(matches!(
        client.weather(AT).await,
        Fetched::Failed(FetchError::Status { status: 401, .. })
    ));
}

#[tokio::test]
async fn unreachable_provider_is_a_transport_failure() {
    // bind then drop, so nothing listens on the port
    let addr = {
        let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap()
    };
    let client = client_for(addr, "k");
    assert!(matches!(
        client.weather(AT).await,
        Fetched::Failed(FetchError::Transport(_))
    ));
}

#[tokio::test]
async fn transport_errors_do_not_carry_the_credential() {
    let addr = {
        let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap()
    };
    let client = client_for(addr, "SECRET-KEY-123");

    match client.weather(AT).await {
        Fetched::Failed(e @ FetchError::Transport(_)) => {
            assert!(!e.to_string().contains("SECRET-KEY-123"), "{e}");
            assert!(!format!("{e:?}").contains("SECRET-KEY-123"), "{e:?}");
        }
        other => panic!("expected transport failure, got {other:?}"),
    }
}
