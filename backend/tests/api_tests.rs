//! HTTP API tests
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{engine_settings, started_engine, FakeProvider};
use wps_server::services::JobClass;
use wps_server::{create_app, AppState, Config, Engine};

async fn app() -> (Router, Arc<Engine>) {
    let engine = Arc::new(started_engine(Arc::new(FakeProvider::clear()), engine_settings()).await);
    let state = AppState {
        engine: engine.clone(),
        config: Arc::new(Config::default()),
    };
    (create_app(state), engine)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[cfg(test)]
mod api_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_reports_store_and_jobs() {
        let (app, engine) = app().await;

        let (status, body) = send(&app, get("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["storeBackend"], "memory");
        assert_eq!(body["trainedModels"], 40);
        assert!(body["jobs"]["idle"].as_u64().unwrap() >= 40);

        let response = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_park_predictions_shape() {
        let (app, engine) = app().await;

        let (status, body) = send(&app, get("/api/v1/predictions/serengeti")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["parkId"], "serengeti");

        let predictions = body["predictions"].as_object().unwrap();
        assert_eq!(predictions.len(), 10);
        let lions = &predictions["lions"];
        for field in [
            "probability",
            "confidence",
            "optimalTime",
            "bestLocation",
            "tips",
            "provenance",
            "generatedAt",
            "modelVersion",
            "recentSightings",
        ] {
            assert!(!lions[field].is_null(), "missing {}", field);
        }

        let score = body["confidenceScore"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&score));

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_species_prediction_and_errors() {
        let (app, engine) = app().await;

        let (status, body) = send(&app, get("/api/v1/predictions/Mikumi/elephants")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["species"], "elephants");
        assert_eq!(body["provenance"], "live");

        let (status, body) = send(&app, get("/api/v1/predictions/mikumi/penguins")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "PREDICTION_UNAVAILABLE");

        let (status, body) = send(&app, get("/api/v1/predictions/atlantis")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "UNKNOWN_PARK");

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_sync_endpoints_accept() {
        let (app, engine) = app().await;

        for target in ["weather", "predictions", "store"] {
            let (status, body) = send(&app, post_empty(&format!("/api/v1/sync/{}", target))).await;
            assert_eq!(status, StatusCode::ACCEPTED);
            assert!(body["message"].as_str().unwrap().contains("cycle started"));
        }

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_weather_and_models() {
        let (app, engine) = app().await;

        let (status, body) = send(&app, get("/api/v1/weather/gombe")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["location_id"], "gombe");
        assert_eq!(body["provenance"], "live");

        let (status, body) = send(&app, get("/api/v1/models/gombe")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 10);

        let (status, body) = send(&app, post_empty("/api/v1/models/gombe/retrain")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["completed"].as_array().unwrap().len(), 10);

        let (status, _) = send(&app, get("/api/v1/models/atlantis")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_sightings_feed_recent_counts() {
        let (app, engine) = app().await;
        let report = json!({
            "park_id": "serengeti",
            "species_id": "lions",
            "sighting_location": "Seronera River Valley",
            "sighting_time": chrono::Utc::now() - chrono::Duration::hours(1),
            "confidence": 0.9,
            "reporter_type": "ranger",
            "group_size": 7
        });

        let (status, body) = send(&app, post_json("/api/v1/sightings", report)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["species_id"], "lions");

        let (status, body) = send(&app, get("/api/v1/sightings/serengeti")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, body) = send(&app, get("/api/v1/predictions/serengeti/lions")).await;
        assert_eq!(body["recentSightings"], 1);

        let invalid = json!({
            "park_id": "serengeti",
            "species_id": "lions",
            "sighting_location": "Seronera",
            "sighting_time": chrono::Utc::now(),
            "confidence": 1.5,
            "reporter_type": "tourist"
        });
        let (status, body) = send(&app, post_json("/api/v1/sightings", invalid)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_park_status_tracks_activity() {
        let (app, engine) = app().await;

        let (status, body) = send(&app, get("/api/v1/parks/manyara/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["activityLevel"], "low");
        assert_eq!(body["predictionsAvailable"], false);
        assert!(body["lastUpdated"].is_null());

        for minutes in [5, 15, 25] {
            let report = json!({
                "park_id": "manyara",
                "species_id": "elephants",
                "sighting_location": "Lake Manyara shores",
                "sighting_time": chrono::Utc::now() - chrono::Duration::minutes(minutes),
                "confidence": 0.8,
                "reporter_type": "guide"
            });
            let (status, _) = send(&app, post_json("/api/v1/sightings", report)).await;
            assert_eq!(status, StatusCode::CREATED);
        }
        engine
            .scheduler
            .run_cycle(JobClass::PredictionRefresh, chrono::Utc::now())
            .await;

        let (_, body) = send(&app, get("/api/v1/parks/manyara/status")).await;
        assert_eq!(body["activityLevel"], "medium");
        assert_eq!(body["recentSightingsCount"], 3);
        assert_eq!(body["predictionsAvailable"], true);
        assert!(body["lastUpdated"].is_string());

        let (status, _) = send(&app, get("/api/v1/parks/atlantis/status")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_prediction_history_window() {
        let (app, engine) = app().await;

        let (_, body) = send(&app, get("/api/v1/history/gombe")).await;
        assert!(body["entries"].as_array().unwrap().is_empty());

        engine
            .scheduler
            .run_cycle(JobClass::PredictionRefresh, chrono::Utc::now())
            .await;

        let (status, body) = send(&app, get("/api/v1/history/gombe?hours=6")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hours"], 6);
        assert_eq!(body["entries"].as_array().unwrap().len(), 10);

        let (status, body) = send(&app, get("/api/v1/history/gombe?hours=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["field"], "hours");

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_sync_status_lists_finished_cycles() {
        let (app, engine) = app().await;

        // startup training is the only cycle so far
        let (status, body) = send(&app, get("/api/v1/sync/status")).await;
        assert_eq!(status, StatusCode::OK);
        let jobs = body["jobs"].as_array().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0]["job"], "model_retrain");
        assert_eq!(jobs[0]["completed"], 40);

        engine
            .scheduler
            .run_cycle(JobClass::WeatherRefresh, chrono::Utc::now())
            .await;
        let (_, body) = send(&app, get("/api/v1/health")).await;
        let last_sync = body["lastSync"].as_array().unwrap();
        assert_eq!(last_sync.len(), 2);
        assert_eq!(last_sync[0]["job"], "weather_refresh");
        assert_eq!(last_sync[0]["completed"], 4);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_sync_refused_after_shutdown() {
        let (app, engine) = app().await;
        engine.shutdown().await;

        let (status, body) = send(&app, post_empty("/api/v1/sync/weather")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "SHUTTING_DOWN");
    }
}
