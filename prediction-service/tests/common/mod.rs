#![allow(dead_code)]

use axum::{body::Body, http::Request, Router};
use prediction_service::config::PredictionConfig;
use prediction_service::pipeline::DomainRegistry;
use prediction_service::services::providers::{InsightProvider, MockInsightProvider};
use prediction_service::startup::{build_router, AppState, Application};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const DIABETES_COLUMNS: [&str; 15] = [
    "age",
    "hypertension",
    "heart_disease",
    "bmi",
    "HbA1c_level",
    "blood_glucose_level",
    "gender_Female",
    "gender_Male",
    "gender_Other",
    "smoking_history_No Info",
    "smoking_history_current",
    "smoking_history_ever",
    "smoking_history_former",
    "smoking_history_never",
    "smoking_history_not current",
];

/// Float-typed categorical source columns come out of the dummy encoder
/// with a `.0` suffix. `thal` uses the Cleveland coding (3, 6, 7).
pub const HEART_COLUMNS: [&str; 29] = [
    "age",
    "trestbps",
    "chol",
    "thalach",
    "oldpeak",
    "sex_0",
    "sex_1",
    "cp_0",
    "cp_1",
    "cp_2",
    "cp_3",
    "fbs_0",
    "fbs_1",
    "restecg_0",
    "restecg_1",
    "restecg_2",
    "exang_0",
    "exang_1",
    "slope_0",
    "slope_1",
    "slope_2",
    "ca_0.0",
    "ca_1.0",
    "ca_2.0",
    "ca_3.0",
    "ca_4.0",
    "thal_3.0",
    "thal_6.0",
    "thal_7.0",
];

fn write(dir: &Path, name: &str, value: Value) {
    std::fs::write(dir.join(name), serde_json::to_vec_pretty(&value).unwrap()).unwrap();
}

/// Two stumps: one on scaled HbA1c, one on scaled blood glucose.
///
/// Scenario A input lands left in both trees, probability 0.2.
pub fn write_diabetes_artifacts(dir: &Path) {
    write(dir, "diabetes_feature_columns.json", json!(DIABETES_COLUMNS));
    write(
        dir,
        "diabetes_scaler.json",
        json!({
            "feature_names": ["age", "bmi", "HbA1c_level", "blood_glucose_level"],
            "mean": [41.9, 27.3, 5.5, 138.0],
            "scale": [22.5, 6.6, 1.07, 40.7]
        }),
    );
    write(
        dir,
        "diabetes_model.json",
        json!({
            "kind": "random_forest",
            "classes": [0, 1],
            "n_features": 15,
            "trees": [
                {
                    "children_left": [1, -1, -1],
                    "children_right": [2, -1, -1],
                    "feature": [4, -2, -2],
                    "threshold": [0.5, -2.0, -2.0],
                    "value": [[110.0, 90.0], [90.0, 10.0], [20.0, 80.0]]
                },
                {
                    "children_left": [1, -1, -1],
                    "children_right": [2, -1, -1],
                    "feature": [5, -2, -2],
                    "threshold": [1.0, -2.0, -2.0],
                    "value": [[80.0, 120.0], [70.0, 30.0], [10.0, 90.0]]
                }
            ]
        }),
    );
}

/// Single stump on `gender_Female`: unset gives 0.8, set gives 0.1.
pub fn write_diabetes_gender_artifacts(dir: &Path) {
    write_diabetes_artifacts(dir);
    write(
        dir,
        "diabetes_model.json",
        json!({
            "kind": "random_forest",
            "classes": [0, 1],
            "n_features": 15,
            "trees": [{
                "children_left": [1, -1, -1],
                "children_right": [2, -1, -1],
                "feature": [6, -2, -2],
                "threshold": [0.5, -2.0, -2.0],
                "value": [[11.0, 9.0], [2.0, 8.0], [9.0, 1.0]]
            }]
        }),
    );
}

/// Logistic regression driven only by the `ca_*` one-hot columns:
/// any mapped `hd_ca` gives `sigmoid(1)`, an unmapped one `sigmoid(-1)`.
pub fn write_heart_artifacts(dir: &Path) {
    write(dir, "heart_disease_feature_columns.json", json!(HEART_COLUMNS));
    write(
        dir,
        "heart_disease_scaler.json",
        json!({
            "feature_names": ["age", "trestbps", "chol", "thalach", "oldpeak"],
            "mean": [54.4, 131.7, 246.7, 149.6, 1.04],
            "scale": [9.0, 17.6, 51.8, 22.9, 1.16]
        }),
    );

    let coefficients: Vec<f64> = HEART_COLUMNS
        .iter()
        .map(|column| if column.starts_with("ca_") { 2.0 } else { 0.0 })
        .collect();
    write(
        dir,
        "heart_disease_model.json",
        json!({
            "kind": "logistic_regression",
            "classes": [0, 1],
            "coefficients": coefficients,
            "intercept": -1.0
        }),
    );
}

pub struct Artifacts {
    pub dir: TempDir,
}

impl Artifacts {
    pub fn both() -> Self {
        let dir = tempfile::tempdir().unwrap();
        write_diabetes_artifacts(dir.path());
        write_heart_artifacts(dir.path());
        Self { dir }
    }

    pub fn diabetes_only() -> Self {
        let dir = tempfile::tempdir().unwrap();
        write_diabetes_artifacts(dir.path());
        Self { dir }
    }

    pub fn diabetes_by_gender() -> Self {
        let dir = tempfile::tempdir().unwrap();
        write_diabetes_gender_artifacts(dir.path());
        Self { dir }
    }

    pub fn none() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn state(&self, provider: Arc<dyn InsightProvider>) -> AppState {
        AppState::new(
            PredictionConfig::for_tests(self.dir.path()),
            DomainRegistry::load(self.dir.path()),
            provider,
        )
    }

    pub fn router(&self) -> Router {
        build_router(self.state(Arc::new(MockInsightProvider::new(true))))
    }
}

pub fn diabetes_scenario_a() -> Value {
    json!({
        "disease_type": "diabetes",
        "gender": "Female",
        "age": 45,
        "hypertension": 0,
        "heart_disease": 0,
        "smoking_history": "never",
        "bmi": 27.3,
        "HbA1c_level": 5.8,
        "blood_glucose_level": 140
    })
}

pub fn heart_input(ca: Value) -> Value {
    json!({
        "disease_type": "heart_disease",
        "hd_age": "63",
        "hd_sex": "1",
        "hd_cp": "3",
        "hd_trestbps": "145",
        "hd_chol": "233",
        "hd_fbs": "1",
        "hd_restecg": "0",
        "hd_thalach": "150",
        "hd_exang": "0",
        "hd_oldpeak": "2.3",
        "hd_slope": "0",
        "hd_ca": ca,
        "hd_thal": "7"
    })
}

/// POST `body` as JSON and return status plus parsed response body.
pub async fn post_json(router: Router, uri: &str, body: &Value) -> (u16, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(router, request).await
}

pub async fn send(router: Router, request: Request<Body>) -> (u16, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status().as_u16();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    _artifacts: Artifacts,
}

impl TestApp {
    pub async fn spawn(artifacts: Artifacts) -> Self {
        let state = artifacts.state(Arc::new(MockInsightProvider::new(true)));
        let app = Application::build_with_state(state)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to accept connections
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }

        TestApp {
            address,
            port,
            _artifacts: artifacts,
        }
    }
}
