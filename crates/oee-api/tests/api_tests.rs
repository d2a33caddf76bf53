//! ---
//! oee_section: "05-networking-external-interfaces"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "REST contract exercised over a live listener."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::Utc;
use oee_api::{spawn_api_server, ApiServer, ApiState};
use oee_common::config::AppConfig;
use oee_core::CellRegistry;
use oee_msg::InMemoryPublisher;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[allow(clippy::field_reassign_with_default)]
fn start(cells: usize, target: u64) -> (ApiServer, String) {
    let mut config = AppConfig::default();
    config.plant.cell_count = cells;
    config.plant.target_units = target;
    config.simulation.status_change_probability = 0.0;
    config.simulation.recovery_probability = 0.0;
    config.simulation.product_change_probability = 0.0;
    let registry = CellRegistry::initialize(&config, Arc::new(InMemoryPublisher::new()), Utc::now());
    let state = Arc::new(ApiState::new(Arc::new(registry)));
    let server = spawn_api_server(state, "127.0.0.1:0".parse().unwrap()).unwrap();
    let base = format!("http://{}", server.addr());
    (server, base)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lists_and_fetches_cells() {
    let (server, base) = start(3, 5000);
    let client = reqwest::Client::new();

    let cells: Vec<Value> = client
        .get(format!("{base}/api/cells"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cells.len(), 3);
    assert_eq!(cells[0]["id"], "C01");
    assert_eq!(cells[0]["status"], "OPERATIONAL");
    assert_eq!(cells[0]["targetUnits"], 5000);

    let cell: Value = client
        .get(format!("{base}/api/cells/C02"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cell["name"], "Célula de Produção 02");

    let missing = client
        .get(format!("{base}/api/cells/C42"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["error"], "cell C42 not found");

    server.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn increment_defaults_clamps_and_validates() {
    let (server, base) = start(1, 5);
    let client = reqwest::Client::new();
    let url = format!("{base}/api/cells/C01/increment");

    let body: Value = client
        .post(&url)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["unitsProduced"], 1);

    let body: Value = client
        .post(&url)
        .json(&json!({ "amount": 10 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["unitsProduced"], 5);
    assert_eq!(body["goodPieces"], 5);

    let negative = client
        .post(&url)
        .json(&json!({ "amount": -1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(negative.status(), StatusCode::BAD_REQUEST);

    let malformed = client
        .post(&url)
        .header("content-type", "application/json")
        .body("{amount")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    let unknown = client
        .post(format!("{base}/api/cells/C09/increment"))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    server.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn toggle_and_summary() {
    let (server, base) = start(2, 5000);
    let client = reqwest::Client::new();

    let toggled: Value = client
        .post(format!("{base}/api/cells/C02/toggle"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(toggled, json!({ "id": "C02", "status": "STOPPED" }));

    let summary: Value = client
        .get(format!("{base}/api/dashboard/summary"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["totalCells"], 2);
    assert_eq!(summary["activeCells"], 1);
    assert_eq!(summary["totalProduced"], 0);
    assert_eq!(summary["globalOEE"], 50.0);
    assert!(summary["timestamp"].is_string());

    let unknown = client
        .post(format!("{base}/api/cells/C77/toggle"))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "UP");
    assert_eq!(health["cells"], 2);

    server.shutdown().await.unwrap();
}
