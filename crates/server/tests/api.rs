//! HTTP-level tests driving the router in-process.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use embed::{Embedder, HashEmbedder};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use server::{build_router, ServerConfig, ServerState};
use store::{DocumentStore, Entity, StoreConfig, TextDocument};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: Arc<DocumentStore>,
    embedder: Arc<HashEmbedder>,
}

fn test_app() -> TestApp {
    let store = Arc::new(DocumentStore::new(StoreConfig::default()).unwrap());
    let embedder = Arc::new(HashEmbedder::new("feature-hash-v1", 64));
    let state = ServerState::from_parts(ServerConfig::default(), store.clone(), embedder.clone());
    TestApp {
        router: build_router(Arc::new(state)),
        store,
        embedder,
    }
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
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
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn seed_embedded(app: &TestApp, texts: &[&str]) {
    for text in texts {
        let vector = app.embedder.embed(text).await.unwrap();
        app.store
            .insert(Entity::from(
                TextDocument::new(*text, *text).with_embedding(vector, app.embedder.model_version()),
            ))
            .unwrap();
    }
}

const CORPUS: [&str; 12] = [
    "dolor de cabeza",
    "fiebre alta en adultos",
    "tos seca nocturna",
    "alergia al polen",
    "dolor muscular tras ejercicio",
    "insomnio ocasional",
    "acidez de estomago",
    "gripe estacional",
    "presion arterial alta",
    "piel seca en invierno",
    "dolor de muelas",
    "congestion nasal",
];

#[tokio::test]
async fn health_reports_healthy() {
    let app = test_app();
    let (status, body) = send(&app.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app.router, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["components"]["store"], "ready");
}

#[tokio::test]
async fn search_on_empty_store_is_empty_brute_force() {
    let app = test_app();
    let (status, body) = send(
        &app.router,
        post_json("/search", json!({ "query": "dolor de cabeza" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "brute_force");
    assert_eq!(body["results"], json!([]));
}

#[tokio::test]
async fn search_ranks_closest_document_first() {
    let app = test_app();
    seed_embedded(&app, &CORPUS).await;

    let (status, body) = send(
        &app.router,
        post_json("/search", json!({ "query": "dolor de cabeza", "top_k": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "brute_force");
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["title"], "dolor de cabeza");
    assert!(results[0]["_id"].is_string());
    let scores: Vec<f64> = results.iter().map(|r| r["score"].as_f64().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn rebuilt_index_serves_indexed_results() {
    let app = test_app();
    seed_embedded(&app, &CORPUS).await;

    let (status, body) = send(&app.router, post_json("/vector-index/rebuild", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "ready");
    assert_eq!(body["vectors"], 12);

    let (status, body) = send(
        &app.router,
        post_json("/search", json!({ "query": "dolor de cabeza", "top_k": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "indexed");
    assert_eq!(body["results"][0]["title"], "dolor de cabeza");
}

#[tokio::test]
async fn search_rejects_bad_top_k() {
    let app = test_app();
    for top_k in [0, -1, 101] {
        let (status, body) = send(
            &app.router,
            post_json("/search", json!({ "query": "fiebre", "top_k": top_k })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "top_k={top_k}");
        assert_eq!(body["error"]["code"], "INVALID_ARGUMENT");
    }
}

#[tokio::test]
async fn search_rejects_malformed_bodies() {
    let app = test_app();
    let req = Request::builder()
        .method("POST")
        .uri("/search")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let (status, body) = send(&app.router, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_ARGUMENT");

    let (status, _) = send(&app.router, post_json("/search", json!({ "top_k": 3 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app.router, post_json("/search", json!({ "query": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_then_fetch_medicamento() {
    let app = test_app();
    let payload = json!({
        "_id": "client-chosen",
        "nombre": "Ibuprofeno 400mg",
        "precio": 3.5,
        "categoria": { "nombre": "Analgesicos" },
        "proveedores": ["P001"]
    });
    let (status, created) = send(&app.router, post_json("/medicamentos", payload)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["_id"].as_str().unwrap().to_string();
    assert_ne!(id, "client-chosen");
    assert!(uuid::Uuid::parse_str(&id).is_ok());
    assert_eq!(created["nombre"], "Ibuprofeno 400mg");

    let (status, fetched) = send(&app.router, get(&format!("/medicamentos/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn create_rejects_schema_violations() {
    let app = test_app();
    let missing_price = json!({ "nombre": "Aspirina", "categoria": { "nombre": "Analgesicos" } });
    let (status, body) = send(&app.router, post_json("/medicamentos", missing_price)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_ARGUMENT");

    let negative = json!({ "nombre": "Aspirina", "precio": -1.0, "categoria": { "nombre": "A" } });
    let (status, _) = send(&app.router, post_json("/medicamentos", negative)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown_field = json!({ "nombre": "Ana", "direccion": "C/ Mayor 1", "telefono": "600", "edad": 30 });
    let (status, _) = send(&app.router, post_json("/clientes", unknown_field)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app.router, post_json("/clientes", json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_collection_is_not_found() {
    let app = test_app();
    let (status, body) = send(&app.router, get("/recetas")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = send(&app.router, post_json("/recetas", json!({ "x": 1 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_by_id_validates_and_reports_missing() {
    let app = test_app();
    let (status, _) = send(&app.router, get("/documents/bad$id")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let long = "x".repeat(129);
    let (status, _) = send(&app.router, get(&format!("/documents/{long}"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app.router, get("/documents/missing-id")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn listing_pages_with_default_and_bounded_limit() {
    let app = test_app();
    let docs: Vec<Entity> = (0..60)
        .map(|i| Entity::from(TextDocument::new(format!("doc {i}"), "contenido")))
        .collect();
    app.store.insert_many(docs).unwrap();

    let (status, body) = send(&app.router, get("/documents")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limit"], 50);
    assert_eq!(body["items"].as_array().unwrap().len(), 50);

    let (status, body) = send(&app.router, get("/documents?offset=55&limit=10")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 5);

    let (status, _) = send(&app.router, get("/documents?limit=101")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app.router, get("/documents?limit=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stats_counts_every_collection() {
    let app = test_app();
    seed_embedded(&app, &CORPUS[..3]).await;
    let cliente = json!({ "nombre": "Ana", "direccion": "C/ Mayor 1", "telefono": "600000000" });
    let (status, _) = send(&app.router, post_json("/clientes", cliente)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app.router, get("/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["collections"]["documents"], 3);
    assert_eq!(body["collections"]["clientes"], 1);
    assert_eq!(body["collections"]["transacciones"], 0);
    assert_eq!(body["total"], 4);
    assert_eq!(body["vector_index"]["state"], "absent");
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = test_app();
    let req = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");
}

#[tokio::test]
async fn metrics_without_recorder_is_not_found() {
    let app = test_app();
    let (status, _) = send(&app.router, get("/metrics")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
