//! HTTP surface coverage (§6/§7): routing, status codes, and the config
//! CRUD routes against an in-memory config store. Config creation/update
//! verify the descriptor via a disposable connection (§4.4), so those
//! routes are exercised against a real, reachable Postgres container; data
//! query routes against a live backend are covered in `pipeline_suite.rs`.

use std::sync::Arc;

use relgate::config_store::{ConfigStore, SqliteConfigStore};
use relgate::http::app_server::{AppServer, AppState};
use relgate::model::DatabaseDescriptor;
use relgate::pipeline::QueryPipeline;
use relgate::registry::ConnectionRegistry;
use relgate::schema_cache::SchemaCache;
use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;

struct Server {
    base: String,
    _container: ContainerAsync<Postgres>,
}

async fn spawn_server() -> Server {
    let container = Postgres::default()
        .with_tag("15-alpine")
        .start()
        .await
        .expect("failed to start postgres container");
    let port = container.get_host_port_ipv4(5432).await.unwrap();

    let config_store: Arc<dyn ConfigStore> =
        Arc::new(SqliteConfigStore::connect(":memory:").await.unwrap());
    let registry = Arc::new(ConnectionRegistry::new(10, 900, 4, config_store.clone()));
    let schema_cache = Arc::new(SchemaCache::new(1000, 600));
    let pipeline = Arc::new(QueryPipeline::new(
        config_store.clone(),
        registry.clone(),
        schema_cache.clone(),
    ));

    let app = AppServer::new(AppState {
        pipeline,
        config_store,
        registry,
        schema_cache,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.router).await.unwrap();
    });

    Server {
        base: format!("http://{addr}"),
        _container: container,
    }
}

fn sample_descriptor_on(name: &str, port: u16) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "db_type": "POSTGRES",
        "host": "127.0.0.1",
        "port": port,
        "database": "postgres",
        "username": "postgres",
        "password": "postgres",
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn creates_lists_and_fetches_a_config() {
    let server = spawn_server().await;
    let port = server._container.get_host_port_ipv4(5432).await.unwrap();
    let client = reqwest::Client::new();

    let created: DatabaseDescriptor = client
        .post(format!("{}/api/configs", server.base))
        .json(&sample_descriptor_on("primary", port))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created.name, "primary");
    let id = created.id.clone().unwrap();

    let list: Vec<DatabaseDescriptor> = client
        .get(format!("{}/api/configs", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 1);

    let fetched = client
        .get(format!("{}/api/configs/{id}", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(fetched.status(), reqwest::StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_name_returns_409() {
    let server = spawn_server().await;
    let port = server._container.get_host_port_ipv4(5432).await.unwrap();
    let client = reqwest::Client::new();

    client
        .post(format!("{}/api/configs", server.base))
        .json(&sample_descriptor_on("dup", port))
        .send()
        .await
        .unwrap();

    let second = client
        .post(format!("{}/api/configs", server.base))
        .json(&sample_descriptor_on("dup", port))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), reqwest::StatusCode::CONFLICT);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_descriptor_is_rejected_before_persisting() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/configs", server.base))
        .json(&sample_descriptor_on("unreachable", 1))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);

    let list: Vec<DatabaseDescriptor> = client
        .get(format!("{}/api/configs", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_config_returns_404() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/configs/does-not-exist", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_then_get_returns_404() {
    let server = spawn_server().await;
    let port = server._container.get_host_port_ipv4(5432).await.unwrap();
    let client = reqwest::Client::new();

    let created: DatabaseDescriptor = client
        .post(format!("{}/api/configs", server.base))
        .json(&sample_descriptor_on("ephemeral", port))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created.id.unwrap();

    let delete_response = client
        .delete(format!("{}/api/configs/{id}", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(delete_response.status(), reqwest::StatusCode::NO_CONTENT);

    let fetched = client
        .get(format!("{}/api/configs/{id}", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(fetched.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn query_request_missing_descriptor_returns_400() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/query/count", server.base))
        .json(&serde_json::json!({ "table": "whatever" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}
