use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use shardcat_infra::{CatalogConfig, InventoryCatalog};

struct TestServer {
    base_url: String,
    catalog: Arc<InventoryCatalog>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory stores, ephemeral port.
        let catalog = Arc::new(
            InventoryCatalog::open(&CatalogConfig::in_memory())
                .await
                .expect("failed to open in-memory catalog"),
        );
        let app = shardcat_api::app::build_app(catalog.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            catalog,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn seed_reference(client: &reqwest::Client, srv: &TestServer) {
    let res = client
        .post(srv.url("/categories"))
        .json(&json!({ "id": 1, "name": "Electronics" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(srv.url("/suppliers"))
        .json(&json!({ "id": 1, "name": "Acme", "contact_info": "sales@acme.test" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

async fn create_product(client: &reqwest::Client, srv: &TestServer, name: &str, price: &str) -> String {
    let res = client
        .post(srv.url("/products"))
        .json(&json!({
            "name": name,
            "description": "test item",
            "price": price,
            "stock_quantity": 10,
            "category_id": 1,
            "supplier_id": 1,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn reference_data_is_listed_after_create() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    seed_reference(&client, &srv).await;

    let categories: Value = client
        .get(srv.url("/categories"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(categories.as_array().unwrap().len(), 1);
    assert_eq!(categories[0]["name"], "Electronics");

    let suppliers: Value = client
        .get(srv.url("/suppliers"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(suppliers[0]["contact_info"], "sales@acme.test");

    let replicas: Value = client
        .get(srv.url("/admin/replicas"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(replicas["consistent"], true);
}

#[tokio::test]
async fn product_moves_between_shards_on_reprice() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    seed_reference(&client, &srv).await;

    let id = create_product(&client, &srv, "Cable", "25.00").await;

    let product: Value = client
        .get(srv.url(&format!("/products/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(product["shard"], "low_price");
    assert_eq!(product["price"], "25.00");
    assert_eq!(product["category_name"], "Electronics");

    let res = client
        .put(srv.url(&format!("/products/{id}/price")))
        .json(&json!({ "price": "750.00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let product: Value = client
        .get(srv.url(&format!("/products/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(product["shard"], "high_price");
    assert_eq!(product["stock_quantity"], 10);

    let counts: Value = client
        .get(srv.url("/shards/counts"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(counts["low_price"], 0);
    assert_eq!(counts["mid_price"], 0);
    assert_eq!(counts["high_price"], 1);

    let log: Value = client
        .get(srv.url(&format!("/products/{id}/log")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let types: Vec<_> = log
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["change_type"].clone())
        .collect();
    assert_eq!(types, vec![json!("stock_in"), json!("price_update")]);

    let pending: Value = client
        .get(srv.url("/admin/migrations"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(pending.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn price_range_spans_shards() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    seed_reference(&client, &srv).await;

    create_product(&client, &srv, "Cable", "25.00").await;
    create_product(&client, &srv, "Monitor", "250.00").await;
    create_product(&client, &srv, "Laptop", "1200.00").await;

    let products: Value = client
        .get(srv.url("/products?min=20&max=500"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let mut names: Vec<_> = products
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Cable", "Monitor"]);

    let all: Value = client
        .get(srv.url("/products"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.as_array().unwrap().len(), 3);

    let res = client
        .get(srv.url("/products?min=20"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stock_cannot_go_negative() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    seed_reference(&client, &srv).await;
    let id = create_product(&client, &srv, "Cable", "25.00").await;

    let res = client
        .post(srv.url(&format!("/products/{id}/stock")))
        .json(&json!({ "delta": -4 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(srv.url(&format!("/products/{id}/stock")))
        .json(&json!({ "delta": -7 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let product = srv
        .catalog
        .get_product_by_id(id.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.stock_quantity, 6);
}

#[tokio::test]
async fn delete_then_missing() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    seed_reference(&client, &srv).await;
    let id = create_product(&client, &srv, "Cable", "25.00").await;

    let res = client
        .delete(srv.url(&format!("/products/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .delete(srv.url(&format!("/products/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(srv.url(&format!("/products/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_input_is_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    seed_reference(&client, &srv).await;

    let res = client
        .get(srv.url("/products/not-a-uuid"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url("/products"))
        .json(&json!({
            "name": "Cable",
            "price": "12.345",
            "stock_quantity": 1,
            "category_id": 1,
            "supplier_id": 1,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url("/products"))
        .json(&json!({
            "name": "Cable",
            "price": "-1.00",
            "stock_quantity": 1,
            "category_id": 1,
            "supplier_id": 1,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn conflicting_category_reports_partial_write() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    seed_reference(&client, &srv).await;

    let res = client
        .post(srv.url("/categories"))
        .json(&json!({ "id": 1, "name": "Hardware" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "partial_write");
    assert_eq!(body["details"]["failed"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn reconcile_on_clean_catalog_is_a_no_op() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/admin/reconcile"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    assert!(report["completed"].as_array().unwrap().is_empty());
    assert!(report["abandoned"].as_array().unwrap().is_empty());

    let log: Value = client
        .get(srv.url("/admin/log?limit=5"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(log.as_array().unwrap().is_empty());
}
