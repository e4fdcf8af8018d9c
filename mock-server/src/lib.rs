use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub type Db = Arc<RwLock<HashMap<String, Value>>>;

#[derive(Deserialize)]
pub struct MessageQuery {
    pub message: Option<String>,
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/docs", get(list_docs))
        .route("/docs/{key}", get(get_doc).put(put_doc).delete(delete_doc))
        .route("/status/{code}", get(bare_status))
        .route("/nested-error/{code}", get(nested_error))
        .route("/not-json", get(not_json))
        .route("/echo", any(echo))
        .route("/slow/{ms}", get(slow))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn status_from(code: u16) -> Result<StatusCode, StatusCode> {
    StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)
}

fn error_body(message: &str) -> Json<Value> {
    Json(json!({ "error": { "message": message } }))
}

async fn list_docs(State(db): State<Db>) -> Json<Vec<String>> {
    let docs = db.read().await;
    let mut keys: Vec<String> = docs.keys().cloned().collect();
    keys.sort();
    Json(keys)
}

async fn get_doc(State(db): State<Db>, Path(key): Path<String>) -> Response {
    match db.read().await.get(&key) {
        Some(doc) => Json(doc.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            error_body(&format!("document {key} not found")),
        )
            .into_response(),
    }
}

async fn put_doc(
    State(db): State<Db>,
    Path(key): Path<String>,
    Json(doc): Json<Value>,
) -> Json<Value> {
    db.write().await.insert(key, doc.clone());
    Json(doc)
}

async fn delete_doc(State(db): State<Db>, Path(key): Path<String>) -> Response {
    match db.write().await.remove(&key) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => (
            StatusCode::NOT_FOUND,
            error_body(&format!("document {key} not found")),
        )
            .into_response(),
    }
}

/// Reply with `code` and an empty body.
async fn bare_status(Path(code): Path<u16>) -> Result<StatusCode, StatusCode> {
    status_from(code)
}

/// Reply with `code` and the message nested under `data.error`.
async fn nested_error(
    Path(code): Path<u16>,
    axum::extract::Query(query): axum::extract::Query<MessageQuery>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let status = status_from(code)?;
    let message = query.message.unwrap_or_else(|| "nested failure".to_string());
    Ok((status, Json(json!({ "data": { "error": { "message": message } } }))))
}

async fn not_json() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "this is not json")
}

async fn echo(method: Method, headers: HeaderMap, body: String) -> Json<Value> {
    let header_str = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "method": method.as_str(),
        "authorization": header_str(header::AUTHORIZATION),
        "content_type": header_str(header::CONTENT_TYPE),
        "body": body,
    }))
}

async fn slow(Path(ms): Path<u64>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(json!({ "delayed_ms": ms }))
}
