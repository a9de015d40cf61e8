/**
 * API REST + WEBSOCKET - Façade HTTP de la station
 *
 * RÔLE :
 * Expose l'historique des mesures aux dashboards (Grafana, PWA) et le
 * canal WebSocket temps réel alimenté par le pipeline d'ingestion.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, routes /api/sensors (historique), /ws (live), /health
 * - Les bornes startDate/endDate sont des timestamps unix en millisecondes
 * - Réponses triées par timestamp croissant, format RFC3339
 * - CORS permissif : les dashboards sont servis depuis d'autres origines
 *
 * SESSIONS WEBSOCKET :
 * connexion -> enregistrement au registre -> boucle de forward des
 * mesures enrichies -> retrait du registre à la déconnexion. Aucune
 * authentification des abonnés (hors périmètre).
 */

use crate::dispatch::SubscriberRegistry;
use crate::health::{HealthTracker, StationHealth};
use crate::models::Reading;
use crate::store::{ReadingQuery, ReadingStore};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReadingStore>,
    pub registry: SubscriberRegistry,
    pub health: HealthTracker,
}

pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(welcome))
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/api/sensors", get(get_all_history))
        .route("/api/sensors/list", get(list_sensors))
        .route("/api/sensors/{client_id}", get(get_sensor_history))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(app_state)
}

// GET /
async fn welcome() -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": "WELCOME API SENSOR MONITORING",
    }))
}

// GET /system/health (état du pipeline)
async fn get_system_health(State(app): State<AppState>) -> Json<StationHealth> {
    Json(app.health.get_health(&app.registry))
}

// GET /api/sensors?startDate=..&endDate=.. (historique tous capteurs)
async fn get_all_history(
    State(app): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Reading>>, (StatusCode, Json<Value>)> {
    let query = range_query(&params, None)?;
    run_query(&app, &query)
}

// GET /api/sensors/list (capteurs distincts)
async fn list_sensors(
    State(app): State<AppState>,
) -> Result<Json<Vec<String>>, (StatusCode, Json<Value>)> {
    app.store.client_ids().map(Json).map_err(|e| {
        eprintln!("[http] failed to list sensors: {e}");
        internal_error()
    })
}

// GET /api/sensors/{client_id}?startDate=..&endDate=.. (historique d'un capteur)
async fn get_sensor_history(
    State(app): State<AppState>,
    Path(client_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Reading>>, (StatusCode, Json<Value>)> {
    let query = range_query(&params, Some(client_id))?;
    run_query(&app, &query)
}

fn run_query(
    app: &AppState,
    query: &ReadingQuery,
) -> Result<Json<Vec<Reading>>, (StatusCode, Json<Value>)> {
    app.store.query(query).map(Json).map_err(|e| {
        eprintln!("[http] history query failed: {e}");
        internal_error()
    })
}

/// Construit la requête historique depuis les query params.
/// Bornes invalides = 400, comme attendu par les dashboards.
fn range_query(
    params: &HashMap<String, String>,
    client_id: Option<String>,
) -> Result<ReadingQuery, (StatusCode, Json<Value>)> {
    let start = parse_bound(params.get("startDate"))?;
    let end = parse_bound(params.get("endDate"))?;
    Ok(ReadingQuery {
        client_id,
        start,
        end,
    })
}

fn parse_bound(
    raw: Option<&String>,
) -> Result<Option<OffsetDateTime>, (StatusCode, Json<Value>)> {
    match raw {
        None => Ok(None),
        Some(text) => parse_millis(text).map(Some).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Invalid startDate or endDate. Please provide valid timestamps in milliseconds.",
                })),
            )
        }),
    }
}

fn parse_millis(text: &str) -> Option<OffsetDateTime> {
    let millis: i64 = text.parse().ok()?;
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000).ok()
}

fn internal_error() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "internal storage error"})),
    )
}

// GET /ws (upgrade vers la session live)
async fn ws_handler(ws: WebSocketUpgrade, State(app): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app))
}

/// Session d'un abonné live : forward des mesures enrichies jusqu'à la
/// première erreur d'envoi, puis retrait du registre (idempotent : le
/// dispatcher a pu élaguer l'abonné avant nous).
async fn handle_socket(mut socket: WebSocket, app: AppState) {
    let (id, mut rx) = app.registry.add();
    eprintln!("[ws] subscriber {id} connected");

    while let Some(payload) = rx.recv().await {
        if socket
            .send(Message::Text(payload.as_str().into()))
            .await
            .is_err()
        {
            break;
        }
    }

    app.registry.remove(id);
    eprintln!("[ws] subscriber {id} disconnected");
}
