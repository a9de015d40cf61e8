/**
 * LUMEN STATION - Point d'entrée de la station centrale de monitoring
 *
 * RÔLE : Orchestration de tous les modules : config, ingestion MQTT,
 * persistence, classification, diffusion WebSocket, API REST, health.
 *
 * ARCHITECTURE : Event-driven via MQTT + pipeline d'enrichissement + push
 * temps réel vers les dashboards. Les handles longue durée (store, client
 * de classification, registre d'abonnés) sont construits une fois ici et
 * passés explicitement au coordinateur, jamais en globals ambiants.
 */

mod classify;
mod config;
mod coordinator;
mod decode;
mod dispatch;
mod health;
mod http;
mod models;
mod mqtt;
mod state;
mod store;

use crate::classify::ClassifierClient;
use crate::config::load_config;
use crate::coordinator::Coordinator;
use crate::dispatch::{Dispatcher, SubscriberRegistry};
use crate::health::HealthTracker;
use crate::http::AppState;
use crate::store::JsonReadingStore;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    let cfg = load_config().await;

    // Ressources process-scoped, construites une fois au démarrage.
    // Un échec ici est fatal : rien à faire tourner sans stockage ni client.
    let store = match JsonReadingStore::new(&cfg.storage.path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("[station] failed to initialize reading store: {e}");
            std::process::exit(1);
        }
    };

    let classifier = match ClassifierClient::new(&cfg.classifier) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("[station] failed to build classifier client: {e}");
            std::process::exit(1);
        }
    };

    let registry = SubscriberRegistry::new();
    let dispatcher = Dispatcher::new(registry.clone());
    let health = HealthTracker::new();

    // Pipeline d'ingestion : MQTT remplit le coordinateur, un événement à la fois
    let coordinator = Arc::new(Coordinator::new(
        store.clone(),
        classifier,
        dispatcher,
        health.clone(),
    ));
    mqtt::spawn_ingest_loop(coordinator, cfg.mqtt.clone(), health.clone());

    // Publication auto du health de la station
    health.spawn_health_publisher(cfg.mqtt.clone(), registry.clone());

    // Façade HTTP : historique + WebSocket live
    let app_state = AppState {
        store,
        registry,
        health,
    };
    let app = http::build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http.port));
    println!("[station] listening on http://{addr}");
    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

/// Arrêt sur Ctrl+C : on cesse d'accepter de nouveaux événements, les
/// opérations en vol se terminent selon leurs propres timeouts.
async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    println!("[station] shutdown signal received");
}
