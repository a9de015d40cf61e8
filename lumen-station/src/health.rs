use crate::config::MqttConf;
use crate::dispatch::SubscriberRegistry;
use crate::state::{new_state, Shared};
use rumqttc::{AsyncClient, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task;

#[derive(Debug, Serialize, Deserialize)]
pub struct StationHealth {
    pub uptime_seconds: u64,
    pub mqtt_status: String,
    pub mqtt_reconnects: u32,
    pub readings_ingested: u64,
    pub readings_dropped: u64,
    pub storage_failures: u64,
    pub classify_failures: u64,
    pub subscribers_connected: u32,
}

/// Compteurs du pipeline, partagés entre coordinateur, ingest MQTT et API.
#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    mqtt_status: Shared<String>,
    mqtt_reconnects: Arc<AtomicU32>,
    readings_ingested: Arc<AtomicU64>,
    readings_dropped: Arc<AtomicU64>,
    storage_failures: Arc<AtomicU64>,
    classify_failures: Arc<AtomicU64>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            mqtt_status: new_state("connecting".to_string()),
            mqtt_reconnects: Arc::new(AtomicU32::new(0)),
            readings_ingested: Arc::new(AtomicU64::new(0)),
            readings_dropped: Arc::new(AtomicU64::new(0)),
            storage_failures: Arc::new(AtomicU64::new(0)),
            classify_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn mark_mqtt_connected(&self) {
        *self.mqtt_status.lock() = "connected".to_string();
    }

    pub fn increment_reconnects(&self) {
        self.mqtt_reconnects.fetch_add(1, Ordering::Relaxed);
        *self.mqtt_status.lock() = "reconnecting".to_string();
    }

    pub fn mark_reading_ingested(&self) {
        self.readings_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_reading_dropped(&self) {
        self.readings_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_storage_failure(&self) {
        self.storage_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_classify_failure(&self) {
        self.classify_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_health(&self, registry: &SubscriberRegistry) -> StationHealth {
        StationHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            mqtt_status: self.mqtt_status.lock().clone(),
            mqtt_reconnects: self.mqtt_reconnects.load(Ordering::Relaxed),
            readings_ingested: self.readings_ingested.load(Ordering::Relaxed),
            readings_dropped: self.readings_dropped.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            classify_failures: self.classify_failures.load(Ordering::Relaxed),
            subscribers_connected: registry.len() as u32,
        }
    }

    /// Démarre la publication auto du health de la station sur MQTT
    pub fn spawn_health_publisher(&self, mqtt_cfg: MqttConf, registry: SubscriberRegistry) {
        let health_tracker = self.clone();

        task::spawn(async move {
            let mut opts = MqttOptions::new("lumen-station-health", &mqtt_cfg.host, mqtt_cfg.port);
            opts.set_keep_alive(Duration::from_secs(15));

            let (client, mut eventloop) = AsyncClient::new(opts, 10);

            // Boucle principale : publish health toutes les 30s
            let mut interval = tokio::time::interval(Duration::from_secs(30));

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let health = health_tracker.get_health(&registry);
                        if let Ok(payload) = serde_json::to_string(&health) {
                            if let Err(e) = client.publish("lumen/station/health@v1", QoS::AtLeastOnce, false, payload).await {
                                eprintln!("[health] failed to publish: {e:?}");
                            }
                        }
                    },
                    event = eventloop.poll() => {
                        match event {
                            Ok(_) => {}
                            Err(e) => {
                                eprintln!("[health] MQTT error: {e:?}");
                                tokio::time::sleep(Duration::from_secs(2)).await;
                            }
                        }
                    }
                }
            }
        });
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}
