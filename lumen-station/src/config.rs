use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Configuration complète de la station (station.yaml)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StationConfig {
    pub mqtt: MqttConf,
    pub classifier: ClassifierConf,
    pub storage: StorageConf,
    pub http: HttpConf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    /// Topic télémétrie des capteurs
    pub topic: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClassifierConf {
    /// Endpoint du microservice d'inférence
    pub url: String,
    /// Timeout de requête : un modèle bloqué ne doit jamais geler l'ingestion
    pub timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConf {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpConf {
    pub port: u16,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConf {
                host: "localhost".into(),
                port: 1883,
                topic: "lumen/sensors/telemetry@v1".into(),
            },
            classifier: ClassifierConf {
                url: "http://localhost:5000/predict".into(),
                timeout_ms: 3000,
            },
            storage: StorageConf {
                path: "./readings.json".into(),
            },
            http: HttpConf { port: 3200 },
        }
    }
}

pub async fn load_config() -> StationConfig {
    let path = std::env::var("LUMEN_STATION_CONFIG").unwrap_or_else(|_| "station.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            return StationConfig::default();
        }
        serde_yaml::from_str(&txt).unwrap_or_else(|e| {
            eprintln!("[config] station.yaml invalide: {e}");
            StationConfig::default()
        })
    } else {
        eprintln!("[config] pas de station.yaml, usage config par défaut");
        StationConfig::default()
    }
}
