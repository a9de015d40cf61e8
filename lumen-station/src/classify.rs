/**
 * CLASSIFIER CLIENT - Appel au microservice de classification lumineuse
 *
 * RÔLE :
 * Envoie une mesure au endpoint d'inférence externe et traduit le code
 * numérique retourné en label lisible (vocabulaire fermé de `Label`).
 *
 * FONCTIONNEMENT :
 * - POST JSON `[{timestamp_millis, analog_value}]` vers l'endpoint configuré
 * - Timeout de requête configurable : un modèle bloqué ne gèle jamais l'ingestion
 * - Timeout, panne réseau, réponse non-2xx, champ manquant ou code hors
 *   vocabulaire remontent tous en `ClassifyError` ; le coordinateur dégrade
 *   alors le label en "unknown" au lieu de bloquer la diffusion
 *
 * UTILITÉ DANS LUMEN :
 * 🎯 Enrichissement : condition lumineuse affichée en temps réel sur le dashboard
 * 🎯 Résilience : le microservice peut tomber sans perdre une seule mesure
 */

use crate::config::ClassifierConf;
use crate::models::{Label, Reading};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// Erreurs de classification. Aucune n'est fatale pour le pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("classifier request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("classifier response has no prediction code")]
    MissingPrediction,
    #[error("unrecognized prediction code {0}")]
    UnrecognizedCode(i64),
}

/// Interface de classification vue par le coordinateur.
/// Permet de tester le pipeline sans endpoint d'inférence réel.
pub trait SensorClassifier: Send + Sync {
    fn classify(
        &self,
        reading: &Reading,
    ) -> impl Future<Output = Result<Label, ClassifyError>> + Send;
}

/// Client HTTP vers le microservice d'inférence
pub struct ClassifierClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ClassifierClient {
    /// Construit le client avec le timeout de requête issu de la config.
    pub fn new(cfg: &ClassifierConf) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            endpoint: cfg.url.clone(),
        })
    }
}

impl SensorClassifier for ClassifierClient {
    async fn classify(&self, reading: &Reading) -> Result<Label, ClassifyError> {
        let timestamp_millis = (reading.timestamp.unix_timestamp_nanos() / 1_000_000) as i64;
        let body = serde_json::json!([{
            "timestamp_millis": timestamp_millis,
            "analog_value": reading.analog_value,
        }]);

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let payload: Value = response.json().await?;
        prediction_from_response(&payload)
    }
}

/// Extrait le code de prédiction de la réponse du modèle (`prediction[0]`)
/// et le traduit en label. Code hors vocabulaire = erreur, pas un label.
pub fn prediction_from_response(payload: &Value) -> Result<Label, ClassifyError> {
    let code = payload["prediction"][0]
        .as_i64()
        .ok_or(ClassifyError::MissingPrediction)?;
    Label::from_code(code).ok_or(ClassifyError::UnrecognizedCode(code))
}
