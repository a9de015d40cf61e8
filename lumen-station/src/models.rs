use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Payload brut publié par un capteur sur le topic télémétrie.
/// `timestamp` optionnel en millisecondes unix (sinon heure d'arrivée).
#[derive(Debug, Deserialize)]
pub struct TelemetryIn {
    pub client_id: String,
    pub analog_value: f64,
    pub timestamp: Option<i64>,
}

/// Une mesure capteur décodée et validée.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub client_id: String,
    pub analog_value: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Condition lumineuse prédite par le microservice de classification.
/// Vocabulaire fermé, `Unknown` quand la classification a échoué.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    #[serde(rename = "intense sunlight")]
    IntenseSunlight,
    #[serde(rename = "sun/shadow glare")]
    SunShadowGlare,
    #[serde(rename = "darkness")]
    Darkness,
    #[serde(rename = "shadow")]
    Shadow,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Label {
    /// Mapping fixe code numérique -> label (contrat du modèle).
    /// Tout autre code est hors vocabulaire.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Label::IntenseSunlight),
            1 => Some(Label::SunShadowGlare),
            2 => Some(Label::Darkness),
            3 => Some(Label::Shadow),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::IntenseSunlight => "intense sunlight",
            Label::SunShadowGlare => "sun/shadow glare",
            Label::Darkness => "darkness",
            Label::Shadow => "shadow",
            Label::Unknown => "unknown",
        }
    }
}

/// Mesure enrichie diffusée aux dashboards : la mesure d'origine + la prédiction.
/// Construite par le coordinateur, jamais persistée.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedReading {
    #[serde(flatten)]
    pub reading: Reading,
    pub predict: Label,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn label_codes_match_model_contract() {
        assert_eq!(Label::from_code(0), Some(Label::IntenseSunlight));
        assert_eq!(Label::from_code(1), Some(Label::SunShadowGlare));
        assert_eq!(Label::from_code(2), Some(Label::Darkness));
        assert_eq!(Label::from_code(3), Some(Label::Shadow));
        assert_eq!(Label::from_code(4), None);
        assert_eq!(Label::from_code(-1), None);
    }

    #[test]
    fn enriched_reading_serializes_flat_with_predict() {
        let enriched = EnrichedReading {
            reading: Reading {
                client_id: "T1".into(),
                analog_value: 19.5,
                timestamp: datetime!(2025-06-01 12:00:00 UTC),
            },
            predict: Label::IntenseSunlight,
        };

        let value = serde_json::to_value(&enriched).unwrap();
        assert_eq!(value["client_id"], "T1");
        assert_eq!(value["analog_value"], 19.5);
        assert_eq!(value["predict"], "intense sunlight");
        assert_eq!(value["timestamp"], "2025-06-01T12:00:00Z");
    }

    #[test]
    fn unknown_label_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Label::Unknown).unwrap(), "unknown");
        assert_eq!(Label::Unknown.as_str(), "unknown");
    }
}
