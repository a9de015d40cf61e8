use crate::models::{Reading, TelemetryIn};
use time::OffsetDateTime;

/// Erreurs de décodage d'un payload télémétrie.
/// Un payload rejeté ici n'atteint ni le stockage ni la classification.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid telemetry JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("client_id must not be empty")]
    EmptyClientId,
    #[error("embedded timestamp out of range: {0}")]
    TimestampRange(i64),
}

/// Décode un payload MQTT brut en `Reading` validé.
///
/// `received_at` est l'heure d'arrivée du message, utilisée quand le capteur
/// n'embarque pas de timestamp. Elle est passée en paramètre pour garder la
/// fonction pure et déterministe.
pub fn decode_reading(payload: &[u8], received_at: OffsetDateTime) -> Result<Reading, DecodeError> {
    let raw: TelemetryIn = serde_json::from_slice(payload)?;

    if raw.client_id.is_empty() {
        return Err(DecodeError::EmptyClientId);
    }

    let timestamp = match raw.timestamp {
        Some(millis) => OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
            .map_err(|_| DecodeError::TimestampRange(millis))?,
        None => received_at,
    };

    Ok(Reading {
        client_id: raw.client_id,
        analog_value: raw.analog_value,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2025-06-01 12:00:00 UTC);

    #[test]
    fn valid_payload_keeps_fields_and_defaults_timestamp() {
        let reading =
            decode_reading(br#"{"client_id":"T1","analog_value":19.42}"#, NOW).unwrap();
        assert_eq!(reading.client_id, "T1");
        assert_eq!(reading.analog_value, 19.42);
        assert_eq!(reading.timestamp, NOW);
    }

    #[test]
    fn embedded_timestamp_wins_over_arrival_time() {
        let reading = decode_reading(
            br#"{"client_id":"T2","analog_value":33.0,"timestamp":1748779200000}"#,
            NOW,
        )
        .unwrap();
        assert_eq!(reading.timestamp.unix_timestamp(), 1_748_779_200);
    }

    #[test]
    fn missing_client_id_is_rejected() {
        assert!(decode_reading(br#"{"analog_value":19.42}"#, NOW).is_err());
    }

    #[test]
    fn missing_analog_value_is_rejected() {
        assert!(decode_reading(br#"{"client_id":"T1"}"#, NOW).is_err());
    }

    #[test]
    fn non_numeric_analog_value_is_rejected() {
        assert!(decode_reading(br#"{"client_id":"T1","analog_value":"high"}"#, NOW).is_err());
    }

    #[test]
    fn empty_client_id_is_rejected() {
        let err = decode_reading(br#"{"client_id":"","analog_value":1.0}"#, NOW).unwrap_err();
        assert!(matches!(err, DecodeError::EmptyClientId));
    }

    #[test]
    fn garbage_payload_is_rejected() {
        assert!(decode_reading(b"not json at all", NOW).is_err());
    }
}
