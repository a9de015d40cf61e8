/**
 * INGESTION COORDINATOR - Orchestration par événement télémétrie
 *
 * RÔLE :
 * Pour chaque message du bus : décoder, puis persister ET classifier en
 * parallèle, puis diffuser la mesure enrichie aux dashboards. C'est ici
 * que vit la politique d'isolation des pannes.
 *
 * FONCTIONNEMENT (machine à états par événement) :
 * Received -> Decoded -> Enriching -> Broadcast -> Done
 *                \-> Dropped (échec de décodage uniquement)
 * - Persistence sur `spawn_blocking` (écriture fichier synchrone)
 * - Classification en future async bornée par le timeout du client
 * - `tokio::join!` attend les DEUX avant de diffuser : la diffusion est
 *   complète par construction, pas par accident
 *
 * ISOLATION DES PANNES :
 * - Échec stockage : loggé, la diffusion a quand même lieu
 * - Échec classification : loggé, predict dégradé en "unknown"
 * - Aucun retry : traitement at-most-once par message entrant
 *
 * CONCURRENCE :
 * Les événements sont traités un à la fois dans l'ordre d'arrivée, ce qui
 * garantit l'ordre de livraison par abonné. Seules les deux sous-étapes
 * d'un même événement tournent en parallèle.
 */

use crate::classify::SensorClassifier;
use crate::decode::decode_reading;
use crate::dispatch::Dispatcher;
use crate::health::HealthTracker;
use crate::models::{EnrichedReading, Label};
use crate::store::ReadingStore;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::task;

pub struct Coordinator<S, C> {
    store: Arc<S>,
    classifier: Arc<C>,
    dispatcher: Dispatcher,
    health: HealthTracker,
}

impl<S, C> Coordinator<S, C>
where
    S: ReadingStore + 'static,
    C: SensorClassifier,
{
    pub fn new(
        store: Arc<S>,
        classifier: Arc<C>,
        dispatcher: Dispatcher,
        health: HealthTracker,
    ) -> Self {
        Self {
            store,
            classifier,
            dispatcher,
            health,
        }
    }

    /// Traite un événement télémétrie entrant de bout en bout.
    /// Ne retourne jamais d'erreur : toutes les pannes par événement sont
    /// contenues ici et remontées uniquement via les logs et le health.
    pub async fn process(&self, payload: &[u8], received_at: OffsetDateTime) {
        // Received -> Decoded (ou Dropped)
        let reading = match decode_reading(payload, received_at) {
            Ok(reading) => reading,
            Err(e) => {
                eprintln!("[ingest] dropped telemetry event: {e}");
                self.health.mark_reading_dropped();
                return;
            }
        };

        // Decoded -> Enriching : persistence et classification en parallèle,
        // indépendantes l'une de l'autre. On attend les deux (join), sans
        // exiger qu'aucune réussisse.
        let store = Arc::clone(&self.store);
        let to_persist = reading.clone();
        let persist = task::spawn_blocking(move || store.append(&to_persist));

        let (persisted, classified) = tokio::join!(persist, self.classifier.classify(&reading));

        match persisted {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                eprintln!(
                    "[store] failed to persist reading from {}: {e}",
                    reading.client_id
                );
                self.health.mark_storage_failure();
            }
            Err(e) => {
                eprintln!("[store] persistence task failed: {e}");
                self.health.mark_storage_failure();
            }
        }

        let predict = match classified {
            Ok(label) => label,
            Err(e) => {
                eprintln!(
                    "[classify] degrading to unknown for {}: {e}",
                    reading.client_id
                );
                self.health.mark_classify_failure();
                Label::Unknown
            }
        };

        // Enriching -> Broadcast -> Done : diffusion inconditionnelle,
        // la valeur affichée ne dépend pas du sort de la persistence
        let event = EnrichedReading { reading, predict };
        self.dispatcher.broadcast(&event);
        self.health.mark_reading_ingested();
    }
}
