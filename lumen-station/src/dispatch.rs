/**
 * DISPATCH - Registre d'abonnés + diffusion temps réel
 *
 * RÔLE :
 * Suivi des dashboards WebSocket connectés et fan-out de chaque mesure
 * enrichie vers tous les abonnés vivants.
 *
 * FONCTIONNEMENT :
 * - `SubscriberRegistry` : map id -> canal d'envoi, mutations sérialisées
 *   par mutex ; `snapshot()` copie les membres pour itérer hors verrou
 * - `Dispatcher::broadcast` : sérialise l'événement UNE fois (Arc<String>),
 *   pousse le même buffer à chaque abonné, élague les canaux fermés
 * - Un abonné cassé est retiré sans affecter la livraison aux autres
 *
 * GARANTIES :
 * - Ordre par abonné = ordre d'appel de broadcast (canaux FIFO, un seul
 *   coordinateur séquentiel en amont)
 * - `remove` idempotent : retirer un absent est un no-op
 */

use crate::models::EnrichedReading;
use crate::state::{new_state, Shared};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

pub type SubscriberId = Uuid;

/// Registre des abonnés live. Clonable, partagé entre les handlers
/// WebSocket (connect/disconnect) et le dispatcher (broadcast).
#[derive(Clone)]
pub struct SubscriberRegistry {
    subscribers: Shared<HashMap<SubscriberId, mpsc::UnboundedSender<Arc<String>>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: new_state(HashMap::new()),
        }
    }

    /// Enregistre un nouvel abonné et retourne son id + le récepteur
    /// que la session WebSocket consommera.
    pub fn add(&self) -> (SubscriberId, mpsc::UnboundedReceiver<Arc<String>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.subscribers.lock().insert(id, tx);
        (id, rx)
    }

    /// Retire un abonné. No-op si l'id est déjà absent.
    pub fn remove(&self, id: SubscriberId) {
        self.subscribers.lock().remove(&id);
    }

    /// Copie instantanée des membres courants, sûre à itérer pendant
    /// que le registre continue de muter.
    pub fn snapshot(&self) -> Vec<(SubscriberId, mpsc::UnboundedSender<Arc<String>>)> {
        self.subscribers
            .lock()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Diffuseur des mesures enrichies vers le registre.
#[derive(Clone)]
pub struct Dispatcher {
    registry: SubscriberRegistry,
}

impl Dispatcher {
    pub fn new(registry: SubscriberRegistry) -> Self {
        Self { registry }
    }

    /// Diffuse une mesure enrichie à tous les abonnés du snapshot courant.
    /// Retourne le nombre d'abonnés servis.
    pub fn broadcast(&self, event: &EnrichedReading) -> usize {
        let payload = match serde_json::to_string(event) {
            Ok(json) => Arc::new(json),
            Err(e) => {
                eprintln!("[dispatch] failed to serialize enriched reading: {e}");
                return 0;
            }
        };

        let mut delivered = 0;
        for (id, tx) in self.registry.snapshot() {
            if tx.send(Arc::clone(&payload)).is_ok() {
                delivered += 1;
            } else {
                // Canal fermé : la session WebSocket est morte, on élague
                eprintln!("[dispatch] pruning dead subscriber {id}");
                self.registry.remove(id);
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Label, Reading};
    use time::macros::datetime;

    fn enriched(value: f64, predict: Label) -> EnrichedReading {
        EnrichedReading {
            reading: Reading {
                client_id: "T1".into(),
                analog_value: value,
                timestamp: datetime!(2025-06-01 12:00:00 UTC),
            },
            predict,
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_every_live_subscriber() {
        let registry = SubscriberRegistry::new();
        let dispatcher = Dispatcher::new(registry.clone());

        let (_id1, mut rx1) = registry.add();
        let (_id2, mut rx2) = registry.add();

        let delivered = dispatcher.broadcast(&enriched(19.0, Label::Darkness));
        assert_eq!(delivered, 2);

        for rx in [&mut rx1, &mut rx2] {
            let payload = rx.try_recv().unwrap();
            let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
            assert_eq!(value["predict"], "darkness");
            assert_eq!(value["client_id"], "T1");
        }
    }

    #[tokio::test]
    async fn dead_subscriber_is_pruned_without_blocking_others() {
        let registry = SubscriberRegistry::new();
        let dispatcher = Dispatcher::new(registry.clone());

        let (_dead_id, dead_rx) = registry.add();
        let (_live_id, mut live_rx) = registry.add();
        drop(dead_rx); // simule une connexion fermée côté client

        let delivered = dispatcher.broadcast(&enriched(20.0, Label::Shadow));

        assert_eq!(delivered, 1);
        assert_eq!(registry.len(), 1);
        assert!(live_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn per_subscriber_order_follows_broadcast_order() {
        let registry = SubscriberRegistry::new();
        let dispatcher = Dispatcher::new(registry.clone());
        let (_id, mut rx) = registry.add();

        dispatcher.broadcast(&enriched(1.0, Label::Darkness));
        dispatcher.broadcast(&enriched(2.0, Label::Shadow));

        let first: serde_json::Value =
            serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        let second: serde_json::Value =
            serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(first["analog_value"], 1.0);
        assert_eq!(second["analog_value"], 2.0);
    }

    #[tokio::test]
    async fn remove_is_idempotent_and_safe_concurrently() {
        let registry = SubscriberRegistry::new();
        let (id, _rx) = registry.add();

        registry.remove(id);
        registry.remove(id); // déjà absent : no-op
        assert!(registry.is_empty());

        // add/remove/snapshot entrelacés depuis plusieurs tâches
        let mut handles = Vec::new();
        for _ in 0..8 {
            let reg = registry.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let (id, _rx) = reg.add();
                    let _ = reg.snapshot();
                    reg.remove(id);
                    reg.remove(id);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(registry.is_empty());
    }
}
