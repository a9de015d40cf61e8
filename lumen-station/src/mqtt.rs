/**
 * MQTT INGEST - Abonnement au bus télémétrie des capteurs
 *
 * RÔLE :
 * Boucle d'événements longue durée qui reçoit les messages des capteurs
 * et les remet un par un au coordinateur, dans l'ordre d'arrivée.
 *
 * FONCTIONNEMENT :
 * - Un client rumqttc dédié, abonné au topic télémétrie de la config
 * - Chaque Publish est traité séquentiellement (process await) : la
 *   boucle de lecture du transport n'est jamais bloquée indéfiniment
 *   grâce aux timeouts des dépendants en aval
 * - Erreur transport : log + backoff 2s, rumqttc se reconnecte seul
 * - Échec d'abonnement au démarrage = fatal (rien à ingérer sans bus)
 */

use crate::classify::SensorClassifier;
use crate::config::MqttConf;
use crate::coordinator::Coordinator;
use crate::health::HealthTracker;
use crate::store::ReadingStore;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task;

pub fn spawn_ingest_loop<S, C>(
    coordinator: Arc<Coordinator<S, C>>,
    cfg: MqttConf,
    health: HealthTracker,
) where
    S: ReadingStore + 'static,
    C: SensorClassifier + 'static,
{
    task::spawn(async move {
        let mut opts = MqttOptions::new("lumen-station", &cfg.host, cfg.port);
        opts.set_keep_alive(Duration::from_secs(15));
        let (client, mut eventloop) = AsyncClient::new(opts, 10);

        if let Err(e) = client.subscribe(&cfg.topic, QoS::AtLeastOnce).await {
            eprintln!("[ingest] MQTT subscribe failed: {e:?}");
            std::process::exit(1);
        }
        eprintln!("[ingest] subscribed to {}", cfg.topic);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    health.mark_mqtt_connected();
                }
                Ok(Event::Incoming(Incoming::Publish(publish))) if publish.topic == cfg.topic => {
                    coordinator
                        .process(&publish.payload, OffsetDateTime::now_utc())
                        .await;
                }
                Ok(_) => {
                    // Autres événements MQTT ignorés
                }
                Err(e) => {
                    eprintln!("[ingest] MQTT error: {e:?}");
                    health.increment_reconnects();
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}
