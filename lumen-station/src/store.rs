/**
 * READING STORE - Persistence des mesures capteurs
 *
 * RÔLE :
 * Stockage durable des `Reading` ingérés, plus les requêtes historiques
 * consommées par l'API REST (filtrage par capteur et plage temporelle).
 *
 * FONCTIONNEMENT :
 * - Trait `ReadingStore` = interface commune (append/query/client_ids)
 * - `JsonReadingStore` = implémentation fichier JSON avec cache mémoire
 * - Une panne du backend remonte en `StorageError` typé, jamais en panic :
 *   le pipeline diffuse quand même la mesure aux dashboards
 *
 * UTILITÉ DANS LUMEN :
 * 🎯 Historique : GET /api/sensors rejoue les mesures stockées
 * 🎯 Isolation : le coordinateur écrit sans se coupler au format de stockage
 * 🎯 Tests : stores factices branchés sur le trait, sans fichier ni réseau
 */

use crate::models::Reading;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use time::OffsetDateTime;

/// Erreurs possibles lors des opérations de persistence
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Requête historique : filtre par capteur et/ou plage temporelle.
/// Les résultats sont toujours triés par timestamp croissant.
#[derive(Debug, Clone, Default)]
pub struct ReadingQuery {
    pub client_id: Option<String>,
    pub start: Option<OffsetDateTime>,
    pub end: Option<OffsetDateTime>,
}

/// Interface commune de persistence des mesures.
/// Le coordinateur et l'API REST ne connaissent que ce trait.
pub trait ReadingStore: Send + Sync {
    /// Écriture durable d'une mesure, best-effort (pas de lien
    /// transactionnel avec la classification).
    fn append(&self, reading: &Reading) -> Result<(), StorageError>;

    /// Lecture historique filtrée, triée par timestamp croissant.
    fn query(&self, query: &ReadingQuery) -> Result<Vec<Reading>, StorageError>;

    /// Liste des capteurs distincts vus par le store.
    fn client_ids(&self) -> Result<Vec<String>, StorageError>;
}

/// Implémentation fichier JSON (SQLite plus tard si le volume l'exige)
pub struct JsonReadingStore {
    /// Chemin du fichier de stockage JSON
    storage_path: PathBuf,
    /// Cache mémoire des mesures (pour perf et requêtes)
    cache: Mutex<Vec<Reading>>,
}

impl JsonReadingStore {
    /// Crée un store avec le fichier spécifié, en chargeant l'existant.
    pub fn new<P: Into<PathBuf>>(storage_path: P) -> Result<Self, StorageError> {
        let path = storage_path.into();
        let store = Self {
            storage_path: path.clone(),
            cache: Mutex::new(Vec::new()),
        };

        store.load_from_disk()?;
        eprintln!("[store] reading store initialized at {:?}", path);
        Ok(store)
    }

    /// Charge les mesures depuis le fichier JSON vers le cache mémoire
    fn load_from_disk(&self) -> Result<(), StorageError> {
        if !self.storage_path.exists() {
            fs::write(&self.storage_path, "[]")?;
            return Ok(());
        }

        let content = fs::read_to_string(&self.storage_path)?;
        let readings: Vec<Reading> = serde_json::from_str(&content)?;

        eprintln!("[store] loaded {} readings from disk", readings.len());
        *self.cache.lock() = readings;
        Ok(())
    }

    /// Sauvegarde le cache mémoire vers le fichier JSON
    fn save_to_disk(&self) -> Result<(), StorageError> {
        let cache = self.cache.lock();
        let json = serde_json::to_string_pretty(&*cache)?;
        fs::write(&self.storage_path, json)?;
        Ok(())
    }
}

impl ReadingStore for JsonReadingStore {
    fn append(&self, reading: &Reading) -> Result<(), StorageError> {
        self.cache.lock().push(reading.clone());
        self.save_to_disk()
    }

    fn query(&self, query: &ReadingQuery) -> Result<Vec<Reading>, StorageError> {
        let cache = self.cache.lock();
        let mut results: Vec<Reading> = cache
            .iter()
            .filter(|r| match &query.client_id {
                Some(id) => &r.client_id == id,
                None => true,
            })
            .filter(|r| query.start.map_or(true, |start| r.timestamp >= start))
            .filter(|r| query.end.map_or(true, |end| r.timestamp <= end))
            .cloned()
            .collect();

        results.sort_by_key(|r| r.timestamp);
        Ok(results)
    }

    fn client_ids(&self) -> Result<Vec<String>, StorageError> {
        let cache = self.cache.lock();
        let ids: BTreeSet<String> = cache.iter().map(|r| r.client_id.clone()).collect();
        Ok(ids.into_iter().collect())
    }
}
