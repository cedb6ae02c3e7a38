use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use predict_common::PredictionOutcome;
use rusqlite::{params, Connection};

use super::{PredictionStore, StoreError};

/// SQLite-backed prediction store.
pub struct SqlitePredictionStore {
    conn: Mutex<Connection>,
}

impl SqlitePredictionStore {
    /// Open (or create) the store. Accepts an optional `sqlite:` prefix and `:memory:`.
    pub fn open(database_url: &str) -> Result<Self, StoreError> {
        let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);

        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
                }
            }
        }

        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS predictions (
                id TEXT PRIMARY KEY,
                prediction_id TEXT NOT NULL,
                user_id TEXT,
                backend TEXT NOT NULL,
                prediction_type TEXT NOT NULL,
                team_home TEXT NOT NULL,
                team_away TEXT NOT NULL,
                match_date TEXT NOT NULL,
                predicted_winner TEXT NOT NULL,
                confidence REAL NOT NULL,
                created_at TEXT NOT NULL,
                payload TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_predictions_user_id ON predictions(user_id)",
            [],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::info!("Prediction store initialized with database: {}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored predictions.
    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock().map_err(|e| StoreError::Database(e.to_string()))?;
        conn.query_row("SELECT COUNT(*) FROM predictions", [], |row| row.get::<_, i64>(0))
            .map(|n| n as u64)
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

fn decode(payload: String) -> Result<PredictionOutcome, StoreError> {
    serde_json::from_str(&payload).map_err(|e| StoreError::Encoding(e.to_string()))
}

#[async_trait]
impl PredictionStore for SqlitePredictionStore {
    async fn save(
        &self,
        outcome: &PredictionOutcome,
        user_id: Option<&str>,
    ) -> Result<String, StoreError> {
        let payload =
            serde_json::to_string(outcome).map_err(|e| StoreError::Encoding(e.to_string()))?;
        let id = uuid::Uuid::new_v4().to_string();

        let conn = self.conn.lock().map_err(|e| StoreError::Database(e.to_string()))?;
        conn.execute(
            "INSERT INTO predictions (
                id, prediction_id, user_id, backend, prediction_type, team_home, team_away,
                match_date, predicted_winner, confidence, created_at, payload
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                id,
                outcome.prediction_id,
                user_id,
                outcome.backend.as_str(),
                outcome.prediction_type.as_str(),
                outcome.match_details.team_home,
                outcome.match_details.team_away,
                outcome.match_details.match_date.to_rfc3339(),
                outcome.predicted_winner.to_string(),
                outcome.confidence,
                outcome.created_at.to_rfc3339(),
                payload,
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<PredictionOutcome>, StoreError> {
        let conn = self.conn.lock().map_err(|e| StoreError::Database(e.to_string()))?;
        let payload: Option<String> = match conn.query_row(
            "SELECT payload FROM predictions WHERE id = ?1",
            params![id],
            |row| row.get(0),
        ) {
            Ok(payload) => Some(payload),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(StoreError::Database(e.to_string())),
        };

        payload.map(decode).transpose()
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<PredictionOutcome>, StoreError> {
        let conn = self.conn.lock().map_err(|e| StoreError::Database(e.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT payload FROM predictions WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![user_id, limit as i64], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut outcomes = Vec::new();
        for row in rows {
            let payload = row.map_err(|e| StoreError::Database(e.to_string()))?;
            outcomes.push(decode(payload)?);
        }
        Ok(outcomes)
    }
}
