//! SQLite-backed knowledge store.
//!
//! ## Schema
//!
//! ```text
//! fertilizer(id, crop_name, recommendation)
//! disease(id, crop_name, symptom_keywords, disease_name, recommendation)
//! crop_calendar(crop_name PK, sowing_month, harvesting_month)
//! ```
//!
//! Lookups are exact matches on the lower-cased crop name. Queries run on
//! the blocking pool so the async runtime never waits on disk.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::{KnowledgeError, KnowledgeQuery, KnowledgeResult, KnowledgeSource, capitalize};
use crate::error::AppError;
use crate::subsystems::memory::open_conn;
use crate::subsystems::nlu::Intent;

const FERTILIZER_ROWS: &[(&str, &str)] = &[
    (
        "gehu",
        "Gehu ke liye 120–130 kg Urea + 50–60 kg DAP per acre behtar hota hai. \
         Sahi matra mitti ki report aur khet ke size par depend karti hai.",
    ),
    (
        "dhaan",
        "Dhaan ke liye 40–50 kg DAP + 100–120 kg Urea ko 2–3 hisson me dena chahiye. \
         Ek hissa ropai ke kuch din baad, baaki tillering ke dauran.",
    ),
    (
        "sarson",
        "Sarson ke liye 40–50 kg DAP + 40–50 kg Urea per acre sahi mana jata hai. \
         Potash ki jarurat mitti ke hisab se ho sakti hai.",
    ),
];

/// `(crop, symptom_keywords, disease_name, recommendation)`.
const DISEASE_ROWS: &[(&str, &str, &str, &str)] = &[
    (
        "gehu",
        "bhura,daag,patta",
        "Brown Rust / Leaf Rust",
        "Gehu ke patton par chhote bhure daag ya pustule agar dikh rahe hain to ye Brown Rust ho sakta hai. \
         Resistant variety ka istemal karein, santulit khaad den, aur zarurat par manayata-prapt fungicide \
         jaise Propiconazole 0.1% ka prayog karein (label anusar).",
    ),
    (
        "gehu",
        "peela,daag,patta",
        "Yellow Rust",
        "Agar patton par peeli dhariyan / daag dikh rahe hain to ye Yellow Rust ho sakta hai. \
         Surakshit fungicide spray (Propiconazole / Tebuconazole) label dose par karein aur \
         infected khet ko observation me rakhein.",
    ),
    (
        "dhaan",
        "neck,blast,daag,panicle",
        "Neck Blast",
        "Dhaan ke panicle ke neck hissa par kaale daag ya todna jaisa symptom Neck Blast ka sanket hai. \
         Resistant variety, santulit nitrogen aur manayata-prapt fungicide jaise Tricyclazole ka prayog karein.",
    ),
    (
        "dhaan",
        "brown,spot,daag,patta",
        "Brown Leaf Spot",
        "Dhaan ke patte par gol ya aniyamit bhure daag Brown Leaf Spot ho sakte hain. \
         Balanced khaad, khadhe pani se bachein, aur zarurat par appropriate fungicide spray karein.",
    ),
    (
        "sarson",
        "safed,daag,patta,white",
        "White Rust / Safed Sundi",
        "Sarson ke patton par ubhre safed chhale jaisa symptom White Rust ka ho sakta hai. \
         Beej upchar, rog-rodhak variety aur manayata-prapt fungicide ka istemal karein.",
    ),
];

/// `(crop, sowing, harvesting)`.
const CALENDAR_ROWS: &[(&str, &str, &str)] = &[
    ("gehu", "October–November", "March–April"),
    ("dhaan", "June–July", "October–November"),
    ("sarson", "October", "February–March"),
];

#[derive(Debug, Clone)]
pub struct SqliteKnowledge {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKnowledge {
    /// Open (or create) the knowledge database and make sure the tables exist.
    pub fn open(db_path: &Path) -> Result<Self, AppError> {
        let conn = open_conn(db_path)?;
        init_schema(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Replace all table contents with the reference rows.
    pub fn seed(&self) -> Result<(), AppError> {
        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Storage(format!("knowledge: begin seed: {e}")))?;

        tx.execute_batch("DELETE FROM fertilizer; DELETE FROM disease; DELETE FROM crop_calendar;")
            .map_err(|e| AppError::Storage(format!("knowledge: clear tables: {e}")))?;

        for (crop, rec) in FERTILIZER_ROWS {
            tx.execute(
                "INSERT INTO fertilizer (crop_name, recommendation) VALUES (?1, ?2)",
                params![crop, rec],
            )
            .map_err(|e| AppError::Storage(format!("knowledge: insert fertilizer: {e}")))?;
        }
        for (crop, keywords, name, rec) in DISEASE_ROWS {
            tx.execute(
                "INSERT INTO disease (crop_name, symptom_keywords, disease_name, recommendation) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![crop, keywords, name, rec],
            )
            .map_err(|e| AppError::Storage(format!("knowledge: insert disease: {e}")))?;
        }
        for (crop, sowing, harvesting) in CALENDAR_ROWS {
            tx.execute(
                "INSERT INTO crop_calendar (crop_name, sowing_month, harvesting_month) VALUES (?1, ?2, ?3)",
                params![crop, sowing, harvesting],
            )
            .map_err(|e| AppError::Storage(format!("knowledge: insert crop_calendar: {e}")))?;
        }

        tx.commit()
            .map_err(|e| AppError::Storage(format!("knowledge: commit seed: {e}")))
    }

    pub async fn lookup(&self, query: &KnowledgeQuery) -> Result<KnowledgeResult, KnowledgeError> {
        let Some(crop) = query.crop.as_deref().map(str::trim).map(str::to_lowercase).filter(|c| !c.is_empty())
        else {
            return Ok(KnowledgeResult::generic());
        };
        let intent = query.intent;
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|e| e.into_inner());
            lookup_blocking(&conn, intent, &crop)
        })
        .await
        .map_err(|e| KnowledgeError::Store(format!("lookup task failed: {e}")))?
    }
}

fn lookup_blocking(conn: &Connection, intent: Intent, crop: &str) -> Result<KnowledgeResult, KnowledgeError> {
    let store_err = |e: rusqlite::Error| KnowledgeError::Store(e.to_string());

    let hit = match intent {
        Intent::Fertilizer => conn
            .query_row(
                "SELECT recommendation FROM fertilizer WHERE LOWER(crop_name) = ?1 ORDER BY id LIMIT 1",
                params![crop],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(store_err)?
            .map(|context| KnowledgeResult { context, source: KnowledgeSource::FertilizerTable }),
        Intent::Disease => conn
            .query_row(
                "SELECT disease_name, recommendation FROM disease WHERE LOWER(crop_name) = ?1 ORDER BY id LIMIT 1",
                params![crop],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .map_err(store_err)?
            .map(|(name, rec)| KnowledgeResult {
                context: format!("{name}: {rec}"),
                source: KnowledgeSource::DiseaseTable,
            }),
        Intent::General => conn
            .query_row(
                "SELECT sowing_month, harvesting_month FROM crop_calendar WHERE LOWER(crop_name) = ?1",
                params![crop],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .map_err(store_err)?
            .map(|(sowing, harvesting)| KnowledgeResult {
                context: format!(
                    "{} aam taur par {sowing} me boya jata hai aur {harvesting} me kaata jata hai.",
                    capitalize(crop)
                ),
                source: KnowledgeSource::CropCalendar,
            }),
        Intent::Water | Intent::Price => None,
    };

    debug!(%intent, crop, hit = hit.is_some(), "knowledge lookup");
    Ok(hit.unwrap_or_else(KnowledgeResult::generic))
}

fn init_schema(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS fertilizer (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            crop_name TEXT NOT NULL,
            recommendation TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS disease (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            crop_name TEXT NOT NULL,
            symptom_keywords TEXT NOT NULL,
            disease_name TEXT NOT NULL,
            recommendation TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS crop_calendar (
            crop_name TEXT PRIMARY KEY,
            sowing_month TEXT NOT NULL,
            harvesting_month TEXT NOT NULL
        );
        ",
    )
    .map_err(|e| AppError::Storage(format!("knowledge: initialize schema: {e}")))
}
