//! Volume catalog rows.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use super::{Database, db_err};
use crate::types::{PoolId, TemplateId, VolumeId, VolumeType};
use crate::volume::{VolumeEntity, VolumeState};
use volumeflow_shared::{VolumeflowError, VolumeflowResult};

const SELECT_COLUMNS: &str = "SELECT id, name, size, volume_type, template_id, pool_id, install_path, state, created_at FROM volumes";

/// Fields supplied when allocating a catalog row.
#[derive(Debug, Clone)]
pub struct NewVolume<'a> {
    pub size: u64,
    pub volume_type: VolumeType,
    pub name: &'a str,
    pub template_id: Option<TemplateId>,
}

/// Raw row, converted to [`VolumeEntity`] outside the rusqlite closure.
struct VolumeRow {
    id: i64,
    name: String,
    size: i64,
    volume_type: String,
    template_id: Option<i64>,
    pool_id: Option<i64>,
    install_path: Option<String>,
    state: String,
    created_at: String,
}

impl VolumeRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            size: row.get(2)?,
            volume_type: row.get(3)?,
            template_id: row.get(4)?,
            pool_id: row.get(5)?,
            install_path: row.get(6)?,
            state: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_entity(self) -> VolumeflowResult<VolumeEntity> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| VolumeflowError::Database(format!("bad created_at: {}", e)))?
            .with_timezone(&Utc);

        Ok(VolumeEntity {
            id: VolumeId(self.id as u64),
            size: self.size as u64,
            volume_type: self.volume_type.parse()?,
            name: self.name,
            template_id: self.template_id.map(|t| TemplateId(t as u64)),
            pool_id: self.pool_id.map(|p| PoolId(p as u64)),
            install_path: self.install_path,
            physical_size: None,
            state: self.state.parse::<VolumeState>()?,
            created_at,
        })
    }
}

/// Volume rows in the `volumes` table.
#[derive(Clone, Debug)]
pub struct VolumeStore {
    db: Database,
}

impl VolumeStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new row in `Allocated` state with no pool.
    pub fn insert(&self, new: &NewVolume<'_>) -> VolumeflowResult<VolumeEntity> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let conn = self.db.conn();

        db_err!(conn.execute(
            "INSERT INTO volumes (name, size, volume_type, template_id, pool_id, install_path, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, NULL, NULL, ?5, ?6, ?6)",
            params![
                new.name,
                new.size as i64,
                new.volume_type.as_str(),
                new.template_id.map(|t| t.0 as i64),
                VolumeState::Allocated.as_str(),
                now_str,
            ],
        ))?;
        let id = conn.last_insert_rowid();

        Ok(VolumeEntity {
            id: VolumeId(id as u64),
            size: new.size,
            volume_type: new.volume_type,
            name: new.name.to_string(),
            template_id: new.template_id,
            pool_id: None,
            install_path: None,
            physical_size: None,
            state: VolumeState::Allocated,
            created_at: now,
        })
    }

    pub fn get(&self, id: VolumeId) -> VolumeflowResult<Option<VolumeEntity>> {
        let row = {
            let conn = self.db.conn();
            db_err!(
                conn.query_row(
                    &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                    params![id.0 as i64],
                    VolumeRow::from_row,
                )
                .optional()
            )?
        };
        row.map(VolumeRow::into_entity).transpose()
    }

    /// Persist the mutable columns (pool, install path, state).
    pub fn update(&self, volume: &VolumeEntity) -> VolumeflowResult<()> {
        let conn = self.db.conn();
        let updated = db_err!(conn.execute(
            "UPDATE volumes SET pool_id = ?1, install_path = ?2, state = ?3, updated_at = ?4 WHERE id = ?5",
            params![
                volume.pool_id.map(|p| p.0 as i64),
                volume.install_path,
                volume.state().as_str(),
                Utc::now().to_rfc3339(),
                volume.id.0 as i64,
            ],
        ))?;

        if updated == 0 {
            return Err(VolumeflowError::NotFound(format!("volume {}", volume.id)));
        }
        Ok(())
    }

    /// Returns whether a row was deleted.
    pub fn delete(&self, id: VolumeId) -> VolumeflowResult<bool> {
        let conn = self.db.conn();
        let deleted = db_err!(conn.execute("DELETE FROM volumes WHERE id = ?1", params![id.0 as i64]))?;
        Ok(deleted > 0)
    }

    /// All rows, oldest first.
    pub fn list_all(&self) -> VolumeflowResult<Vec<VolumeEntity>> {
        let rows = {
            let conn = self.db.conn();
            let mut stmt = db_err!(conn.prepare(&format!("{} ORDER BY id", SELECT_COLUMNS)))?;
            let mapped = db_err!(stmt.query_map([], VolumeRow::from_row))?;
            db_err!(mapped.collect::<Result<Vec<_>, _>>())?
        };
        rows.into_iter().map(VolumeRow::into_entity).collect()
    }
}
