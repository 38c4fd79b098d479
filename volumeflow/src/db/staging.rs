//! Template staging rows, one per (template, pool).

use chrono::Utc;
use rusqlite::{OptionalExtension, params};

use super::{Database, db_err};
use crate::template::TemplateStagingRecord;
use crate::types::{PoolId, TemplateId};
use volumeflow_shared::{VolumeflowError, VolumeflowResult};

#[derive(Clone, Debug)]
pub struct StagingStore {
    db: Database,
}

impl StagingStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert or overwrite the record for its (template, pool) pair.
    pub fn upsert(&self, record: &TemplateStagingRecord) -> VolumeflowResult<()> {
        let conn = self.db.conn();
        db_err!(conn.execute(
            "INSERT INTO template_staging (template_id, pool_id, status, state, install_path, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(template_id, pool_id) DO UPDATE SET
                status = excluded.status,
                state = excluded.state,
                install_path = excluded.install_path,
                updated_at = excluded.updated_at",
            params![
                record.template_id.0 as i64,
                record.pool_id.0 as i64,
                record.status.as_str(),
                record.state.as_str(),
                record.install_path,
                Utc::now().to_rfc3339(),
            ],
        ))?;
        Ok(())
    }

    pub fn get(
        &self,
        template_id: TemplateId,
        pool_id: PoolId,
    ) -> VolumeflowResult<Option<TemplateStagingRecord>> {
        let row: Option<(String, String, Option<String>)> = {
            let conn = self.db.conn();
            db_err!(
                conn.query_row(
                    "SELECT status, state, install_path FROM template_staging
                     WHERE template_id = ?1 AND pool_id = ?2",
                    params![template_id.0 as i64, pool_id.0 as i64],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
            )?
        };

        row.map(|(status, state, install_path)| {
            Ok::<_, VolumeflowError>(TemplateStagingRecord {
                template_id,
                pool_id,
                status: status.parse()?,
                state: state.parse()?,
                install_path,
            })
        })
        .transpose()
    }
}
