use async_trait::async_trait;
use time::OffsetDateTime;

use super::{expect_row, MeterStore, PgStore, StoreError, StoreResult};
use crate::domain::{Meter, SupplyType};

#[derive(Debug, sqlx::FromRow)]
struct MeterRow {
    id: String,
    mpxn: String,
    serial_number: String,
    supply_type: String,
    capacity: Option<f64>,
    meter_type: String,
    installed_at: Option<OffsetDateTime>,
}

impl TryFrom<MeterRow> for Meter {
    type Error = StoreError;

    fn try_from(row: MeterRow) -> Result<Self, Self::Error> {
        let supply_type = row
            .supply_type
            .parse::<SupplyType>()
            .map_err(StoreError::Corrupt)?;
        Ok(Meter {
            id: row.id,
            mpxn: row.mpxn,
            serial_number: row.serial_number,
            supply_type,
            capacity: row.capacity,
            meter_type: row.meter_type,
            installed_at: row.installed_at,
        })
    }
}

#[async_trait]
impl MeterStore for PgStore {
    async fn upsert_meter(&self, meter: &Meter) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO meters (id, mpxn, serial_number, supply_type, capacity, meter_type, installed_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now())
            ON CONFLICT (id) DO UPDATE
               SET mpxn = EXCLUDED.mpxn,
                   serial_number = EXCLUDED.serial_number,
                   supply_type = EXCLUDED.supply_type,
                   capacity = COALESCE(EXCLUDED.capacity, meters.capacity),
                   meter_type = EXCLUDED.meter_type,
                   installed_at = COALESCE(EXCLUDED.installed_at, meters.installed_at),
                   deleted_at = CASE WHEN EXCLUDED.installed_at IS NOT NULL THEN NULL ELSE meters.deleted_at END,
                   updated_at = now()
            "#,
        )
        .bind(&meter.id)
        .bind(&meter.mpxn)
        .bind(&meter.serial_number)
        .bind(meter.supply_type.as_str())
        .bind(meter.capacity)
        .bind(&meter.meter_type)
        .bind(meter.installed_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn mark_uninstalled(&self, meter_id: &str, uninstalled_at: OffsetDateTime) -> StoreResult<()> {
        let res = sqlx::query(
            r#"
            UPDATE meters
               SET deleted_at = COALESCE(deleted_at, $2),
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(meter_id)
        .bind(uninstalled_at)
        .execute(self.pool())
        .await?;
        expect_row(res.rows_affected())
    }

    async fn reverse_uninstall(&self, meter_id: &str) -> StoreResult<()> {
        let res = sqlx::query("UPDATE meters SET deleted_at = NULL, updated_at = now() WHERE id = $1")
            .bind(meter_id)
            .execute(self.pool())
            .await?;
        expect_row(res.rows_affected())
    }

    async fn set_meter_type(&self, meter_id: &str, meter_type: &str) -> StoreResult<()> {
        let res = sqlx::query("UPDATE meters SET meter_type = $2, updated_at = now() WHERE id = $1")
            .bind(meter_id)
            .bind(meter_type)
            .execute(self.pool())
            .await?;
        expect_row(res.rows_affected())
    }

    async fn set_capacity(&self, meter_id: &str, capacity: f64) -> StoreResult<()> {
        let res = sqlx::query("UPDATE meters SET capacity = $2, updated_at = now() WHERE id = $1")
            .bind(meter_id)
            .bind(capacity)
            .execute(self.pool())
            .await?;
        expect_row(res.rows_affected())
    }

    async fn get_meter_by_mpxn(&self, mpxn: &str) -> StoreResult<Meter> {
        let row = sqlx::query_as::<_, MeterRow>(
            r#"
            SELECT id, mpxn, serial_number, supply_type, capacity, meter_type, installed_at
              FROM meters
             WHERE mpxn = $1
               AND deleted_at IS NULL
             ORDER BY installed_at DESC NULLS LAST, updated_at DESC
             LIMIT 1
            "#,
        )
        .bind(mpxn)
        .fetch_optional(self.pool())
        .await?;

        row.ok_or(StoreError::NotFound)?.try_into()
    }

    async fn get_meter_mpxn(&self, meter_id: &str) -> StoreResult<String> {
        let mpxn: Option<String> = sqlx::query_scalar("SELECT mpxn FROM meters WHERE id = $1")
            .bind(meter_id)
            .fetch_optional(self.pool())
            .await?;
        mpxn.ok_or(StoreError::NotFound)
    }
}
