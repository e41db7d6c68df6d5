use async_trait::async_trait;
use time::Date;

use super::{expect_row, PgStore, ServiceStore, StoreError, StoreResult};
use crate::domain::{Service, SupplyType};

#[derive(Debug, sqlx::FromRow)]
struct ServiceRow {
    id: String,
    occupancy_id: String,
    mpxn: String,
    supply_type: String,
    start_date: Option<Date>,
    end_date: Option<Date>,
}

impl TryFrom<ServiceRow> for Service {
    type Error = StoreError;

    fn try_from(row: ServiceRow) -> Result<Self, Self::Error> {
        let supply_type = row
            .supply_type
            .parse::<SupplyType>()
            .map_err(StoreError::Corrupt)?;
        Ok(Service {
            id: row.id,
            occupancy_id: row.occupancy_id,
            mpxn: row.mpxn,
            supply_type,
            is_live: true,
            start_date: row.start_date,
            end_date: row.end_date,
            meter: None,
            meterpoint: None,
        })
    }
}

#[async_trait]
impl ServiceStore for PgStore {
    async fn upsert_service(&self, service: &Service) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO services (id, occupancy_id, mpxn, supply_type, start_date, updated_at)
            VALUES ($1, $2, $3, $4, $5, now())
            ON CONFLICT (id) DO UPDATE
               SET occupancy_id = EXCLUDED.occupancy_id,
                   mpxn = EXCLUDED.mpxn,
                   supply_type = EXCLUDED.supply_type,
                   start_date = EXCLUDED.start_date,
                   updated_at = now()
            "#,
        )
        .bind(&service.id)
        .bind(&service.occupancy_id)
        .bind(&service.mpxn)
        .bind(service.supply_type.as_str())
        .bind(service.start_date)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn end_service(&self, service_id: &str, end_date: Date) -> StoreResult<()> {
        let res = sqlx::query("UPDATE services SET end_date = $2, updated_at = now() WHERE id = $1")
            .bind(service_id)
            .bind(end_date)
            .execute(self.pool())
            .await?;
        expect_row(res.rows_affected())
    }

    async fn cancel_service(&self, service_id: &str) -> StoreResult<()> {
        let res = sqlx::query("UPDATE services SET cancelled = TRUE, updated_at = now() WHERE id = $1")
            .bind(service_id)
            .execute(self.pool())
            .await?;
        expect_row(res.rows_affected())
    }

    async fn live_services(&self, occupancy_id: &str) -> StoreResult<Vec<Service>> {
        let rows = sqlx::query_as::<_, ServiceRow>(
            r#"
            SELECT id, occupancy_id, mpxn, supply_type, start_date, end_date
              FROM services
             WHERE occupancy_id = $1
               AND NOT cancelled
               AND (end_date IS NULL OR end_date > CURRENT_DATE)
             ORDER BY start_date NULLS LAST, id
            "#,
        )
        .bind(occupancy_id)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(Service::try_from).collect()
    }
}
