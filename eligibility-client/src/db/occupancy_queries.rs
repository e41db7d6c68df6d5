use async_trait::async_trait;
use time::OffsetDateTime;

use super::{expect_row, OccupancyStore, PgStore, StoreError, StoreResult};
use crate::domain::OccupancyRecord;

#[derive(Debug, sqlx::FromRow)]
struct OccupancyRow {
    id: String,
    account_id: String,
    site_id: Option<String>,
    ended_at: Option<OffsetDateTime>,
}

impl PgStore {
    async fn fetch_ids(&self, sql: &str, key: &str) -> StoreResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(sql)
            .bind(key)
            .fetch_all(self.pool())
            .await?;
        Ok(ids)
    }
}

#[async_trait]
impl OccupancyStore for PgStore {
    async fn upsert_occupancy(
        &self,
        occupancy_id: &str,
        account_id: &str,
        site_id: Option<&str>,
    ) -> StoreResult<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("INSERT INTO accounts (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO occupancies (id, account_id, site_id, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (id) DO UPDATE
               SET account_id = EXCLUDED.account_id,
                   site_id = COALESCE(EXCLUDED.site_id, occupancies.site_id),
                   updated_at = now()
            "#,
        )
        .bind(occupancy_id)
        .bind(account_id)
        .bind(site_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn set_occupancy_site(&self, occupancy_id: &str, site_id: &str) -> StoreResult<()> {
        let res = sqlx::query("UPDATE occupancies SET site_id = $2, updated_at = now() WHERE id = $1")
            .bind(occupancy_id)
            .bind(site_id)
            .execute(self.pool())
            .await?;
        expect_row(res.rows_affected())
    }

    async fn end_occupancy(&self, occupancy_id: &str, ended_at: OffsetDateTime) -> StoreResult<()> {
        let res = sqlx::query("UPDATE occupancies SET ended_at = $2, updated_at = now() WHERE id = $1")
            .bind(occupancy_id)
            .bind(ended_at)
            .execute(self.pool())
            .await?;
        expect_row(res.rows_affected())
    }

    async fn get_occupancy(&self, occupancy_id: &str) -> StoreResult<OccupancyRecord> {
        let row = sqlx::query_as::<_, OccupancyRow>(
            "SELECT id, account_id, site_id, ended_at FROM occupancies WHERE id = $1",
        )
        .bind(occupancy_id)
        .fetch_optional(self.pool())
        .await?;

        let row = row.ok_or(StoreError::NotFound)?;
        Ok(OccupancyRecord {
            id: row.id,
            account_id: row.account_id,
            site_id: row.site_id,
            ended_at: row.ended_at,
        })
    }

    async fn occupancy_ids_for_account(&self, account_id: &str) -> StoreResult<Vec<String>> {
        self.fetch_ids(
            "SELECT id FROM occupancies WHERE account_id = $1 ORDER BY id",
            account_id,
        )
        .await
    }

    async fn occupancy_ids_for_mpxn(&self, mpxn: &str) -> StoreResult<Vec<String>> {
        self.fetch_ids(
            "SELECT DISTINCT occupancy_id FROM services WHERE mpxn = $1 ORDER BY occupancy_id",
            mpxn,
        )
        .await
    }

    async fn occupancy_ids_for_site(&self, site_id: &str) -> StoreResult<Vec<String>> {
        self.fetch_ids(
            "SELECT id FROM occupancies WHERE site_id = $1 ORDER BY id",
            site_id,
        )
        .await
    }

    async fn occupancy_ids_for_postcode(&self, postcode: &str) -> StoreResult<Vec<String>> {
        self.fetch_ids(
            r#"
            SELECT o.id
              FROM occupancies o
              JOIN sites s ON s.id = o.site_id
             WHERE s.postcode = $1
             ORDER BY o.id
            "#,
            postcode,
        )
        .await
    }

    async fn pending_evaluation_ids(&self) -> StoreResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT o.id
              FROM occupancies o
              LEFT JOIN evaluation_results r
                ON r.occupancy_id = o.id
               AND r.account_id = o.account_id
               AND r.evaluated
             WHERE o.ended_at IS NULL
             GROUP BY o.id
            HAVING COUNT(r.kind) < 3
             ORDER BY o.id
            "#,
        )
        .fetch_all(self.pool())
        .await?;
        Ok(ids)
    }

    async fn live_occupancy_ids(&self) -> StoreResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT id FROM occupancies WHERE ended_at IS NULL ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(ids)
    }
}
