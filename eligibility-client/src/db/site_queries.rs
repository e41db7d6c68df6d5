use async_trait::async_trait;

use super::{PgStore, SiteStore, StoreError, StoreResult};
use crate::domain::Site;

#[derive(Debug, sqlx::FromRow)]
struct SiteRow {
    id: String,
    postcode: String,
    wan_coverage: bool,
}

#[async_trait]
impl SiteStore for PgStore {
    async fn upsert_site(&self, site_id: &str, postcode: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sites (id, postcode, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (id) DO UPDATE
               SET postcode = EXCLUDED.postcode,
                   updated_at = now()
            "#,
        )
        .bind(site_id)
        .bind(postcode)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn set_wan_coverage(&self, postcode: &str, covered: bool) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wan_coverage (postcode, covered, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (postcode) DO UPDATE
               SET covered = EXCLUDED.covered,
                   updated_at = now()
            "#,
        )
        .bind(postcode)
        .bind(covered)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_site(&self, site_id: &str) -> StoreResult<Site> {
        let row = sqlx::query_as::<_, SiteRow>(
            r#"
            SELECT s.id,
                   s.postcode,
                   COALESCE(w.covered, FALSE) AS wan_coverage
              FROM sites s
              LEFT JOIN wan_coverage w ON w.postcode = s.postcode
             WHERE s.id = $1
            "#,
        )
        .bind(site_id)
        .fetch_optional(self.pool())
        .await?;

        let row = row.ok_or(StoreError::NotFound)?;
        Ok(Site {
            id: row.id,
            postcode: row.postcode,
            wan_coverage: row.wan_coverage,
        })
    }
}
