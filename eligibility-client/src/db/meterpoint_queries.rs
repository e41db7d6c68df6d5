use async_trait::async_trait;

use super::{MeterpointStore, PgStore, StoreError, StoreResult};
use crate::domain::Meterpoint;

#[derive(Debug, sqlx::FromRow)]
struct MeterpointRow {
    mpxn: String,
    profile_class: Option<String>,
    ssc: Option<String>,
    alt_han: bool,
}

#[async_trait]
impl MeterpointStore for PgStore {
    async fn set_alt_han(&self, mpxn: &str, alt_han: bool) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO meterpoints (mpxn, alt_han, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (mpxn) DO UPDATE
               SET alt_han = EXCLUDED.alt_han,
                   updated_at = now()
            "#,
        )
        .bind(mpxn)
        .bind(alt_han)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn set_profile_class(&self, mpxn: &str, profile_class: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO meterpoints (mpxn, profile_class, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (mpxn) DO UPDATE
               SET profile_class = EXCLUDED.profile_class,
                   updated_at = now()
            "#,
        )
        .bind(mpxn)
        .bind(profile_class)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn set_ssc(&self, mpxn: &str, ssc: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO meterpoints (mpxn, ssc, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (mpxn) DO UPDATE
               SET ssc = EXCLUDED.ssc,
                   updated_at = now()
            "#,
        )
        .bind(mpxn)
        .bind(ssc)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_meterpoint(&self, mpxn: &str) -> StoreResult<Meterpoint> {
        let row = sqlx::query_as::<_, MeterpointRow>(
            "SELECT mpxn, profile_class, ssc, alt_han FROM meterpoints WHERE mpxn = $1",
        )
        .bind(mpxn)
        .fetch_optional(self.pool())
        .await?;

        let row = row.ok_or(StoreError::NotFound)?;
        Ok(Meterpoint {
            mpxn: row.mpxn,
            profile_class: row.profile_class,
            ssc: row.ssc,
            alt_han: row.alt_han,
        })
    }
}
