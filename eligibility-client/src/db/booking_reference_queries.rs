use async_trait::async_trait;
use time::OffsetDateTime;

use super::{expect_row, BookingReferenceStore, PgStore, StoreError, StoreResult};
use crate::domain::BookingReference;

#[derive(Debug, sqlx::FromRow)]
struct BookingReferenceRow {
    mpxn: String,
    reference: String,
    deleted_at: Option<OffsetDateTime>,
}

#[async_trait]
impl BookingReferenceStore for PgStore {
    async fn upsert_booking_reference(&self, mpxn: &str, reference: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO booking_references (mpxn, reference, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (mpxn) DO UPDATE
               SET reference = EXCLUDED.reference,
                   deleted_at = NULL,
                   updated_at = now()
            "#,
        )
        .bind(mpxn)
        .bind(reference)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn remove_booking_reference(&self, mpxn: &str) -> StoreResult<()> {
        let res = sqlx::query(
            r#"
            UPDATE booking_references
               SET deleted_at = COALESCE(deleted_at, now()),
                   updated_at = now()
             WHERE mpxn = $1
            "#,
        )
        .bind(mpxn)
        .execute(self.pool())
        .await?;
        expect_row(res.rows_affected())
    }

    async fn get_booking_reference(&self, mpxn: &str) -> StoreResult<BookingReference> {
        let row = sqlx::query_as::<_, BookingReferenceRow>(
            "SELECT mpxn, reference, deleted_at FROM booking_references WHERE mpxn = $1",
        )
        .bind(mpxn)
        .fetch_optional(self.pool())
        .await?;

        let row = row.ok_or(StoreError::NotFound)?;
        Ok(BookingReference {
            mpxn: row.mpxn,
            reference: row.reference,
            deleted: row.deleted_at.is_some(),
        })
    }
}
