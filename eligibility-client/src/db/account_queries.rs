use async_trait::async_trait;

use super::{AccountStore, PgStore, StoreError, StoreResult};
use crate::domain::Account;

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: String,
    opt_out: bool,
    psr_codes: Vec<String>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id,
            opt_out: row.opt_out,
            psr_codes: row.psr_codes,
        }
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn ensure_account(&self, account_id: &str) -> StoreResult<()> {
        sqlx::query("INSERT INTO accounts (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(account_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn set_opt_out(&self, account_id: &str, opt_out: bool) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, opt_out, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (id) DO UPDATE
               SET opt_out = EXCLUDED.opt_out,
                   updated_at = now()
            "#,
        )
        .bind(account_id)
        .bind(opt_out)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn set_psr_codes(&self, account_id: &str, codes: &[String]) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, psr_codes, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (id) DO UPDATE
               SET psr_codes = EXCLUDED.psr_codes,
                   updated_at = now()
            "#,
        )
        .bind(account_id)
        .bind(codes)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_account(&self, account_id: &str) -> StoreResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, opt_out, psr_codes FROM accounts WHERE id = $1",
        )
        .bind(account_id)
        .fetch_optional(self.pool())
        .await?;

        row.map(Account::from).ok_or(StoreError::NotFound)
    }
}
