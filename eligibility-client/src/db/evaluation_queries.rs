use async_trait::async_trait;

use super::{EvaluationStore, PgStore, StoreError, StoreResult};
use crate::domain::{EvaluationKind, EvaluationResult, EvaluationResults, ReasonSet};

#[derive(Debug, sqlx::FromRow)]
struct EvaluationRow {
    kind: String,
    reasons: Vec<String>,
    evaluated: bool,
}

fn parse_kind(kind: &str) -> StoreResult<EvaluationKind> {
    EvaluationKind::ALL
        .into_iter()
        .find(|k| k.as_str() == kind)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown evaluation kind {kind:?}")))
}

#[async_trait]
impl EvaluationStore for PgStore {
    async fn get_results(&self, occupancy_id: &str, account_id: &str) -> StoreResult<EvaluationResults> {
        let rows = sqlx::query_as::<_, EvaluationRow>(
            r#"
            SELECT kind, reasons, evaluated
              FROM evaluation_results
             WHERE occupancy_id = $1
               AND account_id = $2
            "#,
        )
        .bind(occupancy_id)
        .bind(account_id)
        .fetch_all(self.pool())
        .await?;

        let mut results = EvaluationResults::default();
        for row in rows {
            let kind = parse_kind(&row.kind)?;
            let reasons = ReasonSet::from_codes(&row.reasons).map_err(StoreError::Corrupt)?;
            *results.get_mut(kind) = EvaluationResult {
                reasons,
                evaluated: row.evaluated,
            };
        }
        Ok(results)
    }

    async fn save_result(
        &self,
        occupancy_id: &str,
        account_id: &str,
        kind: EvaluationKind,
        reasons: &ReasonSet,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO evaluation_results (occupancy_id, account_id, kind, reasons, evaluated, updated_at)
            VALUES ($1, $2, $3, $4, TRUE, now())
            ON CONFLICT (occupancy_id, account_id, kind) DO UPDATE
               SET reasons = EXCLUDED.reasons,
                   evaluated = TRUE,
                   updated_at = now()
            "#,
        )
        .bind(occupancy_id)
        .bind(account_id)
        .bind(kind.as_str())
        .bind(reasons.codes())
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
