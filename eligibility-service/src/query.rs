//! Read-side questions answered from persisted evaluation results.

use eligibility_client::db::{Store, StoreError};

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("account {0} has no evaluated occupancy")]
    NotEvaluated(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// An account is eligible when any of its occupancies is both eligible and suppliable.
pub async fn is_account_eligible(store: &dyn Store, account_id: &str) -> Result<bool, QueryError> {
    let mut any_evaluated = false;
    for occupancy_id in store.occupancy_ids_for_account(account_id).await? {
        let results = store.get_results(&occupancy_id, account_id).await?;
        if results.eligibility.qualifies() && results.suppliability.qualifies() {
            return Ok(true);
        }
        any_evaluated |= results.any_evaluated();
    }

    if any_evaluated {
        Ok(false)
    } else {
        Err(QueryError::NotEvaluated(account_id.to_string()))
    }
}
