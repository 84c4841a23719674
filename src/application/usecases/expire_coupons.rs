// Use case: expire_coupons.

use crate::application::context::AppContext;
use crate::domain::value_objects::timestamps::Timestamp;
use tracing::info;

/// Sweeps available coupons whose validity window has closed into the
/// terminal `expired` state.
///
/// Idempotent, so overlapping or repeated firings are harmless, and safe to
/// run concurrently with redemption: the redeemer's exclusive row lock
/// serializes the two writers on any shared row.
pub struct ExpireCouponsUseCase;

#[derive(Debug)]
pub enum ExpireCouponsError {
    Storage(String),
}

impl ExpireCouponsUseCase {
    /// Run one sweep pass and return the number of coupons expired.
    pub async fn run_once(ctx: &AppContext, now: Timestamp) -> Result<u64, ExpireCouponsError> {
        let swept = ctx
            .repos
            .coupon
            .expire_due(now)
            .await
            .map_err(|e| ExpireCouponsError::Storage(format!("{e:?}")))?;

        if swept > 0 {
            info!(count = swept, "expired overdue coupons");
        }
        Ok(swept)
    }
}
