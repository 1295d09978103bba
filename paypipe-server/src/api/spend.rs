//! Spend API Handlers
//!
//! Ledger summary and runtime control of the spend ceilings.

use axum::{Json, extract::State};
use paypipe_core::domain::spend::{SpendLimits, SpendSummary};
use paypipe_core::dto::spend::UpdateLimits;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

/// GET /spend
pub async fn spend_summary(State(state): State<AppState>) -> Json<SpendSummary> {
    Json(state.orchestrator.ledger().summary())
}

/// PUT /spend/limits
/// Update either ceiling; omitted fields keep their current value
pub async fn update_limits(
    State(state): State<AppState>,
    Json(req): Json<UpdateLimits>,
) -> ApiResult<Json<SpendLimits>> {
    let ledger = state.orchestrator.ledger();
    let current = ledger.limits();
    let limits = SpendLimits {
        max_per_task: req.max_per_task.unwrap_or(current.max_per_task),
        max_per_day: req.max_per_day.unwrap_or(current.max_per_day),
    };

    if limits.max_per_task == 0 || limits.max_per_day == 0 {
        return Err(ApiError::BadRequest("limits must be greater than zero".to_string()));
    }
    if limits.max_per_task > limits.max_per_day {
        return Err(ApiError::BadRequest(
            "maxPerTask cannot exceed maxPerDay".to_string(),
        ));
    }

    ledger.set_limits(limits);
    Ok(Json(limits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_state;

    #[tokio::test]
    async fn test_partial_limit_update() {
        let state = test_state();
        let Json(limits) = update_limits(
            State(state.clone()),
            Json(UpdateLimits {
                max_per_task: Some(5_000),
                max_per_day: None,
            }),
        )
        .await
        .unwrap();

        assert_eq!(limits.max_per_task, 5_000);
        assert_eq!(limits.max_per_day, SpendLimits::default().max_per_day);
        assert_eq!(state.orchestrator.ledger().limits(), limits);
    }

    #[tokio::test]
    async fn test_invalid_limits_rejected() {
        let state = test_state();
        let result = update_limits(
            State(state.clone()),
            Json(UpdateLimits {
                max_per_task: Some(20),
                max_per_day: Some(10),
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
        assert_eq!(state.orchestrator.ledger().limits(), SpendLimits::default());
    }
}
