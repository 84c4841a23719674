use crate::domain::entities::coupon::CouponState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    Forbidden,
}

/// Legal state transitions for a coupon. `Used` and `Expired` are terminal:
/// once left, `Available` is never re-entered.
pub struct CouponStateMachine;

impl CouponStateMachine {
    pub fn can_transition(from: CouponState, to: CouponState) -> bool {
        matches!(
            (from, to),
            (CouponState::Available, CouponState::Used)
                | (CouponState::Available, CouponState::Expired)
        )
    }

    pub fn transition(from: CouponState, to: CouponState) -> Result<CouponState, TransitionError> {
        if Self::can_transition(from, to) {
            return Ok(to);
        }

        Err(TransitionError::Forbidden)
    }
}
