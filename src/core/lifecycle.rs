//! Enrollment state machine.
//!
//! ```text
//! PENDING  -> APPROVED | REJECTED | CANCELLED
//! REJECTED -> CANCELLED
//! APPROVED -> (cannot be cancelled)
//! ```
//!
//! Cancellation also clears the `active` flag, and an inactive enrollment accepts no
//! further transitions. Explicit status updates are permissive by default: any status
//! may overwrite any other as long as the enrollment is active. [`TransitionPolicy::Strict`]
//! restricts updates to the forward edges above.

use crate::{
    entities::{EnrollmentStatus, enrollment},
    errors::{Error, Result},
};

/// How explicit status updates are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Only the `active` flag is checked
    #[default]
    Permissive,
    /// Only `PENDING -> APPROVED | REJECTED` is allowed through a status update
    Strict,
}

impl TransitionPolicy {
    /// Policy for the `strict_status_transitions` setting.
    #[must_use]
    pub const fn from_strict(strict: bool) -> Self {
        if strict { Self::Strict } else { Self::Permissive }
    }
}

/// Whether `from -> to` is an edge of the lifecycle graph.
#[must_use]
pub const fn is_lifecycle_edge(from: EnrollmentStatus, to: EnrollmentStatus) -> bool {
    use EnrollmentStatus::{Approved, Cancelled, Pending, Rejected};
    matches!(
        (from, to),
        (Pending, Approved | Rejected | Cancelled) | (Rejected, Cancelled)
    )
}

/// Checks that `enrollment` may have its status overwritten with `to`.
///
/// # Errors
/// `InvalidState` if the enrollment is inactive, or if the strict policy rejects the
/// edge. Under the strict policy `CANCELLED` is only reachable through cancellation.
pub fn check_status_update(
    enrollment: &enrollment::Model,
    to: EnrollmentStatus,
    policy: TransitionPolicy,
) -> Result<()> {
    if !enrollment.active {
        return Err(Error::invalid_state(format!(
            "enrollment {} is inactive and cannot be modified",
            enrollment.id
        )));
    }
    let forward = is_lifecycle_edge(enrollment.status, to) && to != EnrollmentStatus::Cancelled;
    if policy == TransitionPolicy::Strict && !forward {
        return Err(Error::invalid_state(format!(
            "transition {} -> {} is not allowed",
            enrollment.status, to
        )));
    }
    Ok(())
}

/// Checks that `enrollment` may be cancelled.
///
/// # Errors
/// `InvalidState` if the enrollment is approved.
pub fn check_cancel(enrollment: &enrollment::Model) -> Result<()> {
    if enrollment.status == EnrollmentStatus::Approved {
        return Err(Error::invalid_state(format!(
            "enrollment {} is approved and cannot be cancelled",
            enrollment.id
        )));
    }
    Ok(())
}
