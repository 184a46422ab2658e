//! Route and stop lifecycle rules
//!
//! Pure validation of status transitions. Persistence of the resulting
//! changes (stop update, package cascade, counter recomputation) is done by
//! the server inside a single transaction.
//!
//! Route: DRAFT → PLANNED → IN_PROGRESS → COMPLETED, any non-terminal → CANCELLED.
//! Stop: PENDING → {IN_PROGRESS, ARRIVED} → {COMPLETED, FAILED, SKIPPED}.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::{PackageStatus, RouteStatus, StopStatus};
use crate::{Error, Result};

// ============================================================================
// Route transitions
// ============================================================================

/// Whether a route may move from `from` to `to`
pub fn route_transition_allowed(from: RouteStatus, to: RouteStatus) -> bool {
    use RouteStatus::*;
    match (from, to) {
        (Draft, Planned) => true,
        (Draft | Planned, InProgress) => true,
        (InProgress, Completed) => true,
        (Draft | Planned | InProgress, Cancelled) => true,
        _ => false,
    }
}

/// Validate a route transition
pub fn check_route_transition(from: RouteStatus, to: RouteStatus) -> Result<()> {
    if route_transition_allowed(from, to) {
        Ok(())
    } else {
        Err(Error::InvalidState(format!(
            "Route cannot move from {} to {}",
            from, to
        )))
    }
}

/// Structural edits (stops, packages, ordering, header) require DRAFT
pub fn ensure_structure_editable(status: RouteStatus) -> Result<()> {
    if status == RouteStatus::Draft {
        Ok(())
    } else {
        Err(Error::InvalidState(format!(
            "Route is {}; it can only be restructured while DRAFT",
            status
        )))
    }
}

// ============================================================================
// Failure vocabulary
// ============================================================================

/// Reasons a driver can select when a delivery fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    AbsentRecipient,
    IncorrectAddress,
    AccessDenied,
    Refused,
    DamagedPackage,
    Other,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::AbsentRecipient => "ABSENT_RECIPIENT",
            FailureReason::IncorrectAddress => "INCORRECT_ADDRESS",
            FailureReason::AccessDenied => "ACCESS_DENIED",
            FailureReason::Refused => "REFUSED",
            FailureReason::DamagedPackage => "DAMAGED_PACKAGE",
            FailureReason::Other => "OTHER",
        }
    }

    /// Human label stored on the stop and its packages
    pub fn label(&self) -> &'static str {
        match self {
            FailureReason::AbsentRecipient => "Recipient absent",
            FailureReason::IncorrectAddress => "Incorrect address",
            FailureReason::AccessDenied => "Access denied",
            FailureReason::Refused => "Refused by recipient",
            FailureReason::DamagedPackage => "Damaged package",
            FailureReason::Other => "Other",
        }
    }
}

impl FromStr for FailureReason {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ABSENT_RECIPIENT" => Ok(FailureReason::AbsentRecipient),
            "INCORRECT_ADDRESS" => Ok(FailureReason::IncorrectAddress),
            "ACCESS_DENIED" => Ok(FailureReason::AccessDenied),
            "REFUSED" => Ok(FailureReason::Refused),
            "DAMAGED_PACKAGE" => Ok(FailureReason::DamagedPackage),
            "OTHER" => Ok(FailureReason::Other),
            other => Err(Error::InvalidInput(format!("Unknown failure reason: {}", other))),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Stop transitions
// ============================================================================

/// Delivery action submitted by the driver view
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopUpdate {
    pub status: Option<StopStatus>,
    pub signature: Option<String>,
    pub signed_by: Option<String>,
    pub proof_photo: Option<String>,
    pub delivery_notes: Option<String>,
    pub failure_reason: Option<String>,
    /// Free text accompanying the failure reason
    pub failure_detail: Option<String>,
    /// GPS position captured when the action was taken
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Proof captured on a successful delivery
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryProof {
    pub signature: String,
    pub signed_by: String,
    pub proof_photo: Option<String>,
    pub notes: Option<String>,
}

/// Validated stop transition
#[derive(Debug, Clone, PartialEq)]
pub enum StopTransition {
    Start,
    Arrive,
    Complete(DeliveryProof),
    Fail {
        reason: FailureReason,
        /// Text copied to the stop's failure_reason and every package note
        note: String,
        proof_photo: Option<String>,
        notes: Option<String>,
    },
    Skip { note: Option<String> },
}

impl StopTransition {
    pub fn target(&self) -> StopStatus {
        match self {
            StopTransition::Start => StopStatus::InProgress,
            StopTransition::Arrive => StopStatus::Arrived,
            StopTransition::Complete(_) => StopStatus::Completed,
            StopTransition::Fail { .. } => StopStatus::Failed,
            StopTransition::Skip { .. } => StopStatus::Skipped,
        }
    }

    /// Status every package under the stop takes with this transition
    pub fn package_status(&self) -> Option<PackageStatus> {
        match self {
            StopTransition::Complete(_) => Some(PackageStatus::Delivered),
            StopTransition::Fail { .. } => Some(PackageStatus::Failed),
            _ => None,
        }
    }
}

/// Whether a stop may move from `from` to `to`
pub fn stop_transition_allowed(from: StopStatus, to: StopStatus) -> bool {
    use StopStatus::*;
    match (from, to) {
        (Pending, InProgress | Arrived) => true,
        (InProgress, Arrived) => true,
        (Pending | InProgress | Arrived, Completed | Failed | Skipped) => true,
        _ => false,
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Validate a delivery action against the route and current stop state
///
/// Rejections leave nothing to persist; the caller must not touch the stop.
pub fn plan_stop_transition(
    route_status: RouteStatus,
    current: StopStatus,
    update: &StopUpdate,
) -> Result<StopTransition> {
    if route_status.is_terminal() {
        return Err(Error::InvalidState(format!(
            "Route is {}; deliveries can no longer be recorded",
            route_status
        )));
    }

    let target = update
        .status
        .ok_or_else(|| Error::InvalidInput("status is required".to_string()))?;

    if current.is_terminal() {
        return Err(Error::InvalidState(format!(
            "Stop is already {}",
            current
        )));
    }

    if !stop_transition_allowed(current, target) {
        return Err(Error::InvalidState(format!(
            "Stop cannot move from {} to {}",
            current, target
        )));
    }

    match target {
        StopStatus::InProgress => Ok(StopTransition::Start),
        StopStatus::Arrived => Ok(StopTransition::Arrive),
        StopStatus::Completed => {
            let signature = non_blank(&update.signature)
                .ok_or_else(|| Error::InvalidInput("A signature is required to complete a delivery".to_string()))?;
            let signed_by = non_blank(&update.signed_by)
                .ok_or_else(|| Error::InvalidInput("The signer name is required to complete a delivery".to_string()))?;
            Ok(StopTransition::Complete(DeliveryProof {
                signature,
                signed_by,
                proof_photo: non_blank(&update.proof_photo),
                notes: non_blank(&update.delivery_notes),
            }))
        }
        StopStatus::Failed => {
            let raw = non_blank(&update.failure_reason)
                .ok_or_else(|| Error::InvalidInput("A failure reason is required".to_string()))?;
            let reason: FailureReason = raw.parse()?;
            let note = match non_blank(&update.failure_detail) {
                Some(detail) => format!("{}: {}", reason.label(), detail),
                None => reason.label().to_string(),
            };
            Ok(StopTransition::Fail {
                reason,
                note,
                proof_photo: non_blank(&update.proof_photo),
                notes: non_blank(&update.delivery_notes),
            })
        }
        StopStatus::Skipped => Ok(StopTransition::Skip {
            note: non_blank(&update.delivery_notes),
        }),
        // stop_transition_allowed never admits Pending as a target
        StopStatus::Pending => Err(Error::InvalidState(
            "Stop cannot return to PENDING".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(status: StopStatus) -> StopUpdate {
        StopUpdate {
            status: Some(status),
            ..Default::default()
        }
    }

    #[test]
    fn test_route_happy_path() {
        assert!(route_transition_allowed(RouteStatus::Draft, RouteStatus::Planned));
        assert!(route_transition_allowed(RouteStatus::Planned, RouteStatus::InProgress));
        assert!(route_transition_allowed(RouteStatus::Draft, RouteStatus::InProgress));
        assert!(route_transition_allowed(RouteStatus::InProgress, RouteStatus::Completed));
    }

    #[test]
    fn test_route_rejected_transitions() {
        assert!(!route_transition_allowed(RouteStatus::Draft, RouteStatus::Completed));
        assert!(!route_transition_allowed(RouteStatus::Completed, RouteStatus::Cancelled));
        assert!(!route_transition_allowed(RouteStatus::Cancelled, RouteStatus::Draft));
        assert!(!route_transition_allowed(RouteStatus::InProgress, RouteStatus::Draft));
        assert!(matches!(
            check_route_transition(RouteStatus::Completed, RouteStatus::InProgress),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_structure_only_editable_in_draft() {
        assert!(ensure_structure_editable(RouteStatus::Draft).is_ok());
        for status in [
            RouteStatus::Planned,
            RouteStatus::InProgress,
            RouteStatus::Completed,
            RouteStatus::Cancelled,
        ] {
            assert!(matches!(
                ensure_structure_editable(status),
                Err(Error::InvalidState(_))
            ));
        }
    }

    #[test]
    fn test_complete_requires_signature_and_signer() {
        let mut u = update(StopStatus::Completed);
        u.signed_by = Some("J. Martin".to_string());
        let err = plan_stop_transition(RouteStatus::InProgress, StopStatus::Arrived, &u).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        u.signature = Some("   ".to_string());
        assert!(plan_stop_transition(RouteStatus::InProgress, StopStatus::Arrived, &u).is_err());

        u.signature = Some("data:image/png;base64,AAAA".to_string());
        u.signed_by = None;
        assert!(plan_stop_transition(RouteStatus::InProgress, StopStatus::Arrived, &u).is_err());
    }

    #[test]
    fn test_complete_carries_proof() {
        let mut u = update(StopStatus::Completed);
        u.signature = Some("sig".to_string());
        u.signed_by = Some(" J. Martin ".to_string());
        u.delivery_notes = Some("Left with concierge".to_string());

        let t = plan_stop_transition(RouteStatus::InProgress, StopStatus::Pending, &u).unwrap();
        assert_eq!(t.target(), StopStatus::Completed);
        assert_eq!(t.package_status(), Some(PackageStatus::Delivered));
        match t {
            StopTransition::Complete(proof) => {
                assert_eq!(proof.signed_by, "J. Martin");
                assert_eq!(proof.notes.as_deref(), Some("Left with concierge"));
                assert!(proof.proof_photo.is_none());
            }
            other => panic!("unexpected transition {:?}", other),
        }
    }

    #[test]
    fn test_fail_requires_reason() {
        let mut u = update(StopStatus::Failed);
        assert!(matches!(
            plan_stop_transition(RouteStatus::InProgress, StopStatus::Arrived, &u),
            Err(Error::InvalidInput(_))
        ));

        u.failure_reason = Some("".to_string());
        assert!(plan_stop_transition(RouteStatus::InProgress, StopStatus::Arrived, &u).is_err());

        u.failure_reason = Some("LOST_IN_SPACE".to_string());
        assert!(plan_stop_transition(RouteStatus::InProgress, StopStatus::Arrived, &u).is_err());
    }

    #[test]
    fn test_fail_note_includes_detail() {
        let mut u = update(StopStatus::Failed);
        u.failure_reason = Some("access_denied".to_string());
        u.failure_detail = Some("Gate code changed".to_string());

        let t = plan_stop_transition(RouteStatus::InProgress, StopStatus::Arrived, &u).unwrap();
        assert_eq!(t.package_status(), Some(PackageStatus::Failed));
        match t {
            StopTransition::Fail { reason, note, .. } => {
                assert_eq!(reason, FailureReason::AccessDenied);
                assert_eq!(note, "Access denied: Gate code changed");
            }
            other => panic!("unexpected transition {:?}", other),
        }
    }

    #[test]
    fn test_terminal_stop_is_frozen() {
        let mut u = update(StopStatus::Failed);
        u.failure_reason = Some("OTHER".to_string());
        for current in [StopStatus::Completed, StopStatus::Failed, StopStatus::Skipped] {
            assert!(matches!(
                plan_stop_transition(RouteStatus::InProgress, current, &u),
                Err(Error::InvalidState(_))
            ));
        }
    }

    #[test]
    fn test_terminal_route_rejects_delivery_actions() {
        let u = update(StopStatus::Arrived);
        for route in [RouteStatus::Completed, RouteStatus::Cancelled] {
            assert!(matches!(
                plan_stop_transition(route, StopStatus::Pending, &u),
                Err(Error::InvalidState(_))
            ));
        }
    }

    #[test]
    fn test_cannot_go_back() {
        assert!(!stop_transition_allowed(StopStatus::Arrived, StopStatus::InProgress));
        assert!(!stop_transition_allowed(StopStatus::InProgress, StopStatus::Pending));
        let u = update(StopStatus::Pending);
        assert!(plan_stop_transition(RouteStatus::InProgress, StopStatus::Arrived, &u).is_err());
    }

    #[test]
    fn test_missing_status() {
        let u = StopUpdate::default();
        assert!(matches!(
            plan_stop_transition(RouteStatus::InProgress, StopStatus::Pending, &u),
            Err(Error::InvalidInput(_))
        ));
    }
}
