use tracing::warn;

use shared_models::appointment::{Appointment, AppointmentStatus};
use shared_models::auth::AuthUser;

use crate::models::AppointmentError;

/// How the caller relates to an appointment. Admin wins over the other two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    Admin,
    Doctor,
    Patient,
}

impl Participant {
    pub fn resolve(caller: &AuthUser, appointment: &Appointment) -> Result<Self, AppointmentError> {
        if caller.is_admin() {
            Ok(Participant::Admin)
        } else if caller.owns_doctor(appointment.doctor_id) {
            Ok(Participant::Doctor)
        } else if caller.id() == appointment.patient_id {
            Ok(Participant::Patient)
        } else {
            Err(AppointmentError::NotParticipant)
        }
    }

    pub fn is_privileged(self) -> bool {
        !matches!(self, Participant::Patient)
    }
}

/// Patients may only move an appointment to cancelled; doctors and admins may set any status.
pub fn check_status_change(
    participant: Participant,
    next: AppointmentStatus,
) -> Result<(), AppointmentError> {
    if participant.is_privileged() || next == AppointmentStatus::Cancelled {
        Ok(())
    } else {
        warn!("Patient attempted to set appointment status to {}", next);
        Err(AppointmentError::PatientStatusChange(next))
    }
}

/// Completed, cancelled and no-show appointments keep their status and time.
pub fn check_not_finished(
    current: AppointmentStatus,
    next_status: Option<AppointmentStatus>,
    rescheduling: bool,
) -> Result<(), AppointmentError> {
    let status_moves = next_status.map_or(false, |next| next != current);
    if current.is_terminal() && (status_moves || rescheduling) {
        warn!("Refused change to a {} appointment", current);
        return Err(AppointmentError::Finished(current));
    }
    Ok(())
}

pub fn check_cancellable(current: AppointmentStatus) -> Result<(), AppointmentError> {
    match current {
        AppointmentStatus::Completed | AppointmentStatus::Cancelled => {
            Err(AppointmentError::NotCancellable(current))
        }
        _ => Ok(()),
    }
}
