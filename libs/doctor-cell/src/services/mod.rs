pub mod availability;
pub mod doctor;
pub mod scheduling;
pub mod specialization;

pub use availability::{AvailabilityService, SlotTiler};
pub use doctor::DoctorService;
pub use scheduling::ScheduleService;
pub use specialization::SpecializationService;
