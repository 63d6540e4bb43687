pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::DoctorState;
pub use services::{
    AvailabilityService, DoctorService, ScheduleService, SlotTiler, SpecializationService,
};
