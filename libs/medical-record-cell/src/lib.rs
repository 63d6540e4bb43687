pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::MedicalRecordState;
pub use services::record::MedicalRecordService;
