pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::AdminState;
pub use models::AdminStats;
pub use services::stats::StatsService;
