pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::UserState;
pub use services::user::UserService;
