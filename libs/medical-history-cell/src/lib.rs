pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::medical_history_routes;
pub use services::timeline::filter_timeline;
