pub mod health_handlers;
pub mod notification_handlers;
pub mod object_handlers;
pub mod user_handlers;
