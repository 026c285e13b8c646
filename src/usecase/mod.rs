pub mod contracts;
pub mod error;
pub mod events;
pub mod notifications;
pub mod push_gateway;
pub mod recipients;
pub mod rules;
