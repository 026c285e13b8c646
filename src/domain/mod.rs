pub mod attendance;
pub mod change;
pub mod homework;
pub mod notification;
pub mod push;
pub mod ride;
pub mod subject;
pub mod user;
