pub mod announcement;
pub mod auth;
pub mod conversation;
pub mod events;
pub mod message;
pub mod user;
