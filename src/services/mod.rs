pub mod chat_service;
pub mod delivery;
pub mod gateway;
pub mod health_service;
pub mod identity_service;
pub mod session_registry;

#[cfg(test)]
pub(crate) mod testing;
