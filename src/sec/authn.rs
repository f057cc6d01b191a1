pub mod session;
pub mod password;
pub mod initiator;
pub mod provider;
