// Request middleware - sessions and access control

pub mod auth;
pub mod session;
