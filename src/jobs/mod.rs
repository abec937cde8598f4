// Jobs module - Scheduled background work

pub mod expiration_alerts;
