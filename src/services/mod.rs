// Services module - Business logic

pub mod account;
pub mod aso_launch;
pub mod audit;
pub mod dashboard;
pub mod dates;
pub mod member_import;
