// Models module - records of the hosted store

pub mod audit_log;
pub mod convocation;
pub mod member;
pub mod status;
pub mod user;

pub use audit_log::{AuditLogEntry, NewAuditLogEntry};
pub use convocation::{AsoType, Convocation, ConvocationStatus, NewConvocation};
pub use member::{Member, MemberSummary, MemberUpdate, NewMember};
pub use status::AsoStatus;
pub use user::{AppUser, SystemRole};
