pub mod admin;
pub mod audit_log;
pub mod document;
pub mod post;
pub mod rating;
pub mod report;
pub mod timestamp;
pub mod user;

pub use admin::{Admin, AdminRole};
pub use audit_log::{AuditAction, AuditLogEntry, TargetType};
pub use document::{Entity as DocumentEntity, Model as DocumentModel};
pub use post::{Post, PostStatus};
pub use rating::{format_average, Rating};
pub use report::{Report, ReportStatus};
pub use user::{User, UserRole, UserStatus};
