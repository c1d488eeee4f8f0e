pub mod models;
pub mod pii;

pub use models::approval::ApprovalStatus;
pub use pii::Masked;
