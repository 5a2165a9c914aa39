// Data models for the admin API wire format

pub mod account;
pub mod common;

pub use account::{AccountType, User};
pub use common::{ApiEnvelope, PaginatedList, PaginationQuery};
