pub mod mapper;
pub mod model;
pub mod repository;
pub mod repository_sqlx;
pub mod store;

pub use model::{IdentityKey, StoredRecord};
