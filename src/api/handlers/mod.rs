pub mod health;
pub mod media;
pub mod types;
pub mod usages;
