pub mod asset;
pub mod media_registry;
pub mod storage;
pub mod thumbnail_service;
pub mod upload_service;
pub mod usage_ledger;
