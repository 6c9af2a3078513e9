pub mod prelude;

pub mod media_conversions;
pub mod media_items;
pub mod media_usages;
