pub use super::media_conversions::Entity as MediaConversions;
pub use super::media_items::Entity as MediaItems;
pub use super::media_usages::Entity as MediaUsages;
