pub mod delivery;
pub mod photo;

pub use delivery::ImageDeliveryResolver;
pub use photo::{IngestedPhoto, PhotoIngestor, select_largest};
