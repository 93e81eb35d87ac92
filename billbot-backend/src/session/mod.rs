pub mod pending_photos;

pub use pending_photos::PendingPhotoStore;
