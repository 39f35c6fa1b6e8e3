pub mod classifier;
pub mod evaluation_service;
pub mod exif_service;
pub mod fs_service;
pub mod image;
pub mod thumbnail_service;
