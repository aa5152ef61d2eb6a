pub mod uploader;

pub use uploader::PhotoUploader;
