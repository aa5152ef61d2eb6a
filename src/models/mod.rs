// Re-export all model types for ease of use

pub mod photo;

pub use photo::*;
