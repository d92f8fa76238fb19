pub mod media;
pub mod range;
pub mod stream;
pub mod upload;
