pub mod error;
pub mod gradients;
pub mod profile;
