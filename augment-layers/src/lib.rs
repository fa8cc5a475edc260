pub mod boxes;
pub mod config;
pub mod error;
pub mod layers;
pub mod sample;
pub mod tensor;
