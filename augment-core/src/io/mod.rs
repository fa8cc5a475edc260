mod npy;

pub use npy::read_numpy;
pub use npy::write_numpy;
