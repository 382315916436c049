pub mod ble;
pub mod sampler;

pub use ble::*;
pub use sampler::*;
