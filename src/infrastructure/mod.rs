pub mod staging;
pub mod toolchain;
