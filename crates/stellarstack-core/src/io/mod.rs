pub mod image_out;
pub mod memory;
pub mod raw;
