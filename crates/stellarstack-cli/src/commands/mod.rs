pub mod info;
pub mod stack;
