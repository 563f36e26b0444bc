pub mod error;
pub mod consts;
pub mod sequence;
pub mod stats;
pub mod source;
pub mod select;
pub mod normalize;
pub mod chunk;
pub mod kernel;
pub mod config;
pub mod progress;
pub mod engine;
pub mod io;
