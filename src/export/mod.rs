pub mod codec;
pub mod formats;
pub mod merge;
