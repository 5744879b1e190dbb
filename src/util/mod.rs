//! Various utilities

pub mod builder;
pub mod byte_size;
pub mod pnext;

pub(crate) mod string;
