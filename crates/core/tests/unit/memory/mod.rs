//! Address decoder and memory primitive boundary tests.
pub mod decoder;
