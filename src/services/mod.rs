//! Support services for the matting and compositing pipeline

pub mod format;

pub use format::OutputFormatHandler;
