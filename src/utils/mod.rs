pub mod file;
pub mod shutdown;
