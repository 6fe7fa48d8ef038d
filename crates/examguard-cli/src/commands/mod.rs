pub mod init;
pub mod simulate;
pub mod summary;
pub mod validate;
