pub mod init;
pub mod params;
pub mod replay;
pub mod show;
pub mod validate;
