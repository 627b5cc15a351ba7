pub mod compare;
pub mod demo;
pub mod init;
pub mod report;
pub mod sweep;
