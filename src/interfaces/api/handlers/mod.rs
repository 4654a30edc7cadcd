pub mod auth_handler;
pub mod webdav_handler;
