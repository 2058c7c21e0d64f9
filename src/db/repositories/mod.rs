pub mod movie;
pub mod permission;
pub mod token;
pub mod user;
