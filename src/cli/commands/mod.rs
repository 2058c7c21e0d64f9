mod grant;
mod init;
mod migrate;

pub use grant::cmd_grant;
pub use init::cmd_init_config;
pub use migrate::cmd_migrate;
