//! Configuration module
//!
//! Settings shared by every command.

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the PayPipe server
    pub server_url: String,
}
