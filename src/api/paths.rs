//! All Paths are recorded here for use throughout this codebase
pub mod base {
    pub const ROOT: &str = "/";
    pub const HEALTH: &str = "/health";
    pub const ABOUT: &str = "/about";
}

/// Inbound token RPC; peers POST the token here
pub const TOKEN: &str = "/token";
pub const STATUS: &str = "/status";
pub const CRITICAL_SECTION: &str = "/critical-section";
