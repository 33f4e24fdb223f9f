//! Platform abstraction ports
//!
//! These traits abstract platform-specific operations so that:
//! 1. Session and identity code remains platform-agnostic
//! 2. Platform-specific code is isolated in infrastructure
//! 3. Code becomes easily testable with mock implementations

/// Time operations abstraction
#[cfg_attr(test, mockall::automock)]
pub trait TimeProvider: Send + Sync + 'static {
    /// Get current time as Unix timestamp in seconds
    fn now_unix_secs(&self) -> u64;
}

/// Persistent storage abstraction (cookie jar / file-based)
///
/// Implementations never fail loudly: I/O problems are logged and a missing or
/// unreadable key loads as `None`.
#[cfg_attr(test, mockall::automock)]
pub trait StorageProvider: Send + Sync + 'static {
    /// Save a string value with the given key
    fn save(&self, key: &str, value: &str);

    /// Load a string value by key, returns None if not found
    fn load(&self, key: &str) -> Option<String>;

    /// Remove a value by key
    fn remove(&self, key: &str);
}

/// Storage key constants
///
/// Fixed names shared with the browser client's cookies so a stored identity
/// means the same thing on every platform.
pub mod storage_keys {
    pub const GAME_ID: &str = "game_id";
    pub const PLAYER_ID: &str = "player_id";
}
