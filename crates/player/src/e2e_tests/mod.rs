//! End-to-end tests for the session driver.
//!
//! These run the real tokio-tungstenite driver against an in-process WebSocket
//! server bound to `127.0.0.1:0`, so they need no external services.
//!
//! ```bash
//! cargo test -p secret-hitler-player --lib e2e_tests
//! ```

mod e2e_helpers;
mod session_flow_tests;

pub use e2e_helpers::*;
