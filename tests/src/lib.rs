//! # People Relay Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── bridge_benchmarks.rs   # Round-trip latency through the bridge
//! │
//! └── src/integration/
//!     ├── correlation.rs         # Token isolation, timeouts, stray replies
//!     └── people_flow.rs         # HTTP → bridge → worker → store
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p relay-tests
//! cargo test -p relay-tests integration::correlation
//! cargo bench -p relay-tests
//! ```

pub mod integration;
