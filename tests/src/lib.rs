//! # Keepsake Test Suite
//!
//! Scenarios that cross subsystem boundaries. Each subsystem crate keeps
//! its own unit tests; this crate drives the whole engine through the
//! node container with a manual clock and a recording notifier.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/
//! │   ├── harness.rs             # Engine fixture
//! │   ├── delivery_guarantees.rs # exactly-once, idempotence, terminal states
//! │   ├── verification.rs        # quorum, event triggers, single-use tokens
//! │   ├── liveness.rs            # dead-man's-switch escalation and recovery
//! │   └── persistence.rs         # restart on a file-backed store
//! └── benches/
//!     └── engine_benchmarks.rs   # tick throughput, quorum computation
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All scenarios
//! cargo test -p ks-tests
//!
//! # By area
//! cargo test -p ks-tests integration::liveness::
//!
//! # Benchmarks
//! cargo bench -p ks-tests
//! ```

pub mod integration;
