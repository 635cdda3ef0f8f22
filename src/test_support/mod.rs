//! Helpers for tests of this crate and of code built on it.
//!
//! Because these are intended for testing, their functions panic instead of
//! returning `Result`s.

mod fake_runner;
pub use fake_runner::{Call, FakeRunner};

mod source_repo;
pub use source_repo::{git_stdout, SourceRepo};

mod temp_cwd;
pub use temp_cwd::TempCwd;
