//! Integration tests
//!
//! `lifecycle` drives the loan service against in-memory collaborators.
//! `api_tests` needs a running server and is ignored by default.

mod api_tests;
mod lifecycle;
