//! Integration test modules

mod fixtures;
mod poller_tests;
mod session_tests;
