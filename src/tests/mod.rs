//! Cross-module scenario tests

mod session_flow_tests;
