//! Common test utilities for terrawin.
//!
//! This module provides shared fixtures and helpers for the integration tests.

#![allow(dead_code)]

pub mod assertions;
pub mod http_client;
pub mod test_data;
