//! Integration tests for devtap
//!
//! These tests verify that the bridge, the agent side and the tool layer work together.

#[path = "../common/mod.rs"]
pub mod common;

pub mod bridge_loopback;
pub mod end_to_end;
