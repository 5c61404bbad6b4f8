//! End-to-end scenario tests for Clawbernetes.
//!
//! These tests drive the scheduler cores the way the scheduler does:
//! - Member and group-resource events racing into the gang cache
//! - Gang admission passes latching shared gang-group state
//! - Preemption dry runs across a node snapshot with budgets and quotas

#![cfg(test)]
