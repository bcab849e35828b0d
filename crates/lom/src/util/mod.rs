//! Utility Module - Shared Helpers

pub mod atomic;
