//! Shared numeric helpers

pub mod simd_ops;
