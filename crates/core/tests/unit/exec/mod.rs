//! End-to-end executor scenarios.
//!
//! Drives the `ConcurrentExecutor` through complete Data Movement ISA
//! programs rather than exercising one engine in isolation, the way the
//! per-module unit tests do.
pub mod scenarios;
