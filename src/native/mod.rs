//! Вспомогательные модули нативного бэкенда x86-64.

pub mod frame;
pub mod runtime;

pub use frame::{FrameAllocator, FrameError, Slot, WORD};
