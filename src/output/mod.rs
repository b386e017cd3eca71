//! Output lifecycle management module

pub mod guard;

pub use guard::OutputGuard;
