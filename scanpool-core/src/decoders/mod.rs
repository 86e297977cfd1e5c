//! Decoder implementations shipped with the pool.

pub mod inverting;
#[cfg(feature = "rqrr")]
pub mod qr;
pub mod scripted;

pub use inverting::InvertingDecoder;
#[cfg(feature = "rqrr")]
pub use qr::RqrrDecoder;
pub use scripted::{ScriptStep, ScriptedDecoder};
