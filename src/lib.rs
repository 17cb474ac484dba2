//! scan-wedge - keyboard-wedge barcode scanner listener
//!
//! Barcode scanners that emulate a keyboard "type" each code as a burst of
//! keystrokes.  This crate separates those bursts from human typing and
//! reports each one as a single token.  Feed raw key events into a
//! [`scan::KeyHub`], attach a [`scan::KeystrokeAggregator`], and call
//! `pump()` from your event loop.

pub mod config;
pub mod event;
pub mod scan;
pub mod source;

pub use event::{KeyPhase, RawKeyEvent};
pub use scan::{KeyHub, KeystrokeAggregator, ScanConfig, TerminationMode};
