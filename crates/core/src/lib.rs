//! eqchain core
//!
//! Three-band equalizer engine: a Butterworth low-cut cascade, an RBJ peaking
//! band and a Butterworth high-cut cascade per channel, driven by a lock-free
//! parameter store that a control thread may write while audio is running.

pub mod domain;

pub use domain::*;
