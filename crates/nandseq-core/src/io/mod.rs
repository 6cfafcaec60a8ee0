//! I/O seams
//!
//! The core never touches hardware. Everything the machine emits goes to a
//! [`CommandSink`]; [`RegisterController`] is the stock sink for
//! register-mapped controllers and lowers each command event into register
//! accesses on a [`RegisterBus`].

pub mod register;
mod traits;

pub use register::{dispatch, DmaControl, RegisterController, RegisterMap, StatusBits};
pub use traits::*;
