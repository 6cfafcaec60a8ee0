//! I/O trait definitions
//!
//! These traits use `maybe_async` to support both sync and async modes.
//! - By default, traits are async (suitable for Embassy or tokio drivers)
//! - With the `is_sync` feature, traits become synchronous

use crate::error::Result;
use crate::event::CommandEvent;
use maybe_async::maybe_async;

/// Executes command-level (L1) events against a device
///
/// This is the seam between the protocol core and whatever actually moves
/// the bits: a register-mapped controller, a bit-banged bus, or a
/// recording stub in tests.
///
/// Failures are reported synchronously through the returned `Result` and
/// are terminal for the running operation. A sink may also return
/// [`Error::Abandoned`](crate::Error::Abandoned) from a `TIME_WAIT` to give
/// up on the operation.
///
/// ## Example
///
/// ```ignore
/// #[maybe_async]
/// impl CommandSink for Tracer {
///     async fn execute(&mut self, event: &CommandEvent) -> Result<()> {
///         println!("{}", event);
///         Ok(())
///     }
/// }
/// ```
#[maybe_async(AFIT)]
pub trait CommandSink {
    /// Execute one L1 event
    async fn execute(&mut self, event: &CommandEvent) -> Result<()>;
}

/// Register-level (L0) access to a NAND controller
#[maybe_async(AFIT)]
pub trait RegisterBus {
    /// Read a 32-bit controller register
    async fn read_register(&mut self, offset: u32) -> Result<u32>;

    /// Write a 32-bit controller register
    async fn write_register(&mut self, offset: u32, value: u32) -> Result<()>;

    /// Delay for the specified number of microseconds
    async fn delay_us(&mut self, us: u32);
}

#[maybe_async(AFIT)]
impl<S: CommandSink + ?Sized> CommandSink for &mut S {
    async fn execute(&mut self, event: &CommandEvent) -> Result<()> {
        (**self).execute(event).await
    }
}

// Blanket impl for boxed sinks to allow trait objects (sync mode only)
// In async mode, traits with async fn are not object-safe
#[cfg(all(feature = "alloc", feature = "is_sync"))]
impl CommandSink for alloc::boxed::Box<dyn CommandSink + Send> {
    fn execute(&mut self, event: &CommandEvent) -> Result<()> {
        (**self).execute(event)
    }
}
