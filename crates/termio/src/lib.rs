// SPDX-License-Identifier: MIT
//
// termio — cross-platform terminal I/O driver.
//
// One byte-oriented, UTF-8 read/write surface over the Windows console and
// POSIX ttys, with raw/cooked mode control, size queries, resize
// notification, and signal generation. Standard streams and the terminal
// device itself are separate streams, so a program whose stdout is piped
// can still draw on and read from the user's terminal.
//
// Platform code lives behind the `Backend` trait. Everything above it
// (transcoding, mode snapshots, resize debounce) is platform-neutral and
// tested against the in-memory `testing::ScriptedBackend`.

pub mod backend;
mod blocking;
pub mod config;
pub mod driver;
pub mod error;
pub mod handle;
pub mod mode;
pub mod reader;
pub mod resize;
pub mod signal;
pub mod size;
pub mod testing;
pub mod writer;

pub use backend::{Backend, SystemBackend};
pub use config::DriverConfig;
pub use driver::{Driver, RawModeGuard, SystemDriver};
pub use error::{TerminalError, TerminalResult};
pub use mode::{ModeSnapshot, TerminalMode};
pub use reader::Reader;
pub use resize::{ResizeMonitor, ResizeSubscription};
pub use signal::TerminalSignal;
pub use size::Size;
pub use writer::Writer;
