//! Line-framing and AT-command driver for a serial-attached GSM modem.
//!
//! The interrupt side of the application feeds raw bytes into a
//! [`ModemChannel`]; task-side readers and writers see whole lines and drive
//! AT request/response exchanges through [`AtSession`]. Targets that expose
//! their UART as an [`embedded_io_async`] duplex can run [`io::run`] instead
//! of wiring interrupt handlers by hand.

#![no_std]

pub mod at;
pub mod channel;
pub mod config;
pub mod io;
pub mod ring;

pub use at::{AtSession, CommandError};
pub use channel::{LineReader, LineWriter, ModemChannel};
pub use config::{Config, MAX_LINE_LEN, RX_BUFFER_SIZE, TX_BUFFER_SIZE};
