//! Shared state between the interrupt side and the task side of the link.
//!
//! A [`ModemChannel`] owns both ring buffers, the complete-line counter and
//! the cross-context notifications. The interrupt handlers (or the
//! [`crate::io`] pump standing in for them) call [`ModemChannel::on_rx_byte`]
//! and [`ModemChannel::next_tx_byte`]; the single task-side consumer works
//! through the [`LineReader`]/[`LineWriter`] pair returned by
//! [`ModemChannel::split`].

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use crate::config::{NEW_MSG_DEPTH, RX_BUFFER_SIZE, TX_BUFFER_SIZE};
use crate::ring::RingBuffer;

const LF: u8 = b'\n';
const CR: u8 = b'\r';

struct RxShared {
    ring: RingBuffer<RX_BUFFER_SIZE>,
    /// Complete, not-yet-consumed lines currently buffered.
    pending_lines: usize,
}

/// One modem link. Construct it once, wherever the transport is wired up;
/// `const fn new` allows placing it in a `static` when interrupt handlers
/// need access.
pub struct ModemChannel {
    rx: Mutex<CriticalSectionRawMutex, RefCell<RxShared>>,
    tx: Mutex<CriticalSectionRawMutex, RefCell<RingBuffer<TX_BUFFER_SIZE>>>,
    /// Counting notification, one unit per completed receive line.
    new_msg: Channel<CriticalSectionRawMutex, (), NEW_MSG_DEPTH>,
    /// Armed whenever transmit data is queued; consumed by the drain path.
    tx_kick: Signal<CriticalSectionRawMutex, ()>,
}

impl ModemChannel {
    pub const fn new() -> Self {
        Self {
            rx: Mutex::new(RefCell::new(RxShared {
                ring: RingBuffer::new(),
                pending_lines: 0,
            })),
            tx: Mutex::new(RefCell::new(RingBuffer::new())),
            new_msg: Channel::new(),
            tx_kick: Signal::new(),
        }
    }

    /// Receive-interrupt entry point: store one byte arriving from the wire.
    ///
    /// Line terminators bump the pending-line count and post a new-message
    /// notification. A full notification queue means the waiter has fallen
    /// behind; the unit is dropped and surfaces as an overrun on its side.
    pub fn on_rx_byte(&self, byte: u8) {
        self.rx.lock(|rx| {
            let mut rx = rx.borrow_mut();
            rx.ring.write(byte);
            if byte == LF {
                rx.pending_lines += 1;
            }
        });
        if byte == LF {
            self.new_msg.try_send(()).ok();
        }
    }

    /// Transmit-interrupt entry point: next byte to put on the wire, or
    /// `None` when the queue is drained and the interrupt should stop.
    pub fn next_tx_byte(&self) -> Option<u8> {
        self.tx.lock(|tx| tx.borrow_mut().read())
    }

    /// Task-side views of the channel. The receive side tolerates exactly
    /// one consumer at a time; that discipline is the caller's.
    pub fn split(&self) -> (LineReader<'_>, LineWriter<'_>) {
        (LineReader { channel: self }, LineWriter { channel: self })
    }

    pub(crate) async fn tx_armed(&self) {
        self.tx_kick.wait().await
    }

    fn arm_tx(&self) {
        self.tx_kick.signal(());
    }
}

impl Default for ModemChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Task-side consumer of the receive ring.
pub struct LineReader<'a> {
    channel: &'a ModemChannel,
}

impl<'a> LineReader<'a> {
    /// Pop one raw byte. Consuming a line terminator settles one unit of the
    /// pending-line count.
    pub fn read_byte(&mut self) -> Option<u8> {
        self.channel.rx.lock(|rx| {
            let mut rx = rx.borrow_mut();
            let byte = rx.ring.read()?;
            if byte == LF && rx.pending_lines > 0 {
                rx.pending_lines -= 1;
            }
            Some(byte)
        })
    }

    /// Read one complete line into `buf`, stripped of CR/LF framing, and
    /// return the content length. Returns 0 when no complete line is
    /// buffered. The line is consumed in full even if `buf` is smaller than
    /// its content; the excess is dropped.
    pub fn read_line(&mut self, buf: &mut [u8]) -> usize {
        if self.pending() == 0 {
            return 0;
        }
        let mut count = 0;
        loop {
            match self.read_byte() {
                Some(LF) => break,
                Some(CR) => {}
                Some(byte) => {
                    if count < buf.len() {
                        buf[count] = byte;
                        count += 1;
                    }
                }
                // only possible when eviction swallowed a counted terminator
                None => break,
            }
        }
        count
    }

    /// Complete lines waiting to be read.
    pub fn pending(&self) -> usize {
        self.channel.rx.lock(|rx| rx.borrow().pending_lines)
    }

    /// Discard all unread receive data and the pending-line count. Used to
    /// clear stale input before a new exchange. Pending new-message
    /// notifications are left in place so a waiter can still detect that it
    /// missed them.
    pub fn flush(&mut self) {
        self.channel.rx.lock(|rx| {
            let mut rx = rx.borrow_mut();
            rx.ring.reset();
            rx.pending_lines = 0;
        });
    }

    /// Sleep until the interrupt side completes the next line.
    ///
    /// Returns `false` without waiting when a notification is already
    /// queued: the consumer lagged at least one line behind and must resync
    /// (typically by flushing) instead of trusting the next wakeup.
    pub async fn wait_for_new_message(&mut self) -> bool {
        if self.channel.new_msg.try_receive().is_ok() {
            return false;
        }
        self.channel.new_msg.receive().await;
        true
    }
}

/// Task-side producer of the transmit ring.
pub struct LineWriter<'a> {
    channel: &'a ModemChannel,
}

impl<'a> LineWriter<'a> {
    /// Queue one byte and arm the drain path. Re-arming an active drain is
    /// a no-op.
    pub fn write_byte(&mut self, byte: u8) {
        self.channel.tx.lock(|tx| tx.borrow_mut().write(byte));
        self.channel.arm_tx();
    }

    /// Queue a byte slice, arming the drain path once at the end.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.channel.tx.lock(|tx| {
            let mut tx = tx.borrow_mut();
            for &byte in bytes {
                tx.write(byte);
            }
        });
        self.channel.arm_tx();
    }

    /// Queue a command line followed by the CR+LF wire terminator.
    pub fn write_line(&mut self, text: &str) {
        self.write_bytes(text.as_bytes());
        self.write_bytes(b"\r\n");
    }
}
