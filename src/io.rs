//! Async transport pump for targets that expose their UART as an
//! [`embedded_io_async`] duplex instead of raw interrupt handlers.

use embassy_futures::select::{select, Either};
use embedded_io_async::{Read, Write};
use log::error;

use crate::channel::ModemChannel;

const CHUNK_SIZE: usize = 32;

/// Pump bytes between `channel` and `uart` until dropped.
///
/// Waits on whichever happens first: the transmit side is armed (drain the
/// queued bytes to the UART) or the UART delivers received bytes (feed them
/// through the receive path one at a time, exactly as an RX interrupt
/// would). UART errors are logged and the pump keeps running.
pub async fn run<U>(channel: &ModemChannel, mut uart: U) -> !
where
    U: Read + Write,
{
    loop {
        let mut rx_buf = [0u8; CHUNK_SIZE];
        match select(channel.tx_armed(), uart.read(&mut rx_buf)).await {
            Either::First(()) => drain_tx(channel, &mut uart).await,
            Either::Second(Ok(0)) => continue,
            Either::Second(Ok(len)) => {
                for &byte in &rx_buf[..len] {
                    channel.on_rx_byte(byte);
                }
            }
            Either::Second(Err(e)) => error!("UART read error: {:?}", e),
        }
    }
}

async fn drain_tx<U: Write>(channel: &ModemChannel, uart: &mut U) {
    loop {
        let mut chunk: heapless::Vec<u8, CHUNK_SIZE> = heapless::Vec::new();
        while chunk.len() < chunk.capacity() {
            match channel.next_tx_byte() {
                Some(byte) => {
                    // capacity checked by the loop bound
                    chunk.push(byte).ok();
                }
                None => break,
            }
        }
        if chunk.is_empty() {
            break;
        }
        if let Err(e) = uart.write_all(&chunk).await {
            error!("UART write error: {:?}", e);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;
    use embassy_futures::select::{select, Either};
    use embassy_time::{Duration, Timer};
    use heapless::Deque;

    use super::*;

    /// UART double: hands out a scripted receive burst, then stays silent;
    /// captures everything written to it.
    struct ScriptUart {
        incoming: Deque<u8, 64>,
        written: heapless::Vec<u8, 64>,
    }

    impl ScriptUart {
        fn new(script: &[u8]) -> Self {
            let mut incoming = Deque::new();
            for &byte in script {
                incoming.push_back(byte).unwrap();
            }
            Self {
                incoming,
                written: heapless::Vec::new(),
            }
        }
    }

    impl embedded_io_async::ErrorType for ScriptUart {
        type Error = core::convert::Infallible;
    }

    impl Read for ScriptUart {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            if self.incoming.is_empty() {
                core::future::pending::<()>().await;
            }
            let mut len = 0;
            while len < buf.len() {
                match self.incoming.pop_front() {
                    Some(byte) => {
                        buf[len] = byte;
                        len += 1;
                    }
                    None => break,
                }
            }
            Ok(len)
        }
    }

    impl Write for ScriptUart {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            for &byte in buf {
                self.written.push(byte).unwrap();
            }
            Ok(buf.len())
        }
    }

    #[test]
    fn pump_moves_bytes_both_ways() {
        let channel = ModemChannel::new();
        let (mut reader, mut writer) = channel.split();
        let mut uart = ScriptUart::new(b"AT\r\nOK\r\n");
        writer.write_line("AT");

        let outcome = block_on(select(run(&channel, &mut uart), async {
            while reader.pending() < 2 {
                Timer::after(Duration::from_micros(100)).await;
            }
            let mut line = [0u8; 16];
            let len = reader.read_line(&mut line);
            assert_eq!(&line[..len], b"AT");
            let len = reader.read_line(&mut line);
            assert_eq!(&line[..len], b"OK");
        }));
        match outcome {
            Either::First(never) => match never {},
            Either::Second(()) => {}
        }
        assert_eq!(&uart.written[..], b"AT\r\n");
    }
}
