//! AT request/response exchanges over a [`ModemChannel`].
//!
//! A successful exchange on the wire looks like
//! `<echo of command>` CRLF `[payload]` CRLF `[blank]` CRLF `OK` CRLF;
//! anything else maps onto one [`CommandError`] variant. Every exchange is a
//! single attempt; retries belong to the caller.

use embassy_time::Timer;
use heapless::String;
use log::{debug, trace, warn};

use crate::channel::{LineReader, LineWriter, ModemChannel};
use crate::config::{Config, MAX_LINE_LEN};

/// Delimiters separating payload tokens, e.g. `+CSQ: 24,0`.
const TOKEN_DELIMITERS: [char; 4] = [' ', ',', '.', '-'];
/// Shortest plausible echo (`AT` itself).
const MIN_ECHO_LEN: usize = 2;
const STATUS_OK: &[u8] = b"OK";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// No response line arrived within the poll budget.
    Timeout,
    /// The echoed command did not match what was sent.
    EchoMismatch,
    /// The response structure was malformed, e.g. the blank separator line
    /// before the status was missing.
    ProtocolError,
    /// The terminal status line was something other than `OK`.
    NotOk,
    /// The payload held fewer tokens than the requested index.
    TokenNotFound,
}

/// Drives AT exchanges over one modem link. Holds no protocol state between
/// calls; each command is flush, send, then a fixed sequence of bounded
/// line waits.
pub struct AtSession<'a> {
    reader: LineReader<'a>,
    writer: LineWriter<'a>,
    config: Config,
}

impl<'a> AtSession<'a> {
    pub fn new(channel: &'a ModemChannel, config: Config) -> Self {
        let (reader, writer) = channel.split();
        Self {
            reader,
            writer,
            config,
        }
    }

    /// Sleep-poll until a complete line is buffered. Returns `false` once
    /// the poll budget is spent, so the total wait is bounded by
    /// `poll_interval * poll_budget`.
    pub async fn wait_for_message(&mut self) -> bool {
        let mut budget = self.config.poll_budget;
        while self.reader.pending() == 0 {
            if budget == 0 {
                return false;
            }
            Timer::after(self.config.poll_interval).await;
            budget -= 1;
        }
        true
    }

    /// Send a command expecting only its echo and a terminal `OK`.
    pub async fn send_command(&mut self, cmd: &str) -> Result<(), CommandError> {
        self.start_exchange(cmd);
        self.verify_echo(cmd).await?;
        self.verify_ok().await
    }

    /// Send a command expecting one payload line between the echo and the
    /// terminal status, separated from the status by a blank line.
    pub async fn send_command_with_response(
        &mut self,
        cmd: &str,
    ) -> Result<String<MAX_LINE_LEN>, CommandError> {
        self.start_exchange(cmd);
        self.verify_echo(cmd).await?;

        let mut line = [0u8; MAX_LINE_LEN];
        let len = self.expect_line(&mut line).await?;
        let payload = to_string(&line[..len])?;

        let len = self.expect_line(&mut line).await?;
        if len != 0 {
            // firmware skipped the blank separator; don't guess at a
            // more lenient parse
            return Err(CommandError::ProtocolError);
        }

        self.verify_ok().await?;
        Ok(payload)
    }

    /// As [`Self::send_command_with_response`], but returns the 1-based
    /// `index`-th token of the payload instead of the whole line.
    pub async fn send_command_with_indexed_response(
        &mut self,
        cmd: &str,
        index: usize,
    ) -> Result<String<MAX_LINE_LEN>, CommandError> {
        let payload = self.send_command_with_response(cmd).await?;
        nth_token(&payload, index)
    }

    fn start_exchange(&mut self, cmd: &str) {
        self.reader.flush();
        debug!("modem <- {}", cmd);
        self.writer.write_line(cmd);
    }

    /// One bounded wait plus one line read.
    async fn expect_line(&mut self, buf: &mut [u8]) -> Result<usize, CommandError> {
        if !self.wait_for_message().await {
            return Err(CommandError::Timeout);
        }
        let len = self.reader.read_line(buf);
        trace!(
            "modem -> {}",
            core::str::from_utf8(&buf[..len]).unwrap_or("<non-ascii>")
        );
        Ok(len)
    }

    async fn verify_echo(&mut self, cmd: &str) -> Result<(), CommandError> {
        let mut line = [0u8; MAX_LINE_LEN];
        let len = self.expect_line(&mut line).await?;
        if len < MIN_ECHO_LEN || line[..len] != *cmd.as_bytes() {
            warn!("echo mismatch for {}", cmd);
            return Err(CommandError::EchoMismatch);
        }
        Ok(())
    }

    async fn verify_ok(&mut self) -> Result<(), CommandError> {
        let mut line = [0u8; MAX_LINE_LEN];
        let len = self.expect_line(&mut line).await?;
        if line[..len] != *STATUS_OK {
            return Err(CommandError::NotOk);
        }
        Ok(())
    }
}

/// 1-based token lookup, `strtok` style: runs of delimiters collapse and
/// never yield empty tokens.
fn nth_token(payload: &str, index: usize) -> Result<String<MAX_LINE_LEN>, CommandError> {
    if index == 0 {
        return Err(CommandError::TokenNotFound);
    }
    let token = payload
        .split(TOKEN_DELIMITERS)
        .filter(|t| !t.is_empty())
        .nth(index - 1)
        .ok_or(CommandError::TokenNotFound)?;
    to_string(token.as_bytes())
}

fn to_string(bytes: &[u8]) -> Result<String<MAX_LINE_LEN>, CommandError> {
    let text = core::str::from_utf8(bytes).map_err(|_| CommandError::ProtocolError)?;
    let mut out = String::new();
    out.push_str(text).map_err(|_| CommandError::ProtocolError)?;
    Ok(out)
}
