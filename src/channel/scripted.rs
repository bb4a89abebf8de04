//! Scripted channel: replays a canned transcript for tests.
//!
//! Command order within a session is deterministic, so a plain queue of
//! read events is enough to script a whole device conversation; the
//! channel does not need to react to writes. Cloning shares state, which
//! lets a test keep a handle while the session owns the boxed channel.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::Channel;
use crate::error::{ChannelError, Result};

/// One scripted read event.
#[derive(Debug, Clone)]
pub enum ScriptRead {
    /// Deliver these bytes.
    Data(Vec<u8>),
    /// Deliver nothing (a quiet poll).
    Quiet,
    /// Fail the read with a channel fault.
    Fault,
}

#[derive(Debug, Default)]
struct ScriptState {
    reads: VecDeque<ScriptRead>,
    written: Vec<u8>,
    closed: bool,
}

/// A [`Channel`] implementation driven by a scripted read queue.
///
/// Each `read_available` call consumes one queued event; once the queue
/// is exhausted every further read is quiet, which is how a test makes a
/// command time out.
#[derive(Debug, Clone, Default)]
pub struct ScriptedChannel {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedChannel {
    /// Create a channel with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue bytes to be delivered by the next read.
    pub fn queue_data(&self, data: impl AsRef<[u8]>) {
        self.lock()
            .reads
            .push_back(ScriptRead::Data(data.as_ref().to_vec()));
    }

    /// Queue `count` quiet polls.
    pub fn queue_quiet(&self, count: usize) {
        let mut state = self.lock();
        for _ in 0..count {
            state.reads.push_back(ScriptRead::Quiet);
        }
    }

    /// Queue a channel fault.
    pub fn queue_fault(&self) {
        self.lock().reads.push_back(ScriptRead::Fault);
    }

    /// Everything written to the channel so far.
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Everything written, as a string.
    pub fn written_str(&self) -> String {
        String::from_utf8_lossy(&self.written()).into_owned()
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[async_trait]
impl Channel for ScriptedChannel {
    async fn read_available(&mut self, max: usize) -> Result<Vec<u8>> {
        let event = {
            let mut state = self.lock();
            if state.closed {
                return Err(ChannelError::Closed.into());
            }
            state.reads.pop_front()
        };
        match event {
            Some(ScriptRead::Data(mut data)) => {
                data.truncate(max);
                Ok(data)
            }
            Some(ScriptRead::Quiet) | None => Ok(Vec::new()),
            Some(ScriptRead::Fault) => Err(ChannelError::Closed.into()),
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(ChannelError::Closed.into());
        }
        state.written.extend_from_slice(data);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.lock().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_queued_events_in_order() {
        let script = ScriptedChannel::new();
        script.queue_data(b"banner\r\nswitch01>");
        script.queue_quiet(1);
        script.queue_data(b"more");

        let mut channel = script.clone();
        assert_eq!(
            channel.read_available(65_535).await.unwrap(),
            b"banner\r\nswitch01>"
        );
        assert!(channel.read_available(65_535).await.unwrap().is_empty());
        assert_eq!(channel.read_available(65_535).await.unwrap(), b"more");
        // Exhausted scripts stay quiet.
        assert!(channel.read_available(65_535).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fault_surfaces_as_channel_error() {
        let script = ScriptedChannel::new();
        script.queue_fault();

        let mut channel = script.clone();
        assert!(channel.read_available(65_535).await.is_err());
    }

    #[tokio::test]
    async fn writes_are_captured_and_close_sticks() {
        let script = ScriptedChannel::new();
        let mut channel = script.clone();

        channel.write(b"terminal length 0\n").await.unwrap();
        channel.close().await.unwrap();

        assert_eq!(script.written_str(), "terminal length 0\n");
        assert!(script.is_closed());
        assert!(channel.write(b"more").await.is_err());
    }
}
