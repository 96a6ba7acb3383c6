//! The outbound event stream of one request.
//!
//! An [`Emitter`] is owned by the task that handles the request. The HTTP
//! layer only sees the [`ResponseStart`] it receives once the task
//! commits to a response: either a structured error, or a stream of
//! events.

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::error::Error;
use crate::event::StreamEvent;

const EVENT_BUFFER: usize = 16;

/// The head of a response, decided by the request task.
#[derive(Debug)]
pub enum ResponseStart {
    /// An event stream, events arrive on the receiver. The stream ends
    /// when the sender is dropped.
    Stream(mpsc::Receiver<StreamEvent>),
    /// A plain JSON error response.
    Error {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: ErrorBody,
    },
}

/// Body of a structured error response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// A short summary.
    pub message: String,
    /// The detailed cause.
    pub error: String,
}

impl ErrorBody {
    /// Creates a new error body.
    #[inline]
    pub fn new(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error: error.into(),
        }
    }
}

/// The phase of a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Nothing has been committed yet.
    NotStarted,
    /// The event stream headers have been committed.
    StreamOpen,
    /// The response is complete, nothing more can be written.
    Terminated,
}

/// The write side of a response.
///
/// The phase only moves forward, and termination is idempotent: once a
/// terminal event or a structured error has been produced, every further
/// write is dropped.
#[derive(Debug)]
pub struct Emitter {
    phase: Phase,
    head_tx: Option<oneshot::Sender<ResponseStart>>,
    event_tx: Option<mpsc::Sender<StreamEvent>>,
}

impl Emitter {
    /// Creates an emitter and the receiver for its response head.
    pub fn new() -> (Self, oneshot::Receiver<ResponseStart>) {
        let (head_tx, head_rx) = oneshot::channel();
        let emitter = Self {
            phase: Phase::NotStarted,
            head_tx: Some(head_tx),
            event_tx: None,
        };
        (emitter, head_rx)
    }

    /// Returns the current phase.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Commits to an event stream. Does nothing if already open.
    pub fn open(&mut self) -> Result<(), Error> {
        match self.phase {
            Phase::NotStarted => {}
            Phase::StreamOpen => return Ok(()),
            Phase::Terminated => return Err(Error::disconnected()),
        }
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let head_tx = self.head_tx.take();
        let sent = head_tx
            .map(|tx| tx.send(ResponseStart::Stream(event_rx)).is_ok())
            .unwrap_or(false);
        if !sent {
            self.phase = Phase::Terminated;
            return Err(Error::disconnected());
        }
        trace!("event stream opened");
        self.event_tx = Some(event_tx);
        self.phase = Phase::StreamOpen;
        Ok(())
    }

    /// Writes one event, opening the stream first if needed.
    ///
    /// A terminal event also ends the stream. Writes after termination
    /// are dropped. Fails only when the client has gone away, which ends
    /// the stream as well.
    pub async fn emit(&mut self, event: StreamEvent) -> Result<(), Error> {
        if self.phase == Phase::Terminated {
            debug!("dropping event after termination: {event:?}");
            return Ok(());
        }
        self.open()?;
        trace!("emitting {event:?}");
        let terminal = event.is_terminal();
        let Some(event_tx) = &self.event_tx else {
            return Err(Error::disconnected());
        };
        if event_tx.send(event).await.is_err() {
            debug!("client disconnected");
            self.end();
            return Err(Error::disconnected());
        }
        if terminal {
            self.end();
        }
        Ok(())
    }

    /// Answers with a structured error instead of a stream.
    ///
    /// Only possible before anything was committed, returns whether the
    /// error was sent.
    pub fn reject(&mut self, status: u16, body: ErrorBody) -> bool {
        if self.phase != Phase::NotStarted {
            return false;
        }
        self.phase = Phase::Terminated;
        self.head_tx
            .take()
            .map(|tx| tx.send(ResponseStart::Error { status, body }).is_ok())
            .unwrap_or(false)
    }

    /// Reports a failure the way the current phase allows: a structured
    /// error before the stream is open, a terminal event after.
    pub async fn fail(
        &mut self,
        status: u16,
        body: ErrorBody,
        event: StreamEvent,
    ) {
        match self.phase {
            Phase::NotStarted => {
                self.reject(status, body);
            }
            Phase::StreamOpen => {
                // The client may be gone already, nothing left to report to.
                self.emit(event).await.ok();
            }
            Phase::Terminated => {}
        }
    }

    /// Ends the response. Safe to call any number of times.
    pub fn end(&mut self) {
        if self.phase == Phase::Terminated {
            return;
        }
        self.phase = Phase::Terminated;
        self.event_tx = None;
        self.head_tx = None;
        trace!("response terminated");
    }
}

impl Drop for Emitter {
    fn drop(&mut self) {
        if self.phase != Phase::Terminated {
            warn!("emitter dropped in phase {:?}", self.phase);
        }
    }
}
