//! Dispatcher task
//!
//! Owns the transport, the stream parser and the command queue, and is the
//! only code that touches them. Callers talk to it through a
//! [`DispatcherHandle`].

use std::future;

use gt521_core::StreamParser;
use gt521_transport::Transport;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::queue::{CommandQueue, CommandRequest, Completion, Reply, Transmission};

const REQUEST_CHANNEL_CAPACITY: usize = 32;

struct Request {
    request: CommandRequest,
    completion: Completion,
}

pub struct Dispatcher {
    transport: Box<dyn Transport>,
    parser: StreamParser,
    queue: CommandQueue,
}

impl Dispatcher {
    /// Start a dispatcher over an already open transport
    pub fn spawn(transport: Box<dyn Transport>) -> DispatcherHandle {
        let (requests, rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let dispatcher = Self {
            transport,
            parser: StreamParser::new(),
            queue: CommandQueue::new(),
        };

        DispatcherHandle {
            requests,
            task: tokio::spawn(dispatcher.run(rx)),
        }
    }

    async fn run(mut self, mut requests: mpsc::Receiver<Request>) -> Box<dyn Transport> {
        debug!("Dispatcher started on {}", self.transport.port_name());

        loop {
            let deadline = self.queue.next_deadline();

            tokio::select! {
                request = requests.recv() => match request {
                    Some(request) => self.on_request(request).await,
                    None => break,
                },
                chunk = self.transport.receive() => match chunk {
                    Ok(chunk) => self.on_chunk(&chunk).await,
                    Err(err) => {
                        warn!("Receive failed: {}", err);
                        self.queue.close(|| gt521_transport::Error::ConnectionClosed.into());
                        break;
                    }
                },
                () = sleep_until(deadline) => {
                    let next = self.queue.expire(Instant::now());
                    self.transmit(next).await;
                }
            }
        }

        self.discard_residue("dispatcher stopping");
        self.queue.close(|| Error::NotOpen);
        debug!("Dispatcher stopped");

        self.transport
    }

    async fn on_request(&mut self, Request { request, completion }: Request) {
        let next = self.queue.enqueue(request, completion);
        self.transmit(next).await;
    }

    async fn on_chunk(&mut self, chunk: &[u8]) {
        let data_len = self.queue.expected_data_len();
        let mut packets = self.parser.feed(chunk, data_len).into_iter();

        while let Some(packet) = packets.next() {
            trace!("Frame received: {}", packet);

            let next = self.queue.dispatch(packet);
            if let Some(baud_rate) = self.queue.take_reconfigure() {
                self.reconfigure(baud_rate).await;
            }
            if next.is_some() {
                // The line is flushed before the next write
                let stale = packets.len();
                if stale > 0 {
                    debug!(stale, "Dropping frames received ahead of the next command");
                }
                self.transmit(next).await;
                return;
            }
        }
    }

    /// Write the frame for each new head until one goes out
    async fn transmit(&mut self, mut next: Option<Transmission>) {
        while let Some(transmission) = next.take() {
            self.discard_residue("new transmission");

            match self.write(&transmission).await {
                Ok(()) => trace!(id = transmission.id, "Sent {}", transmission.command),
                Err(err) => {
                    warn!(id = transmission.id, "Sending {} failed: {}", transmission.command, err);
                    next = self.queue.fail_head(err.into());
                }
            }
        }
    }

    /// Follow the device to a new line speed
    ///
    /// The command that asked for it has already succeeded, so a failure
    /// here only shows up as errors on later commands.
    async fn reconfigure(&mut self, baud_rate: u32) {
        match self.transport.reconfigure(baud_rate).await {
            Ok(()) => debug!(baud_rate, "Transport reconfigured"),
            Err(err) => warn!(baud_rate, "Reconfiguring transport failed: {}", err),
        }
    }

    async fn write(&mut self, transmission: &Transmission) -> gt521_transport::Result<()> {
        self.transport.flush().await?;
        self.transport.send(&transmission.frame).await
    }

    fn discard_residue(&mut self, reason: &str) {
        let residue = self.parser.flush();
        if !residue.is_empty() {
            warn!(
                reason,
                "Discarding {} unparsed bytes: {:02X?}",
                residue.len(),
                &residue[..residue.len().min(32)]
            );
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

/// Caller side of a running dispatcher
pub struct DispatcherHandle {
    requests: mpsc::Sender<Request>,
    task: JoinHandle<Box<dyn Transport>>,
}

impl DispatcherHandle {
    /// Queue a command and wait for it to terminate
    pub async fn execute(&self, request: CommandRequest) -> Result<Reply> {
        let (completion, outcome) = oneshot::channel();
        self.requests
            .send(Request {
                request,
                completion,
            })
            .await
            .map_err(|_| Error::NotOpen)?;

        outcome.await.map_err(|_| Error::NotOpen)?
    }

    /// False once the task has stopped, e.g. after the link dropped
    pub fn is_running(&self) -> bool {
        !self.requests.is_closed()
    }

    /// Stop the task and take back the transport
    pub async fn shutdown(self) -> Result<Box<dyn Transport>> {
        drop(self.requests);
        Ok(self.task.await?)
    }
}
