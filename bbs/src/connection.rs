use crate::io::FrameTransport;
use crate::packets::{self, EcrMessage, ItuMessage};
use crate::pending::{Promise, PromiseHandle};
use crate::session::{Session, TerminalError};
use crate::Error;
use bbs_builder::{BbsSerialize, Price};
use chrono::Local;
use log::{debug, error, warn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// One queued outbound message.
///
/// The item is owned by the send worker until its bytes are on the wire,
/// then either parked on the response FIFO (requests) or completed on the
/// spot (responses).
struct SendItem {
    data: Vec<u8>,
    expects_response: bool,
    promise: Promise<Option<ItuMessage>>,
}

/// The send FIFO. A `None` sentinel unblocks the worker at shutdown.
type SendQueue = mpsc::UnboundedReceiver<Option<SendItem>>;

struct Workers {
    send: JoinHandle<SendQueue>,
    receive: JoinHandle<()>,
}

/// The future of an outstanding request.
pub struct Reply {
    inner: PromiseHandle<Option<ItuMessage>>,
}

impl Reply {
    /// Waits for the terminal's answer.
    pub async fn wait(&self) -> Result<ItuMessage, Error> {
        match self.inner.wait().await? {
            Some(message) => Ok(message),
            // Response items complete without a payload; a request always
            // carries one.
            None => Err(Error::ResponseInterrupted),
        }
    }
}

/// A live MsgRouter connection.
///
/// Owns the port and the two workers. Requests are answered strictly in
/// order: the protocol has no correlation id, so the response FIFO holds
/// the requests in the exact order their bytes hit the port.
pub struct Connection {
    send_tx: mpsc::UnboundedSender<Option<SendItem>>,
    response_fifo: Mutex<VecDeque<Promise<Option<ItuMessage>>>>,
    current_session: Mutex<Option<Arc<dyn Session>>>,
    is_shutdown: AtomicBool,
    shutdown_lock: tokio::sync::Mutex<()>,
    shutdown_tx: watch::Sender<bool>,
    workers: Mutex<Option<Workers>>,
}

impl Connection {
    pub fn new<S>(port: S) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(port);
        let (send_tx, send_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let connection = Arc::new(Connection {
            send_tx,
            response_fifo: Mutex::new(VecDeque::new()),
            current_session: Mutex::new(None),
            is_shutdown: AtomicBool::new(false),
            shutdown_lock: tokio::sync::Mutex::new(()),
            shutdown_tx,
            workers: Mutex::new(None),
        });

        let send = tokio::spawn(send_loop(
            connection.clone(),
            FrameTransport { source: write_half },
            send_rx,
            shutdown_rx.clone(),
        ));
        let receive = tokio::spawn(receive_loop(
            connection.clone(),
            FrameTransport { source: read_half },
            shutdown_rx,
        ));
        *connection.workers.lock().unwrap() = Some(Workers { send, receive });
        connection
    }

    /// Binds `session` as the connection's current session.
    ///
    /// The previous session stays bound while it unbinds: a payment session
    /// may still need the terminal's local mode message to finish its
    /// cancel handshake.
    pub async fn set_current_session(&self, session: Option<Arc<dyn Session>>) {
        let previous = self.current_session.lock().unwrap().clone();
        if let Some(previous) = previous {
            previous.unbind().await;
        }
        *self.current_session.lock().unwrap() = session;
    }

    /// Sends a message and returns the future of its response.
    pub fn request(&self, message: EcrMessage) -> Result<Reply, Error> {
        Ok(Reply {
            inner: self.submit(&message, true)?,
        })
    }

    /// Starts a payment bank mode session. Maps to a single H51 request.
    ///
    /// Should only be called by the current session.
    pub fn request_transfer_amount(&self, amount: Price) -> Result<Reply, Error> {
        let message = packets::TransferAmount {
            timestamp: Local::now().naive_local(),
            id_no: String::new(),
            seq_no: "0000".to_string(),
            operator_id: "0000".to_string(),
            mode: (),
            transfer_type: packets::TransferType::EftAuthorisation,
            amount,
            unused_type: (),
            cashback_amount: Price::ZERO,
            top_up: false,
            art_amount: Price::ZERO,
        };
        self.request(EcrMessage::TransferAmount(message))
    }

    /// Asks the ITU to abandon the running transaction. Maps to a single
    /// H53 request; the local mode message decides whether the cancel won.
    pub fn request_cancel(&self) -> Result<Reply, Error> {
        self.request_administration(packets::AdminCode::Cancel)
    }

    /// Asks the ITU to reverse the most recent payment. Maps to a single
    /// H53 request.
    pub fn request_reversal(&self) -> Result<Reply, Error> {
        self.request_administration(packets::AdminCode::Reverse)
    }

    /// Requests that the ITU exit bank mode.
    ///
    /// The reference protocol notes leave this operation open; it is not
    /// implemented.
    pub fn request_abort(&self) -> Result<Reply, Error> {
        Err(Error::NotImplemented)
    }

    fn request_administration(&self, adm_code: packets::AdminCode) -> Result<Reply, Error> {
        let message = packets::Administration {
            timestamp: Local::now().naive_local(),
            id_no: String::new(),
            seq_no: "0000".to_string(),
            operator_id: "0000".to_string(),
            adm_code,
            fs: (),
        };
        self.request(EcrMessage::Administration(message))
    }

    /// Answers a request from the ITU. Fire and forget; ordering is
    /// preserved by the send FIFO.
    fn respond(&self, message: EcrMessage) {
        if let Err(err) = self.submit(&message, false) {
            debug!("dropping response: {err}");
        }
    }

    fn submit(
        &self,
        message: &EcrMessage,
        expects_response: bool,
    ) -> Result<PromiseHandle<Option<ItuMessage>>, Error> {
        if self.is_shutdown.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        let data = message.to_bytes()?;
        let promise = Promise::new();
        let handle = promise.handle();
        self.send_tx
            .send(Some(SendItem {
                data,
                expects_response,
                promise,
            }))
            .map_err(|_| Error::ConnectionClosed)?;
        Ok(handle)
    }

    /// Closes the connection and cancels all pending items.
    ///
    /// Safe to call from several tasks and more than once; later callers
    /// wait for the first teardown to finish and return.
    pub async fn shutdown(&self) {
        let _guard = self.shutdown_lock.lock().await;
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("shutting down");
        // The send worker blocks on an empty queue; the sentinel wakes it.
        let _ = self.send_tx.send(None);
        // Interrupt both workers mid I/O.
        let _ = self.shutdown_tx.send(true);

        let workers = self.workers.lock().unwrap().take();
        if let Some(workers) = workers {
            match workers.send.await {
                Ok(mut queue) => {
                    // Items enqueued after the worker exited.
                    while let Ok(item) = queue.try_recv() {
                        if let Some(item) = item {
                            item.promise.cancel();
                        }
                    }
                }
                Err(err) => error!("send worker panicked: {err}"),
            }
            if let Err(err) = workers.receive.await {
                error!("receive worker panicked: {err}");
            }
        }

        // Requests whose bytes hit the wire will never see their response.
        let interrupted: Vec<_> = self.response_fifo.lock().unwrap().drain(..).collect();
        for request in interrupted {
            request.fail(Error::ResponseInterrupted);
        }

        // Break the session<->connection cycle; a still unresolved
        // transaction future fails instead of dangling.
        let session = self.current_session.lock().unwrap().take();
        if let Some(session) = session {
            session.on_connection_closed(Error::ConnectionClosed);
        }
        debug!("successfully shut down");
    }

    fn shutdown_async(self: &Arc<Self>) {
        let connection = Arc::clone(self);
        tokio::spawn(async move { connection.shutdown().await });
    }

    /// Routes a non-response message to the current session.
    ///
    /// Returns false on a fatal handler error.
    fn dispatch_request(&self, message: &ItuMessage) -> bool {
        let session = self.current_session.lock().unwrap().clone();
        let Some(session) = session else {
            warn!("request from the terminal with no bound session");
            self.respond(EcrMessage::Response(packets::Response::failure()));
            return true;
        };
        let result = match message {
            ItuMessage::DisplayText(msg) => {
                session.on_req_display_text(&msg.text, msg.prompt_customer, msg.expects_input)
            }
            ItuMessage::PrintText(msg) => session.on_req_print_text(&msg.commands),
            ItuMessage::ResetTimer(msg) => session.on_req_reset_timer(msg.seconds),
            ItuMessage::LocalMode(msg) => session.on_req_local_mode(msg),
            ItuMessage::KeyboardInputRequest(msg) => session.on_req_keyboard_input(msg),
            ItuMessage::SendData(msg) => session.on_req_send_data(msg),
            ItuMessage::DeviceAttributeRequest(msg) => session.on_req_device_attr(msg),
            ItuMessage::Status(_) | ItuMessage::Response(_) | ItuMessage::KeyboardInput(_) => {
                return true
            }
        };
        match result {
            Ok(Some(response)) => {
                self.respond(response);
                true
            }
            Ok(None) => {
                self.respond(EcrMessage::Response(packets::Response::success()));
                true
            }
            Err(err) if err.is::<TerminalError>() => {
                warn!("error handling message from terminal: {err}");
                self.respond(EcrMessage::Response(packets::Response::failure()));
                true
            }
            Err(err) => {
                error!("critical error while handling message: {err}");
                false
            }
        }
    }
}

/// Worker responsible for output to the card reader.
///
/// Requests enter the response FIFO in the exact order their bytes hit the
/// port, matching the terminal's strictly ordered reply semantics. Returns
/// its queue so shutdown can drain late arrivals.
async fn send_loop<S>(
    connection: Arc<Connection>,
    mut port: FrameTransport<WriteHalf<S>>,
    mut queue: SendQueue,
    mut shutdown: watch::Receiver<bool>,
) -> SendQueue
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    loop {
        let Some(Some(item)) = queue.recv().await else {
            // Shutdown sentinel, or every sender is gone.
            break;
        };
        if !item.promise.claim() {
            // Cancelled while still queued.
            continue;
        }
        tokio::select! {
            result = port.write_frame(&item.data) => match result {
                Ok(()) => {
                    if item.expects_response {
                        connection
                            .response_fifo
                            .lock()
                            .unwrap()
                            .push_back(item.promise);
                    } else {
                        item.promise.complete(None);
                    }
                }
                Err(err) => {
                    if !connection.is_shutdown.load(Ordering::SeqCst) {
                        error!("error sending data: {err}");
                        connection.shutdown_async();
                    }
                    item.promise.fail(err);
                    break;
                }
            },
            _ = shutdown.changed() => {
                // The frame may be half written; the port is going away.
                item.promise.fail(Error::ResponseInterrupted);
                break;
            }
        }
    }
    while let Ok(item) = queue.try_recv() {
        if let Some(item) = item {
            item.promise.cancel();
        }
    }
    queue
}

/// Worker responsible for input from the card reader.
///
/// Reads frames one at a time and either links them to an outstanding
/// request or dispatches them to the current session.
async fn receive_loop<S>(
    connection: Arc<Connection>,
    mut port: FrameTransport<ReadHalf<S>>,
    mut shutdown: watch::Receiver<bool>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    loop {
        let frame = tokio::select! {
            result = port.read_frame() => match result {
                Ok(frame) => frame,
                Err(err) => {
                    if !connection.is_shutdown.load(Ordering::SeqCst) {
                        error!("error receiving data: {err}");
                        connection.shutdown_async();
                    }
                    return;
                }
            },
            _ = shutdown.changed() => return,
        };
        let message = match ItuMessage::from_bytes(&frame) {
            Ok(message) => message,
            Err(err) => {
                // Framing is intact, so the connection survives; the
                // terminal gets a failure response.
                warn!("undecodable message from terminal: {err}");
                connection.respond(EcrMessage::Response(packets::Response::failure()));
                continue;
            }
        };
        if message.is_response() {
            let request = connection.response_fifo.lock().unwrap().pop_front();
            match request {
                Some(request) => {
                    request.complete(Some(message));
                }
                None => {
                    error!("response has no corresponding request");
                    connection.shutdown_async();
                    return;
                }
            }
        } else if !connection.dispatch_request(&message) {
            connection.shutdown_async();
            return;
        }
    }
}
