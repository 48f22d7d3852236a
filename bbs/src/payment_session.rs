use crate::connection::Connection;
use crate::packets::{EcrMessage, ItuMessage, LocalMode, TransactionResult};
use crate::pending::Promise;
use crate::session::Session;
use crate::Error;
use anyhow::Result;
use async_trait::async_trait;
use bbs_builder::{Price, PrintCommand};
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The result record of an authorised transaction.
///
/// Everything but the amount comes from the terminal's local mode message
/// and may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub amount: Price,
    pub card_pan: Option<String>,
    pub card_end_date: Option<String>,
    pub provider_scheme: Option<String>,
    pub provider_auth_code: Option<String>,
}

/// Host callbacks of a payment session.
///
/// All methods run on the connection's receive worker and must not call
/// back into the session or block on connection traffic.
pub trait PaymentEvents: Send + Sync {
    /// Called after the terminal authorised the transaction but before it
    /// is committed. Returning false rolls the transaction back.
    fn before_commit(&self, payment: &Payment) -> bool {
        let _ = payment;
        true
    }

    fn on_display(&self, text: &str, prompt_customer: bool, expects_input: bool) {
        let _ = (text, prompt_customer, expects_input);
    }

    fn on_print(&self, commands: &[PrintCommand]) {
        let _ = commands;
    }
}

impl PaymentEvents for () {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentState {
    /// Awaiting the terminal's authorisation.
    Running,

    /// The host asked for a cancel; the local mode message decides whether
    /// the cancel won the race.
    Cancelling,

    /// A reversal is in flight after a lost race or a refused commit.
    Reversing,

    Finished,

    /// The reversal itself failed; the payment may remain posted and needs
    /// operator intervention.
    Broken,
}

/// One payment transaction on a BBS MsgRouter terminal.
pub struct BbsPaymentSession {
    connection: Arc<Connection>,
    amount: Price,
    events: Arc<dyn PaymentEvents>,
    state: Mutex<PaymentState>,
    outcome: Promise<Payment>,
}

impl BbsPaymentSession {
    pub(crate) async fn start(
        connection: Arc<Connection>,
        amount: Price,
        events: Arc<dyn PaymentEvents>,
    ) -> Result<Arc<Self>, Error> {
        let session = Arc::new(BbsPaymentSession {
            connection: connection.clone(),
            amount,
            events,
            state: Mutex::new(PaymentState::Running),
            outcome: Promise::new(),
        });
        connection
            .set_current_session(Some(session.clone()))
            .await;
        let reply = connection.request_transfer_amount(amount)?.wait().await?;
        if let ItuMessage::Response(response) = &reply {
            if !response.code.is_success() {
                warn!(
                    "terminal rejected the transfer amount request: {:?}",
                    response.code
                );
            }
        }
        Ok(session)
    }

    pub fn amount(&self) -> Price {
        self.amount
    }

    pub fn state(&self) -> PaymentState {
        *self.state.lock().unwrap()
    }

    /// Waits for the transaction outcome.
    ///
    /// Timing out only abandons the wait; the transaction itself keeps
    /// going.
    pub async fn result(&self, timeout: Option<Duration>) -> Result<Payment, Error> {
        let outcome = self.outcome.handle();
        match timeout {
            None => outcome.wait().await,
            Some(timeout) => tokio::time::timeout(timeout, outcome.wait())
                .await
                .map_err(|_| Error::Timeout)?,
        }
    }

    /// Tries to cancel the payment and blocks until the session reaches a
    /// terminal state.
    ///
    /// Returns Ok if the session ended cancelled, [Error::SessionCompleted]
    /// if it had already finished, and [Error::CancelFailed] for every other
    /// outcome.
    pub async fn cancel(&self) -> Result<(), Error> {
        {
            let mut state = self.state.lock().unwrap();
            match *state {
                PaymentState::Running => {
                    *state = PaymentState::Cancelling;
                    // Fire and forget; the next local mode message decides
                    // the race.
                    if let Err(err) = self.connection.request_cancel() {
                        warn!("could not request a cancel: {err}");
                    }
                }
                PaymentState::Cancelling | PaymentState::Reversing => {}
                PaymentState::Finished | PaymentState::Broken => {
                    return Err(Error::SessionCompleted)
                }
            }
        }
        match self.outcome.handle().wait().await {
            Err(Error::SessionCancelled { .. }) => Ok(()),
            Ok(_) | Err(_) => Err(Error::CancelFailed),
        }
    }

    fn payment_from(&self, message: &LocalMode) -> Payment {
        // On-line transactions carry the STAN in the first six bytes of
        // stan_auth and the authorisation code in the last six; offline
        // transactions pad the code with blanks, which the codec trims.
        let auth_code = if message.stan_auth.len() == 12 {
            Some(message.stan_auth[6..].to_string())
        } else {
            None
        };
        Payment {
            amount: self.amount,
            card_pan: message.pan.clone(),
            card_end_date: None,
            provider_scheme: None,
            provider_auth_code: auth_code,
        }
    }

    fn handle_local_mode(&self, message: &LocalMode) -> Result<()> {
        let mut outcome: Option<Result<Payment, Error>> = None;
        let mut start_reversal = false;
        {
            let mut state = self.state.lock().unwrap();
            let success = message.result == TransactionResult::Success;
            match *state {
                PaymentState::Running => {
                    if success {
                        let payment = self.payment_from(message);
                        if self.events.before_commit(&payment) {
                            *state = PaymentState::Finished;
                            outcome = Some(Ok(payment));
                        } else {
                            *state = PaymentState::Reversing;
                            start_reversal = true;
                        }
                    } else {
                        *state = PaymentState::Finished;
                        outcome = Some(Err(Error::SessionCancelled {
                            reason: Some("itu error"),
                        }));
                    }
                }
                PaymentState::Cancelling => {
                    if success {
                        // The cancel lost the race; the terminal already
                        // authorised, so undo it.
                        *state = PaymentState::Reversing;
                        start_reversal = true;
                    } else {
                        *state = PaymentState::Finished;
                        outcome = Some(Err(Error::SessionCancelled { reason: None }));
                    }
                }
                PaymentState::Reversing => {
                    if success {
                        *state = PaymentState::Finished;
                        outcome = Some(Err(Error::SessionCancelled { reason: None }));
                    } else {
                        *state = PaymentState::Broken;
                        outcome = Some(Err(Error::CancelFailed));
                    }
                }
                PaymentState::Finished | PaymentState::Broken => {
                    anyhow::bail!("local mode message in state {:?}", *state);
                }
            }
        }
        if start_reversal {
            // Enqueued, never awaited: the response would arrive on the
            // worker running this handler.
            if let Err(err) = self.connection.request_reversal() {
                warn!("could not request a reversal: {err}");
                *self.state.lock().unwrap() = PaymentState::Broken;
                outcome = Some(Err(Error::CancelFailed));
            }
        }
        match outcome {
            Some(Ok(payment)) => {
                self.outcome.complete(payment);
            }
            Some(Err(err)) => {
                self.outcome.fail(err);
            }
            None => {}
        }
        Ok(())
    }
}

#[async_trait]
impl Session for BbsPaymentSession {
    fn on_req_display_text(
        &self,
        text: &str,
        prompt_customer: bool,
        expects_input: bool,
    ) -> Result<Option<EcrMessage>> {
        self.events.on_display(text, prompt_customer, expects_input);
        Ok(None)
    }

    fn on_req_print_text(&self, commands: &[PrintCommand]) -> Result<Option<EcrMessage>> {
        self.events.on_print(commands);
        Ok(None)
    }

    fn on_req_local_mode(&self, message: &LocalMode) -> Result<Option<EcrMessage>> {
        self.handle_local_mode(message)?;
        Ok(None)
    }

    async fn unbind(&self) {
        match self.cancel().await {
            Ok(()) | Err(Error::SessionCompleted) => {}
            Err(err) => warn!("could not cancel the replaced session: {err}"),
        }
    }

    fn on_connection_closed(&self, err: Error) {
        {
            let mut state = self.state.lock().unwrap();
            if matches!(*state, PaymentState::Finished | PaymentState::Broken) {
                return;
            }
            *state = PaymentState::Broken;
        }
        self.outcome.fail(err);
    }
}
