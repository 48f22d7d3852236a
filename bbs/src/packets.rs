use crate::{codec, Bbs, BbsEnum, BbsToken};
use bbs_builder::{BbsMessage, CodecError, CodecResult, Price, PrintCommand};
use chrono::NaiveDateTime;

/// Text for the operator or customer display. See the H41 message.
#[derive(Debug, Clone, PartialEq, Bbs)]
#[bbs_msg_type(0x41)]
pub struct DisplayText {
    #[bbs(codec = codec::Flag<0x31, 0x30>)]
    pub prompt_customer: bool,

    #[bbs(codec = codec::Flag<0x31, 0x30>)]
    pub expects_input: bool,

    #[bbs(constant = b"\x30")]
    pub mode: (),

    pub text: String,
}

impl DisplayText {
    pub fn new(text: impl Into<String>) -> Self {
        DisplayText {
            prompt_customer: true,
            expects_input: false,
            mode: (),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BbsToken)]
pub enum PrintMedia {
    #[bbs_token(b"\x20")]
    Receipt,

    #[bbs_token(b"\x21")]
    Journal,

    #[bbs_token(b"\x22")]
    Both,
}

/// Receipt or journal output for the host printer. See the H42 message.
///
/// The sub type and mode bytes only have one defined value each (formatted
/// commands, normal text).
#[derive(Debug, Clone, PartialEq, Bbs)]
#[bbs_msg_type(0x42)]
pub struct PrintText {
    #[bbs(constant = b"\x20")]
    pub sub_type: (),

    pub media: PrintMedia,

    #[bbs(constant = b"\x2a")]
    pub mode: (),

    #[bbs(codec = codec::Formatted)]
    pub commands: Vec<PrintCommand>,
}

/// Restarts the host side transaction watchdog. See the H43 message.
#[derive(Debug, Clone, PartialEq, Bbs)]
#[bbs_msg_type(0x43)]
pub struct ResetTimer {
    #[bbs(codec = codec::Int<3>)]
    pub seconds: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BbsToken)]
pub enum TransactionResult {
    /// Transaction OK.
    #[bbs_token(b"\x20")]
    Success,

    /// Transaction or operation rejected.
    #[bbs_token(b"\x21")]
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BbsToken)]
pub enum AccumulatorUpdate {
    /// Standard update of the accumulator.
    #[bbs_token(b"\x20")]
    Standard,

    /// The transaction was finalised as an offline transaction.
    #[bbs_token(b"\x22")]
    Offline,

    /// No update of the accumulator.
    #[bbs_token(b"\x30")]
    NoUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BbsToken)]
pub enum VerificationMethod {
    /// PIN based, also used for reversal transactions.
    #[bbs_token(b"\x30")]
    PinBased,

    #[bbs_token(b"\x31")]
    SignatureBased,

    /// No cardholder verification; only the amount was confirmed.
    #[bbs_token(b"\x32")]
    NotVerified,
}

/// End of a bank mode transaction, carrying the authorisation result. See
/// the H44 message.
///
/// The fixed header is followed by seven `;` terminated fields. For on-line
/// transactions `stan_auth` holds the system trace audit number in its
/// first six bytes and the authorisation code in the last six.
#[derive(Debug, Clone, PartialEq, Bbs)]
#[bbs_msg_type(0x44)]
pub struct LocalMode {
    pub result: TransactionResult,

    pub acc: AccumulatorUpdate,

    /// The card issuer, sent whenever the data is available.
    #[bbs(codec = codec::Int<2>)]
    pub issuer_id: u32,

    /// Primary account number, at most 19 digits. Not sent when parts of
    /// the card number are masked on the printout.
    #[bbs(codec = codec::OptDelimited<codec::BoundedText<19>>)]
    pub pan: Option<String>,

    /// Timestamp as received from the host in the response message.
    #[bbs(codec = codec::Delimited)]
    pub timestamp: NaiveDateTime,

    #[bbs(codec = codec::Delimited)]
    pub ver_method: VerificationMethod,

    /// Session number received from the host; uncertain for offline
    /// transactions, changed on reconciliation.
    #[bbs(codec = codec::Delimited<codec::Int<3>>)]
    pub session_num: u32,

    #[bbs(codec = codec::Delimited<codec::FixedText<12>>)]
    pub stan_auth: String,

    /// Customer number of a pre-auth transaction; referenced again by the
    /// adjustment transfer.
    #[bbs(codec = codec::Delimited<codec::Int<4>>)]
    pub seq_no: u32,

    /// Only used where a tip is added to the purchase amount on the ITU.
    #[bbs(codec = codec::OptDelimited)]
    pub tip: Option<Price>,
}

/// Asks the host to collect keyboard input. See the H46 message.
#[derive(Debug, Clone, PartialEq, Bbs)]
#[bbs_msg_type(0x46)]
pub struct KeyboardInputRequest {
    #[bbs(codec = codec::Flag<0x20, 0x21>)]
    pub echo: bool,

    #[bbs(codec = codec::FixedText<2>)]
    pub min_chars: String,

    #[bbs(codec = codec::FixedText<2>)]
    pub max_chars: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BbsToken)]
pub enum InputTerminator {
    #[bbs_token(b"0")]
    Enter,

    #[bbs_token(b"9")]
    Escape,
}

/// Keyboard input collected by the host. See the H55 message.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyboardInput {
    pub text: String,
    pub terminator: InputTerminator,
}

impl BbsMessage for KeyboardInput {
    const MSG_TYPE: u8 = 0x55;
}

/// The variadic `text` is followed by a fixed size terminator, so the codec
/// peels the trailing byte off before handing the middle to the text codec.
impl codec::Encoding<KeyboardInput> for codec::Default {
    fn encode(input: &KeyboardInput) -> CodecResult<Vec<u8>> {
        let mut output = vec![KeyboardInput::MSG_TYPE];
        output.extend(<codec::Default as codec::Encoding<String>>::encode(&input.text)?);
        output.extend(<codec::Default as codec::Encoding<InputTerminator>>::encode(
            &input.terminator,
        )?);
        Ok(output)
    }

    fn decode(bytes: &[u8]) -> CodecResult<(KeyboardInput, &[u8])> {
        match bytes.first() {
            None => return Err(CodecError::IncompleteData),
            Some(&b) if b == KeyboardInput::MSG_TYPE => {}
            Some(&b) => {
                return Err(CodecError::ConstantMismatch {
                    expected: vec![KeyboardInput::MSG_TYPE],
                    found: vec![b],
                })
            }
        }
        let body = &bytes[1..];
        let Some((tail, text)) = body.split_last() else {
            return Err(CodecError::IncompleteData);
        };
        let (text, _) = <codec::Default as codec::Encoding<String>>::decode(text)?;
        let (terminator, _) =
            <codec::Default as codec::Encoding<InputTerminator>>::decode(&[*tail])?;
        Ok((KeyboardInput { text, terminator }, &[]))
    }
}

/// Body of a [SendData] block, selected by the two byte function code.
#[derive(Debug, Clone, PartialEq)]
pub enum SendDataBody {
    /// Code `01`: header of a report transfer.
    ReportsHeader {
        site_number: String,
        session_number: String,
        timestamp: NaiveDateTime,
    },

    /// Code `02`: per issuer reconciliation amounts.
    ReconciliationAmounts {
        issuer_id: String,
        num_transactions: u32,
    },
}

impl SendDataBody {
    fn code(&self) -> &'static [u8; 2] {
        match self {
            SendDataBody::ReportsHeader { .. } => b"01",
            SendDataBody::ReconciliationAmounts { .. } => b"02",
        }
    }
}

/// One block of report or reconciliation data. See the H46 send data
/// messages.
///
/// The message family shares its type byte with [KeyboardInputRequest]; the
/// two byte function code behind the type byte tells them apart.
#[derive(Debug, Clone, PartialEq)]
pub struct SendData {
    pub is_last_block: bool,
    pub seq: String,
    pub length: String,
    pub body: SendDataBody,
}

impl BbsMessage for SendData {
    const MSG_TYPE: u8 = 0x46;
}

impl codec::Encoding<SendData> for codec::Default {
    fn encode(input: &SendData) -> CodecResult<Vec<u8>> {
        let mut output = vec![SendData::MSG_TYPE];
        output.extend_from_slice(input.body.code());
        output.extend(<codec::Flag<0x32, 0x31> as codec::Encoding<bool>>::encode(
            &input.is_last_block,
        )?);
        output.extend(<codec::FixedText<4> as codec::Encoding<String>>::encode(&input.seq)?);
        output.extend(<codec::FixedText<3> as codec::Encoding<String>>::encode(&input.length)?);
        match &input.body {
            SendDataBody::ReportsHeader {
                site_number,
                session_number,
                timestamp,
            } => {
                output.extend(<codec::FixedText<6> as codec::Encoding<String>>::encode(
                    site_number,
                )?);
                output.extend(<codec::FixedText<3> as codec::Encoding<String>>::encode(
                    session_number,
                )?);
                output.extend(
                    <codec::Default as codec::Encoding<NaiveDateTime>>::encode(timestamp)?,
                );
            }
            SendDataBody::ReconciliationAmounts {
                issuer_id,
                num_transactions,
            } => {
                output.extend(<codec::FixedText<2> as codec::Encoding<String>>::encode(
                    issuer_id,
                )?);
                output.extend(<codec::Int<4> as codec::Encoding<u32>>::encode(
                    num_transactions,
                )?);
            }
        }
        Ok(output)
    }

    fn decode(bytes: &[u8]) -> CodecResult<(SendData, &[u8])> {
        match bytes.first() {
            None => return Err(CodecError::IncompleteData),
            Some(&b) if b == SendData::MSG_TYPE => {}
            Some(&b) => {
                return Err(CodecError::ConstantMismatch {
                    expected: vec![SendData::MSG_TYPE],
                    found: vec![b],
                })
            }
        }
        let mut bytes = &bytes[1..];
        if bytes.len() < 2 {
            return Err(CodecError::IncompleteData);
        }
        let code = [bytes[0], bytes[1]];
        bytes = &bytes[2..];
        let (is_last_block, rest) =
            <codec::Flag<0x32, 0x31> as codec::Encoding<bool>>::decode(bytes)?;
        let (seq, rest) = <codec::FixedText<4> as codec::Encoding<String>>::decode(rest)?;
        let (length, mut rest) = <codec::FixedText<3> as codec::Encoding<String>>::decode(rest)?;
        let body = match &code {
            b"01" => {
                let (site_number, r) =
                    <codec::FixedText<6> as codec::Encoding<String>>::decode(rest)?;
                let (session_number, r) =
                    <codec::FixedText<3> as codec::Encoding<String>>::decode(r)?;
                let (timestamp, r) =
                    <codec::Default as codec::Encoding<NaiveDateTime>>::decode(r)?;
                rest = r;
                SendDataBody::ReportsHeader {
                    site_number,
                    session_number,
                    timestamp,
                }
            }
            b"02" => {
                let (issuer_id, r) = <codec::FixedText<2> as codec::Encoding<String>>::decode(rest)?;
                let (num_transactions, r) = <codec::Int<4> as codec::Encoding<u32>>::decode(r)?;
                rest = r;
                SendDataBody::ReconciliationAmounts {
                    issuer_id,
                    num_transactions,
                }
            }
            other => return Err(CodecError::UnknownToken(other.to_vec())),
        };
        Ok((
            SendData {
                is_last_block,
                seq,
                length,
                body,
            },
            rest,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BbsToken)]
pub enum TransferType {
    #[bbs_token(b"\x30")]
    EftAuthorisation,

    #[bbs_token(b"\x31")]
    ReturnOfGoods,

    #[bbs_token(b"\x32")]
    Reversal,

    #[bbs_token(b"\x33")]
    PurchaseWithCashback,

    #[bbs_token(b"\x34")]
    PreAuthorisation,

    #[bbs_token(b"\x35")]
    Adjustment,

    #[bbs_token(b"\x36")]
    BalanceInquiry,

    #[bbs_token(b"\x37")]
    CompleteReceipt,

    #[bbs_token(b"\x38")]
    Deposit,

    #[bbs_token(b"\x39")]
    CashWithdrawal,

    #[bbs_token(b"\x3a")]
    LoadEpurseCard,

    #[bbs_token(b"\x3b")]
    MerchandisePurchase,

    #[bbs_token(b"\x3c")]
    MerchandiseReversal,

    #[bbs_token(b"\x3d")]
    MerchandiseCorrection,
}

/// Starts a bank mode transaction for an amount. See the H51 message.
#[derive(Debug, Clone, PartialEq, Bbs)]
#[bbs_msg_type(0x51)]
pub struct TransferAmount {
    pub timestamp: NaiveDateTime,

    #[bbs(codec = codec::FixedText<6>)]
    pub id_no: String,

    #[bbs(codec = codec::FixedText<4>)]
    pub seq_no: String,

    #[bbs(codec = codec::FixedText<4>)]
    pub operator_id: String,

    #[bbs(constant = b"\x30")]
    pub mode: (),

    pub transfer_type: TransferType,

    pub amount: Price,

    #[bbs(constant = b"\x30")]
    pub unused_type: (),

    pub cashback_amount: Price,

    #[bbs(codec = codec::Flag<0x30, 0x31>)]
    pub top_up: bool,

    pub art_amount: Price,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BbsToken)]
pub enum AdminCode {
    /// Mapped by the ITU to the reconciliation function.
    #[bbs_token(b"\x31\x30")]
    Send,

    /// KLAR, the validation key.
    #[bbs_token(b"\x31\x31")]
    Ready,

    /// AVBRYT, the cancellation key.
    #[bbs_token(b"\x31\x32")]
    Cancel,

    /// FEIL, the correction key.
    #[bbs_token(b"\x31\x33")]
    Correction,

    /// ANNUL, mapped by the ITU to a reversal transaction.
    #[bbs_token(b"\x31\x34")]
    Reverse,

    #[bbs_token(b"\x31\x35")]
    BalanceInquiry,

    #[bbs_token(b"\x31\x36")]
    XReport,

    #[bbs_token(b"\x31\x37")]
    ZReport,

    #[bbs_token(b"\x31\x38")]
    SendOfflineTransactions,

    #[bbs_token(b"\x31\x39")]
    TurnoverReport,

    #[bbs_token(b"\x31\x3a")]
    PrintStoredTransactions,

    #[bbs_token(b"\x30\x30", b"\x30\x39", b"\x31\x3b", b"\x31\x3c", b"\x31\x3d", b"\x31\x3e")]
    NotUsed,
}

/// Administrative function keys forwarded to the ITU. See the H53 message.
///
/// Carries, among the report functions, the protocol level cancel (AVBRYT)
/// and reversal (ANNUL) used while a transaction is in flight.
#[derive(Debug, Clone, PartialEq, Bbs)]
#[bbs_msg_type(0x53)]
pub struct Administration {
    pub timestamp: NaiveDateTime,

    #[bbs(codec = codec::FixedText<6>)]
    pub id_no: String,

    #[bbs(codec = codec::FixedText<4>)]
    pub seq_no: String,

    #[bbs(codec = codec::FixedText<4>)]
    pub operator_id: String,

    pub adm_code: AdminCode,

    #[bbs(constant = b"\x1c")]
    pub fs: (),
}

/// Host request for the device attributes. The body layout is not nailed
/// down by the protocol notes we have, so the raw bytes are kept.
#[derive(Debug, Clone, PartialEq, Bbs)]
#[bbs_msg_type(0x60)]
pub struct DeviceAttributeRequest {
    #[bbs(codec = codec::Raw)]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Bbs)]
#[bbs_msg_type(0x61)]
pub struct DeviceAttribute {
    #[bbs(codec = codec::Raw)]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Bbs)]
#[bbs_msg_type(0x62)]
pub struct Status {
    #[bbs(codec = codec::Raw)]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BbsToken)]
pub enum ResponseCode {
    /// The receiver has received and processed the data correctly.
    #[bbs_token(b"\x30\x30")]
    Success,

    /// The receiver was not able to process the data. All codes of the
    /// range are treated alike; the first is canonical when encoding.
    #[bbs_token(
        b"\x30\x33",
        b"\x30\x34",
        b"\x30\x35",
        b"\x30\x36",
        b"\x30\x37",
        b"\x30\x38",
        b"\x30\x39"
    )]
    Failure,

    /// The display is busy; the ITU may try once more.
    #[bbs_token(b"\x31\x31")]
    DisplayBusy,

    /// The printer is busy; the ITU may try once more.
    #[bbs_token(b"\x31\x32")]
    PrinterBusy,

    /// The printer is out of function. The ITU must interrupt the current
    /// transaction and wait for the next bank mode initiation.
    #[bbs_token(b"\x31\x33")]
    PrinterBroken,
}

impl ResponseCode {
    pub fn is_success(&self) -> bool {
        matches!(self, ResponseCode::Success)
    }
}

/// Generic acknowledgement, sent by both sides. See the H5B message.
#[derive(Debug, Clone, PartialEq, Bbs)]
#[bbs_msg_type(0x5b)]
pub struct Response {
    pub code: ResponseCode,

    #[bbs(constant = b"\x5d")]
    pub end: (),
}

impl Response {
    pub fn success() -> Self {
        Response {
            code: ResponseCode::Success,
            end: (),
        }
    }

    pub fn failure() -> Self {
        Response {
            code: ResponseCode::Failure,
            end: (),
        }
    }
}

/// Messages originated by the terminal.
///
/// [KeyboardInputRequest] must stay listed before [SendData]: the two share
/// the type byte 0x46 and are told apart by their bodies.
#[derive(Debug, Clone, PartialEq, BbsEnum)]
pub enum ItuMessage {
    DisplayText(DisplayText),
    PrintText(PrintText),
    ResetTimer(ResetTimer),
    LocalMode(LocalMode),
    KeyboardInputRequest(KeyboardInputRequest),
    SendData(SendData),
    DeviceAttributeRequest(DeviceAttributeRequest),
    Status(Status),
    Response(Response),
    KeyboardInput(KeyboardInput),
}

impl ItuMessage {
    /// True for message types that answer an outstanding ECR request instead
    /// of opening a request of their own.
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            ItuMessage::Response(_) | ItuMessage::KeyboardInput(_) | ItuMessage::Status(_)
        )
    }
}

/// Messages originated by the host.
#[derive(Debug, Clone, PartialEq, BbsEnum)]
pub enum EcrMessage {
    KeyboardInput(KeyboardInput),
    SendData(SendData),
    TransferAmount(TransferAmount),
    Administration(Administration),
    DeviceAttribute(DeviceAttribute),
    Response(Response),
}
