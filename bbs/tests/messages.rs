use bbs::packets::*;
use bbs::{BbsSerialize, CodecError, Price, PrintCommand};
use chrono::{NaiveDate, NaiveDateTime};

fn timestamp() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2015, 7, 10)
        .unwrap()
        .and_hms_opt(17, 30, 0)
        .unwrap()
}

#[test]
fn test_pack_display_text() {
    assert_eq!(
        DisplayText::new("Hello World").to_bytes().unwrap(),
        b"\x41100Hello World"
    );

    let mut message = DisplayText::new("Prompt customer");
    message.prompt_customer = false;
    assert_eq!(message.to_bytes().unwrap(), b"\x41000Prompt customer");

    let mut message = DisplayText::new("Expects input");
    message.expects_input = true;
    assert_eq!(message.to_bytes().unwrap(), b"\x41110Expects input");
}

#[test]
fn test_unpack_display_text() {
    let message = DisplayText::from_bytes(b"\x41\x31\x30\x30Prompt customer").unwrap();
    assert!(message.prompt_customer);
    assert!(!message.expects_input);
    assert_eq!(message.text, "Prompt customer");

    let message = DisplayText::from_bytes(b"\x41010Expects input").unwrap();
    assert!(!message.prompt_customer);
    assert!(message.expects_input);
    assert_eq!(message.text, "Expects input");
}

#[test]
fn test_pack_print_text() {
    let message = PrintText {
        sub_type: (),
        media: PrintMedia::Both,
        mode: (),
        commands: vec![
            PrintCommand::Write("First".to_string()),
            PrintCommand::CutPartial,
            PrintCommand::Write("Second".to_string()),
            PrintCommand::CutThrough,
        ],
    };
    let bytes = message.to_bytes().unwrap();
    assert_eq!(bytes, b"\x42\x20\x22\x2aFirst\x0eSecond\x0c");
    assert_eq!(PrintText::from_bytes(&bytes).unwrap(), message);
}

#[test]
fn test_reset_timer() {
    let message = ResetTimer { seconds: 60 };
    assert_eq!(message.to_bytes().unwrap(), b"\x43060");
    assert_eq!(ResetTimer::from_bytes(b"\x43120").unwrap().seconds, 120);
}

fn local_mode_bytes() -> Vec<u8> {
    [
        b"\x44\x20\x2003" as &[u8],
        b"4571234567890123;",
        b"20150710173000;",
        b"0;",
        b"042;",
        b"123456ABCDEF;",
        b"0001;",
        b";",
    ]
    .concat()
}

#[test]
fn test_local_mode_round_trip() {
    let bytes = local_mode_bytes();
    let message = LocalMode::from_bytes(&bytes).unwrap();
    assert_eq!(message.result, TransactionResult::Success);
    assert_eq!(message.acc, AccumulatorUpdate::Standard);
    assert_eq!(message.issuer_id, 3);
    assert_eq!(message.pan.as_deref(), Some("4571234567890123"));
    assert_eq!(message.timestamp, timestamp());
    assert_eq!(message.ver_method, VerificationMethod::PinBased);
    assert_eq!(message.session_num, 42);
    assert_eq!(message.stan_auth, "123456ABCDEF");
    assert_eq!(message.seq_no, 1);
    assert_eq!(message.tip, None);

    assert_eq!(message.to_bytes().unwrap(), bytes);
}

#[test]
fn test_local_mode_without_pan_with_tip() {
    let bytes = [
        b"\x44\x21\x3099" as &[u8],
        b";",
        b"20150710173000;",
        b"1;",
        b"001;",
        b"123456ABCDEF;",
        b"0000;",
        b"00000050000;",
    ]
    .concat();
    let message = LocalMode::from_bytes(&bytes).unwrap();
    assert_eq!(message.result, TransactionResult::Failure);
    assert_eq!(message.acc, AccumulatorUpdate::NoUpdate);
    assert_eq!(message.pan, None);
    assert_eq!(message.ver_method, VerificationMethod::SignatureBased);
    assert_eq!(message.tip, Some(Price::from_raw(50_000)));
    assert_eq!(message.to_bytes().unwrap(), bytes);
}

#[test]
fn test_local_mode_missing_delimiter() {
    assert_eq!(
        LocalMode::from_bytes(b"\x44\x20\x2003nodelimiters"),
        Err(CodecError::MissingDelimiter)
    );
}

#[test]
fn test_keyboard_input() {
    let message = KeyboardInput {
        text: "some text".to_string(),
        terminator: InputTerminator::Enter,
    };
    let bytes = message.to_bytes().unwrap();
    assert_eq!(bytes, b"\x55some text0");
    assert_eq!(KeyboardInput::from_bytes(&bytes).unwrap(), message);

    let message = KeyboardInput::from_bytes(b"\x559").unwrap();
    assert_eq!(message.text, "");
    assert_eq!(message.terminator, InputTerminator::Escape);
}

#[test]
fn test_transfer_amount_golden() {
    let message = TransferAmount {
        timestamp: timestamp(),
        id_no: String::new(),
        seq_no: "0000".to_string(),
        operator_id: "0000".to_string(),
        mode: (),
        transfer_type: TransferType::EftAuthorisation,
        amount: Price::from_major(10),
        unused_type: (),
        cashback_amount: Price::ZERO,
        top_up: false,
        art_amount: Price::ZERO,
    };
    let expected: Vec<u8> = [
        b"\x51" as &[u8],
        b"20150710173000",
        b"      ",
        b"0000",
        b"0000",
        b"\x30",
        b"\x30",
        b"00000100000",
        b"\x30",
        b"00000000000",
        b"\x31",
        b"00000000000",
    ]
    .concat();
    let bytes = message.to_bytes().unwrap();
    assert_eq!(bytes, expected);
    assert_eq!(TransferAmount::from_bytes(&bytes).unwrap(), message);
}

#[test]
fn test_administration_round_trip() {
    let message = Administration {
        timestamp: timestamp(),
        id_no: String::new(),
        seq_no: "0000".to_string(),
        operator_id: "0000".to_string(),
        adm_code: AdminCode::Cancel,
        fs: (),
    };
    let bytes = message.to_bytes().unwrap();
    assert_eq!(&bytes[29..31], b"\x31\x32");
    assert_eq!(*bytes.last().unwrap(), 0x1c);
    assert_eq!(Administration::from_bytes(&bytes).unwrap(), message);
}

#[test]
fn test_response_codes() {
    let message = Response::from_bytes(b"\x5b\x30\x30\x5d").unwrap();
    assert!(message.code.is_success());

    // Every code of the failure range collapses into one variant; the first
    // code is canonical when encoding.
    let message = Response::from_bytes(b"\x5b\x30\x34\x5d").unwrap();
    assert_eq!(message.code, ResponseCode::Failure);
    assert_eq!(message.to_bytes().unwrap(), b"\x5b\x30\x33\x5d");

    assert_eq!(
        Response::from_bytes(b"\x5b\x32\x30\x5d"),
        Err(CodecError::UnknownToken(vec![0x32, 0x30]))
    );
}

#[test]
fn test_itu_dispatch() {
    let message = ItuMessage::from_bytes(b"\x41100Hello").unwrap();
    assert!(matches!(message, ItuMessage::DisplayText(_)));
    assert!(!message.is_response());

    let message = ItuMessage::from_bytes(&local_mode_bytes()).unwrap();
    assert!(matches!(message, ItuMessage::LocalMode(_)));

    let message = ItuMessage::from_bytes(b"\x5b\x30\x30\x5d").unwrap();
    assert!(message.is_response());

    let message = ItuMessage::from_bytes(b"\x55ok0").unwrap();
    assert!(message.is_response());

    let message = ItuMessage::from_bytes(b"\x62anything").unwrap();
    assert!(message.is_response());

    assert_eq!(
        ItuMessage::from_bytes(b"\x7f???"),
        Err(CodecError::UnknownMessageType(0x7f))
    );
}

#[test]
fn test_shared_type_byte_dispatch() {
    // Keyboard input requests and send data blocks share the type byte
    // 0x46; the byte behind it tells them apart.
    let message = ItuMessage::from_bytes(b"\x46\x200310").unwrap();
    let ItuMessage::KeyboardInputRequest(request) = message else {
        panic!("expected a keyboard input request");
    };
    assert!(request.echo);
    assert_eq!(request.min_chars, "03");
    assert_eq!(request.max_chars, "10");

    let send_data = SendData {
        is_last_block: true,
        seq: "0001".to_string(),
        length: "017".to_string(),
        body: SendDataBody::ReportsHeader {
            site_number: "SITE01".to_string(),
            session_number: "001".to_string(),
            timestamp: timestamp(),
        },
    };
    let bytes = send_data.to_bytes().unwrap();
    let message = ItuMessage::from_bytes(&bytes).unwrap();
    assert_eq!(message, ItuMessage::SendData(send_data.clone()));

    let reconciliation = SendData {
        is_last_block: false,
        seq: "0002".to_string(),
        length: "006".to_string(),
        body: SendDataBody::ReconciliationAmounts {
            issuer_id: "03".to_string(),
            num_transactions: 17,
        },
    };
    let bytes = reconciliation.to_bytes().unwrap();
    assert_eq!(SendData::from_bytes(&bytes).unwrap(), reconciliation);
}

#[test]
fn test_ecr_dispatch() {
    let message = EcrMessage::TransferAmount(TransferAmount {
        timestamp: timestamp(),
        id_no: String::new(),
        seq_no: "0000".to_string(),
        operator_id: "0000".to_string(),
        mode: (),
        transfer_type: TransferType::EftAuthorisation,
        amount: Price::from_major(10),
        unused_type: (),
        cashback_amount: Price::ZERO,
        top_up: false,
        art_amount: Price::ZERO,
    });
    let bytes = message.to_bytes().unwrap();
    assert_eq!(EcrMessage::from_bytes(&bytes).unwrap(), message);
}
