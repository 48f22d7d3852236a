use super::{CodecError, CodecResult, Price, PrintCommand};
use chrono::NaiveDateTime;
use std::marker::PhantomData;

/// The implementation for serializing/deserializing one field.
///
/// A field codec turns a value into its wire bytes and back. Decoding
/// returns the remainder of the buffer so codecs can be chained in schema
/// order; a variadic codec consumes the whole remainder.
///
/// [Default] is the canonical codec of a value type. Marker types select an
/// alternate wire form where a message needs one (fixed width text, zero
/// padded integers, delimited fields).
pub trait Encoding<T> {
    fn encode(value: &T) -> CodecResult<Vec<u8>>;
    fn decode(bytes: &[u8]) -> CodecResult<(T, &[u8])>;
}

/// Marker for the canonical codec of a type.
pub struct Default;

/// Variadic ASCII text. Consumes the remainder of the buffer.
impl Encoding<String> for Default {
    fn encode(value: &String) -> CodecResult<Vec<u8>> {
        if !value.is_ascii() {
            return Err(CodecError::NotAscii);
        }
        Ok(value.as_bytes().to_vec())
    }

    fn decode(bytes: &[u8]) -> CodecResult<(String, &[u8])> {
        if !bytes.is_ascii() {
            return Err(CodecError::NotAscii);
        }
        let text = String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::NotAscii)?;
        Ok((text, &[]))
    }
}

/// ASCII text of exactly `N` bytes, space padded on encode and right
/// trimmed on decode.
pub struct FixedText<const N: usize>;

impl<const N: usize> Encoding<String> for FixedText<N> {
    fn encode(value: &String) -> CodecResult<Vec<u8>> {
        if !value.is_ascii() {
            return Err(CodecError::NotAscii);
        }
        if value.len() > N {
            return Err(CodecError::TooLong {
                max: N,
                len: value.len(),
            });
        }
        let mut out = value.as_bytes().to_vec();
        out.resize(N, b' ');
        Ok(out)
    }

    fn decode(bytes: &[u8]) -> CodecResult<(String, &[u8])> {
        if bytes.len() < N {
            return Err(CodecError::IncompleteData);
        }
        let field = &bytes[..N];
        if !field.is_ascii() {
            return Err(CodecError::NotAscii);
        }
        let text = String::from_utf8(field.to_vec()).map_err(|_| CodecError::NotAscii)?;
        Ok((text.trim_end().to_string(), &bytes[N..]))
    }
}

/// Variadic ASCII text of at most `MAX` bytes.
pub struct BoundedText<const MAX: usize>;

impl<const MAX: usize> Encoding<String> for BoundedText<MAX> {
    fn encode(value: &String) -> CodecResult<Vec<u8>> {
        if value.len() > MAX {
            return Err(CodecError::TooLong {
                max: MAX,
                len: value.len(),
            });
        }
        <Default as Encoding<String>>::encode(value)
    }

    fn decode(bytes: &[u8]) -> CodecResult<(String, &[u8])> {
        if bytes.len() > MAX {
            return Err(CodecError::TooLong {
                max: MAX,
                len: bytes.len(),
            });
        }
        <Default as Encoding<String>>::decode(bytes)
    }
}

/// Zero padded decimal of exactly `N` digits.
pub struct Int<const N: usize>;

impl<const N: usize> Encoding<u32> for Int<N> {
    fn encode(value: &u32) -> CodecResult<Vec<u8>> {
        let text = format!("{:0width$}", value, width = N);
        if text.len() != N {
            return Err(CodecError::Overflow(N));
        }
        Ok(text.into_bytes())
    }

    fn decode(bytes: &[u8]) -> CodecResult<(u32, &[u8])> {
        if bytes.len() < N {
            return Err(CodecError::IncompleteData);
        }
        let field = &bytes[..N];
        if !field.iter().all(|b| b.is_ascii_digit()) {
            return Err(CodecError::NotNumeric(
                String::from_utf8_lossy(field).into_owned(),
            ));
        }
        let text = std::str::from_utf8(field).expect("digits are utf-8");
        let value = text
            .parse()
            .map_err(|_| CodecError::NotNumeric(text.to_string()))?;
        Ok((value, &bytes[N..]))
    }
}

/// 11 digit zero padded fixed point amount.
impl Encoding<Price> for Default {
    fn encode(value: &Price) -> CodecResult<Vec<u8>> {
        let text = format!("{:011}", value.raw());
        if text.len() != 11 {
            return Err(CodecError::Overflow(11));
        }
        Ok(text.into_bytes())
    }

    fn decode(bytes: &[u8]) -> CodecResult<(Price, &[u8])> {
        if bytes.len() < 11 {
            return Err(CodecError::IncompleteData);
        }
        let field = &bytes[..11];
        if !field.iter().all(|b| b.is_ascii_digit()) {
            return Err(CodecError::NotNumeric(
                String::from_utf8_lossy(field).into_owned(),
            ));
        }
        let raw = std::str::from_utf8(field)
            .expect("digits are utf-8")
            .parse()
            .map_err(|_| CodecError::Overflow(11))?;
        Ok((Price::from_raw(raw), &bytes[11..]))
    }
}

/// 14 byte `YYYYMMDDHHMMSS` timestamp.
impl Encoding<NaiveDateTime> for Default {
    fn encode(value: &NaiveDateTime) -> CodecResult<Vec<u8>> {
        let text = value.format("%Y%m%d%H%M%S").to_string();
        if text.len() != 14 {
            return Err(CodecError::BadTimestamp(text));
        }
        Ok(text.into_bytes())
    }

    fn decode(bytes: &[u8]) -> CodecResult<(NaiveDateTime, &[u8])> {
        if bytes.len() < 14 {
            return Err(CodecError::IncompleteData);
        }
        let field = &bytes[..14];
        if !field.is_ascii() {
            return Err(CodecError::NotAscii);
        }
        let text = std::str::from_utf8(field).expect("checked ascii");
        let value = NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%S")
            .map_err(|_| CodecError::BadTimestamp(text.to_string()))?;
        Ok((value, &bytes[14..]))
    }
}

/// One byte boolean with per-field tokens.
///
/// The protocol is not consistent about which bytes mean true and false, so
/// the tokens are const parameters of the marker.
pub struct Flag<const T: u8, const F: u8>;

impl<const T: u8, const F: u8> Encoding<bool> for Flag<T, F> {
    fn encode(value: &bool) -> CodecResult<Vec<u8>> {
        Ok(vec![if *value { T } else { F }])
    }

    fn decode(bytes: &[u8]) -> CodecResult<(bool, &[u8])> {
        match bytes.first() {
            None => Err(CodecError::IncompleteData),
            Some(&b) if b == T => Ok((true, &bytes[1..])),
            Some(&b) if b == F => Ok((false, &bytes[1..])),
            Some(&b) => Err(CodecError::UnknownToken(vec![b])),
        }
    }
}

/// A field terminated by a single delimiter byte.
///
/// Encoding appends the delimiter; decoding splits at the first delimiter
/// and hands the prefix to the inner codec, which must consume it exactly.
pub struct Delimited<C = Default, const D: u8 = b';'>(PhantomData<C>);

impl<T, C, const D: u8> Encoding<T> for Delimited<C, D>
where
    C: Encoding<T>,
{
    fn encode(value: &T) -> CodecResult<Vec<u8>> {
        let mut out = C::encode(value)?;
        out.push(D);
        Ok(out)
    }

    fn decode(bytes: &[u8]) -> CodecResult<(T, &[u8])> {
        let pos = bytes
            .iter()
            .position(|&b| b == D)
            .ok_or(CodecError::MissingDelimiter)?;
        let (value, rest) = C::decode(&bytes[..pos])?;
        if !rest.is_empty() {
            return Err(CodecError::TrailingData);
        }
        Ok((value, &bytes[pos + 1..]))
    }
}

/// [Delimited] over an optional field.
///
/// An empty prefix decodes to [None]; [None] encodes to just the delimiter.
pub struct OptDelimited<C = Default, const D: u8 = b';'>(PhantomData<C>);

impl<T, C, const D: u8> Encoding<Option<T>> for OptDelimited<C, D>
where
    C: Encoding<T>,
{
    fn encode(value: &Option<T>) -> CodecResult<Vec<u8>> {
        match value {
            None => Ok(vec![D]),
            Some(inner) => <Delimited<C, D> as Encoding<T>>::encode(inner),
        }
    }

    fn decode(bytes: &[u8]) -> CodecResult<(Option<T>, &[u8])> {
        match bytes.first() {
            None => Err(CodecError::MissingDelimiter),
            Some(&b) if b == D => Ok((None, &bytes[1..])),
            Some(_) => {
                let (value, rest) = <Delimited<C, D> as Encoding<T>>::decode(bytes)?;
                Ok((Some(value), rest))
            }
        }
    }
}

pub const CUT_THROUGH: u8 = 0x0c;
pub const CUT_PARTIAL: u8 = 0x0e;

/// Receipt printer command list.
///
/// `0x0c` terminates a receipt, `0x0e` cuts between partitions of one
/// receipt. Leading, trailing and repeated control codes never produce
/// empty [PrintCommand::Write] commands.
pub struct Formatted;

impl Encoding<Vec<PrintCommand>> for Formatted {
    fn encode(value: &Vec<PrintCommand>) -> CodecResult<Vec<u8>> {
        let mut out = Vec::new();
        for command in value {
            match command {
                PrintCommand::Write(text) => {
                    if !text.is_ascii() {
                        return Err(CodecError::NotAscii);
                    }
                    out.extend_from_slice(text.as_bytes());
                }
                PrintCommand::CutPartial => out.push(CUT_PARTIAL),
                PrintCommand::CutThrough => out.push(CUT_THROUGH),
            }
        }
        Ok(out)
    }

    fn decode(bytes: &[u8]) -> CodecResult<(Vec<PrintCommand>, &[u8])> {
        if !bytes.is_ascii() {
            return Err(CodecError::NotAscii);
        }
        let mut commands = Vec::new();
        for receipt in bytes.split(|&b| b == CUT_THROUGH) {
            if receipt.is_empty() {
                continue;
            }
            let mut partitions = receipt.split(|&b| b == CUT_PARTIAL).filter(|p| !p.is_empty());
            if let Some(first) = partitions.next() {
                commands.push(PrintCommand::Write(
                    String::from_utf8(first.to_vec()).map_err(|_| CodecError::NotAscii)?,
                ));
                for partition in partitions {
                    commands.push(PrintCommand::CutPartial);
                    commands.push(PrintCommand::Write(
                        String::from_utf8(partition.to_vec()).map_err(|_| CodecError::NotAscii)?,
                    ));
                }
            }
            commands.push(PrintCommand::CutThrough);
        }
        Ok((commands, &[]))
    }
}

/// Uninterpreted remainder of the buffer.
///
/// Used for message bodies whose layout the protocol documentation leaves
/// open; the raw bytes are surfaced to the caller.
pub struct Raw;

impl Encoding<Vec<u8>> for Raw {
    fn encode(value: &Vec<u8>) -> CodecResult<Vec<u8>> {
        Ok(value.clone())
    }

    fn decode(bytes: &[u8]) -> CodecResult<(Vec<u8>, &[u8])> {
        Ok((bytes.to_vec(), &[]))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fixed_text() {
        assert_eq!(
            <FixedText<10> as Encoding<String>>::encode(&"padded".to_string()).unwrap(),
            b"padded    "
        );
        assert_eq!(
            <FixedText<10> as Encoding<String>>::decode(b"padded    rest").unwrap(),
            ("padded".to_string(), b"rest" as &[u8])
        );
        assert_eq!(
            <FixedText<4> as Encoding<String>>::encode(&"loooonnnngggg".to_string()),
            Err(CodecError::TooLong { max: 4, len: 13 })
        );
        assert_eq!(
            <FixedText<120> as Encoding<String>>::decode(b"short"),
            Err(CodecError::IncompleteData)
        );
    }

    #[test]
    fn test_variadic_text() {
        assert_eq!(
            <Default as Encoding<String>>::decode(b"hello").unwrap(),
            ("hello".to_string(), b"" as &[u8])
        );
        assert_eq!(
            <Default as Encoding<String>>::encode(&"h\u{e9}llo".to_string()),
            Err(CodecError::NotAscii)
        );
    }

    #[test]
    fn test_int() {
        assert_eq!(<Int<3> as Encoding<u32>>::encode(&7).unwrap(), b"007");
        assert_eq!(
            <Int<3> as Encoding<u32>>::decode(b"042rest").unwrap(),
            (42, b"rest" as &[u8])
        );
        assert_eq!(
            <Int<3> as Encoding<u32>>::encode(&1000),
            Err(CodecError::Overflow(3))
        );
        assert!(matches!(
            <Int<3> as Encoding<u32>>::decode(b"a42"),
            Err(CodecError::NotNumeric(_))
        ));
    }

    #[test]
    fn test_price_round_trip() {
        let bytes = b"00000100000";
        let (price, rest) = <Default as Encoding<Price>>::decode(bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(price, Price::from_major(10));
        assert_eq!(<Default as Encoding<Price>>::encode(&price).unwrap(), bytes);
    }

    #[test]
    fn test_datetime() {
        let bytes = b"20150710173000";
        let (value, rest) = <Default as Encoding<NaiveDateTime>>::decode(bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            <Default as Encoding<NaiveDateTime>>::encode(&value).unwrap(),
            bytes
        );
        assert!(matches!(
            <Default as Encoding<NaiveDateTime>>::decode(b"20159910173000"),
            Err(CodecError::BadTimestamp(_))
        ));
    }

    #[test]
    fn test_flag() {
        type Echo = Flag<0x20, 0x21>;
        assert_eq!(<Echo as Encoding<bool>>::encode(&true).unwrap(), b"\x20");
        assert_eq!(
            <Echo as Encoding<bool>>::decode(b"\x21").unwrap(),
            (false, b"" as &[u8])
        );
        assert_eq!(
            <Echo as Encoding<bool>>::decode(b"\x22"),
            Err(CodecError::UnknownToken(vec![0x22]))
        );
    }

    #[test]
    fn test_delimited() {
        type Field = Delimited<Int<3>>;
        assert_eq!(<Field as Encoding<u32>>::encode(&7).unwrap(), b"007;");
        assert_eq!(
            <Field as Encoding<u32>>::decode(b"007;rest").unwrap(),
            (7, b"rest" as &[u8])
        );
        assert_eq!(
            <Field as Encoding<u32>>::decode(b"007"),
            Err(CodecError::MissingDelimiter)
        );
    }

    #[test]
    fn test_opt_delimited() {
        type Pan = OptDelimited<BoundedText<19>>;
        assert_eq!(
            <Pan as Encoding<Option<String>>>::decode(b";rest").unwrap(),
            (None, b"rest" as &[u8])
        );
        assert_eq!(
            <Pan as Encoding<Option<String>>>::decode(b"4012345678;").unwrap(),
            (Some("4012345678".to_string()), b"" as &[u8])
        );
        assert_eq!(<Pan as Encoding<Option<String>>>::encode(&None).unwrap(), b";");
    }

    #[test]
    fn test_formatted_round_trip() {
        let commands = vec![
            PrintCommand::Write("First".to_string()),
            PrintCommand::CutPartial,
            PrintCommand::Write("Second".to_string()),
            PrintCommand::CutThrough,
        ];
        let bytes = <Formatted as Encoding<Vec<PrintCommand>>>::encode(&commands).unwrap();
        assert_eq!(bytes, b"First\x0eSecond\x0c");
        assert_eq!(
            <Formatted as Encoding<Vec<PrintCommand>>>::decode(&bytes)
                .unwrap()
                .0,
            commands
        );
    }

    #[test]
    fn test_formatted_ignores_empty_segments() {
        let (commands, _) = <Formatted as Encoding<Vec<PrintCommand>>>::decode(b"\x0c\x0c").unwrap();
        assert_eq!(commands, vec![]);

        let (commands, _) =
            <Formatted as Encoding<Vec<PrintCommand>>>::decode(b"\x0eA\x0e\x0eB\x0e\x0c\x0c")
                .unwrap();
        assert_eq!(
            commands,
            vec![
                PrintCommand::Write("A".to_string()),
                PrintCommand::CutPartial,
                PrintCommand::Write("B".to_string()),
                PrintCommand::CutThrough,
            ]
        );
    }
}
