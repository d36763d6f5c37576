//! Record log parser using nom
//!
//! File format:
//! ```text
//! EMAKV001\n
//! ...records...
//! ```
//!
//! Record format (lengths are byte lengths, decimal):
//! ```text
//! +<klen>:<vlen>\n<key><value>\n     set
//! -<klen>\n<key>\n                   remove
//! ```
//!
//! Parsers are streaming so a record cut short by a crash reads as
//! `Incomplete` instead of corruption.

use nom::{
    branch::alt,
    bytes::streaming::take,
    character::streaming::{char, digit1},
    combinator::map_res,
    sequence::{delimited, separated_pair, terminated},
    IResult,
};

use crate::error::{Error, Result};

/// Magic header for key-value log files
pub const KV_MAGIC: &[u8] = b"EMAKV001\n";

/// A single log record
#[derive(Debug, Clone, PartialEq)]
pub enum Record<'a> {
    /// Key was written with a value
    Set {
        /// Key
        key: &'a str,
        /// Value
        value: &'a str,
    },
    /// Key was removed
    Remove {
        /// Key
        key: &'a str,
    },
}

/// Records recovered from a log body
#[derive(Debug)]
pub struct Replay<'a> {
    /// Complete records in log order
    pub records: Vec<Record<'a>>,
    /// Bytes of the body covered by complete records
    pub consumed: usize,
}

/// Strip and validate the magic header, returning the record body
pub fn parse_header(input: &[u8]) -> Result<&[u8]> {
    if input.len() < KV_MAGIC.len() {
        return Err(Error::Parse("Input too short for header".to_string()));
    }

    if &input[..KV_MAGIC.len()] != KV_MAGIC {
        return Err(Error::Parse("Invalid log magic header".to_string()));
    }

    Ok(&input[KV_MAGIC.len()..])
}

fn length(input: &[u8]) -> IResult<&[u8], usize> {
    map_res(map_res(digit1, std::str::from_utf8), |s: &str| s.parse::<usize>())(input)
}

fn text<'a>(len: usize) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], &'a str> {
    map_res(take(len), std::str::from_utf8)
}

fn set_record(input: &[u8]) -> IResult<&[u8], Record<'_>> {
    let (input, (klen, vlen)) = delimited(
        char('+'),
        separated_pair(length, char(':'), length),
        char('\n'),
    )(input)?;
    let (input, key) = text(klen)(input)?;
    let (input, value) = terminated(text(vlen), char('\n'))(input)?;

    Ok((input, Record::Set { key, value }))
}

fn remove_record(input: &[u8]) -> IResult<&[u8], Record<'_>> {
    let (input, klen) = delimited(char('-'), length, char('\n'))(input)?;
    let (input, key) = terminated(text(klen), char('\n'))(input)?;

    Ok((input, Record::Remove { key }))
}

/// Parse one record
pub fn parse_record(input: &[u8]) -> IResult<&[u8], Record<'_>> {
    alt((set_record, remove_record))(input)
}

/// Parse every complete record in a log body.
///
/// A truncated trailing record stops the replay; anything else that fails
/// to parse is an error.
pub fn replay(body: &[u8]) -> Result<Replay<'_>> {
    let mut records = Vec::new();
    let mut rest = body;

    while !rest.is_empty() {
        match parse_record(rest) {
            Ok((remaining, record)) => {
                records.push(record);
                rest = remaining;
            }
            Err(nom::Err::Incomplete(_)) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(Replay {
        records,
        consumed: body.len() - rest.len(),
    })
}

/// Encode a set record
pub fn encode_set(key: &str, value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + value.len() + 24);
    out.extend_from_slice(format!("+{}:{}\n", key.len(), value.len()).as_bytes());
    out.extend_from_slice(key.as_bytes());
    out.extend_from_slice(value.as_bytes());
    out.push(b'\n');
    out
}

/// Encode a remove record
pub fn encode_remove(key: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + 12);
    out.extend_from_slice(format!("-{}\n", key.len()).as_bytes());
    out.extend_from_slice(key.as_bytes());
    out.push(b'\n');
    out
}
