use base64::Engine;
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take, take_while, take_while1},
    character::complete::{tab, u16, u64},
    combinator::{eof, map, opt, peek, recognize, rest, value},
    error::{Error, ErrorKind},
    multi::{many1, separated_list0},
    sequence::{pair, preceded, tuple},
    IResult,
};

use super::types::*;

pub fn client_command(input: &[u8]) -> IResult<&[u8], ClientCommand> {
    alt((version_command, cpid_command, auth_command, cont_command))(input)
        .or_else(|_| invalid_request(input))
}

// An AUTH or CONT we can not make sense of, but whose id is readable
fn invalid_request(input: &[u8]) -> IResult<&[u8], ClientCommand> {
    map(
        tuple((
            alt((tag_no_case(b"AUTH"), tag_no_case(b"CONT"))),
            tab,
            u64,
            take_while(|c: u8| c != b'\n'),
        )),
        |(_, _, id, _)| ClientCommand::Invalid { id },
    )(input)
}

fn version_command(input: &[u8]) -> IResult<&[u8], ClientCommand> {
    map(
        tuple((tag_no_case(b"VERSION"), tab, u64, tab, u64)),
        |(_, _, major, _, minor)| ClientCommand::Version(Version { major, minor }),
    )(input)
}

fn cpid_command(input: &[u8]) -> IResult<&[u8], ClientCommand> {
    preceded(pair(tag_no_case(b"CPID"), tab), map(u64, ClientCommand::Cpid))(input)
}

fn mechanism(input: &[u8]) -> IResult<&[u8], Mechanism> {
    alt((
        value(Mechanism::Plain, tag_no_case(b"PLAIN")),
        value(Mechanism::Login, tag_no_case(b"LOGIN")),
    ))(input)
}

// TAB, LF and the 0x01 escape byte delimit parameters
fn is_param_char(c: u8) -> bool {
    c != 0x09 && c != 0x0a && c != 0x01
}

fn escaped(input: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(tag(&[0x01]), take(1usize))(input)
}

fn parameter(input: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(many1(alt((take_while1(is_param_char), escaped))))(input)
}

fn parameter_str(input: &[u8]) -> IResult<&[u8], String> {
    let (rest, buf) = parameter(input)?;
    match std::str::from_utf8(buf) {
        Ok(v) => Ok((rest, v.to_string())),
        Err(_) => Err(nom::Err::Failure(Error::new(input, ErrorKind::Verify))),
    }
}

fn parameter_name(input: &[u8]) -> IResult<&[u8], String> {
    let (rest, buf) = take_while1(|c: u8| is_param_char(c) && c != b'=')(input)?;
    match std::str::from_utf8(buf) {
        Ok(v) => Ok((rest, v.to_string())),
        Err(_) => Err(nom::Err::Failure(Error::new(input, ErrorKind::Verify))),
    }
}

fn auth_option(input: &[u8]) -> IResult<&[u8], AuthOption> {
    use AuthOption::*;
    alt((
        value(Debug, tag_no_case(b"debug")),
        value(NoPenalty, tag_no_case(b"no-penalty")),
        map(preceded(tag_no_case(b"session="), u64), Session),
        map(preceded(tag_no_case(b"lip="), parameter_str), LocalIp),
        map(preceded(tag_no_case(b"rip="), parameter_str), RemoteIp),
        map(preceded(tag_no_case(b"lport="), u16), LocalPort),
        map(preceded(tag_no_case(b"rport="), u16), RemotePort),
        map(preceded(tag_no_case(b"real_rip="), parameter_str), RealRemoteIp),
        map(preceded(tag_no_case(b"real_lip="), parameter_str), RealLocalIp),
        map(preceded(tag_no_case(b"secured="), parameter_str), |v| {
            Secured(Some(v))
        }),
        value(Secured(None), tag_no_case(b"secured")),
        map(preceded(tag_no_case(b"transport="), parameter_str), Transport),
        map(preceded(tag_no_case(b"resp="), base64), Resp),
        map(
            tuple((parameter_name, tag(b"="), parameter)),
            |(n, _, v)| UnknownPair(n, v.into()),
        ),
        map(parameter, |v| UnknownBool(v.into())),
    ))(input)
}

fn auth_command(input: &[u8]) -> IResult<&[u8], ClientCommand> {
    map(
        tuple((
            tag_no_case(b"AUTH"),
            tab,
            u64,
            tab,
            mechanism,
            tab,
            preceded(tag_no_case(b"service="), parameter_str),
            map(opt(preceded(tab, separated_list0(tab, auth_option))), |o| {
                o.unwrap_or_default()
            }),
        )),
        |(_, _, id, _, mech, _, service, options)| ClientCommand::Auth {
            id,
            mech,
            service,
            options,
        },
    )(input)
}

fn is_base64_core(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'+' || c == b'/'
}

// Padding is optional on the wire, so it is dropped before decoding.
// An empty payload is a valid (empty) SASL response.
fn base64(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    let (rest, (b64, _)) =
        tuple((take_while(is_base64_core), take_while(|c: u8| c == b'=')))(input)?;

    let data = base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(b64)
        .map_err(|_| nom::Err::Failure(Error::new(input, ErrorKind::Verify)))?;

    Ok((rest, data))
}

fn cont_command(input: &[u8]) -> IResult<&[u8], ClientCommand> {
    map(
        tuple((
            tag_no_case(b"CONT"),
            tab,
            u64,
            tab,
            base64,
            peek(alt((tag(b"\n"), eof))),
        )),
        |(_, _, id, _, data, _)| ClientCommand::Cont { id, data },
    )(input)
}

// -----------------------------------------------------------------
//
// SASL PLAIN
//
// -----------------------------------------------------------------

/// Splits an RFC 4616 message into (authorization id, login, password)
pub fn auth_plain(input: &[u8]) -> IResult<&[u8], (&[u8], &[u8], &[u8])> {
    map(
        tuple((
            take_while(|c: u8| c != 0),
            tag(&[0u8]),
            take_while(|c: u8| c != 0),
            tag(&[0u8]),
            rest,
        )),
        |(authz, _, user, _, pass)| (authz, user, pass),
    )(input)
}
