use anyhow::Result;
use base64::Engine;
use tokio_util::bytes::{BufMut, BytesMut};

use super::types::*;

pub trait Encode {
    fn encode(&self, out: &mut BytesMut) -> Result<()>;
}

const TAB: u8 = 0x09;
const LF: u8 = 0x0a;

fn field(out: &mut BytesMut, value: &[u8]) {
    out.put_u8(TAB);
    out.put(value);
}

impl Encode for Mechanism {
    fn encode(&self, out: &mut BytesMut) -> Result<()> {
        match self {
            Self::Plain => out.put(&b"PLAIN"[..]),
            Self::Login => out.put(&b"LOGIN"[..]),
        }
        Ok(())
    }
}

impl Encode for MechanismParameters {
    fn encode(&self, out: &mut BytesMut) -> Result<()> {
        match self {
            Self::PlainText => out.put(&b"plaintext"[..]),
        }
        Ok(())
    }
}

impl Encode for FailCode {
    fn encode(&self, out: &mut BytesMut) -> Result<()> {
        match self {
            Self::TempFail => out.put(&b"temp_fail"[..]),
        }
        Ok(())
    }
}

fn user_field(out: &mut BytesMut, user_id: &Option<String>) {
    if let Some(user) = user_id {
        out.put_u8(TAB);
        out.put(&b"user="[..]);
        out.put(user.as_bytes());
    }
}

impl Encode for ServerCommand {
    fn encode(&self, out: &mut BytesMut) -> Result<()> {
        match self {
            Self::Version(Version { major, minor }) => {
                out.put(&b"VERSION"[..]);
                field(out, major.to_string().as_bytes());
                field(out, minor.to_string().as_bytes());
            }
            Self::Spid(pid) => {
                out.put(&b"SPID"[..]);
                field(out, pid.to_string().as_bytes());
            }
            Self::Cuid(cuid) => {
                out.put(&b"CUID"[..]);
                field(out, cuid.to_string().as_bytes());
            }
            Self::Cookie(cookie) => {
                out.put(&b"COOKIE"[..]);
                field(out, hex::encode(cookie).as_bytes());
            }
            Self::Mech { kind, parameters } => {
                out.put(&b"MECH"[..]);
                out.put_u8(TAB);
                kind.encode(out)?;
                for p in parameters.iter() {
                    out.put_u8(TAB);
                    p.encode(out)?;
                }
            }
            Self::Done => out.put(&b"DONE"[..]),
            Self::Cont { id, data } => {
                out.put(&b"CONT"[..]);
                field(out, id.to_string().as_bytes());
                out.put_u8(TAB);
                if let Some(data) = data {
                    let b64 = base64::engine::general_purpose::STANDARD.encode(data);
                    out.put(b64.as_bytes());
                }
            }
            Self::Ok { id, user_id } => {
                out.put(&b"OK"[..]);
                field(out, id.to_string().as_bytes());
                user_field(out, user_id);
            }
            Self::Fail { id, user_id, code } => {
                out.put(&b"FAIL"[..]);
                field(out, id.to_string().as_bytes());
                user_field(out, user_id);
                if let Some(code) = code {
                    out.put_u8(TAB);
                    out.put(&b"code="[..]);
                    code.encode(out)?;
                }
            }
        }
        out.put_u8(LF);
        Ok(())
    }
}
