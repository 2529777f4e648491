//! A small MQTT 3.1.1 packet codec.
//!
//! Only the packets a QoS 0 chat participant needs are supported. Encoding
//! produces one complete packet per call; decoding goes through
//! [`PacketReader`], which buffers bytes until a whole packet is available
//! because a packet may be split across (or share) WebSocket frames.

use thiserror::Error;

pub const PROTOCOL_NAME: &str = "MQTT";
pub const PROTOCOL_LEVEL: u8 = 4;

/// Largest value the four-byte remaining-length field can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

const CONNECT: u8 = 1;
const CONNACK: u8 = 2;
const PUBLISH: u8 = 3;
const SUBSCRIBE: u8 = 8;
const SUBACK: u8 = 9;
const UNSUBSCRIBE: u8 = 10;
const UNSUBACK: u8 = 11;
const PINGREQ: u8 = 12;
const PINGRESP: u8 = 13;
const DISCONNECT: u8 = 14;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("remaining length field longer than four bytes")]
    MalformedLength,

    #[error("packet body ended early")]
    Truncated,

    #[error("unsupported packet type {0}")]
    UnknownPacket(u8),

    #[error("invalid flags {flags:#06b} for packet type {packet_type}")]
    InvalidFlags { packet_type: u8, flags: u8 },

    #[error("string field is not valid utf-8")]
    InvalidUtf8,

    #[error("string field longer than 65535 bytes")]
    StringTooLong,

    #[error("packet larger than the protocol allows")]
    PacketTooLarge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect {
        client_id: String,
        keep_alive: u16,
        clean_session: bool,
    },
    ConnAck {
        session_present: bool,
        return_code: u8,
    },
    Publish {
        topic: String,
        payload: Vec<u8>,
        qos: u8,
        /// Present only when `qos > 0`.
        packet_id: Option<u16>,
        retain: bool,
    },
    Subscribe {
        packet_id: u16,
        topic: String,
        qos: u8,
    },
    SubAck {
        packet_id: u16,
        return_codes: Vec<u8>,
    },
    Unsubscribe {
        packet_id: u16,
        topic: String,
    },
    UnsubAck {
        packet_id: u16,
    },
    PingReq,
    PingResp,
    Disconnect,
}

impl Packet {
    /// Shorthand for a QoS 0, non-retained publish.
    pub fn publish(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Packet::Publish {
            topic: topic.into(),
            payload: payload.into(),
            qos: 0,
            packet_id: None,
            retain: false,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut body = Vec::new();
        let header = match self {
            Packet::Connect {
                client_id,
                keep_alive,
                clean_session,
            } => {
                put_string(&mut body, PROTOCOL_NAME)?;
                body.push(PROTOCOL_LEVEL);
                body.push(if *clean_session { 0b0000_0010 } else { 0 });
                body.extend_from_slice(&keep_alive.to_be_bytes());
                put_string(&mut body, client_id)?;
                CONNECT << 4
            }
            Packet::ConnAck {
                session_present,
                return_code,
            } => {
                body.push(u8::from(*session_present));
                body.push(*return_code);
                CONNACK << 4
            }
            Packet::Publish {
                topic,
                payload,
                qos,
                packet_id,
                retain,
            } => {
                if *qos > 2 {
                    return Err(CodecError::InvalidFlags {
                        packet_type: PUBLISH,
                        flags: qos << 1,
                    });
                }
                put_string(&mut body, topic)?;
                if *qos > 0 {
                    body.extend_from_slice(&packet_id.unwrap_or(0).to_be_bytes());
                }
                body.extend_from_slice(payload);
                (PUBLISH << 4) | (qos << 1) | u8::from(*retain)
            }
            Packet::Subscribe {
                packet_id,
                topic,
                qos,
            } => {
                body.extend_from_slice(&packet_id.to_be_bytes());
                put_string(&mut body, topic)?;
                body.push(*qos);
                (SUBSCRIBE << 4) | 0b0010
            }
            Packet::SubAck {
                packet_id,
                return_codes,
            } => {
                body.extend_from_slice(&packet_id.to_be_bytes());
                body.extend_from_slice(return_codes);
                SUBACK << 4
            }
            Packet::Unsubscribe { packet_id, topic } => {
                body.extend_from_slice(&packet_id.to_be_bytes());
                put_string(&mut body, topic)?;
                (UNSUBSCRIBE << 4) | 0b0010
            }
            Packet::UnsubAck { packet_id } => {
                body.extend_from_slice(&packet_id.to_be_bytes());
                UNSUBACK << 4
            }
            Packet::PingReq => PINGREQ << 4,
            Packet::PingResp => PINGRESP << 4,
            Packet::Disconnect => DISCONNECT << 4,
        };

        let mut out = Vec::with_capacity(body.len() + 5);
        out.push(header);
        put_remaining_length(&mut out, body.len())?;
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decodes one packet from the front of `buf`.
    ///
    /// Returns `Ok(None)` when `buf` does not yet hold a whole packet, and
    /// otherwise the packet together with the number of bytes it used.
    pub fn decode(buf: &[u8]) -> Result<Option<(Packet, usize)>, CodecError> {
        let Some(&first) = buf.first() else {
            return Ok(None);
        };
        let Some((len, len_bytes)) = remaining_length(&buf[1..])? else {
            return Ok(None);
        };
        let total = 1 + len_bytes + len;
        if buf.len() < total {
            return Ok(None);
        }

        let body = &buf[1 + len_bytes..total];
        let packet = parse(first >> 4, first & 0x0f, body)?;
        Ok(Some((packet, total)))
    }
}

/// Accumulates bytes from the wire and hands out whole packets.
#[derive(Debug, Default)]
pub struct PacketReader {
    buf: Vec<u8>,
}

impl PacketReader {
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn next_packet(&mut self) -> Result<Option<Packet>, CodecError> {
        match Packet::decode(&self.buf)? {
            Some((packet, used)) => {
                self.buf.drain(..used);
                Ok(Some(packet))
            }
            None => Ok(None),
        }
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

fn parse(packet_type: u8, flags: u8, body: &[u8]) -> Result<Packet, CodecError> {
    let expect_flags = |expected: u8| {
        if flags == expected {
            Ok(())
        } else {
            Err(CodecError::InvalidFlags { packet_type, flags })
        }
    };
    let mut cursor = Cursor::new(body);

    let packet = match packet_type {
        CONNECT => {
            expect_flags(0)?;
            let _protocol = cursor.string()?;
            let _level = cursor.u8()?;
            let connect_flags = cursor.u8()?;
            let keep_alive = cursor.u16()?;
            let client_id = cursor.string()?;
            Packet::Connect {
                client_id,
                keep_alive,
                clean_session: connect_flags & 0b0000_0010 != 0,
            }
        }
        CONNACK => {
            expect_flags(0)?;
            let ack_flags = cursor.u8()?;
            let return_code = cursor.u8()?;
            Packet::ConnAck {
                session_present: ack_flags & 1 == 1,
                return_code,
            }
        }
        PUBLISH => {
            let qos = (flags >> 1) & 0b11;
            if qos == 3 {
                return Err(CodecError::InvalidFlags { packet_type, flags });
            }
            let topic = cursor.string()?;
            let packet_id = if qos > 0 { Some(cursor.u16()?) } else { None };
            Packet::Publish {
                topic,
                payload: cursor.rest().to_vec(),
                qos,
                packet_id,
                retain: flags & 1 == 1,
            }
        }
        SUBSCRIBE => {
            expect_flags(0b0010)?;
            let packet_id = cursor.u16()?;
            let topic = cursor.string()?;
            let qos = cursor.u8()?;
            Packet::Subscribe {
                packet_id,
                topic,
                qos,
            }
        }
        SUBACK => {
            expect_flags(0)?;
            let packet_id = cursor.u16()?;
            Packet::SubAck {
                packet_id,
                return_codes: cursor.rest().to_vec(),
            }
        }
        UNSUBSCRIBE => {
            expect_flags(0b0010)?;
            let packet_id = cursor.u16()?;
            let topic = cursor.string()?;
            Packet::Unsubscribe { packet_id, topic }
        }
        UNSUBACK => {
            expect_flags(0)?;
            Packet::UnsubAck {
                packet_id: cursor.u16()?,
            }
        }
        PINGREQ => {
            expect_flags(0)?;
            Packet::PingReq
        }
        PINGRESP => {
            expect_flags(0)?;
            Packet::PingResp
        }
        DISCONNECT => {
            expect_flags(0)?;
            Packet::Disconnect
        }
        other => return Err(CodecError::UnknownPacket(other)),
    };
    Ok(packet)
}

fn put_string(out: &mut Vec<u8>, value: &str) -> Result<(), CodecError> {
    let len = u16::try_from(value.len()).map_err(|_| CodecError::StringTooLong)?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

fn put_remaining_length(out: &mut Vec<u8>, mut len: usize) -> Result<(), CodecError> {
    if len > MAX_REMAINING_LENGTH {
        return Err(CodecError::PacketTooLarge);
    }
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            return Ok(());
        }
    }
}

/// Reads the variable-length remaining-length field.
/// Returns the value and the number of bytes it occupied.
fn remaining_length(buf: &[u8]) -> Result<Option<(usize, usize)>, CodecError> {
    let mut value = 0usize;
    let mut multiplier = 1usize;
    for (i, byte) in buf.iter().take(4).enumerate() {
        value += usize::from(byte & 0x7f) * multiplier;
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
        multiplier *= 128;
    }
    if buf.len() >= 4 {
        Err(CodecError::MalformedLength)
    } else {
        Ok(None)
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(n).ok_or(CodecError::Truncated)?;
        let buf = self.buf;
        let bytes = buf.get(self.pos..end).ok_or(CodecError::Truncated)?;
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let len = usize::from(self.u16()?);
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    fn rest(&mut self) -> &'a [u8] {
        let buf = self.buf;
        let rest = &buf[self.pos..];
        self.pos = self.buf.len();
        rest
    }
}
