//! Binary protocol spoken between clients and the service.
//!
//! ## Request
//!
//! | Offset | Content                                   |
//! |--------|-------------------------------------------|
//! | 0-3    | magic `b"SENS"`                           |
//! | 4-n    | sensor identifier, UTF-8                  |
//! | n+1    | `0x00` terminator                         |
//!
//! ## Response
//!
//! | Offset | Content                                               |
//! |--------|-------------------------------------------------------|
//! | 0-3    | status code, big endian `u32`                         |
//! | 4-7    | `f32` value in native byte order, only for `Success`  |
//!
//! Every request is answered by exactly one response; there is no pipelining.

use thiserror::Error;

pub const MAGIC: [u8; 4] = *b"SENS";

/// Largest request the server reads in one go.
pub const MAX_REQUEST_LEN: usize = 1024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("message too short: {0} bytes")]
    Truncated(usize),

    #[error("invalid magic bytes {0:02x?}")]
    BadMagic([u8; 4]),

    #[error("sensor identifier is not zero terminated")]
    MissingTerminator,

    #[error("sensor identifier contains a zero byte")]
    EmbeddedZero,

    #[error("sensor identifier is not valid UTF-8")]
    InvalidUtf8,

    #[error("{0} unexpected bytes after the message")]
    TrailingBytes(usize),

    #[error("unknown response code {0}")]
    UnknownCode(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ResponseCode {
    Success = 0,
    InvalidRequest = 1,
    SensorNotFound = 2,
    SensorNotMonitored = 3,
    SensorFailed = 4,
}

impl TryFrom<u32> for ResponseCode {
    type Error = ProtocolError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ResponseCode::Success),
            1 => Ok(ResponseCode::InvalidRequest),
            2 => Ok(ResponseCode::SensorNotFound),
            3 => Ok(ResponseCode::SensorNotMonitored),
            4 => Ok(ResponseCode::SensorFailed),
            other => Err(ProtocolError::UnknownCode(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorRequest {
    pub sensor_id: String,
}

impl SensorRequest {
    pub fn new(sensor_id: impl Into<String>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        if self.sensor_id.as_bytes().contains(&0) {
            return Err(ProtocolError::EmbeddedZero);
        }
        let mut out = Vec::with_capacity(MAGIC.len() + self.sensor_id.len() + 1);
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(self.sensor_id.as_bytes());
        out.push(0);
        Ok(out)
    }

    /// Decodes one complete request. The magic is checked before the
    /// identifier is looked at.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < MAGIC.len() {
            return Err(ProtocolError::Truncated(bytes.len()));
        }
        let (magic, rest) = bytes.split_at(MAGIC.len());
        if magic != MAGIC {
            return Err(ProtocolError::BadMagic([magic[0], magic[1], magic[2], magic[3]]));
        }

        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ProtocolError::MissingTerminator)?;
        let trailing = rest.len() - end - 1;
        if trailing > 0 {
            return Err(ProtocolError::TrailingBytes(trailing));
        }

        let sensor_id = std::str::from_utf8(&rest[..end]).map_err(|_| ProtocolError::InvalidUtf8)?;
        Ok(Self::new(sensor_id))
    }
}

/// Answer to one [`SensorRequest`]; only `Success` carries a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorResponse {
    Success(f32),
    InvalidRequest,
    SensorNotFound,
    SensorNotMonitored,
    SensorFailed,
}

impl SensorResponse {
    pub const HEADER_LEN: usize = 4;
    pub const VALUE_LEN: usize = 4;

    pub fn code(&self) -> ResponseCode {
        match self {
            SensorResponse::Success(_) => ResponseCode::Success,
            SensorResponse::InvalidRequest => ResponseCode::InvalidRequest,
            SensorResponse::SensorNotFound => ResponseCode::SensorNotFound,
            SensorResponse::SensorNotMonitored => ResponseCode::SensorNotMonitored,
            SensorResponse::SensorFailed => ResponseCode::SensorFailed,
        }
    }

    pub fn value(&self) -> Option<f32> {
        match self {
            SensorResponse::Success(value) => Some(*value),
            _ => None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::HEADER_LEN + Self::VALUE_LEN);
        out.extend_from_slice(&(self.code() as u32).to_be_bytes());
        if let SensorResponse::Success(value) = self {
            out.extend_from_slice(&value.to_ne_bytes());
        }
        out
    }

    /// Decodes the status header and, for `Success` only, the value that follows.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let header: [u8; Self::HEADER_LEN] = bytes
            .get(..Self::HEADER_LEN)
            .and_then(|h| h.try_into().ok())
            .ok_or(ProtocolError::Truncated(bytes.len()))?;
        let code = ResponseCode::try_from(u32::from_be_bytes(header))?;

        let expected = Self::body_len(code) + Self::HEADER_LEN;
        if bytes.len() < expected {
            return Err(ProtocolError::Truncated(bytes.len()));
        }
        if bytes.len() > expected {
            return Err(ProtocolError::TrailingBytes(bytes.len() - expected));
        }

        Ok(match code {
            ResponseCode::Success => {
                let mut value = [0u8; Self::VALUE_LEN];
                value.copy_from_slice(&bytes[Self::HEADER_LEN..expected]);
                SensorResponse::Success(f32::from_ne_bytes(value))
            }
            ResponseCode::InvalidRequest => SensorResponse::InvalidRequest,
            ResponseCode::SensorNotFound => SensorResponse::SensorNotFound,
            ResponseCode::SensorNotMonitored => SensorResponse::SensorNotMonitored,
            ResponseCode::SensorFailed => SensorResponse::SensorFailed,
        })
    }

    /// Number of bytes following the header for a given code.
    pub fn body_len(code: ResponseCode) -> usize {
        match code {
            ResponseCode::Success => Self::VALUE_LEN,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_layout() {
        let bytes = SensorRequest::new("cputemp").encode().unwrap();
        assert_eq!(bytes, b"SENScputemp\0");
        assert_eq!(SensorRequest::decode(&bytes).unwrap().sensor_id, "cputemp");
    }

    #[test]
    fn test_request_bad_magic_checked_first() {
        // The identifier is also malformed; the magic mismatch must win.
        let err = SensorRequest::decode(b"SENXcputemp").unwrap_err();
        assert_eq!(err, ProtocolError::BadMagic(*b"SENX"));
    }

    #[test]
    fn test_request_structural_errors() {
        assert_eq!(SensorRequest::decode(b"SE"), Err(ProtocolError::Truncated(2)));
        assert_eq!(
            SensorRequest::decode(b"SENScputemp"),
            Err(ProtocolError::MissingTerminator)
        );
        assert_eq!(
            SensorRequest::decode(b"SENSa\0b\0"),
            Err(ProtocolError::TrailingBytes(2))
        );
        assert_eq!(
            SensorRequest::decode(b"SENS\xff\xfe\0"),
            Err(ProtocolError::InvalidUtf8)
        );
        assert_eq!(
            SensorRequest::new("a\0b").encode(),
            Err(ProtocolError::EmbeddedZero)
        );
    }

    #[test]
    fn test_empty_identifier_is_well_formed() {
        assert_eq!(SensorRequest::decode(b"SENS\0").unwrap().sensor_id, "");
    }

    #[test]
    fn test_success_response() {
        let bytes = SensorResponse::Success(42.5).encode();
        assert_eq!(&bytes[..4], &[0, 0, 0, 0]);
        assert_eq!(&bytes[4..], &42.5f32.to_ne_bytes());

        let decoded = SensorResponse::decode(&bytes).unwrap();
        assert_eq!(decoded.code(), ResponseCode::Success);
        assert_eq!(decoded.value(), Some(42.5));
    }

    #[test]
    fn test_status_only_response() {
        let bytes = SensorResponse::SensorNotFound.encode();
        assert_eq!(bytes, vec![0, 0, 0, 2]);

        let decoded = SensorResponse::decode(&bytes).unwrap();
        assert_eq!(decoded.code(), ResponseCode::SensorNotFound);
        assert_eq!(decoded.value(), None);
    }

    #[test]
    fn test_codes_are_big_endian() {
        assert_eq!(SensorResponse::InvalidRequest.encode(), vec![0, 0, 0, 1]);
        assert_eq!(SensorResponse::SensorNotMonitored.encode(), vec![0, 0, 0, 3]);
        assert_eq!(SensorResponse::SensorFailed.encode(), vec![0, 0, 0, 4]);
    }

    #[test]
    fn test_response_decode_errors() {
        assert_eq!(SensorResponse::decode(&[0, 0]), Err(ProtocolError::Truncated(2)));
        assert_eq!(
            SensorResponse::decode(&[0, 0, 0, 0, 1]),
            Err(ProtocolError::Truncated(5))
        );
        assert_eq!(
            SensorResponse::decode(&[0, 0, 0, 9]),
            Err(ProtocolError::UnknownCode(9))
        );
        assert_eq!(
            SensorResponse::decode(&[0, 0, 0, 2, 0, 0, 0, 0]),
            Err(ProtocolError::TrailingBytes(4))
        );
    }
}
