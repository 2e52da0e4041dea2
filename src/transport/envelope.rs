//! The transport-level message envelope (distinct from the DHT message
//! vocabulary in `wire::message`): carries an opaque payload plus the
//! addressing and correlation metadata the connection layer needs,
//! grounded in `lazymq/struct.py`'s `Message` and `Status`.

use crate::error::WireError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    BadMessage,
    HostNotReachable,
    ConnectionRefused,
    Timeout,
    Ping,
    Pong,
}

impl Status {
    fn to_u8(self) -> u8 {
        match self {
            Status::Success => 0,
            Status::BadMessage => 1,
            Status::HostNotReachable => 2,
            Status::ConnectionRefused => 3,
            Status::Timeout => 4,
            Status::Ping => 5,
            Status::Pong => 6,
        }
    }

    fn from_u8(b: u8) -> Result<Self, WireError> {
        Ok(match b {
            0 => Status::Success,
            1 => Status::BadMessage,
            2 => Status::HostNotReachable,
            3 => Status::ConnectionRefused,
            4 => Status::Timeout,
            5 => Status::Ping,
            6 => Status::Pong,
            _ => return Err(WireError::BadMessage("unknown transport status")),
        })
    }
}

/// One transport-level envelope. `data` carries the encoded `wire::Message`
/// payload for ordinary traffic, or a UTF-8 diagnostic string for
/// `status != Success` error replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub identity: [u8; 32],
    pub data: Vec<u8>,
    pub status: Status,
    pub port: u16,
    pub address_v4: Option<[u8; 4]>,
    pub address_v6: Option<[u8; 16]>,
}

impl Envelope {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64 + self.data.len());
        buf.extend_from_slice(&self.identity);
        buf.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.data);
        buf.push(self.status.to_u8());
        buf.extend_from_slice(&self.port.to_be_bytes());
        match self.address_v4 {
            Some(v4) => {
                buf.push(1);
                buf.extend_from_slice(&v4);
            }
            None => buf.push(0),
        }
        match self.address_v6 {
            Some(v6) => {
                buf.push(1);
                buf.extend_from_slice(&v6);
            }
            None => buf.push(0),
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Envelope, WireError> {
        if bytes.len() < 32 + 4 {
            return Err(WireError::BadMessage("envelope truncated before data length"));
        }
        let mut identity = [0u8; 32];
        identity.copy_from_slice(&bytes[0..32]);
        let data_len = u32::from_be_bytes(bytes[32..36].try_into().unwrap()) as usize;
        let mut pos = 36;
        if bytes.len() < pos + data_len {
            return Err(WireError::BadMessage("envelope truncated before data"));
        }
        let data = bytes[pos..pos + data_len].to_vec();
        pos += data_len;

        if bytes.len() < pos + 1 + 2 + 1 {
            return Err(WireError::BadMessage("envelope truncated before trailer"));
        }
        let status = Status::from_u8(bytes[pos])?;
        pos += 1;
        let port = u16::from_be_bytes(bytes[pos..pos + 2].try_into().unwrap());
        pos += 2;

        let address_v4 = match bytes[pos] {
            0 => {
                pos += 1;
                None
            }
            1 => {
                pos += 1;
                if bytes.len() < pos + 4 {
                    return Err(WireError::BadMessage("envelope truncated before v4 address"));
                }
                let mut v4 = [0u8; 4];
                v4.copy_from_slice(&bytes[pos..pos + 4]);
                pos += 4;
                Some(v4)
            }
            _ => return Err(WireError::BadMessage("invalid v4 presence flag")),
        };
        if bytes.len() < pos + 1 {
            return Err(WireError::BadMessage("envelope truncated before v6 presence flag"));
        }
        let address_v6 = match bytes[pos] {
            0 => None,
            1 => {
                pos += 1;
                if bytes.len() < pos + 16 {
                    return Err(WireError::BadMessage("envelope truncated before v6 address"));
                }
                let mut v6 = [0u8; 16];
                v6.copy_from_slice(&bytes[pos..pos + 16]);
                Some(v6)
            }
            _ => return Err(WireError::BadMessage("invalid v6 presence flag")),
        };

        Ok(Envelope { identity, data, status, port, address_v4, address_v6 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_round_trip_with_both_addresses() {
        let env = Envelope {
            identity: [7u8; 32],
            data: b"payload".to_vec(),
            status: Status::Success,
            port: 7339,
            address_v4: Some([1, 2, 3, 4]),
            address_v6: Some([9u8; 16]),
        };
        let decoded = Envelope::decode(&env.encode()).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn test_envelope_round_trip_with_no_addresses() {
        let env = Envelope {
            identity: [1u8; 32],
            data: Vec::new(),
            status: Status::Timeout,
            port: 1,
            address_v4: None,
            address_v6: None,
        };
        let decoded = Envelope::decode(&env.encode()).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn test_decode_rejects_truncated_bytes() {
        let err = Envelope::decode(&[0u8; 10]).unwrap_err();
        assert_eq!(err, WireError::BadMessage("envelope truncated before data length"));
    }
}
