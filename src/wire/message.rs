//! The tagged-sum wire message and its compact binary encoding.
//!
//! The original protocol this overlay descends from represents every
//! message as a dynamic, integer-keyed map of mixed-type values. Per the
//! design decision to stay wire-semantics-compatible without dynamic
//! typing, each message here is a fixed-field enum variant; encoding is a
//! small hand-rolled binary format rather than a dynamic map codec, since
//! the field set per message type is now known at compile time.

use sha2::{Digest, Sha256};

use crate::config::NETWORK_ID;
use crate::domain::entities::PeerAddr;
use crate::domain::{NodeId, PeerRecord};
use crate::error::WireError;

pub type RpcId = [u8; 32];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Ping { peer_id: NodeId, rpc_id: Option<RpcId> },
    Pong { peer_id: NodeId, rpc_id: Option<RpcId>, all_addr: PeerRecord, cli_addr: PeerRecord },
    FindNode { peer_id: NodeId, rpc_id: RpcId, target: NodeId },
    FindValue { peer_id: NodeId, rpc_id: RpcId, target: NodeId },
    FoundNodes { peer_id: NodeId, rpc_id: RpcId, nodes: Vec<PeerRecord> },
    FoundValue { peer_id: NodeId, rpc_id: RpcId, value: Vec<u8> },
    Store { peer_id: NodeId, key: NodeId, value: Vec<u8> },
    FwPing { peer_id: NodeId },
    FwPong { peer_id: NodeId, id: NodeId },
}

const TAG_PING: u8 = 0;
const TAG_PONG: u8 = 1;
const TAG_FIND_NODE: u8 = 2;
const TAG_FIND_VALUE: u8 = 3;
const TAG_FOUND_NODES: u8 = 4;
const TAG_FOUND_VALUE: u8 = 5;
const TAG_STORE: u8 = 6;
const TAG_FW_PING: u8 = 15;
const TAG_FW_PONG: u8 = 16;

/// `H(sender_id ∥ shared_network_id)` — included in every message as a
/// segregation gate; see §9's `hashed_rpc_id` design note for the related
/// (but distinct) RPC-correlation hash.
pub fn network_gate(peer_id: &NodeId) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(peer_id.as_bytes());
    hasher.update(NETWORK_ID);
    hasher.finalize().into()
}

/// `H(rpc_id ∥ network_id)`, the `RpcState` table key.
pub fn hashed_rpc_id(rpc_id: &RpcId) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(rpc_id);
    hasher.update(NETWORK_ID);
    hasher.finalize().into()
}

impl Message {
    pub fn peer_id(&self) -> &NodeId {
        match self {
            Message::Ping { peer_id, .. }
            | Message::Pong { peer_id, .. }
            | Message::FindNode { peer_id, .. }
            | Message::FindValue { peer_id, .. }
            | Message::FoundNodes { peer_id, .. }
            | Message::FoundValue { peer_id, .. }
            | Message::Store { peer_id, .. }
            | Message::FwPing { peer_id }
            | Message::FwPong { peer_id, .. } => peer_id,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);
        let gate = network_gate(self.peer_id());
        match self {
            Message::Ping { peer_id, rpc_id } => {
                buf.push(TAG_PING);
                buf.extend_from_slice(&gate);
                buf.extend_from_slice(peer_id.as_bytes());
                put_optional_rpc_id(&mut buf, rpc_id);
            }
            Message::Pong { peer_id, rpc_id, all_addr, cli_addr } => {
                buf.push(TAG_PONG);
                buf.extend_from_slice(&gate);
                buf.extend_from_slice(peer_id.as_bytes());
                put_optional_rpc_id(&mut buf, rpc_id);
                put_peer_record(&mut buf, all_addr);
                put_peer_record(&mut buf, cli_addr);
            }
            Message::FindNode { peer_id, rpc_id, target } => {
                buf.push(TAG_FIND_NODE);
                buf.extend_from_slice(&gate);
                buf.extend_from_slice(peer_id.as_bytes());
                buf.extend_from_slice(rpc_id);
                buf.extend_from_slice(target.as_bytes());
            }
            Message::FindValue { peer_id, rpc_id, target } => {
                buf.push(TAG_FIND_VALUE);
                buf.extend_from_slice(&gate);
                buf.extend_from_slice(peer_id.as_bytes());
                buf.extend_from_slice(rpc_id);
                buf.extend_from_slice(target.as_bytes());
            }
            Message::FoundNodes { peer_id, rpc_id, nodes } => {
                buf.push(TAG_FOUND_NODES);
                buf.extend_from_slice(&gate);
                buf.extend_from_slice(peer_id.as_bytes());
                buf.extend_from_slice(rpc_id);
                buf.extend_from_slice(&(nodes.len() as u16).to_be_bytes());
                for node in nodes {
                    put_peer_record(&mut buf, node);
                }
            }
            Message::FoundValue { peer_id, rpc_id, value } => {
                buf.push(TAG_FOUND_VALUE);
                buf.extend_from_slice(&gate);
                buf.extend_from_slice(peer_id.as_bytes());
                buf.extend_from_slice(rpc_id);
                buf.extend_from_slice(&(value.len() as u32).to_be_bytes());
                buf.extend_from_slice(value);
            }
            Message::Store { peer_id, key, value } => {
                buf.push(TAG_STORE);
                buf.extend_from_slice(&gate);
                buf.extend_from_slice(peer_id.as_bytes());
                buf.extend_from_slice(key.as_bytes());
                buf.extend_from_slice(&(value.len() as u32).to_be_bytes());
                buf.extend_from_slice(value);
            }
            Message::FwPing { peer_id } => {
                buf.push(TAG_FW_PING);
                buf.extend_from_slice(&gate);
                buf.extend_from_slice(peer_id.as_bytes());
            }
            Message::FwPong { peer_id, id } => {
                buf.push(TAG_FW_PONG);
                buf.extend_from_slice(&gate);
                buf.extend_from_slice(peer_id.as_bytes());
                buf.extend_from_slice(id.as_bytes());
            }
        }
        buf
    }

    /// Decodes a message, validating the network gate and every known
    /// field's typed length per §4.7. An unknown tag or a failed typed
    /// check is reported as `BadMessage`; the caller drops silently and
    /// does not update the routing table for this message.
    pub fn decode(bytes: &[u8]) -> Result<Message, WireError> {
        let mut cur = Cursor::new(bytes);
        let tag = cur.take_u8()?;
        let gate = cur.take_array::<32>()?;
        let peer_id = NodeId::new(cur.take_array::<32>()?);
        if gate != network_gate(&peer_id) {
            return Err(WireError::BadMessage("network gate mismatch"));
        }

        let message = match tag {
            TAG_PING => Message::Ping { peer_id, rpc_id: take_optional_rpc_id(&mut cur)? },
            TAG_PONG => {
                let rpc_id = take_optional_rpc_id(&mut cur)?;
                let all_addr = take_peer_record(&mut cur)?;
                let cli_addr = take_peer_record(&mut cur)?;
                Message::Pong { peer_id, rpc_id, all_addr, cli_addr }
            }
            TAG_FIND_NODE => {
                let rpc_id = cur.take_array::<32>()?;
                let target = NodeId::new(cur.take_array::<32>()?);
                Message::FindNode { peer_id, rpc_id, target }
            }
            TAG_FIND_VALUE => {
                let rpc_id = cur.take_array::<32>()?;
                let target = NodeId::new(cur.take_array::<32>()?);
                Message::FindValue { peer_id, rpc_id, target }
            }
            TAG_FOUND_NODES => {
                let rpc_id = cur.take_array::<32>()?;
                let count = cur.take_u16()? as usize;
                let mut nodes = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    nodes.push(take_peer_record(&mut cur)?);
                }
                Message::FoundNodes { peer_id, rpc_id, nodes }
            }
            TAG_FOUND_VALUE => {
                let rpc_id = cur.take_array::<32>()?;
                let len = cur.take_u32()? as usize;
                let value = cur.take_bytes(len)?.to_vec();
                Message::FoundValue { peer_id, rpc_id, value }
            }
            TAG_STORE => {
                let key = NodeId::new(cur.take_array::<32>()?);
                let len = cur.take_u32()? as usize;
                let value = cur.take_bytes(len)?.to_vec();
                Message::Store { peer_id, key, value }
            }
            TAG_FW_PING => Message::FwPing { peer_id },
            TAG_FW_PONG => {
                let id = NodeId::new(cur.take_array::<32>()?);
                Message::FwPong { peer_id, id }
            }
            _ => return Err(WireError::BadMessage("unknown message type")),
        };
        Ok(message)
    }
}

fn put_optional_rpc_id(buf: &mut Vec<u8>, rpc_id: &Option<RpcId>) {
    match rpc_id {
        Some(id) => {
            buf.push(1);
            buf.extend_from_slice(id);
        }
        None => buf.push(0),
    }
}

fn take_optional_rpc_id(cur: &mut Cursor) -> Result<Option<RpcId>, WireError> {
    match cur.take_u8()? {
        0 => Ok(None),
        1 => Ok(Some(cur.take_array::<32>()?)),
        _ => Err(WireError::BadMessage("invalid rpc_id presence flag")),
    }
}

fn put_peer_record(buf: &mut Vec<u8>, record: &PeerRecord) {
    buf.extend_from_slice(&record.port.to_be_bytes());
    buf.extend_from_slice(record.id.as_bytes());
    match record.addr.v4 {
        Some(v4) => {
            buf.push(1);
            buf.extend_from_slice(&v4);
        }
        None => buf.push(0),
    }
    match record.addr.v6 {
        Some(v6) => {
            buf.push(1);
            buf.extend_from_slice(&v6);
        }
        None => buf.push(0),
    }
    buf.push(record.well_connected as u8);
}

fn take_peer_record(cur: &mut Cursor) -> Result<PeerRecord, WireError> {
    let port = cur.take_u16()?;
    if port < 1024 {
        return Err(WireError::BadMessage("port below 1024"));
    }
    let id = NodeId::new(cur.take_array::<32>()?);
    let v4 = match cur.take_u8()? {
        0 => None,
        1 => Some(cur.take_array::<4>()?),
        _ => return Err(WireError::BadMessage("invalid v4 presence flag")),
    };
    let v6 = match cur.take_u8()? {
        0 => None,
        1 => Some(cur.take_array::<16>()?),
        _ => return Err(WireError::BadMessage("invalid v6 presence flag")),
    };
    let well_connected = match cur.take_u8()? {
        0 => false,
        1 => true,
        _ => return Err(WireError::BadMessage("invalid well_connected flag")),
    };
    let addr = PeerAddr { v4, v6 };
    if addr.is_empty() {
        return Err(WireError::BadMessage("peer record has neither v4 nor v6 address"));
    }
    Ok(PeerRecord { port, id, addr, well_connected })
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take_bytes(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.pos + n > self.bytes.len() {
            return Err(WireError::BadMessage("truncated message"));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let slice = self.take_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn take_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take_bytes(1)?[0])
    }

    fn take_u16(&mut self) -> Result<u16, WireError> {
        Ok(u16::from_be_bytes(self.take_array::<2>()?))
    }

    fn take_u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_be_bytes(self.take_array::<4>()?))
    }
}
