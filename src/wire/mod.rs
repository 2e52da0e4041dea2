//! The wire protocol: message vocabulary (§6) and length-framing (§4.3).

pub mod frame;
pub mod message;

pub use frame::{read_frame, write_frame};
pub use message::{hashed_rpc_id, network_gate, Message, RpcId};

#[cfg(test)]
mod tests;
