//! Encrypted, chunked, fire-and-forget file transfer over UDP
//!
//! A sender encrypts the whole file under the pair's session key, frames it
//! (see [`packet`]), punches a hole, and sprays the frame out in fixed-size
//! datagrams. A receiver reassembles per source address, looks the sender up
//! among its trusted peers, and writes the plaintext to its inbox only if it
//! decrypts.

pub mod packet;
mod protocol;
mod reassembly;

pub use packet::{
    Frame, PacketError, PacketHeader, CHUNK_SIZE, FRAME_PREFIX_LEN, HEADER_FIELD_LEN,
    ID_FIELD_LEN, PUNCH_MARKER,
};
pub use protocol::{
    TransferConfig, TransferError, TransferProtocol, DEFAULT_PUNCH_DELAY, DEFAULT_TRANSFER_PORT,
};
pub use reassembly::{
    Reassembler, ReassemblyError, DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_PENDING,
    DEFAULT_REASSEMBLY_TIMEOUT,
};
