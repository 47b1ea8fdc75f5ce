//! Typed decoding and encoding of node frames.
//!
//! `decode` turns raw bytes into a closed [`Message`] tree; every byte value
//! outside the wire enums becomes a [`ProtocolError`]. The encoders produce
//! the frames the node itself emits.

use serde::de::DeserializeOwned;
use serde::Serialize;
use shard_messages::{
    BlockMessageType, ControlMessageType, IdentityAction, IdentityMessageType, MessageCategory,
    NodeMessageType, PingMessage, PongMessage, TransactionMessageType,
};
use shard_types::{Block, Transaction, TxHash};

use crate::frame::{assemble, Frame};
use crate::ProtocolError;

/// A fully decoded frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Identity(IdentityMessage),
    /// Bytes after the category byte, handed to consensus unchanged.
    Consensus(Vec<u8>),
    /// Bytes after the category byte, handed to the beacon unchanged.
    Beacon(Vec<u8>),
    Node(NodeMessage),
}

impl Message {
    /// Short route name for logs and spans.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Identity(_) => "identity",
            Message::Consensus(_) => "consensus",
            Message::Beacon(_) => "beacon",
            Message::Node(node) => node.kind(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityMessage {
    pub action: IdentityAction,
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeMessage {
    Transaction(TransactionMessage),
    Block(BlockMessage),
    Control(ControlMessage),
    Ping(PingMessage),
    Pong(PongMessage),
}

impl NodeMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeMessage::Transaction(TransactionMessage::Send(_)) => "tx_send",
            NodeMessage::Transaction(TransactionMessage::Request(_)) => "tx_request",
            NodeMessage::Block(BlockMessage::Sync(_)) => "block_sync",
            NodeMessage::Control(ControlMessage::Stop) => "control_stop",
            NodeMessage::Ping(_) => "ping",
            NodeMessage::Pong(_) => "pong",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionMessage {
    Send(Vec<Transaction>),
    Request(Vec<TxHash>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockMessage {
    Sync(Vec<Block>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlMessage {
    Stop,
}

/// Decode a raw frame into a typed message.
pub fn decode(bytes: &[u8]) -> Result<Message, ProtocolError> {
    let frame = Frame::parse(bytes)?;
    match frame.category {
        MessageCategory::Consensus => Ok(Message::Consensus(frame.nested().to_vec())),
        MessageCategory::Beacon => Ok(Message::Beacon(frame.nested().to_vec())),
        MessageCategory::Identity => decode_identity(&frame).map(Message::Identity),
        MessageCategory::Node => decode_node(&frame).map(Message::Node),
    }
}

fn decode_identity(frame: &Frame<'_>) -> Result<IdentityMessage, ProtocolError> {
    IdentityMessageType::from_byte(frame.msg_type).ok_or(ProtocolError::UnknownType {
        category: MessageCategory::Identity,
        byte: frame.msg_type,
    })?;
    let (sub, rest) = frame.sub_typed("identity")?;
    let action = IdentityAction::from_byte(sub).ok_or(ProtocolError::UnknownSubType {
        context: "identity",
        byte: sub,
    })?;
    Ok(IdentityMessage {
        action,
        payload: rest.to_vec(),
    })
}

fn decode_node(frame: &Frame<'_>) -> Result<NodeMessage, ProtocolError> {
    let msg_type = NodeMessageType::from_byte(frame.msg_type).ok_or(ProtocolError::UnknownType {
        category: MessageCategory::Node,
        byte: frame.msg_type,
    })?;

    match msg_type {
        NodeMessageType::Transaction => {
            let (sub, rest) = frame.sub_typed("transaction")?;
            match TransactionMessageType::from_byte(sub) {
                Some(TransactionMessageType::Send) => Ok(NodeMessage::Transaction(
                    TransactionMessage::Send(deserialize("transaction send", rest)?),
                )),
                Some(TransactionMessageType::Request) => Ok(NodeMessage::Transaction(
                    TransactionMessage::Request(split_hashes(rest)),
                )),
                None => Err(ProtocolError::UnknownSubType {
                    context: "transaction",
                    byte: sub,
                }),
            }
        }
        NodeMessageType::Block => {
            let (sub, rest) = frame.sub_typed("block")?;
            match BlockMessageType::from_byte(sub) {
                Some(BlockMessageType::Sync) => Ok(NodeMessage::Block(BlockMessage::Sync(
                    deserialize("block sync", rest)?,
                ))),
                None => Err(ProtocolError::UnknownSubType {
                    context: "block",
                    byte: sub,
                }),
            }
        }
        NodeMessageType::Control => {
            let (sub, _) = frame.sub_typed("control")?;
            match ControlMessageType::from_byte(sub) {
                Some(ControlMessageType::Stop) => Ok(NodeMessage::Control(ControlMessage::Stop)),
                None => Err(ProtocolError::UnknownSubType {
                    context: "control",
                    byte: sub,
                }),
            }
        }
        NodeMessageType::Ping => Ok(NodeMessage::Ping(deserialize("ping", frame.payload())?)),
        NodeMessageType::Pong => Ok(NodeMessage::Pong(deserialize("pong", frame.payload())?)),
    }
}

/// Flat list of 32-byte hashes. A trailing partial chunk is ignored.
fn split_hashes(bytes: &[u8]) -> Vec<TxHash> {
    bytes
        .chunks_exact(TxHash::LEN)
        .filter_map(|chunk| TxHash::from_slice(chunk).ok())
        .collect()
}

fn deserialize<T: DeserializeOwned>(context: &'static str, bytes: &[u8]) -> Result<T, ProtocolError> {
    if bytes.is_empty() {
        return Err(ProtocolError::Malformed {
            context,
            reason: "empty payload".into(),
        });
    }
    bincode::deserialize(bytes).map_err(|e| ProtocolError::Malformed {
        context,
        reason: e.to_string(),
    })
}

fn serialize<T: Serialize + ?Sized>(context: &'static str, value: &T) -> Result<Vec<u8>, ProtocolError> {
    bincode::serialize(value).map_err(|e| ProtocolError::Malformed {
        context,
        reason: e.to_string(),
    })
}

fn node_frame(msg_type: NodeMessageType, sub: Option<u8>, body: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(body.len() + 1);
    payload.extend(sub);
    payload.extend_from_slice(body);
    assemble(MessageCategory::Node, msg_type.to_byte(), &payload)
}

/// `Node/Transaction/Send` carrying the given transactions.
pub fn encode_transactions(txs: &[Transaction]) -> Result<Vec<u8>, ProtocolError> {
    let body = serialize("transaction send", txs)?;
    Ok(node_frame(
        NodeMessageType::Transaction,
        Some(TransactionMessageType::Send.to_byte()),
        &body,
    ))
}

/// `Node/Transaction/Request` asking for the given hashes.
pub fn encode_transaction_request(hashes: &[TxHash]) -> Vec<u8> {
    let body: Vec<u8> = hashes.iter().flat_map(|h| *h.as_bytes()).collect();
    node_frame(
        NodeMessageType::Transaction,
        Some(TransactionMessageType::Request.to_byte()),
        &body,
    )
}

/// `Node/Block/Sync` carrying the given blocks.
pub fn encode_block_sync(blocks: &[Block]) -> Result<Vec<u8>, ProtocolError> {
    let body = serialize("block sync", blocks)?;
    Ok(node_frame(
        NodeMessageType::Block,
        Some(BlockMessageType::Sync.to_byte()),
        &body,
    ))
}

/// `Node/Control/Stop`.
pub fn encode_stop() -> Vec<u8> {
    node_frame(
        NodeMessageType::Control,
        Some(ControlMessageType::Stop.to_byte()),
        &[],
    )
}

pub fn encode_ping(ping: &PingMessage) -> Result<Vec<u8>, ProtocolError> {
    let body = serialize("ping", ping)?;
    Ok(node_frame(NodeMessageType::Ping, None, &body))
}

pub fn encode_pong(pong: &PongMessage) -> Result<Vec<u8>, ProtocolError> {
    let body = serialize("pong", pong)?;
    Ok(node_frame(NodeMessageType::Pong, None, &body))
}

/// `Identity/Identity/Register` with an opaque registration payload.
pub fn encode_identity_register(payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + 1);
    body.push(IdentityAction::Register.to_byte());
    body.extend_from_slice(payload);
    assemble(
        MessageCategory::Identity,
        IdentityMessageType::Identity.to_byte(),
        &body,
    )
}

/// Wrap a consensus message (which starts with its own type byte).
pub fn encode_consensus(inner: &[u8]) -> Vec<u8> {
    wrap(MessageCategory::Consensus, inner)
}

/// Wrap a beacon message (which starts with its own type byte).
pub fn encode_beacon(inner: &[u8]) -> Vec<u8> {
    wrap(MessageCategory::Beacon, inner)
}

fn wrap(category: MessageCategory, inner: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(inner.len() + 1);
    out.push(category.to_byte());
    out.extend_from_slice(inner);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use shard_types::{Address, BlockHeader, Peer, PeerRole, PublicKey};

    fn sample_tx(nonce: u64) -> Transaction {
        Transaction {
            nonce,
            shard_id: 0,
            from: Address::new([1; 20]),
            to: Some(Address::new([2; 20])),
            value: 1_000,
            gas_limit: 21_000,
            data: vec![],
        }
    }

    #[test]
    fn consensus_payload_keeps_its_type_byte() {
        let bytes = encode_consensus(&[7, 1, 2, 3]);
        assert_eq!(bytes, vec![0, 7, 1, 2, 3]);
        assert_eq!(decode(&bytes).unwrap(), Message::Consensus(vec![7, 1, 2, 3]));
    }

    #[test]
    fn beacon_payload_keeps_its_type_byte() {
        let bytes = encode_beacon(&[2, 9]);
        assert_eq!(decode(&bytes).unwrap(), Message::Beacon(vec![2, 9]));
    }

    #[test]
    fn transaction_send_decodes() {
        let txs = vec![sample_tx(1), sample_tx(2)];
        let bytes = encode_transactions(&txs).unwrap();
        assert_eq!(&bytes[..3], &[1, 0, 0]);
        assert_eq!(
            decode(&bytes).unwrap(),
            Message::Node(NodeMessage::Transaction(TransactionMessage::Send(txs)))
        );
    }

    #[test]
    fn transaction_request_ignores_partial_chunk() {
        let a = TxHash::new([0xAA; 32]);
        let b = TxHash::new([0xBB; 32]);
        let mut bytes = encode_transaction_request(&[a, b]);
        bytes.extend_from_slice(&[0xCC; 10]);
        assert_eq!(
            decode(&bytes).unwrap(),
            Message::Node(NodeMessage::Transaction(TransactionMessage::Request(vec![a, b])))
        );
    }

    #[test]
    fn block_sync_decodes() {
        let block = Block::new(BlockHeader::default(), vec![sample_tx(3)]);
        let bytes = encode_block_sync(std::slice::from_ref(&block)).unwrap();
        assert_eq!(
            decode(&bytes).unwrap(),
            Message::Node(NodeMessage::Block(BlockMessage::Sync(vec![block])))
        );
    }

    #[test]
    fn stop_is_three_bytes() {
        let bytes = encode_stop();
        assert_eq!(bytes, vec![1, 3, 0]);
        assert_eq!(
            decode(&bytes).unwrap(),
            Message::Node(NodeMessage::Control(ControlMessage::Stop))
        );
    }

    #[test]
    fn ping_and_pong_decode() {
        let peer = Peer::new("10.0.0.1", 9000)
            .with_peer_id("peer-a")
            .with_public_key(PublicKey([4; 32]))
            .with_role(PeerRole::Client);
        let ping = PingMessage::new(&peer);
        assert_eq!(
            decode(&encode_ping(&ping).unwrap()).unwrap(),
            Message::Node(NodeMessage::Ping(ping))
        );

        let pong = PongMessage::new(&[peer], &[PublicKey([5; 32])]);
        assert_eq!(
            decode(&encode_pong(&pong).unwrap()).unwrap(),
            Message::Node(NodeMessage::Pong(pong))
        );
    }

    #[test]
    fn identity_register_and_announce() {
        let bytes = encode_identity_register(b"hello");
        assert_eq!(
            decode(&bytes).unwrap(),
            Message::Identity(IdentityMessage {
                action: IdentityAction::Register,
                payload: b"hello".to_vec(),
            })
        );
        let announce = decode(&[4, 0, 1]).unwrap();
        assert!(matches!(
            announce,
            Message::Identity(IdentityMessage {
                action: IdentityAction::Announce,
                ..
            })
        ));
    }

    #[test]
    fn reserved_node_types_rejected() {
        for byte in [2u8, 4, 7, 0xFF] {
            assert_eq!(
                decode(&[1, byte, 0]),
                Err(ProtocolError::UnknownType {
                    category: MessageCategory::Node,
                    byte,
                })
            );
        }
    }

    #[test]
    fn missing_and_unknown_sub_types_rejected() {
        assert_eq!(decode(&[1, 0]), Err(ProtocolError::MissingSubType("transaction")));
        assert_eq!(decode(&[1, 1]), Err(ProtocolError::MissingSubType("block")));
        assert_eq!(decode(&[1, 3]), Err(ProtocolError::MissingSubType("control")));
        assert_eq!(
            decode(&[1, 0, 9]),
            Err(ProtocolError::UnknownSubType {
                context: "transaction",
                byte: 9
            })
        );
        assert_eq!(
            decode(&[4, 0, 5]),
            Err(ProtocolError::UnknownSubType {
                context: "identity",
                byte: 5
            })
        );
        assert!(matches!(decode(&[4, 1, 0]), Err(ProtocolError::UnknownType { .. })));
    }

    #[test]
    fn empty_ping_is_malformed() {
        assert!(matches!(
            decode(&[1, 5]),
            Err(ProtocolError::Malformed { context: "ping", .. })
        ));
        assert!(matches!(
            decode(&[1, 6, 0xFF, 0xFF]),
            Err(ProtocolError::Malformed { context: "pong", .. })
        ));
    }

    #[test]
    fn kinds_name_routes() {
        assert_eq!(decode(&encode_stop()).unwrap().kind(), "control_stop");
        assert_eq!(Message::Consensus(vec![]).kind(), "consensus");
    }
}
