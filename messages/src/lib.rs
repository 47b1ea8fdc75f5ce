//! Wire identifiers for node-to-node messages.
//!
//! A frame is `[category:1][type:1][payload:N]`. The enums below give every
//! byte value the node understands a name; anything else is rejected by the
//! codec in `shard-protocol`.

pub mod discovery;

pub use discovery::{PeerDescriptor, PingMessage, PongMessage};

/// Generates a `#[repr(u8)]` wire enum with `to_byte` / `from_byte`.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub fn to_byte(self) -> u8 {
                self as u8
            }

            pub fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

wire_enum! {
    /// First byte of every frame. `2` was the retired client category.
    MessageCategory {
        Consensus = 0,
        Node = 1,
        Beacon = 3,
        Identity = 4,
    }
}

wire_enum! {
    /// Second byte of a `Node` frame. `2` and `4` are retired.
    NodeMessageType {
        Transaction = 0,
        Block = 1,
        Control = 3,
        Ping = 5,
        Pong = 6,
    }
}

wire_enum! {
    /// First payload byte of a `Node/Transaction` frame.
    TransactionMessageType {
        Send = 0,
        Request = 1,
    }
}

wire_enum! {
    /// First payload byte of a `Node/Block` frame.
    BlockMessageType {
        Sync = 0,
    }
}

wire_enum! {
    /// First payload byte of a `Node/Control` frame.
    ControlMessageType {
        Stop = 0,
    }
}

wire_enum! {
    /// Second byte of an `Identity` frame.
    IdentityMessageType {
        Identity = 0,
    }
}

wire_enum! {
    /// First payload byte of an `Identity/Identity` frame.
    IdentityAction {
        Register = 0,
        Announce = 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retired_bytes_are_unknown() {
        assert_eq!(MessageCategory::from_byte(2), None);
        assert_eq!(NodeMessageType::from_byte(2), None);
        assert_eq!(NodeMessageType::from_byte(4), None);
        assert_eq!(NodeMessageType::from_byte(7), None);
    }

    #[test]
    fn bytes_map_back() {
        for category in [
            MessageCategory::Consensus,
            MessageCategory::Node,
            MessageCategory::Beacon,
            MessageCategory::Identity,
        ] {
            assert_eq!(MessageCategory::from_byte(category.to_byte()), Some(category));
        }
        assert_eq!(NodeMessageType::Pong.to_byte(), 6);
        assert_eq!(TransactionMessageType::from_byte(1), Some(TransactionMessageType::Request));
    }
}
