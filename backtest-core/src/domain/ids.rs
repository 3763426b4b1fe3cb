//! Sequential identifiers and content-addressed hashes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Declares a `u64`-backed monotonic identifier type.
macro_rules! seq_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

seq_id!(OrderId);
seq_id!(TradeId);
seq_id!(SignalEventId);

/// Monotonic generator for every sequential ID type used by one run.
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    next: u64,
}

impl IdGen {
    pub fn next_order_id(&mut self) -> OrderId {
        let id = OrderId(self.next);
        self.next += 1;
        id
    }

    pub fn next_trade_id(&mut self) -> TradeId {
        let id = TradeId(self.next);
        self.next += 1;
        id
    }

    pub fn next_signal_event_id(&mut self) -> SignalEventId {
        let id = SignalEventId(self.next);
        self.next += 1;
        id
    }
}

/// Declares a `[u8; 32]`-backed BLAKE3 content hash type.
macro_rules! hash_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub fn from_bytes(data: &[u8]) -> Self {
                Self(*blake3::hash(data).as_bytes())
            }

            pub fn as_hex(&self) -> String {
                hex_encode(&self.0)
            }

            /// First 8 hex characters — the short hash used to name artifact directories.
            pub fn short_hex(&self) -> String {
                self.as_hex()[..8].to_string()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}…)", stringify!($name), &self.as_hex()[..16])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.as_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                let bytes = hex_decode(&s).map_err(serde::de::Error::custom)?;
                Ok(Self(bytes))
            }
        }
    };
}

hash_id!(PlayHash);
hash_id!(ConfigHash);
hash_id!(DatasetHash);
hash_id!(RunId);
hash_id!(FullHash);

fn hex_encode(bytes: &[u8; 32]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Result<[u8; 32], String> {
    if s.len() != 64 {
        return Err(format!("expected 64 hex chars, got {}", s.len()));
    }
    let mut out = [0u8; 32];
    for i in 0..32 {
        out[i] = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|e| e.to_string())?;
    }
    Ok(out)
}
