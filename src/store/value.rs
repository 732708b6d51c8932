use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};

/// A value stored under a key. The kind is fixed for the key's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(Bytes),
    List(VecDeque<Bytes>),
    Hash(HashMap<Bytes, Bytes>),
    Set(HashSet<Bytes>),
    /// member -> score; ordered iteration is computed on demand.
    ZSet(HashMap<Bytes, f64>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::List(_) => ValueKind::List,
            Value::Hash(_) => ValueKind::Hash,
            Value::Set(_) => ValueKind::Set,
            Value::ZSet(_) => ValueKind::ZSet,
        }
    }

    /// Containers with no elements are never kept in a keyspace.
    pub(crate) fn is_empty_container(&self) -> bool {
        match self {
            Value::String(_) => false,
            Value::List(l) => l.is_empty(),
            Value::Hash(h) => h.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::ZSet(z) => z.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    List,
    Hash,
    Set,
    ZSet,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::List => "list",
            Self::Hash => "hash",
            Self::Set => "set",
            Self::ZSet => "zset",
        }
    }
}

/// Conversion of command arguments into stored bytes. Numbers are stored in
/// their decimal string form.
pub trait ToBytes {
    fn to_bytes(&self) -> Bytes;
}

impl ToBytes for Bytes {
    fn to_bytes(&self) -> Bytes {
        self.clone()
    }
}

impl ToBytes for str {
    fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToBytes for String {
    fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToBytes for [u8] {
    fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl<const N: usize> ToBytes for [u8; N] {
    fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl ToBytes for Vec<u8> {
    fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

macro_rules! stringified {
    ($($ty:ty),*) => {
        $(impl ToBytes for $ty {
            fn to_bytes(&self) -> Bytes {
                Bytes::from(self.to_string())
            }
        })*
    };
}

stringified!(i32, i64, u32, u64, usize, isize, f64);

impl<T: ToBytes + ?Sized> ToBytes for &T {
    fn to_bytes(&self) -> Bytes {
        (**self).to_bytes()
    }
}
