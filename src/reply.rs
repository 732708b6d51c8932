use std::collections::{HashMap, HashSet};

use bytes::Bytes;

use crate::error::StoreError;
use crate::store::sort::SortResult;
use crate::store::value::ValueKind;

/// Result of one buffered pipeline command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Nil,
    Status(&'static str),
    Bool(bool),
    Int(i64),
    Float(f64),
    Bulk(Bytes),
    Array(Vec<Reply>),
    /// The command failed; later commands in the batch still ran.
    Error(StoreError),
}

impl Reply {
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Status("OK")
    }
}

impl From<bool> for Reply {
    fn from(v: bool) -> Self {
        Reply::Bool(v)
    }
}

impl From<u8> for Reply {
    fn from(v: u8) -> Self {
        Reply::Int(i64::from(v))
    }
}

impl From<i64> for Reply {
    fn from(v: i64) -> Self {
        Reply::Int(v)
    }
}

impl From<usize> for Reply {
    fn from(v: usize) -> Self {
        Reply::Int(v as i64)
    }
}

impl From<f64> for Reply {
    fn from(v: f64) -> Self {
        Reply::Float(v)
    }
}

impl From<Bytes> for Reply {
    fn from(v: Bytes) -> Self {
        Reply::Bulk(v)
    }
}

impl From<String> for Reply {
    fn from(v: String) -> Self {
        Reply::Bulk(Bytes::from(v))
    }
}

impl From<ValueKind> for Reply {
    fn from(v: ValueKind) -> Self {
        Reply::Status(v.as_str())
    }
}

impl<T: Into<Reply>> From<Option<T>> for Reply {
    fn from(v: Option<T>) -> Self {
        v.map_or(Reply::Nil, Into::into)
    }
}

impl<T: Into<Reply>> From<Vec<T>> for Reply {
    fn from(v: Vec<T>) -> Self {
        Reply::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<A: Into<Reply>, B: Into<Reply>> From<(A, B)> for Reply {
    fn from((a, b): (A, B)) -> Self {
        Reply::Array(vec![a.into(), b.into()])
    }
}

impl From<HashSet<Bytes>> for Reply {
    fn from(v: HashSet<Bytes>) -> Self {
        let mut members: Vec<Bytes> = v.into_iter().collect();
        members.sort();
        members.into()
    }
}

/// Flattened `field, value` pairs ordered by field.
impl From<HashMap<Bytes, Bytes>> for Reply {
    fn from(v: HashMap<Bytes, Bytes>) -> Self {
        let mut pairs: Vec<(Bytes, Bytes)> = v.into_iter().collect();
        pairs.sort();
        Reply::Array(
            pairs
                .into_iter()
                .flat_map(|(f, v)| [Reply::Bulk(f), Reply::Bulk(v)])
                .collect(),
        )
    }
}

impl From<SortResult> for Reply {
    fn from(v: SortResult) -> Self {
        match v {
            SortResult::Values(values) => values.into(),
            SortResult::Stored(len) => len.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_conversions() {
        let reply: Reply = Some(Bytes::from("v")).into();
        assert_eq!(reply, Reply::Bulk(Bytes::from("v")));

        let missing: Reply = Option::<Bytes>::None.into();
        assert_eq!(missing, Reply::Nil);

        let scored: Reply = vec![(Bytes::from("m"), Some(1.5))].into();
        assert_eq!(
            scored,
            Reply::Array(vec![Reply::Array(vec![
                Reply::Bulk(Bytes::from("m")),
                Reply::Float(1.5)
            ])])
        );

        let set: Reply = HashSet::from([Bytes::from("b"), Bytes::from("a")]).into();
        assert_eq!(
            set,
            Reply::Array(vec![Reply::Bulk(Bytes::from("a")), Reply::Bulk(Bytes::from("b"))])
        );
        assert_eq!(Reply::from(()), Reply::Status("OK"));
    }
}
