/// Errors surfaced by keyspace commands, pipelines and the registry.
///
/// Messages follow the wording of the emulated server so callers that match
/// on text keep working.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("ERR value is not an integer or out of range")]
    NotInteger,
    #[error("ERR value is not a valid float")]
    NotFloat,
    #[error("ERR One or more scores can't be converted into double")]
    NotDouble,
    #[error("ERR increment or decrement would overflow")]
    Overflow,
    #[error("ERR index out of range")]
    IndexOutOfRange,
    #[error("ERR no such key")]
    NoSuchKey,
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),
    #[error("ERR syntax error: {0}")]
    Syntax(&'static str),
    #[error("ERR invalid expire time in '{0}' command")]
    InvalidExpire(&'static str),
    #[error("ERR bit is not an integer or out of range")]
    InvalidBit,
    #[error("ERR bit offset is not an integer or out of range")]
    BitOffset,
    #[error("ERR string exceeds maximum allowed size (512MB)")]
    StringTooLong,
    #[error("ERR DB index is out of range")]
    DbIndexOutOfRange,
    #[error("ERR source and destination objects are the same")]
    SameObject,
    #[error("Watched variable changed: {}", .0.join(", "))]
    Watch(Vec<String>),
    #[error("ERR transaction aborted after {0} attempts")]
    TransactionAborted(usize),
    #[error("ERR MULTI calls can not be nested")]
    NestedMulti,
    #[error("ERR WATCH inside MULTI is not allowed")]
    WatchInsideMulti,
    #[error("ERR commands were buffered before MULTI while watching")]
    QueuedBeforeMulti,
    #[error("ERR store lock poisoned")]
    Poisoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_server_wording() {
        assert_eq!(
            StoreError::WrongType.to_string(),
            "WRONGTYPE Operation against a key holding the wrong kind of value"
        );
        assert_eq!(
            StoreError::WrongArity("sadd").to_string(),
            "ERR wrong number of arguments for 'sadd' command"
        );
        assert_eq!(
            StoreError::Watch(vec!["a".into(), "b".into()]).to_string(),
            "Watched variable changed: a, b"
        );
    }
}
