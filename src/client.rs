use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;

use crate::error::StoreError;
use crate::pipeline::Pipeline;
use crate::registry::Registry;
use crate::reply::Reply;
use crate::store::list::InsertPosition;
use crate::store::sort::{SortOptions, SortResult};
use crate::store::string::SetOptions;
use crate::store::value::{ToBytes, ValueKind};
use crate::store::zset::Aggregate;
use crate::store::{Keyspace, SharedKeyspace};

/// Command handle bound to one logical database.
///
/// Each call takes the keyspace's write lock for the duration of that single
/// command. Cloning a client is cheap and the clone shares the same data.
#[derive(Debug, Clone)]
pub struct Client {
    db: usize,
    keyspace: SharedKeyspace,
    registry: Arc<Registry>,
}

/// Generates a `Client` method per keyspace command, each running under the
/// keyspace lock.
macro_rules! forward {
    ($( $(#[$meta:meta])* fn $name:ident($($arg:ident: $ty:ty),* $(,)?) -> $ret:ty; )*) => {
        impl Client {
            $(
                $(#[$meta])*
                pub fn $name(&self, $($arg: $ty),*) -> Result<$ret, StoreError> {
                    self.with_keyspace(stringify!($name), |ks| ks.$name($($arg),*))
                }
            )*
        }
    };
}

impl Client {
    pub(crate) fn new(db: usize, keyspace: SharedKeyspace, registry: Arc<Registry>) -> Self {
        Self {
            db,
            keyspace,
            registry,
        }
    }

    pub fn db(&self) -> usize {
        self.db
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub(crate) fn keyspace(&self) -> &SharedKeyspace {
        &self.keyspace
    }

    fn with_keyspace<T>(
        &self,
        command: &'static str,
        op: impl FnOnce(&mut Keyspace) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        ::metrics::counter!(crate::metrics::COMMANDS_TOTAL, "command" => command).increment(1);
        let mut keyspace = self.keyspace.write().map_err(|_| StoreError::Poisoned)?;
        tracing::trace!(db = self.db, command, "executing command");
        op(&mut keyspace)
    }

    /// Move `key` into database `db`. Returns false if the key is missing
    /// here or already present there.
    pub fn move_key(&self, key: &str, db: usize) -> Result<bool, StoreError> {
        if db == self.db {
            return Err(StoreError::SameObject);
        }
        let target = self.registry.keyspace(db)?;
        ::metrics::counter!(crate::metrics::COMMANDS_TOTAL, "command" => "move_key").increment(1);

        // Lock in index order so concurrent moves cannot deadlock.
        let mut src;
        let mut dst;
        if self.db < db {
            src = self.keyspace.write().map_err(|_| StoreError::Poisoned)?;
            dst = target.write().map_err(|_| StoreError::Poisoned)?;
        } else {
            dst = target.write().map_err(|_| StoreError::Poisoned)?;
            src = self.keyspace.write().map_err(|_| StoreError::Poisoned)?;
        }

        if dst.value(key).is_some() || src.value(key).is_none() {
            return Ok(false);
        }
        let Some((value, deadline)) = src.remove(key) else {
            return Ok(false);
        };
        dst.insert_entry(key, value, deadline);
        tracing::trace!(key, from = self.db, to = db, "key moved");
        Ok(true)
    }

    /// Clear every database in the registry.
    pub fn flushall(&self) -> Result<(), StoreError> {
        ::metrics::counter!(crate::metrics::COMMANDS_TOTAL, "command" => "flushall").increment(1);
        self.registry.flushall()
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.clone())
    }

    /// Run `func` inside WATCH/MULTI/EXEC, retrying when a watched key
    /// changes before commit.
    ///
    /// `func` receives a pipeline already watching `keys`; it may read through
    /// [`Pipeline::client`] and queue writes. If it does not call
    /// [`Pipeline::multi`] itself, buffering starts once it returns.
    pub fn transaction<F>(&self, keys: &[impl AsRef<str>], mut func: F) -> Result<Vec<Reply>, StoreError>
    where
        F: FnMut(&mut Pipeline) -> Result<(), StoreError>,
    {
        let attempts = self.registry.config().transaction_attempts;
        let mut pipe = self.pipeline();
        for attempt in 1..=attempts {
            pipe.watch(keys)?;
            if let Err(err) = func(&mut pipe) {
                pipe.reset();
                return Err(err);
            }
            pipe.start_buffering();
            match pipe.execute() {
                Ok(replies) => {
                    ::metrics::counter!(crate::metrics::TRANSACTIONS_TOTAL).increment(1);
                    return Ok(replies);
                }
                Err(StoreError::Watch(changed)) => {
                    tracing::debug!(attempt, ?changed, "transaction conflict, retrying");
                }
                Err(err) => return Err(err),
            }
        }
        tracing::warn!(attempts, "transaction aborted after repeated watch conflicts");
        Err(StoreError::TransactionAborted(attempts))
    }
}

forward! {
    fn exists(keys: &[impl AsRef<str>]) -> usize;
    fn delete(keys: &[impl AsRef<str>]) -> usize;
    fn key_type(key: &str) -> Option<ValueKind>;
    fn keys(pattern: &str) -> Vec<String>;
    fn randomkey() -> Option<String>;
    fn dbsize() -> usize;
    fn flushdb() -> ();
    fn rename(src: &str, dst: &str) -> ();
    fn renamenx(src: &str, dst: &str) -> bool;
    fn expire(key: &str, seconds: i64) -> bool;
    fn pexpire(key: &str, millis: i64) -> bool;
    fn expireat(key: &str, when: SystemTime) -> bool;
    fn ttl(key: &str) -> Option<i64>;
    fn pttl(key: &str) -> Option<i64>;
    fn persist(key: &str) -> bool;

    fn get(key: &str) -> Option<Bytes>;
    fn set(key: &str, value: impl ToBytes, opts: SetOptions) -> bool;
    fn setnx(key: &str, value: impl ToBytes) -> bool;
    fn setex(key: &str, seconds: u64, value: impl ToBytes) -> ();
    fn psetex(key: &str, millis: u64, value: impl ToBytes) -> ();
    fn getset(key: &str, value: impl ToBytes) -> Option<Bytes>;
    fn mget(keys: &[impl AsRef<str>]) -> Vec<Option<Bytes>>;
    fn mset(pairs: &[(impl AsRef<str>, impl ToBytes)]) -> ();
    fn msetnx(pairs: &[(impl AsRef<str>, impl ToBytes)]) -> bool;
    fn incr(key: &str) -> i64;
    fn decr(key: &str) -> i64;
    fn incrby(key: &str, amount: i64) -> i64;
    fn decrby(key: &str, amount: i64) -> i64;
    fn incrbyfloat(key: &str, amount: f64) -> f64;
    fn append(key: &str, value: impl ToBytes) -> usize;
    fn strlen(key: &str) -> usize;
    fn getrange(key: &str, start: i64, end: i64) -> Bytes;
    fn setrange(key: &str, offset: usize, value: impl ToBytes) -> usize;
    fn getbit(key: &str, offset: u64) -> u8;
    fn setbit(key: &str, offset: u64, bit: u8) -> u8;
    fn bitcount(key: &str, start: i64, end: i64) -> usize;

    fn lpush(key: &str, values: &[impl ToBytes]) -> usize;
    fn rpush(key: &str, values: &[impl ToBytes]) -> usize;
    fn lpushx(key: &str, value: impl ToBytes) -> usize;
    fn rpushx(key: &str, value: impl ToBytes) -> usize;
    fn llen(key: &str) -> usize;
    fn lrange(key: &str, start: i64, end: i64) -> Vec<Bytes>;
    fn lindex(key: &str, index: i64) -> Option<Bytes>;
    fn lset(key: &str, index: i64, value: impl ToBytes) -> ();
    fn linsert(key: &str, position: InsertPosition, pivot: impl ToBytes, value: impl ToBytes) -> i64;
    fn lrem(key: &str, count: i64, value: impl ToBytes) -> usize;
    fn ltrim(key: &str, start: i64, end: i64) -> ();
    fn lpop(key: &str) -> Option<Bytes>;
    fn rpop(key: &str) -> Option<Bytes>;
    fn rpoplpush(src: &str, dst: &str) -> Option<Bytes>;
    /// Never blocks; `timeout` is accepted and ignored.
    fn blpop(keys: &[impl AsRef<str>], timeout: u64) -> Option<(String, Bytes)>;
    /// Never blocks; `timeout` is accepted and ignored.
    fn brpop(keys: &[impl AsRef<str>], timeout: u64) -> Option<(String, Bytes)>;
    fn brpoplpush(src: &str, dst: &str, timeout: u64) -> Option<Bytes>;

    fn hset(key: &str, field: impl ToBytes, value: impl ToBytes) -> bool;
    fn hsetnx(key: &str, field: impl ToBytes, value: impl ToBytes) -> bool;
    fn hmset(key: &str, pairs: &[(impl ToBytes, impl ToBytes)]) -> ();
    fn hget(key: &str, field: impl ToBytes) -> Option<Bytes>;
    fn hmget(key: &str, fields: &[impl ToBytes]) -> Vec<Option<Bytes>>;
    fn hdel(key: &str, fields: &[impl ToBytes]) -> usize;
    fn hexists(key: &str, field: impl ToBytes) -> bool;
    fn hgetall(key: &str) -> HashMap<Bytes, Bytes>;
    fn hkeys(key: &str) -> Vec<Bytes>;
    fn hvals(key: &str) -> Vec<Bytes>;
    fn hlen(key: &str) -> usize;
    fn hstrlen(key: &str, field: impl ToBytes) -> usize;
    fn hincrby(key: &str, field: impl ToBytes, amount: i64) -> i64;
    fn hincrbyfloat(key: &str, field: impl ToBytes, amount: f64) -> f64;

    fn sadd(key: &str, members: &[impl ToBytes]) -> usize;
    fn srem(key: &str, members: &[impl ToBytes]) -> usize;
    fn scard(key: &str) -> usize;
    fn sismember(key: &str, member: impl ToBytes) -> bool;
    fn smembers(key: &str) -> HashSet<Bytes>;
    fn sdiff(keys: &[impl AsRef<str>]) -> HashSet<Bytes>;
    fn sinter(keys: &[impl AsRef<str>]) -> HashSet<Bytes>;
    fn sunion(keys: &[impl AsRef<str>]) -> HashSet<Bytes>;
    fn sdiffstore(dest: &str, keys: &[impl AsRef<str>]) -> usize;
    fn sinterstore(dest: &str, keys: &[impl AsRef<str>]) -> usize;
    fn sunionstore(dest: &str, keys: &[impl AsRef<str>]) -> usize;
    fn smove(src: &str, dst: &str, member: impl ToBytes) -> bool;
    fn spop(key: &str) -> Option<Bytes>;
    fn srandmember(key: &str) -> Option<Bytes>;

    fn zadd(key: &str, members: &[(f64, impl ToBytes)]) -> usize;
    /// Flat `score, member, score, member, ...` form.
    fn zadd_args(key: &str, args: &[impl ToBytes]) -> usize;
    fn zrem(key: &str, members: &[impl ToBytes]) -> usize;
    fn zcard(key: &str) -> usize;
    fn zscore(key: &str, member: impl ToBytes) -> Option<f64>;
    fn zincrby(key: &str, increment: f64, member: impl ToBytes) -> f64;
    fn zrank(key: &str, member: impl ToBytes) -> Option<usize>;
    fn zrevrank(key: &str, member: impl ToBytes) -> Option<usize>;
    fn zcount(key: &str, min: impl ToBytes, max: impl ToBytes) -> usize;
    fn zrange(key: &str, start: i64, end: i64, withscores: bool) -> Vec<(Bytes, Option<f64>)>;
    fn zrevrange(key: &str, start: i64, end: i64, withscores: bool) -> Vec<(Bytes, Option<f64>)>;
    fn zrangebyscore(
        key: &str,
        min: impl ToBytes,
        max: impl ToBytes,
        start: Option<i64>,
        num: Option<i64>,
        withscores: bool,
    ) -> Vec<(Bytes, Option<f64>)>;
    fn zrevrangebyscore(
        key: &str,
        max: impl ToBytes,
        min: impl ToBytes,
        start: Option<i64>,
        num: Option<i64>,
        withscores: bool,
    ) -> Vec<(Bytes, Option<f64>)>;
    fn zremrangebyrank(key: &str, start: i64, end: i64) -> usize;
    fn zremrangebyscore(key: &str, min: impl ToBytes, max: impl ToBytes) -> usize;
    fn zunionstore(
        dest: &str,
        keys: &[impl AsRef<str>],
        weights: Option<&[f64]>,
        aggregate: Aggregate,
    ) -> usize;
    fn zinterstore(
        dest: &str,
        keys: &[impl AsRef<str>],
        weights: Option<&[f64]>,
        aggregate: Aggregate,
    ) -> usize;

    fn sort(key: &str, opts: &SortOptions) -> SortResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn client() -> Client {
        Registry::new(Config::default()).client(0).unwrap()
    }

    #[test]
    fn forwards_to_shared_keyspace() {
        let a = client();
        let b = a.registry().client(0).unwrap();
        a.set("k", "v", SetOptions::default()).unwrap();
        assert_eq!(b.get("k").unwrap(), Some(Bytes::from("v")));
        assert_eq!(b.key_type("k").unwrap(), Some(ValueKind::String));
    }

    #[test]
    fn move_key_between_databases() {
        let src = client();
        let dst = src.registry().client(1).unwrap();
        src.set("k", "v", SetOptions::default()).unwrap();
        src.expire("k", 100).unwrap();

        assert!(src.move_key("k", 1).unwrap());
        assert_eq!(src.exists(&["k"]).unwrap(), 0);
        assert_eq!(dst.get("k").unwrap(), Some(Bytes::from("v")));
        assert!(dst.ttl("k").unwrap().is_some());

        assert!(!src.move_key("k", 1).unwrap());
        src.set("k", "other", SetOptions::default()).unwrap();
        assert!(!src.move_key("k", 1).unwrap());
        assert_eq!(src.get("k").unwrap(), Some(Bytes::from("other")));

        assert_eq!(src.move_key("k", 0).unwrap_err(), StoreError::SameObject);
        assert_eq!(src.move_key("k", 99).unwrap_err(), StoreError::DbIndexOutOfRange);
    }

    #[test]
    fn flushall_reaches_other_databases() {
        let a = client();
        let b = a.registry().client(5).unwrap();
        a.sadd("s", &["x"]).unwrap();
        b.rpush("l", &["y"]).unwrap();
        a.flushall().unwrap();
        assert_eq!(a.dbsize().unwrap(), 0);
        assert_eq!(b.dbsize().unwrap(), 0);
    }

    #[test]
    fn transaction_commits_queued_writes() {
        let c = client();
        c.set("counter", 10, SetOptions::default()).unwrap();
        let replies = c
            .transaction(&["counter"], |pipe| {
                let current = pipe.client().get("counter")?.unwrap_or_default();
                let next = std::str::from_utf8(&current).unwrap().parse::<i64>().unwrap() * 2;
                pipe.multi()?;
                pipe.set("counter", next, SetOptions::default());
                Ok(())
            })
            .unwrap();
        assert_eq!(replies, vec![Reply::Bool(true)]);
        assert_eq!(c.get("counter").unwrap(), Some(Bytes::from("20")));
    }

    #[test]
    fn transaction_gives_up_after_configured_attempts() {
        let config = Config {
            transaction_attempts: 3,
            ..Config::default()
        };
        let c = Registry::new(config).client(0).unwrap();
        let rival = c.clone();
        let mut calls = 0;
        let err = c
            .transaction(&["k"], |pipe| {
                calls += 1;
                rival.incr("k")?;
                pipe.incr("k");
                Ok(())
            })
            .unwrap_err();
        assert_eq!(err, StoreError::TransactionAborted(3));
        assert_eq!(calls, 3);
        assert_eq!(c.get("k").unwrap(), Some(Bytes::from("3")));
    }
}
