use std::collections::HashMap;
use std::mem;
use std::time::SystemTime;

use bytes::Bytes;

use crate::client::Client;
use crate::error::StoreError;
use crate::reply::Reply;
use crate::store::Keyspace;
use crate::store::list::InsertPosition;
use crate::store::sort::SortOptions;
use crate::store::string::SetOptions;
use crate::store::value::{ToBytes, Value};
use crate::store::zset::Aggregate;

type Queued = Box<dyn FnOnce(&mut Keyspace) -> Result<Reply, StoreError> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Immediate,
    /// Keys are snapshotted. Command methods still queue, and
    /// [`Pipeline::multi`] fails with [`StoreError::QueuedBeforeMulti`] if
    /// anything was queued before it; read through [`Pipeline::client`].
    Watching,
    /// Inside MULTI; commands queue until [`Pipeline::execute`].
    Buffering,
}

/// Buffers commands and replays them atomically on [`Pipeline::execute`].
///
/// Command methods never touch the keyspace; they record the call and return
/// `&mut Self` for chaining. Reads that must observe live data while watching
/// go through [`Pipeline::client`].
pub struct Pipeline {
    client: Client,
    commands: Vec<(&'static str, Queued)>,
    watching: HashMap<String, Option<Value>>,
    state: PipelineState,
}

fn owned_keys(keys: &[impl AsRef<str>]) -> Vec<String> {
    keys.iter().map(|k| k.as_ref().to_owned()).collect()
}

fn owned_values(values: &[impl ToBytes]) -> Vec<Bytes> {
    values.iter().map(ToBytes::to_bytes).collect()
}

impl Pipeline {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            commands: Vec::new(),
            watching: HashMap::new(),
            state: PipelineState::Immediate,
        }
    }

    /// Handle for immediate commands against the live keyspace.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Snapshot `keys` so `execute` can detect concurrent modification.
    pub fn watch(&mut self, keys: &[impl AsRef<str>]) -> Result<(), StoreError> {
        if self.state == PipelineState::Buffering {
            return Err(StoreError::WatchInsideMulti);
        }
        let mut keyspace = self.client.keyspace().write().map_err(|_| StoreError::Poisoned)?;
        for key in keys.iter().map(AsRef::<str>::as_ref) {
            self.watching.insert(key.to_owned(), keyspace.snapshot(key));
        }
        tracing::trace!(db = self.client.db(), keys = self.watching.len(), "watching keys");
        self.state = PipelineState::Watching;
        Ok(())
    }

    pub fn unwatch(&mut self) {
        self.watching.clear();
        if self.state == PipelineState::Watching {
            self.state = PipelineState::Immediate;
        }
    }

    /// Start the transactional block.
    pub fn multi(&mut self) -> Result<(), StoreError> {
        match self.state {
            PipelineState::Buffering => Err(StoreError::NestedMulti),
            PipelineState::Watching if !self.commands.is_empty() => {
                Err(StoreError::QueuedBeforeMulti)
            }
            _ => {
                self.state = PipelineState::Buffering;
                Ok(())
            }
        }
    }

    pub(crate) fn start_buffering(&mut self) {
        self.state = PipelineState::Buffering;
    }

    /// Drop buffered commands and watched keys.
    pub fn reset(&mut self) {
        self.commands.clear();
        self.watching.clear();
        self.state = PipelineState::Immediate;
    }

    /// Replay the buffer under one write lock.
    ///
    /// Fails with [`StoreError::Watch`] if any watched key changed since it was
    /// snapshotted; nothing is applied in that case. A command that fails
    /// during replay yields [`Reply::Error`] in its slot and later commands
    /// still run. The pipeline is reset on every path.
    pub fn execute(&mut self) -> Result<Vec<Reply>, StoreError> {
        let commands = mem::take(&mut self.commands);
        let watching = mem::take(&mut self.watching);
        self.state = PipelineState::Immediate;

        let mut keyspace = self.client.keyspace().write().map_err(|_| StoreError::Poisoned)?;

        let mut changed: Vec<String> = watching
            .into_iter()
            .filter_map(|(key, before)| (keyspace.snapshot(&key) != before).then_some(key))
            .collect();
        if !changed.is_empty() {
            changed.sort();
            tracing::warn!(db = self.client.db(), keys = ?changed, "watched keys changed, discarding pipeline");
            ::metrics::counter!(crate::metrics::WATCH_CONFLICTS_TOTAL).increment(1);
            return Err(StoreError::Watch(changed));
        }

        let count = commands.len();
        let replies = commands
            .into_iter()
            .map(|(command, op)| {
                ::metrics::counter!(crate::metrics::COMMANDS_TOTAL, "command" => command).increment(1);
                op(&mut *keyspace).unwrap_or_else(|err| {
                    tracing::debug!(command, error = %err, "queued command failed");
                    Reply::Error(err)
                })
            })
            .collect();
        tracing::debug!(db = self.client.db(), count, "pipeline executed");
        Ok(replies)
    }

    fn queue<T, F>(&mut self, command: &'static str, op: F) -> &mut Self
    where
        T: Into<Reply>,
        F: FnOnce(&mut Keyspace) -> Result<T, StoreError> + Send + 'static,
    {
        let queued: Queued = Box::new(move |ks: &mut Keyspace| op(ks).map(Into::into));
        self.commands.push((command, queued));
        self
    }

    // keys

    pub fn exists(&mut self, keys: &[impl AsRef<str>]) -> &mut Self {
        let keys = owned_keys(keys);
        self.queue("exists", move |ks| ks.exists(&keys[..]))
    }

    pub fn delete(&mut self, keys: &[impl AsRef<str>]) -> &mut Self {
        let keys = owned_keys(keys);
        self.queue("delete", move |ks| ks.delete(&keys[..]))
    }

    pub fn key_type(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("key_type", move |ks| ks.key_type(&key))
    }

    pub fn keys(&mut self, pattern: &str) -> &mut Self {
        let pattern = pattern.to_owned();
        self.queue("keys", move |ks| ks.keys(&pattern))
    }

    pub fn randomkey(&mut self) -> &mut Self {
        self.queue("randomkey", |ks| ks.randomkey())
    }

    pub fn dbsize(&mut self) -> &mut Self {
        self.queue("dbsize", |ks| ks.dbsize())
    }

    pub fn flushdb(&mut self) -> &mut Self {
        self.queue("flushdb", |ks| ks.flushdb())
    }

    pub fn rename(&mut self, src: &str, dst: &str) -> &mut Self {
        let (src, dst) = (src.to_owned(), dst.to_owned());
        self.queue("rename", move |ks| ks.rename(&src, &dst))
    }

    pub fn renamenx(&mut self, src: &str, dst: &str) -> &mut Self {
        let (src, dst) = (src.to_owned(), dst.to_owned());
        self.queue("renamenx", move |ks| ks.renamenx(&src, &dst))
    }

    pub fn expire(&mut self, key: &str, seconds: i64) -> &mut Self {
        let key = key.to_owned();
        self.queue("expire", move |ks| ks.expire(&key, seconds))
    }

    pub fn pexpire(&mut self, key: &str, millis: i64) -> &mut Self {
        let key = key.to_owned();
        self.queue("pexpire", move |ks| ks.pexpire(&key, millis))
    }

    pub fn expireat(&mut self, key: &str, when: SystemTime) -> &mut Self {
        let key = key.to_owned();
        self.queue("expireat", move |ks| ks.expireat(&key, when))
    }

    pub fn ttl(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("ttl", move |ks| ks.ttl(&key))
    }

    pub fn pttl(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("pttl", move |ks| ks.pttl(&key))
    }

    pub fn persist(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("persist", move |ks| ks.persist(&key))
    }

    // strings

    pub fn get(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("get", move |ks| ks.get(&key))
    }

    pub fn set(&mut self, key: &str, value: impl ToBytes, opts: SetOptions) -> &mut Self {
        let (key, value) = (key.to_owned(), value.to_bytes());
        self.queue("set", move |ks| ks.set(&key, value, opts))
    }

    pub fn setnx(&mut self, key: &str, value: impl ToBytes) -> &mut Self {
        let (key, value) = (key.to_owned(), value.to_bytes());
        self.queue("setnx", move |ks| ks.setnx(&key, value))
    }

    pub fn setex(&mut self, key: &str, seconds: u64, value: impl ToBytes) -> &mut Self {
        let (key, value) = (key.to_owned(), value.to_bytes());
        self.queue("setex", move |ks| ks.setex(&key, seconds, value))
    }

    pub fn psetex(&mut self, key: &str, millis: u64, value: impl ToBytes) -> &mut Self {
        let (key, value) = (key.to_owned(), value.to_bytes());
        self.queue("psetex", move |ks| ks.psetex(&key, millis, value))
    }

    pub fn getset(&mut self, key: &str, value: impl ToBytes) -> &mut Self {
        let (key, value) = (key.to_owned(), value.to_bytes());
        self.queue("getset", move |ks| ks.getset(&key, value))
    }

    pub fn mget(&mut self, keys: &[impl AsRef<str>]) -> &mut Self {
        let keys = owned_keys(keys);
        self.queue("mget", move |ks| ks.mget(&keys[..]))
    }

    pub fn mset(&mut self, pairs: &[(impl AsRef<str>, impl ToBytes)]) -> &mut Self {
        let pairs: Vec<(String, Bytes)> = pairs
            .iter()
            .map(|(k, v)| (k.as_ref().to_owned(), v.to_bytes()))
            .collect();
        self.queue("mset", move |ks| ks.mset(&pairs[..]))
    }

    pub fn msetnx(&mut self, pairs: &[(impl AsRef<str>, impl ToBytes)]) -> &mut Self {
        let pairs: Vec<(String, Bytes)> = pairs
            .iter()
            .map(|(k, v)| (k.as_ref().to_owned(), v.to_bytes()))
            .collect();
        self.queue("msetnx", move |ks| ks.msetnx(&pairs[..]))
    }

    pub fn incr(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("incr", move |ks| ks.incr(&key))
    }

    pub fn decr(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("decr", move |ks| ks.decr(&key))
    }

    pub fn incrby(&mut self, key: &str, amount: i64) -> &mut Self {
        let key = key.to_owned();
        self.queue("incrby", move |ks| ks.incrby(&key, amount))
    }

    pub fn decrby(&mut self, key: &str, amount: i64) -> &mut Self {
        let key = key.to_owned();
        self.queue("decrby", move |ks| ks.decrby(&key, amount))
    }

    pub fn incrbyfloat(&mut self, key: &str, amount: f64) -> &mut Self {
        let key = key.to_owned();
        self.queue("incrbyfloat", move |ks| ks.incrbyfloat(&key, amount))
    }

    pub fn append(&mut self, key: &str, value: impl ToBytes) -> &mut Self {
        let (key, value) = (key.to_owned(), value.to_bytes());
        self.queue("append", move |ks| ks.append(&key, value))
    }

    pub fn strlen(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("strlen", move |ks| ks.strlen(&key))
    }

    pub fn getrange(&mut self, key: &str, start: i64, end: i64) -> &mut Self {
        let key = key.to_owned();
        self.queue("getrange", move |ks| ks.getrange(&key, start, end))
    }

    pub fn setrange(&mut self, key: &str, offset: usize, value: impl ToBytes) -> &mut Self {
        let (key, value) = (key.to_owned(), value.to_bytes());
        self.queue("setrange", move |ks| ks.setrange(&key, offset, value))
    }

    pub fn getbit(&mut self, key: &str, offset: u64) -> &mut Self {
        let key = key.to_owned();
        self.queue("getbit", move |ks| ks.getbit(&key, offset))
    }

    pub fn setbit(&mut self, key: &str, offset: u64, bit: u8) -> &mut Self {
        let key = key.to_owned();
        self.queue("setbit", move |ks| ks.setbit(&key, offset, bit))
    }

    pub fn bitcount(&mut self, key: &str, start: i64, end: i64) -> &mut Self {
        let key = key.to_owned();
        self.queue("bitcount", move |ks| ks.bitcount(&key, start, end))
    }

    // lists

    pub fn lpush(&mut self, key: &str, values: &[impl ToBytes]) -> &mut Self {
        let (key, values) = (key.to_owned(), owned_values(values));
        self.queue("lpush", move |ks| ks.lpush(&key, &values[..]))
    }

    pub fn rpush(&mut self, key: &str, values: &[impl ToBytes]) -> &mut Self {
        let (key, values) = (key.to_owned(), owned_values(values));
        self.queue("rpush", move |ks| ks.rpush(&key, &values[..]))
    }

    pub fn lpushx(&mut self, key: &str, value: impl ToBytes) -> &mut Self {
        let (key, value) = (key.to_owned(), value.to_bytes());
        self.queue("lpushx", move |ks| ks.lpushx(&key, value))
    }

    pub fn rpushx(&mut self, key: &str, value: impl ToBytes) -> &mut Self {
        let (key, value) = (key.to_owned(), value.to_bytes());
        self.queue("rpushx", move |ks| ks.rpushx(&key, value))
    }

    pub fn llen(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("llen", move |ks| ks.llen(&key))
    }

    pub fn lrange(&mut self, key: &str, start: i64, end: i64) -> &mut Self {
        let key = key.to_owned();
        self.queue("lrange", move |ks| ks.lrange(&key, start, end))
    }

    pub fn lindex(&mut self, key: &str, index: i64) -> &mut Self {
        let key = key.to_owned();
        self.queue("lindex", move |ks| ks.lindex(&key, index))
    }

    pub fn lset(&mut self, key: &str, index: i64, value: impl ToBytes) -> &mut Self {
        let (key, value) = (key.to_owned(), value.to_bytes());
        self.queue("lset", move |ks| ks.lset(&key, index, value))
    }

    pub fn linsert(
        &mut self,
        key: &str,
        position: InsertPosition,
        pivot: impl ToBytes,
        value: impl ToBytes,
    ) -> &mut Self {
        let (key, pivot, value) = (key.to_owned(), pivot.to_bytes(), value.to_bytes());
        self.queue("linsert", move |ks| ks.linsert(&key, position, pivot, value))
    }

    pub fn lrem(&mut self, key: &str, count: i64, value: impl ToBytes) -> &mut Self {
        let (key, value) = (key.to_owned(), value.to_bytes());
        self.queue("lrem", move |ks| ks.lrem(&key, count, value))
    }

    pub fn ltrim(&mut self, key: &str, start: i64, end: i64) -> &mut Self {
        let key = key.to_owned();
        self.queue("ltrim", move |ks| ks.ltrim(&key, start, end))
    }

    pub fn lpop(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("lpop", move |ks| ks.lpop(&key))
    }

    pub fn rpop(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("rpop", move |ks| ks.rpop(&key))
    }

    pub fn rpoplpush(&mut self, src: &str, dst: &str) -> &mut Self {
        let (src, dst) = (src.to_owned(), dst.to_owned());
        self.queue("rpoplpush", move |ks| ks.rpoplpush(&src, &dst))
    }

    pub fn blpop(&mut self, keys: &[impl AsRef<str>], timeout: u64) -> &mut Self {
        let keys = owned_keys(keys);
        self.queue("blpop", move |ks| ks.blpop(&keys[..], timeout))
    }

    pub fn brpop(&mut self, keys: &[impl AsRef<str>], timeout: u64) -> &mut Self {
        let keys = owned_keys(keys);
        self.queue("brpop", move |ks| ks.brpop(&keys[..], timeout))
    }

    pub fn brpoplpush(&mut self, src: &str, dst: &str, timeout: u64) -> &mut Self {
        let (src, dst) = (src.to_owned(), dst.to_owned());
        self.queue("brpoplpush", move |ks| ks.brpoplpush(&src, &dst, timeout))
    }

    // hashes

    pub fn hset(&mut self, key: &str, field: impl ToBytes, value: impl ToBytes) -> &mut Self {
        let (key, field, value) = (key.to_owned(), field.to_bytes(), value.to_bytes());
        self.queue("hset", move |ks| ks.hset(&key, field, value))
    }

    pub fn hsetnx(&mut self, key: &str, field: impl ToBytes, value: impl ToBytes) -> &mut Self {
        let (key, field, value) = (key.to_owned(), field.to_bytes(), value.to_bytes());
        self.queue("hsetnx", move |ks| ks.hsetnx(&key, field, value))
    }

    pub fn hmset(&mut self, key: &str, pairs: &[(impl ToBytes, impl ToBytes)]) -> &mut Self {
        let key = key.to_owned();
        let pairs: Vec<(Bytes, Bytes)> =
            pairs.iter().map(|(f, v)| (f.to_bytes(), v.to_bytes())).collect();
        self.queue("hmset", move |ks| ks.hmset(&key, &pairs[..]))
    }

    pub fn hget(&mut self, key: &str, field: impl ToBytes) -> &mut Self {
        let (key, field) = (key.to_owned(), field.to_bytes());
        self.queue("hget", move |ks| ks.hget(&key, field))
    }

    pub fn hmget(&mut self, key: &str, fields: &[impl ToBytes]) -> &mut Self {
        let (key, fields) = (key.to_owned(), owned_values(fields));
        self.queue("hmget", move |ks| ks.hmget(&key, &fields[..]))
    }

    pub fn hdel(&mut self, key: &str, fields: &[impl ToBytes]) -> &mut Self {
        let (key, fields) = (key.to_owned(), owned_values(fields));
        self.queue("hdel", move |ks| ks.hdel(&key, &fields[..]))
    }

    pub fn hexists(&mut self, key: &str, field: impl ToBytes) -> &mut Self {
        let (key, field) = (key.to_owned(), field.to_bytes());
        self.queue("hexists", move |ks| ks.hexists(&key, field))
    }

    pub fn hgetall(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("hgetall", move |ks| ks.hgetall(&key))
    }

    pub fn hkeys(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("hkeys", move |ks| ks.hkeys(&key))
    }

    pub fn hvals(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("hvals", move |ks| ks.hvals(&key))
    }

    pub fn hlen(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("hlen", move |ks| ks.hlen(&key))
    }

    pub fn hstrlen(&mut self, key: &str, field: impl ToBytes) -> &mut Self {
        let (key, field) = (key.to_owned(), field.to_bytes());
        self.queue("hstrlen", move |ks| ks.hstrlen(&key, field))
    }

    pub fn hincrby(&mut self, key: &str, field: impl ToBytes, amount: i64) -> &mut Self {
        let (key, field) = (key.to_owned(), field.to_bytes());
        self.queue("hincrby", move |ks| ks.hincrby(&key, field, amount))
    }

    pub fn hincrbyfloat(&mut self, key: &str, field: impl ToBytes, amount: f64) -> &mut Self {
        let (key, field) = (key.to_owned(), field.to_bytes());
        self.queue("hincrbyfloat", move |ks| ks.hincrbyfloat(&key, field, amount))
    }

    // sets

    pub fn sadd(&mut self, key: &str, members: &[impl ToBytes]) -> &mut Self {
        let (key, members) = (key.to_owned(), owned_values(members));
        self.queue("sadd", move |ks| ks.sadd(&key, &members[..]))
    }

    pub fn srem(&mut self, key: &str, members: &[impl ToBytes]) -> &mut Self {
        let (key, members) = (key.to_owned(), owned_values(members));
        self.queue("srem", move |ks| ks.srem(&key, &members[..]))
    }

    pub fn scard(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("scard", move |ks| ks.scard(&key))
    }

    pub fn sismember(&mut self, key: &str, member: impl ToBytes) -> &mut Self {
        let (key, member) = (key.to_owned(), member.to_bytes());
        self.queue("sismember", move |ks| ks.sismember(&key, member))
    }

    pub fn smembers(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("smembers", move |ks| ks.smembers(&key))
    }

    pub fn sdiff(&mut self, keys: &[impl AsRef<str>]) -> &mut Self {
        let keys = owned_keys(keys);
        self.queue("sdiff", move |ks| ks.sdiff(&keys[..]))
    }

    pub fn sinter(&mut self, keys: &[impl AsRef<str>]) -> &mut Self {
        let keys = owned_keys(keys);
        self.queue("sinter", move |ks| ks.sinter(&keys[..]))
    }

    pub fn sunion(&mut self, keys: &[impl AsRef<str>]) -> &mut Self {
        let keys = owned_keys(keys);
        self.queue("sunion", move |ks| ks.sunion(&keys[..]))
    }

    pub fn sdiffstore(&mut self, dest: &str, keys: &[impl AsRef<str>]) -> &mut Self {
        let (dest, keys) = (dest.to_owned(), owned_keys(keys));
        self.queue("sdiffstore", move |ks| ks.sdiffstore(&dest, &keys[..]))
    }

    pub fn sinterstore(&mut self, dest: &str, keys: &[impl AsRef<str>]) -> &mut Self {
        let (dest, keys) = (dest.to_owned(), owned_keys(keys));
        self.queue("sinterstore", move |ks| ks.sinterstore(&dest, &keys[..]))
    }

    pub fn sunionstore(&mut self, dest: &str, keys: &[impl AsRef<str>]) -> &mut Self {
        let (dest, keys) = (dest.to_owned(), owned_keys(keys));
        self.queue("sunionstore", move |ks| ks.sunionstore(&dest, &keys[..]))
    }

    pub fn smove(&mut self, src: &str, dst: &str, member: impl ToBytes) -> &mut Self {
        let (src, dst, member) = (src.to_owned(), dst.to_owned(), member.to_bytes());
        self.queue("smove", move |ks| ks.smove(&src, &dst, member))
    }

    pub fn spop(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("spop", move |ks| ks.spop(&key))
    }

    pub fn srandmember(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("srandmember", move |ks| ks.srandmember(&key))
    }

    // sorted sets

    pub fn zadd(&mut self, key: &str, members: &[(f64, impl ToBytes)]) -> &mut Self {
        let key = key.to_owned();
        let members: Vec<(f64, Bytes)> = members.iter().map(|(s, m)| (*s, m.to_bytes())).collect();
        self.queue("zadd", move |ks| ks.zadd(&key, &members[..]))
    }

    pub fn zadd_args(&mut self, key: &str, args: &[impl ToBytes]) -> &mut Self {
        let (key, args) = (key.to_owned(), owned_values(args));
        self.queue("zadd", move |ks| ks.zadd_args(&key, &args[..]))
    }

    pub fn zrem(&mut self, key: &str, members: &[impl ToBytes]) -> &mut Self {
        let (key, members) = (key.to_owned(), owned_values(members));
        self.queue("zrem", move |ks| ks.zrem(&key, &members[..]))
    }

    pub fn zcard(&mut self, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.queue("zcard", move |ks| ks.zcard(&key))
    }

    pub fn zscore(&mut self, key: &str, member: impl ToBytes) -> &mut Self {
        let (key, member) = (key.to_owned(), member.to_bytes());
        self.queue("zscore", move |ks| ks.zscore(&key, member))
    }

    pub fn zincrby(&mut self, key: &str, increment: f64, member: impl ToBytes) -> &mut Self {
        let (key, member) = (key.to_owned(), member.to_bytes());
        self.queue("zincrby", move |ks| ks.zincrby(&key, increment, member))
    }

    pub fn zrank(&mut self, key: &str, member: impl ToBytes) -> &mut Self {
        let (key, member) = (key.to_owned(), member.to_bytes());
        self.queue("zrank", move |ks| ks.zrank(&key, member))
    }

    pub fn zrevrank(&mut self, key: &str, member: impl ToBytes) -> &mut Self {
        let (key, member) = (key.to_owned(), member.to_bytes());
        self.queue("zrevrank", move |ks| ks.zrevrank(&key, member))
    }

    pub fn zcount(&mut self, key: &str, min: impl ToBytes, max: impl ToBytes) -> &mut Self {
        let (key, min, max) = (key.to_owned(), min.to_bytes(), max.to_bytes());
        self.queue("zcount", move |ks| ks.zcount(&key, min, max))
    }

    pub fn zrange(&mut self, key: &str, start: i64, end: i64, withscores: bool) -> &mut Self {
        let key = key.to_owned();
        self.queue("zrange", move |ks| ks.zrange(&key, start, end, withscores))
    }

    pub fn zrevrange(&mut self, key: &str, start: i64, end: i64, withscores: bool) -> &mut Self {
        let key = key.to_owned();
        self.queue("zrevrange", move |ks| ks.zrevrange(&key, start, end, withscores))
    }

    pub fn zrangebyscore(
        &mut self,
        key: &str,
        min: impl ToBytes,
        max: impl ToBytes,
        start: Option<i64>,
        num: Option<i64>,
        withscores: bool,
    ) -> &mut Self {
        let (key, min, max) = (key.to_owned(), min.to_bytes(), max.to_bytes());
        self.queue("zrangebyscore", move |ks| {
            ks.zrangebyscore(&key, min, max, start, num, withscores)
        })
    }

    pub fn zrevrangebyscore(
        &mut self,
        key: &str,
        max: impl ToBytes,
        min: impl ToBytes,
        start: Option<i64>,
        num: Option<i64>,
        withscores: bool,
    ) -> &mut Self {
        let (key, max, min) = (key.to_owned(), max.to_bytes(), min.to_bytes());
        self.queue("zrevrangebyscore", move |ks| {
            ks.zrevrangebyscore(&key, max, min, start, num, withscores)
        })
    }

    pub fn zremrangebyrank(&mut self, key: &str, start: i64, end: i64) -> &mut Self {
        let key = key.to_owned();
        self.queue("zremrangebyrank", move |ks| ks.zremrangebyrank(&key, start, end))
    }

    pub fn zremrangebyscore(&mut self, key: &str, min: impl ToBytes, max: impl ToBytes) -> &mut Self {
        let (key, min, max) = (key.to_owned(), min.to_bytes(), max.to_bytes());
        self.queue("zremrangebyscore", move |ks| ks.zremrangebyscore(&key, min, max))
    }

    pub fn zunionstore(
        &mut self,
        dest: &str,
        keys: &[impl AsRef<str>],
        weights: Option<&[f64]>,
        aggregate: Aggregate,
    ) -> &mut Self {
        let (dest, keys, weights) = (dest.to_owned(), owned_keys(keys), weights.map(<[f64]>::to_vec));
        self.queue("zunionstore", move |ks| {
            ks.zunionstore(&dest, &keys[..], weights.as_deref(), aggregate)
        })
    }

    pub fn zinterstore(
        &mut self,
        dest: &str,
        keys: &[impl AsRef<str>],
        weights: Option<&[f64]>,
        aggregate: Aggregate,
    ) -> &mut Self {
        let (dest, keys, weights) = (dest.to_owned(), owned_keys(keys), weights.map(<[f64]>::to_vec));
        self.queue("zinterstore", move |ks| {
            ks.zinterstore(&dest, &keys[..], weights.as_deref(), aggregate)
        })
    }

    pub fn sort(&mut self, key: &str, opts: &SortOptions) -> &mut Self {
        let (key, opts) = (key.to_owned(), opts.clone());
        self.queue("sort", move |ks| ks.sort(&key, &opts))
    }
}
