use std::time::{Duration, SystemTime};

use bytes::{Bytes, BytesMut};

use super::value::{ToBytes, Value};
use super::{Keyspace, inclusive_range, parse_f64, parse_i64};
use crate::error::StoreError;

/// Largest string SETRANGE may produce.
const MAX_STRING_LEN: usize = 512 * 1024 * 1024;

/// Largest bit offset accepted by SETBIT/GETBIT (512 MiB strings).
const MAX_BIT_OFFSET: u64 = (1 << 32) - 1;

/// Optional SET arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Expire after this many seconds.
    pub ex: Option<u64>,
    /// Expire after this many milliseconds.
    pub px: Option<u64>,
    /// Only set if the key does not exist.
    pub nx: bool,
    /// Only set if the key already exists.
    pub xx: bool,
}

impl Keyspace {
    /// String stored under `key`; `None` if absent.
    fn string_ref(&mut self, key: &str) -> Result<Option<&Bytes>, StoreError> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::String(b)) => Ok(Some(b)),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// Overwrite a string in place, keeping any expiry.
    fn store_string(&mut self, key: &str, bytes: Bytes) {
        self.data.insert(key.to_owned(), Value::String(bytes));
    }

    pub fn get(&mut self, key: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(self.string_ref(key)?.cloned())
    }

    /// Returns `false` when an `nx`/`xx` condition prevented the write.
    pub fn set(
        &mut self,
        key: &str,
        value: impl ToBytes,
        opts: SetOptions,
    ) -> Result<bool, StoreError> {
        let ttl = match (opts.ex, opts.px) {
            (Some(_), Some(_)) => return Err(StoreError::Syntax("EX and PX are exclusive")),
            (Some(0), None) | (None, Some(0)) => return Err(StoreError::InvalidExpire("set")),
            (Some(secs), None) => Some(Duration::from_secs(secs)),
            (None, Some(ms)) => Some(Duration::from_millis(ms)),
            (None, None) => None,
        };
        if opts.nx && opts.xx {
            return Err(StoreError::Syntax("NX and XX are exclusive"));
        }
        let deadline = ttl
            .map(|ttl| {
                SystemTime::now()
                    .checked_add(ttl)
                    .ok_or(StoreError::InvalidExpire("set"))
            })
            .transpose()?;

        self.purge_expired();
        let present = self.data.contains_key(key);
        if (opts.nx && present) || (opts.xx && !present) {
            return Ok(false);
        }

        self.insert_entry(key, Value::String(value.to_bytes()), deadline);
        Ok(true)
    }

    pub fn setnx(&mut self, key: &str, value: impl ToBytes) -> Result<bool, StoreError> {
        self.set(
            key,
            value,
            SetOptions {
                nx: true,
                ..SetOptions::default()
            },
        )
    }

    pub fn setex(&mut self, key: &str, seconds: u64, value: impl ToBytes) -> Result<(), StoreError> {
        if seconds == 0 {
            return Err(StoreError::InvalidExpire("setex"));
        }
        self.set(
            key,
            value,
            SetOptions {
                ex: Some(seconds),
                ..SetOptions::default()
            },
        )?;
        Ok(())
    }

    pub fn psetex(&mut self, key: &str, millis: u64, value: impl ToBytes) -> Result<(), StoreError> {
        if millis == 0 {
            return Err(StoreError::InvalidExpire("psetex"));
        }
        self.set(
            key,
            value,
            SetOptions {
                px: Some(millis),
                ..SetOptions::default()
            },
        )?;
        Ok(())
    }

    pub fn getset(&mut self, key: &str, value: impl ToBytes) -> Result<Option<Bytes>, StoreError> {
        let old = self.get(key)?;
        self.replace(key, Value::String(value.to_bytes()));
        Ok(old)
    }

    /// Values for each key; non-string keys read as `None`.
    pub fn mget(&mut self, keys: &[impl AsRef<str>]) -> Result<Vec<Option<Bytes>>, StoreError> {
        self.purge_expired();
        Ok(keys
            .iter()
            .map(|k| match self.data.get(k.as_ref()) {
                Some(Value::String(b)) => Some(b.clone()),
                _ => None,
            })
            .collect())
    }

    pub fn mset<K, V>(&mut self, pairs: &[(K, V)]) -> Result<(), StoreError>
    where
        K: AsRef<str>,
        V: ToBytes,
    {
        if pairs.is_empty() {
            return Err(StoreError::WrongArity("mset"));
        }
        for (k, v) in pairs {
            self.replace(k.as_ref(), Value::String(v.to_bytes()));
        }
        Ok(())
    }

    /// Sets every pair only if none of the keys exist.
    pub fn msetnx<K, V>(&mut self, pairs: &[(K, V)]) -> Result<bool, StoreError>
    where
        K: AsRef<str>,
        V: ToBytes,
    {
        if pairs.is_empty() {
            return Err(StoreError::WrongArity("msetnx"));
        }
        self.purge_expired();
        if pairs.iter().any(|(k, _)| self.data.contains_key(k.as_ref())) {
            return Ok(false);
        }
        self.mset(pairs)?;
        Ok(true)
    }

    pub fn incr(&mut self, key: &str) -> Result<i64, StoreError> {
        self.incrby(key, 1)
    }

    pub fn decr(&mut self, key: &str) -> Result<i64, StoreError> {
        self.incrby(key, -1)
    }

    pub fn decrby(&mut self, key: &str, amount: i64) -> Result<i64, StoreError> {
        self.incrby(key, amount.checked_neg().ok_or(StoreError::Overflow)?)
    }

    pub fn incrby(&mut self, key: &str, amount: i64) -> Result<i64, StoreError> {
        let current = match self.string_ref(key)? {
            Some(b) => parse_i64(b)?,
            None => 0,
        };
        let next = current.checked_add(amount).ok_or(StoreError::Overflow)?;
        self.store_string(key, Bytes::from(next.to_string()));
        Ok(next)
    }

    pub fn incrbyfloat(&mut self, key: &str, amount: f64) -> Result<f64, StoreError> {
        let current = match self.string_ref(key)? {
            Some(b) => parse_f64(b)?,
            None => 0.0,
        };
        let next = current + amount;
        if !next.is_finite() {
            return Err(StoreError::NotFloat);
        }
        self.store_string(key, Bytes::from(next.to_string()));
        Ok(next)
    }

    pub fn append(&mut self, key: &str, value: impl ToBytes) -> Result<usize, StoreError> {
        let mut buf = BytesMut::from(self.string_ref(key)?.cloned().unwrap_or_default().as_ref());
        buf.extend_from_slice(&value.to_bytes());
        let len = buf.len();
        self.store_string(key, buf.freeze());
        Ok(len)
    }

    pub fn strlen(&mut self, key: &str) -> Result<usize, StoreError> {
        Ok(self.string_ref(key)?.map_or(0, Bytes::len))
    }

    /// Inclusive substring with negative offsets counting from the end.
    pub fn getrange(&mut self, key: &str, start: i64, end: i64) -> Result<Bytes, StoreError> {
        Ok(match self.string_ref(key)? {
            Some(b) => match inclusive_range(start, end, b.len()) {
                Some((s, e)) => b.slice(s..=e),
                None => Bytes::new(),
            },
            None => Bytes::new(),
        })
    }

    /// Overwrite from `offset`, zero-padding as needed. Returns the new length.
    pub fn setrange(
        &mut self,
        key: &str,
        offset: usize,
        value: impl ToBytes,
    ) -> Result<usize, StoreError> {
        let value = value.to_bytes();
        let current = self.string_ref(key)?.cloned();
        if value.is_empty() {
            return Ok(current.map_or(0, |b| b.len()));
        }
        let needed = offset
            .checked_add(value.len())
            .filter(|&n| n <= MAX_STRING_LEN)
            .ok_or(StoreError::StringTooLong)?;
        let mut buf = BytesMut::from(current.unwrap_or_default().as_ref());
        if buf.len() < needed {
            buf.resize(needed, 0);
        }
        buf[offset..needed].copy_from_slice(&value);
        let len = buf.len();
        self.store_string(key, buf.freeze());
        Ok(len)
    }

    /// Bit at `offset`, most significant bit of byte 0 first.
    pub fn getbit(&mut self, key: &str, offset: u64) -> Result<u8, StoreError> {
        if offset > MAX_BIT_OFFSET {
            return Err(StoreError::BitOffset);
        }
        let (byte, bit) = ((offset / 8) as usize, 7 - (offset % 8) as u32);
        Ok(match self.string_ref(key)? {
            Some(b) if byte < b.len() => (b[byte] >> bit) & 1,
            _ => 0,
        })
    }

    /// Returns the previous bit.
    pub fn setbit(&mut self, key: &str, offset: u64, bit: u8) -> Result<u8, StoreError> {
        if bit > 1 {
            return Err(StoreError::InvalidBit);
        }
        if offset > MAX_BIT_OFFSET {
            return Err(StoreError::BitOffset);
        }
        let (byte, shift) = ((offset / 8) as usize, 7 - (offset % 8) as u32);
        let mut buf = BytesMut::from(self.string_ref(key)?.cloned().unwrap_or_default().as_ref());
        if buf.len() <= byte {
            buf.resize(byte + 1, 0);
        }
        let old = (buf[byte] >> shift) & 1;
        if bit == 1 {
            buf[byte] |= 1 << shift;
        } else {
            buf[byte] &= !(1 << shift);
        }
        self.store_string(key, buf.freeze());
        Ok(old)
    }

    /// Set bits in the inclusive byte range `[start, end]`.
    pub fn bitcount(&mut self, key: &str, start: i64, end: i64) -> Result<usize, StoreError> {
        Ok(match self.string_ref(key)? {
            Some(b) => match inclusive_range(start, end, b.len()) {
                Some((s, e)) => b[s..=e].iter().map(|x| x.count_ones() as usize).sum(),
                None => 0,
            },
            None => 0,
        })
    }
}
