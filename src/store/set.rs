use std::collections::HashSet;

use bytes::Bytes;
use rand::seq::IteratorRandom;

use super::Keyspace;
use super::value::{ToBytes, Value};
use crate::error::StoreError;

impl Keyspace {
    fn set_ref(&mut self, key: &str) -> Result<Option<&HashSet<Bytes>>, StoreError> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::Set(s)) => Ok(Some(s)),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    fn set_mut(&mut self, key: &str) -> Result<Option<&mut HashSet<Bytes>>, StoreError> {
        self.purge_expired();
        match self.data.get_mut(key) {
            None => Ok(None),
            Some(Value::Set(s)) => Ok(Some(s)),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    fn set_entry(&mut self, key: &str) -> Result<&mut HashSet<Bytes>, StoreError> {
        self.purge_expired();
        match self
            .data
            .entry(key.to_owned())
            .or_insert_with(|| Value::Set(HashSet::new()))
        {
            Value::Set(s) => Ok(s),
            _ => Err(StoreError::WrongType),
        }
    }

    /// Returns how many members were not already present.
    pub fn sadd(&mut self, key: &str, members: &[impl ToBytes]) -> Result<usize, StoreError> {
        if members.is_empty() {
            return Err(StoreError::WrongArity("sadd"));
        }
        let set = self.set_entry(key)?;
        Ok(members.iter().filter(|m| set.insert(m.to_bytes())).count())
    }

    pub fn srem(&mut self, key: &str, members: &[impl ToBytes]) -> Result<usize, StoreError> {
        let removed = match self.set_mut(key)? {
            Some(set) => members.iter().filter(|m| set.remove(&m.to_bytes())).count(),
            None => 0,
        };
        self.drop_if_empty(key);
        Ok(removed)
    }

    pub fn scard(&mut self, key: &str) -> Result<usize, StoreError> {
        Ok(self.set_ref(key)?.map_or(0, HashSet::len))
    }

    pub fn sismember(&mut self, key: &str, member: impl ToBytes) -> Result<bool, StoreError> {
        Ok(self
            .set_ref(key)?
            .is_some_and(|s| s.contains(&member.to_bytes())))
    }

    pub fn smembers(&mut self, key: &str) -> Result<HashSet<Bytes>, StoreError> {
        Ok(self.set_ref(key)?.cloned().unwrap_or_default())
    }

    /// Collect the sets named by `keys`, absent keys reading as empty.
    fn collect_sets(&mut self, keys: &[impl AsRef<str>]) -> Result<Vec<HashSet<Bytes>>, StoreError> {
        keys.iter()
            .map(|k| self.smembers(k.as_ref()))
            .collect()
    }

    /// Members of the first set absent from every other set.
    pub fn sdiff(&mut self, keys: &[impl AsRef<str>]) -> Result<HashSet<Bytes>, StoreError> {
        let mut sets = self.collect_sets(keys)?.into_iter();
        let first = sets.next().ok_or(StoreError::WrongArity("sdiff"))?;
        Ok(sets.fold(first, |acc, s| &acc - &s))
    }

    pub fn sinter(&mut self, keys: &[impl AsRef<str>]) -> Result<HashSet<Bytes>, StoreError> {
        let mut sets = self.collect_sets(keys)?.into_iter();
        let first = sets.next().ok_or(StoreError::WrongArity("sinter"))?;
        Ok(sets.fold(first, |acc, s| &acc & &s))
    }

    pub fn sunion(&mut self, keys: &[impl AsRef<str>]) -> Result<HashSet<Bytes>, StoreError> {
        if keys.is_empty() {
            return Err(StoreError::WrongArity("sunion"));
        }
        Ok(self.collect_sets(keys)?.into_iter().flatten().collect())
    }

    pub fn sdiffstore(&mut self, dest: &str, keys: &[impl AsRef<str>]) -> Result<usize, StoreError> {
        let result = self.sdiff(keys)?;
        Ok(self.store_set(dest, result))
    }

    pub fn sinterstore(&mut self, dest: &str, keys: &[impl AsRef<str>]) -> Result<usize, StoreError> {
        let result = self.sinter(keys)?;
        Ok(self.store_set(dest, result))
    }

    pub fn sunionstore(&mut self, dest: &str, keys: &[impl AsRef<str>]) -> Result<usize, StoreError> {
        let result = self.sunion(keys)?;
        Ok(self.store_set(dest, result))
    }

    fn store_set(&mut self, dest: &str, members: HashSet<Bytes>) -> usize {
        let len = members.len();
        self.replace(dest, Value::Set(members));
        len
    }

    /// Move `member` from `src` to `dst`; `false` if it was not in `src`.
    pub fn smove(&mut self, src: &str, dst: &str, member: impl ToBytes) -> Result<bool, StoreError> {
        let member = member.to_bytes();
        self.set_ref(dst)?;
        let moved = match self.set_mut(src)? {
            Some(set) => set.remove(&member),
            None => false,
        };
        if !moved {
            return Ok(false);
        }
        self.drop_if_empty(src);
        self.set_entry(dst)?.insert(member);
        Ok(true)
    }

    /// Remove and return an arbitrary member.
    pub fn spop(&mut self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let popped = match self.set_mut(key)? {
            Some(set) => {
                let pick = set.iter().choose(&mut rand::thread_rng()).cloned();
                if let Some(member) = &pick {
                    set.remove(member);
                }
                pick
            }
            None => None,
        };
        self.drop_if_empty(key);
        Ok(popped)
    }

    pub fn srandmember(&mut self, key: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(self
            .set_ref(key)?
            .and_then(|s| s.iter().choose(&mut rand::thread_rng()).cloned()))
    }
}
