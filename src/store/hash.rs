use std::collections::HashMap;

use bytes::Bytes;

use super::value::{ToBytes, Value};
use super::{Keyspace, parse_f64, parse_i64};
use crate::error::StoreError;

impl Keyspace {
    fn hash_ref(&mut self, key: &str) -> Result<Option<&HashMap<Bytes, Bytes>>, StoreError> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::Hash(h)) => Ok(Some(h)),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    fn hash_entry(&mut self, key: &str) -> Result<&mut HashMap<Bytes, Bytes>, StoreError> {
        self.purge_expired();
        match self
            .data
            .entry(key.to_owned())
            .or_insert_with(|| Value::Hash(HashMap::new()))
        {
            Value::Hash(h) => Ok(h),
            _ => Err(StoreError::WrongType),
        }
    }

    /// Returns `true` if the field is new.
    pub fn hset(
        &mut self,
        key: &str,
        field: impl ToBytes,
        value: impl ToBytes,
    ) -> Result<bool, StoreError> {
        Ok(self
            .hash_entry(key)?
            .insert(field.to_bytes(), value.to_bytes())
            .is_none())
    }

    pub fn hsetnx(
        &mut self,
        key: &str,
        field: impl ToBytes,
        value: impl ToBytes,
    ) -> Result<bool, StoreError> {
        let hash = self.hash_entry(key)?;
        let field = field.to_bytes();
        if hash.contains_key(&field) {
            return Ok(false);
        }
        hash.insert(field, value.to_bytes());
        Ok(true)
    }

    pub fn hmset<F, V>(&mut self, key: &str, pairs: &[(F, V)]) -> Result<(), StoreError>
    where
        F: ToBytes,
        V: ToBytes,
    {
        if pairs.is_empty() {
            return Err(StoreError::WrongArity("hmset"));
        }
        let hash = self.hash_entry(key)?;
        for (f, v) in pairs {
            hash.insert(f.to_bytes(), v.to_bytes());
        }
        Ok(())
    }

    pub fn hget(&mut self, key: &str, field: impl ToBytes) -> Result<Option<Bytes>, StoreError> {
        Ok(self
            .hash_ref(key)?
            .and_then(|h| h.get(&field.to_bytes()))
            .cloned())
    }

    pub fn hmget(
        &mut self,
        key: &str,
        fields: &[impl ToBytes],
    ) -> Result<Vec<Option<Bytes>>, StoreError> {
        let hash = self.hash_ref(key)?;
        Ok(fields
            .iter()
            .map(|f| hash.and_then(|h| h.get(&f.to_bytes())).cloned())
            .collect())
    }

    /// Returns the number of fields actually removed.
    pub fn hdel(&mut self, key: &str, fields: &[impl ToBytes]) -> Result<usize, StoreError> {
        self.purge_expired();
        let removed = match self.data.get_mut(key) {
            None => 0,
            Some(Value::Hash(h)) => fields
                .iter()
                .filter(|f| h.remove(&f.to_bytes()).is_some())
                .count(),
            Some(_) => return Err(StoreError::WrongType),
        };
        self.drop_if_empty(key);
        Ok(removed)
    }

    pub fn hexists(&mut self, key: &str, field: impl ToBytes) -> Result<bool, StoreError> {
        Ok(self
            .hash_ref(key)?
            .is_some_and(|h| h.contains_key(&field.to_bytes())))
    }

    pub fn hgetall(&mut self, key: &str) -> Result<HashMap<Bytes, Bytes>, StoreError> {
        Ok(self.hash_ref(key)?.cloned().unwrap_or_default())
    }

    pub fn hkeys(&mut self, key: &str) -> Result<Vec<Bytes>, StoreError> {
        Ok(self
            .hash_ref(key)?
            .map(|h| h.keys().cloned().collect())
            .unwrap_or_default())
    }

    pub fn hvals(&mut self, key: &str) -> Result<Vec<Bytes>, StoreError> {
        Ok(self
            .hash_ref(key)?
            .map(|h| h.values().cloned().collect())
            .unwrap_or_default())
    }

    pub fn hlen(&mut self, key: &str) -> Result<usize, StoreError> {
        Ok(self.hash_ref(key)?.map_or(0, HashMap::len))
    }

    pub fn hstrlen(&mut self, key: &str, field: impl ToBytes) -> Result<usize, StoreError> {
        Ok(self
            .hash_ref(key)?
            .and_then(|h| h.get(&field.to_bytes()))
            .map_or(0, Bytes::len))
    }

    /// Integer increment of a field, with the parse rules of INCR.
    pub fn hincrby(
        &mut self,
        key: &str,
        field: impl ToBytes,
        amount: i64,
    ) -> Result<i64, StoreError> {
        let field = field.to_bytes();
        let current = match self.hash_ref(key)?.and_then(|h| h.get(&field)) {
            Some(raw) => parse_i64(raw)?,
            None => 0,
        };
        let next = current.checked_add(amount).ok_or(StoreError::Overflow)?;
        self.hash_entry(key)?
            .insert(field, Bytes::from(next.to_string()));
        Ok(next)
    }

    pub fn hincrbyfloat(
        &mut self,
        key: &str,
        field: impl ToBytes,
        amount: f64,
    ) -> Result<f64, StoreError> {
        let field = field.to_bytes();
        let current = match self.hash_ref(key)?.and_then(|h| h.get(&field)) {
            Some(raw) => parse_f64(raw)?,
            None => 0.0,
        };
        let next = current + amount;
        if !next.is_finite() {
            return Err(StoreError::NotFloat);
        }
        self.hash_entry(key)?
            .insert(field, Bytes::from(next.to_string()));
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_and_delete_fields() {
        let mut ks = Keyspace::new();
        assert!(ks.hset("h", "f1", "v1").unwrap());
        assert!(!ks.hset("h", "f1", "v2").unwrap());
        assert_eq!(ks.hget("h", "f1").unwrap().unwrap(), "v2");
        assert_eq!(ks.hget("h", "nope").unwrap(), None);
        assert!(ks.hexists("h", "f1").unwrap());

        ks.hset("h", "f2", 7i64).unwrap();
        assert_eq!(ks.hlen("h").unwrap(), 2);
        assert_eq!(ks.hstrlen("h", "f2").unwrap(), 1);
        assert_eq!(ks.hdel("h", &["f1", "f2", "f3"]).unwrap(), 2);
        assert_eq!(ks.exists(&["h"]).unwrap(), 0);
    }

    #[test]
    fn hmset_rejects_empty_mapping() {
        let mut ks = Keyspace::new();
        let empty: &[(&str, &str)] = &[];
        assert_eq!(ks.hmset("h", empty), Err(StoreError::WrongArity("hmset")));
        assert_eq!(ks.exists(&["h"]).unwrap(), 0);

        ks.hmset("h", &[("a", "1"), ("b", "2")]).unwrap();
        assert_eq!(
            ks.hmget("h", &["a", "x", "b"]).unwrap(),
            vec![Some(Bytes::from("1")), None, Some(Bytes::from("2"))]
        );
        let mut keys = ks.hkeys("h").unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
        let all = ks.hgetall("h").unwrap();
        assert_eq!(all.get(&Bytes::from("b")).unwrap(), "2");
        assert_eq!(ks.hvals("h").unwrap().len(), 2);
    }

    #[test]
    fn hsetnx_keeps_existing() {
        let mut ks = Keyspace::new();
        assert!(ks.hsetnx("h", "f", "1").unwrap());
        assert!(!ks.hsetnx("h", "f", "2").unwrap());
        assert_eq!(ks.hget("h", "f").unwrap().unwrap(), "1");
    }

    #[test]
    fn hincrby_parses_like_incr() {
        let mut ks = Keyspace::new();
        assert_eq!(ks.hincrby("h", "n", 5).unwrap(), 5);
        assert_eq!(ks.hincrby("h", "n", -7).unwrap(), -2);
        ks.hset("h", "s", "abc").unwrap();
        assert_eq!(ks.hincrby("h", "s", 1), Err(StoreError::NotInteger));
        assert_eq!(ks.hget("h", "s").unwrap().unwrap(), "abc");
        assert_eq!(ks.hincrbyfloat("h", "n", 0.5).unwrap(), -1.5);
    }

    #[test]
    fn hash_commands_reject_other_kinds() {
        let mut ks = Keyspace::new();
        ks.sadd("s", &["m"]).unwrap();
        assert_eq!(ks.hset("s", "f", "v"), Err(StoreError::WrongType));
        assert_eq!(ks.hgetall("s"), Err(StoreError::WrongType));
        assert_eq!(ks.scard("s").unwrap(), 1);
    }
}
