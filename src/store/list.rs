use std::collections::VecDeque;

use bytes::Bytes;

use super::value::{ToBytes, Value};
use super::{Keyspace, inclusive_range};
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Before,
    After,
}

impl Keyspace {
    fn list_ref(&mut self, key: &str) -> Result<Option<&VecDeque<Bytes>>, StoreError> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::List(l)) => Ok(Some(l)),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    fn list_mut(&mut self, key: &str) -> Result<Option<&mut VecDeque<Bytes>>, StoreError> {
        self.purge_expired();
        match self.data.get_mut(key) {
            None => Ok(None),
            Some(Value::List(l)) => Ok(Some(l)),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// The list under `key`, created empty if absent.
    fn list_entry(&mut self, key: &str) -> Result<&mut VecDeque<Bytes>, StoreError> {
        self.purge_expired();
        match self
            .data
            .entry(key.to_owned())
            .or_insert_with(|| Value::List(VecDeque::new()))
        {
            Value::List(l) => Ok(l),
            _ => Err(StoreError::WrongType),
        }
    }

    /// Inserts each value at the head in turn, so the last one ends up first.
    pub fn lpush(&mut self, key: &str, values: &[impl ToBytes]) -> Result<usize, StoreError> {
        if values.is_empty() {
            return Err(StoreError::WrongArity("lpush"));
        }
        let list = self.list_entry(key)?;
        for v in values {
            list.push_front(v.to_bytes());
        }
        Ok(list.len())
    }

    pub fn rpush(&mut self, key: &str, values: &[impl ToBytes]) -> Result<usize, StoreError> {
        if values.is_empty() {
            return Err(StoreError::WrongArity("rpush"));
        }
        let list = self.list_entry(key)?;
        for v in values {
            list.push_back(v.to_bytes());
        }
        Ok(list.len())
    }

    /// Push only onto an existing list; returns 0 otherwise.
    pub fn lpushx(&mut self, key: &str, value: impl ToBytes) -> Result<usize, StoreError> {
        Ok(match self.list_mut(key)? {
            Some(list) => {
                list.push_front(value.to_bytes());
                list.len()
            }
            None => 0,
        })
    }

    pub fn rpushx(&mut self, key: &str, value: impl ToBytes) -> Result<usize, StoreError> {
        Ok(match self.list_mut(key)? {
            Some(list) => {
                list.push_back(value.to_bytes());
                list.len()
            }
            None => 0,
        })
    }

    pub fn llen(&mut self, key: &str) -> Result<usize, StoreError> {
        Ok(self.list_ref(key)?.map_or(0, VecDeque::len))
    }

    pub fn lrange(&mut self, key: &str, start: i64, end: i64) -> Result<Vec<Bytes>, StoreError> {
        Ok(match self.list_ref(key)? {
            Some(list) => match inclusive_range(start, end, list.len()) {
                Some((s, e)) => list.range(s..=e).cloned().collect(),
                None => Vec::new(),
            },
            None => Vec::new(),
        })
    }

    pub fn lindex(&mut self, key: &str, index: i64) -> Result<Option<Bytes>, StoreError> {
        Ok(self
            .list_ref(key)?
            .and_then(|list| resolve_index(index, list.len()).and_then(|i| list.get(i)))
            .cloned())
    }

    pub fn lset(&mut self, key: &str, index: i64, value: impl ToBytes) -> Result<(), StoreError> {
        let list = self.list_mut(key)?.ok_or(StoreError::NoSuchKey)?;
        let i = resolve_index(index, list.len()).ok_or(StoreError::IndexOutOfRange)?;
        list[i] = value.to_bytes();
        Ok(())
    }

    /// Returns the new length, -1 if `pivot` is absent, 0 if the key is absent.
    pub fn linsert(
        &mut self,
        key: &str,
        position: InsertPosition,
        pivot: impl ToBytes,
        value: impl ToBytes,
    ) -> Result<i64, StoreError> {
        let Some(list) = self.list_mut(key)? else {
            return Ok(0);
        };
        let pivot = pivot.to_bytes();
        let Some(at) = list.iter().position(|v| *v == pivot) else {
            return Ok(-1);
        };
        let at = match position {
            InsertPosition::Before => at,
            InsertPosition::After => at + 1,
        };
        list.insert(at, value.to_bytes());
        Ok(list.len() as i64)
    }

    /// Removes matches of `value`: from the head if `count > 0`, from the
    /// tail if `count < 0`, everywhere if `count == 0`.
    pub fn lrem(&mut self, key: &str, count: i64, value: impl ToBytes) -> Result<usize, StoreError> {
        let value = value.to_bytes();
        let Some(list) = self.list_mut(key)? else {
            return Ok(0);
        };
        let limit = if count == 0 {
            usize::MAX
        } else {
            count.unsigned_abs() as usize
        };
        let mut removed = 0;
        if count >= 0 {
            let mut i = 0;
            while i < list.len() && removed < limit {
                if list[i] == value {
                    list.remove(i);
                    removed += 1;
                } else {
                    i += 1;
                }
            }
        } else {
            let mut i = list.len();
            while i > 0 && removed < limit {
                i -= 1;
                if list[i] == value {
                    list.remove(i);
                    removed += 1;
                }
            }
        }
        self.drop_if_empty(key);
        Ok(removed)
    }

    /// Keep only the inclusive range `[start, end]`.
    pub fn ltrim(&mut self, key: &str, start: i64, end: i64) -> Result<(), StoreError> {
        let Some(list) = self.list_mut(key)? else {
            return Ok(());
        };
        match inclusive_range(start, end, list.len()) {
            Some((s, e)) => {
                list.truncate(e + 1);
                list.drain(..s);
            }
            None => list.clear(),
        }
        self.drop_if_empty(key);
        Ok(())
    }

    pub fn lpop(&mut self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let popped = self.list_mut(key)?.and_then(VecDeque::pop_front);
        self.drop_if_empty(key);
        Ok(popped)
    }

    pub fn rpop(&mut self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let popped = self.list_mut(key)?.and_then(VecDeque::pop_back);
        self.drop_if_empty(key);
        Ok(popped)
    }

    /// Pop the tail of `src` and push it onto the head of `dst`.
    pub fn rpoplpush(&mut self, src: &str, dst: &str) -> Result<Option<Bytes>, StoreError> {
        // Type-check the destination before mutating the source.
        self.list_ref(dst)?;
        let Some(value) = self.rpop(src)? else {
            return Ok(None);
        };
        self.list_entry(dst)?.push_front(value.clone());
        Ok(Some(value))
    }

    /// Non-blocking BLPOP: first element of the first non-empty list, if any.
    /// `timeout` is accepted for interface compatibility and ignored.
    pub fn blpop(
        &mut self,
        keys: &[impl AsRef<str>],
        _timeout: u64,
    ) -> Result<Option<(String, Bytes)>, StoreError> {
        for key in keys.iter().map(AsRef::<str>::as_ref) {
            if let Some(value) = self.lpop(key)? {
                return Ok(Some((key.to_owned(), value)));
            }
        }
        Ok(None)
    }

    pub fn brpop(
        &mut self,
        keys: &[impl AsRef<str>],
        _timeout: u64,
    ) -> Result<Option<(String, Bytes)>, StoreError> {
        for key in keys.iter().map(AsRef::<str>::as_ref) {
            if let Some(value) = self.rpop(key)? {
                return Ok(Some((key.to_owned(), value)));
            }
        }
        Ok(None)
    }

    pub fn brpoplpush(
        &mut self,
        src: &str,
        dst: &str,
        _timeout: u64,
    ) -> Result<Option<Bytes>, StoreError> {
        self.rpoplpush(src, dst)
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let i = if index < 0 { len as i64 + index } else { index };
    (0..len as i64).contains(&i).then_some(i as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(ks: &mut Keyspace, key: &str) -> Vec<Bytes> {
        ks.lrange(key, 0, -1).unwrap()
    }

    #[test]
    fn push_order() {
        let mut ks = Keyspace::new();
        assert_eq!(ks.rpush("r", &["one", "two", "three"]).unwrap(), 3);
        assert_eq!(range(&mut ks, "r"), vec!["one", "two", "three"]);

        assert_eq!(ks.lpush("l", &["one", "two", "three"]).unwrap(), 3);
        assert_eq!(range(&mut ks, "l"), vec!["three", "two", "one"]);
    }

    #[test]
    fn pushx_requires_existing_list() {
        let mut ks = Keyspace::new();
        assert_eq!(ks.lpushx("l", "a").unwrap(), 0);
        assert_eq!(ks.exists(&["l"]).unwrap(), 0);
        ks.rpush("l", &["b"]).unwrap();
        assert_eq!(ks.lpushx("l", "a").unwrap(), 2);
        assert_eq!(ks.rpushx("l", "c").unwrap(), 3);
        assert_eq!(range(&mut ks, "l"), vec!["a", "b", "c"]);
    }

    #[test]
    fn lrange_bounds() {
        let mut ks = Keyspace::new();
        ks.rpush("l", &["a", "b", "c", "d"]).unwrap();
        assert_eq!(ks.lrange("l", 1, 2).unwrap(), vec!["b", "c"]);
        assert_eq!(ks.lrange("l", -2, -1).unwrap(), vec!["c", "d"]);
        assert_eq!(ks.lrange("l", 3, 100).unwrap(), vec!["d"]);
        assert!(ks.lrange("l", 5, 10).unwrap().is_empty());
        assert!(ks.lrange("nope", 0, -1).unwrap().is_empty());
    }

    #[test]
    fn lrem_directions() {
        let mut ks = Keyspace::new();
        ks.rpush("l", &["a", "x", "b", "x", "c", "x"]).unwrap();
        assert_eq!(ks.lrem("l", 1, "x").unwrap(), 1);
        assert_eq!(range(&mut ks, "l"), vec!["a", "b", "x", "c", "x"]);
        assert_eq!(ks.lrem("l", -1, "x").unwrap(), 1);
        assert_eq!(range(&mut ks, "l"), vec!["a", "b", "x", "c"]);
        ks.rpush("l", &["x"]).unwrap();
        assert_eq!(ks.lrem("l", 0, "x").unwrap(), 2);
        assert_eq!(range(&mut ks, "l"), vec!["a", "b", "c"]);
    }

    #[test]
    fn lset_lindex_linsert() {
        let mut ks = Keyspace::new();
        assert_eq!(ks.lset("l", 0, "x"), Err(StoreError::NoSuchKey));
        ks.rpush("l", &["a", "b", "c"]).unwrap();
        ks.lset("l", -1, "z").unwrap();
        assert_eq!(ks.lindex("l", 2).unwrap().unwrap(), "z");
        assert_eq!(ks.lindex("l", 3).unwrap(), None);
        assert_eq!(ks.lset("l", 3, "x"), Err(StoreError::IndexOutOfRange));

        assert_eq!(ks.linsert("l", InsertPosition::Before, "b", "a2").unwrap(), 4);
        assert_eq!(ks.linsert("l", InsertPosition::After, "z", "end").unwrap(), 5);
        assert_eq!(ks.linsert("l", InsertPosition::After, "nope", "x").unwrap(), -1);
        assert_eq!(ks.linsert("other", InsertPosition::After, "a", "x").unwrap(), 0);
        assert_eq!(range(&mut ks, "l"), vec!["a", "a2", "b", "z", "end"]);
    }

    #[test]
    fn ltrim_and_pops_remove_empty_lists() {
        let mut ks = Keyspace::new();
        ks.rpush("l", &["a", "b", "c", "d"]).unwrap();
        ks.ltrim("l", 1, -2).unwrap();
        assert_eq!(range(&mut ks, "l"), vec!["b", "c"]);
        assert_eq!(ks.lpop("l").unwrap().unwrap(), "b");
        assert_eq!(ks.rpop("l").unwrap().unwrap(), "c");
        assert_eq!(ks.lpop("l").unwrap(), None);
        assert_eq!(ks.exists(&["l"]).unwrap(), 0);

        ks.rpush("t", &["a"]).unwrap();
        ks.ltrim("t", 5, 10).unwrap();
        assert_eq!(ks.exists(&["t"]).unwrap(), 0);
    }

    #[test]
    fn rpoplpush_moves_and_rotates() {
        let mut ks = Keyspace::new();
        ks.rpush("src", &["a", "b", "c"]).unwrap();
        assert_eq!(ks.rpoplpush("src", "dst").unwrap().unwrap(), "c");
        assert_eq!(range(&mut ks, "dst"), vec!["c"]);
        assert_eq!(ks.rpoplpush("src", "src").unwrap().unwrap(), "b");
        assert_eq!(range(&mut ks, "src"), vec!["b", "a"]);
        assert_eq!(ks.rpoplpush("empty", "dst").unwrap(), None);

        ks.set("str", "v", Default::default()).unwrap();
        assert_eq!(ks.rpoplpush("src", "str"), Err(StoreError::WrongType));
        assert_eq!(ks.llen("src").unwrap(), 2);
    }

    #[test]
    fn blocking_pops_scan_in_order() {
        let mut ks = Keyspace::new();
        ks.rpush("second", &["x", "y"]).unwrap();
        assert_eq!(
            ks.blpop(&["first", "second"], 5).unwrap(),
            Some(("second".to_string(), Bytes::from("x")))
        );
        assert_eq!(
            ks.brpop(&["first", "second"], 0).unwrap(),
            Some(("second".to_string(), Bytes::from("y")))
        );
        assert_eq!(ks.blpop(&["first", "second"], 1).unwrap(), None);
        assert_eq!(ks.brpoplpush("first", "dst", 1).unwrap(), None);
    }
}
