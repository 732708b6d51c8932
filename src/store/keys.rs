use std::time::{Duration, SystemTime};

use rand::seq::IteratorRandom;

use super::Keyspace;
use super::value::ValueKind;
use crate::error::StoreError;

impl Keyspace {
    pub fn exists(&mut self, keys: &[impl AsRef<str>]) -> Result<usize, StoreError> {
        self.purge_expired();
        Ok(keys
            .iter()
            .map(AsRef::<str>::as_ref)
            .filter(|k| self.data.contains_key(*k))
            .count())
    }

    pub fn delete(&mut self, keys: &[impl AsRef<str>]) -> Result<usize, StoreError> {
        self.purge_expired();
        Ok(keys
            .iter()
            .map(AsRef::<str>::as_ref)
            .filter(|k| self.remove(k).is_some())
            .count())
    }

    pub fn key_type(&mut self, key: &str) -> Result<Option<ValueKind>, StoreError> {
        Ok(self.value(key).map(|v| v.kind()))
    }

    /// Keys matching a glob pattern (`*`, `?`, `[...]`, `\` escapes).
    pub fn keys(&mut self, pattern: &str) -> Result<Vec<String>, StoreError> {
        self.purge_expired();
        let mut keys: Vec<String> = self
            .data
            .keys()
            .filter(|k| glob_match(pattern.as_bytes(), k.as_bytes()))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    pub fn randomkey(&mut self) -> Result<Option<String>, StoreError> {
        self.purge_expired();
        Ok(self.data.keys().choose(&mut rand::thread_rng()).cloned())
    }

    pub fn dbsize(&mut self) -> Result<usize, StoreError> {
        self.purge_expired();
        Ok(self.data.len())
    }

    pub fn flushdb(&mut self) -> Result<(), StoreError> {
        tracing::debug!(keys = self.data.len(), "flushing keyspace");
        self.data.clear();
        self.expiry.clear();
        Ok(())
    }

    /// Move value and expiry from `src` to `dst`, overwriting `dst`.
    pub fn rename(&mut self, src: &str, dst: &str) -> Result<(), StoreError> {
        self.purge_expired();
        let (value, deadline) = self.remove(src).ok_or(StoreError::NoSuchKey)?;
        tracing::debug!(src, dst, "renaming key");
        self.insert_entry(dst, value, deadline);
        Ok(())
    }

    pub fn renamenx(&mut self, src: &str, dst: &str) -> Result<bool, StoreError> {
        self.purge_expired();
        if !self.data.contains_key(src) {
            return Err(StoreError::NoSuchKey);
        }
        if self.data.contains_key(dst) {
            return Ok(false);
        }
        self.rename(src, dst)?;
        Ok(true)
    }

    pub fn expire(&mut self, key: &str, seconds: i64) -> Result<bool, StoreError> {
        self.pexpire(key, seconds.saturating_mul(1000))
    }

    pub fn pexpire(&mut self, key: &str, millis: i64) -> Result<bool, StoreError> {
        let now = SystemTime::now();
        let deadline = if millis >= 0 {
            now.checked_add(Duration::from_millis(millis as u64))
        } else {
            now.checked_sub(Duration::from_millis(millis.unsigned_abs()))
        }
        .ok_or(StoreError::InvalidExpire("pexpire"))?;
        self.expireat(key, deadline)
    }

    pub fn expireat(&mut self, key: &str, when: SystemTime) -> Result<bool, StoreError> {
        self.purge_expired();
        if !self.data.contains_key(key) {
            return Ok(false);
        }
        self.expiry.set_deadline(key.to_owned(), when);
        Ok(true)
    }

    /// Remaining time to live in seconds, rounded to the nearest second.
    pub fn ttl(&mut self, key: &str) -> Result<Option<i64>, StoreError> {
        Ok(self
            .remaining(key)
            .map(|left| left.as_secs_f64().round() as i64))
    }

    pub fn pttl(&mut self, key: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.remaining(key).map(|left| left.as_millis() as i64))
    }

    pub fn persist(&mut self, key: &str) -> Result<bool, StoreError> {
        self.purge_expired();
        Ok(self.data.contains_key(key) && self.expiry.remove(key).is_some())
    }

    fn remaining(&mut self, key: &str) -> Option<Duration> {
        self.purge_expired();
        if !self.data.contains_key(key) {
            return None;
        }
        let deadline = self.expiry.get_deadline(key)?;
        Some(
            deadline
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO),
        )
    }
}

/// Glob matching with the pattern syntax of the emulated KEYS command.
pub(crate) fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Position after the last `*` and the text index it is currently absorbing.
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                b'*' => {
                    star = Some((p + 1, t));
                    p += 1;
                    continue;
                }
                b'?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                b'[' => {
                    if let Some((matched, next)) = match_class(pattern, p, text[t]) {
                        if matched {
                            p = next;
                            t += 1;
                            continue;
                        }
                    }
                }
                b'\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == text[t] {
                        p += 2;
                        t += 1;
                        continue;
                    }
                }
                c if c == text[t] => {
                    p += 1;
                    t += 1;
                    continue;
                }
                _ => {}
            }
        }
        match star {
            Some((sp, st)) => {
                p = sp;
                t = st + 1;
                star = Some((sp, st + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

/// Match one byte against the `[...]` class starting at `start`. Returns
/// whether it matched and the pattern index just past the class.
fn match_class(pattern: &[u8], start: usize, byte: u8) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = matches!(pattern.get(i), Some(b'^') | Some(b'!'));
    if negate {
        i += 1;
    }
    let mut matched = false;
    let mut first = true;
    loop {
        let c = *pattern.get(i)?;
        if c == b']' && !first {
            break;
        }
        first = false;
        let c = if c == b'\\' {
            i += 1;
            *pattern.get(i)?
        } else {
            c
        };
        if pattern.get(i + 1) == Some(&b'-') && pattern.get(i + 2).is_some_and(|&e| e != b']') {
            let end = pattern[i + 2];
            let (lo, hi) = if c <= end { (c, end) } else { (end, c) };
            if (lo..=hi).contains(&byte) {
                matched = true;
            }
            i += 3;
        } else {
            if c == byte {
                matched = true;
            }
            i += 1;
        }
    }
    Some((matched != negate, i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::string::SetOptions;

    #[test]
    fn glob_patterns() {
        assert!(glob_match(b"*", b"anything"));
        assert!(glob_match(b"h?llo", b"hello"));
        assert!(glob_match(b"h*llo", b"heeeello"));
        assert!(glob_match(b"h[ae]llo", b"hallo"));
        assert!(!glob_match(b"h[ae]llo", b"hillo"));
        assert!(glob_match(b"h[^e]llo", b"hallo"));
        assert!(!glob_match(b"h[^e]llo", b"hello"));
        assert!(glob_match(b"h[a-c]llo", b"hbllo"));
        assert!(glob_match(b"h\\*llo", b"h*llo"));
        assert!(!glob_match(b"h\\*llo", b"hello"));
        assert!(!glob_match(b"foo", b"foobar"));
        assert!(glob_match(b"foo*", b"foo"));
    }

    #[test]
    fn rename_moves_value_and_expiry() {
        let mut ks = Keyspace::new();
        ks.set("a", "1", SetOptions::default()).unwrap();
        ks.expire("a", 100).unwrap();
        ks.rename("a", "b").unwrap();

        assert_eq!(ks.exists(&["a"]).unwrap(), 0);
        assert_eq!(ks.get("b").unwrap().unwrap(), "1");
        assert_eq!(ks.ttl("b").unwrap(), Some(100));
        assert_eq!(ks.rename("missing", "c"), Err(StoreError::NoSuchKey));
    }

    #[test]
    fn persist_and_ttl() {
        let mut ks = Keyspace::new();
        assert_eq!(ks.ttl("k").unwrap(), None);
        assert!(!ks.expire("k", 10).unwrap());

        ks.set("k", "v", SetOptions::default()).unwrap();
        assert_eq!(ks.ttl("k").unwrap(), None);
        assert!(ks.expire("k", 10).unwrap());
        assert_eq!(ks.ttl("k").unwrap(), Some(10));
        assert!(ks.persist("k").unwrap());
        assert!(!ks.persist("k").unwrap());
        assert_eq!(ks.ttl("k").unwrap(), None);
    }

    #[test]
    fn negative_expire_removes_key_on_next_access() {
        let mut ks = Keyspace::new();
        ks.set("k", "v", SetOptions::default()).unwrap();
        assert!(ks.pexpire("k", -1).unwrap());
        assert_eq!(ks.get("k").unwrap(), None);
        assert_eq!(ks.dbsize().unwrap(), 0);
    }

    #[test]
    fn keys_type_and_delete() {
        let mut ks = Keyspace::new();
        ks.set("one", "1", SetOptions::default()).unwrap();
        ks.rpush("two", &["x"]).unwrap();
        ks.sadd("three", &["y"]).unwrap();

        assert_eq!(ks.keys("t*").unwrap(), vec!["three", "two"]);
        assert_eq!(ks.key_type("two").unwrap(), Some(ValueKind::List));
        assert_eq!(ks.key_type("nope").unwrap(), None);
        assert_eq!(ks.delete(&["one", "two", "nope"]).unwrap(), 2);
        assert_eq!(ks.randomkey().unwrap().as_deref(), Some("three"));
    }

    #[test]
    fn renamenx_refuses_existing_destination() {
        let mut ks = Keyspace::new();
        ks.set("a", "1", SetOptions::default()).unwrap();
        ks.set("b", "2", SetOptions::default()).unwrap();
        assert!(!ks.renamenx("a", "b").unwrap());
        assert!(ks.renamenx("a", "c").unwrap());
        assert_eq!(ks.get("c").unwrap().unwrap(), "1");
    }
}
