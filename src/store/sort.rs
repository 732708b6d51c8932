use std::cmp::Ordering;
use std::collections::VecDeque;

use bytes::Bytes;

use super::Keyspace;
use super::value::Value;
use super::zset::{cmp_scores, ordered};
use crate::error::StoreError;

/// Arguments of the SORT command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortOptions {
    /// LIMIT offset; must be given together with `num`.
    pub start: Option<i64>,
    /// LIMIT count; must be given together with `start`.
    pub num: Option<i64>,
    /// Weight key pattern, e.g. `weight_*` or `obj_*->field`.
    pub by: Option<String>,
    /// Projection patterns; `#` selects the element itself.
    pub get: Vec<String>,
    pub desc: bool,
    pub alpha: bool,
    /// Store the result as a list under this key instead of returning it.
    pub store: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortResult {
    Values(Vec<Option<Bytes>>),
    /// Length of the list written to `store`.
    Stored(usize),
}

enum Weight {
    Numeric(f64),
    Alpha(Option<Bytes>),
}

impl Keyspace {
    /// SORT over a list, set or sorted set.
    pub fn sort(&mut self, key: &str, opts: &SortOptions) -> Result<SortResult, StoreError> {
        if opts.start.is_some() != opts.num.is_some() {
            return Err(StoreError::Syntax("start and num must both be specified"));
        }

        let mut elements: Vec<Bytes> = match self.value(key) {
            None => Vec::new(),
            Some(Value::List(l)) => l.iter().cloned().collect(),
            Some(Value::Set(s)) => s.iter().cloned().collect(),
            Some(Value::ZSet(z)) => ordered(z).into_iter().map(|(m, _)| m).collect(),
            Some(_) => return Err(StoreError::WrongType),
        };

        let skip_sort = opts.by.as_deref().is_some_and(|p| !p.contains('*'));
        if !skip_sort {
            elements = self.sorted(elements, opts)?;
        }

        let elements = match (opts.start, opts.num) {
            (Some(start), Some(num)) => {
                let iter = elements.into_iter().skip(start.max(0) as usize);
                if num < 0 {
                    iter.collect()
                } else {
                    iter.take(num as usize).collect()
                }
            }
            _ => elements,
        };

        let values: Vec<Option<Bytes>> = if opts.get.is_empty() {
            elements.into_iter().map(Some).collect()
        } else {
            let this: &Keyspace = self;
            elements
                .iter()
                .flat_map(|element| {
                    opts.get.iter().map(move |pattern| {
                        if pattern == "#" {
                            Some(element.clone())
                        } else {
                            this.lookup(pattern, element)
                        }
                    })
                })
                .collect()
        };

        match &opts.store {
            Some(dest) => {
                let list: VecDeque<Bytes> = values
                    .into_iter()
                    .map(Option::unwrap_or_default)
                    .collect();
                let len = list.len();
                self.replace(dest, Value::List(list));
                Ok(SortResult::Stored(len))
            }
            None => Ok(SortResult::Values(values)),
        }
    }

    fn sorted(&self, elements: Vec<Bytes>, opts: &SortOptions) -> Result<Vec<Bytes>, StoreError> {
        let mut weighted = elements
            .into_iter()
            .map(|element| {
                let raw = match &opts.by {
                    Some(pattern) => self.lookup(pattern, &element),
                    None => Some(element.clone()),
                };
                let weight = if opts.alpha {
                    Weight::Alpha(raw)
                } else {
                    match raw {
                        Some(raw) => {
                            Weight::Numeric(parse_c_double(&raw).ok_or(StoreError::NotDouble)?)
                        }
                        None => Weight::Numeric(0.0),
                    }
                };
                Ok((element, weight))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        weighted.sort_by(|(ea, wa), (eb, wb)| {
            let ord = match (wa, wb) {
                (Weight::Numeric(a), Weight::Numeric(b)) => cmp_scores(*a, *b),
                (Weight::Alpha(a), Weight::Alpha(b)) => a.cmp(b),
                _ => Ordering::Equal,
            }
            .then_with(|| ea.cmp(eb));
            if opts.desc { ord.reverse() } else { ord }
        });

        Ok(weighted.into_iter().map(|(element, _)| element).collect())
    }

    /// Resolve a `*` pattern for one element: a string key, or a hash field
    /// when the pattern ends in `->field`. Lookups never purge, so callers
    /// must have purged already.
    fn lookup(&self, pattern: &str, element: &Bytes) -> Option<Bytes> {
        let (key_pattern, field) = match pattern.rfind("->") {
            Some(at) if at + 2 < pattern.len() => (&pattern[..at], Some(&pattern[at + 2..])),
            _ => (pattern, None),
        };
        let key = key_pattern.replacen('*', &String::from_utf8_lossy(element), 1);
        match (self.data.get(&key)?, field) {
            (Value::String(b), None) => Some(b.clone()),
            (Value::Hash(h), Some(field)) => h.get(field.as_bytes()).cloned(),
            _ => None,
        }
    }
}

/// Parse the leading numeric prefix of `raw` like C `strtod` in the C
/// locale. Returns `None` when no prefix is numeric.
pub(crate) fn parse_c_double(raw: &[u8]) -> Option<f64> {
    let text = std::str::from_utf8(raw).ok()?.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }

    let rest = &text[end..];
    for word in ["infinity", "inf", "nan"] {
        if rest.len() >= word.len()
            && rest.as_bytes()[..word.len()].eq_ignore_ascii_case(word.as_bytes())
        {
            return text[..end + word.len()].parse().ok();
        }
    }

    let digits_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut mantissa_digits = end - digits_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    let prefix = &text[..end];
    // "5." is valid for strtod but not for Rust's parser.
    prefix.trim_end_matches('.').parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::string::SetOptions;

    fn values(result: SortResult) -> Vec<Option<Bytes>> {
        match result {
            SortResult::Values(v) => v,
            SortResult::Stored(n) => panic!("expected values, got stored {n}"),
        }
    }

    fn strings(items: &[&str]) -> Vec<Option<Bytes>> {
        items
            .iter()
            .map(|s| Some(Bytes::copy_from_slice(s.as_bytes())))
            .collect()
    }

    #[test]
    fn signed_zero_weights_tie_on_element() {
        let mut ks = Keyspace::new();
        ks.rpush("l", &["b", "a"]).unwrap();
        ks.set("w_a", "0", SetOptions::default()).unwrap();
        ks.set("w_b", "-0", SetOptions::default()).unwrap();
        let by = SortOptions {
            by: Some("w_*".into()),
            ..Default::default()
        };
        assert_eq!(values(ks.sort("l", &by).unwrap()), strings(&["a", "b"]));
    }

    #[test]
    fn numeric_versus_alpha() {
        let mut ks = Keyspace::new();
        ks.rpush("l", &["10", "9", "2"]).unwrap();
        let numeric = ks.sort("l", &SortOptions::default()).unwrap();
        assert_eq!(values(numeric), strings(&["2", "9", "10"]));

        let alpha = SortOptions {
            alpha: true,
            ..Default::default()
        };
        assert_eq!(values(ks.sort("l", &alpha).unwrap()), strings(&["10", "2", "9"]));

        let desc = SortOptions {
            desc: true,
            ..Default::default()
        };
        assert_eq!(values(ks.sort("l", &desc).unwrap()), strings(&["10", "9", "2"]));
    }

    #[test]
    fn non_numeric_element_requires_alpha() {
        let mut ks = Keyspace::new();
        ks.rpush("l", &["1", "abc"]).unwrap();
        assert_eq!(ks.sort("l", &SortOptions::default()), Err(StoreError::NotDouble));
    }

    #[test]
    fn by_and_get_patterns() {
        let mut ks = Keyspace::new();
        ks.sadd("ids", &["1", "2", "3"]).unwrap();
        ks.mset(&[("w_1", "30"), ("w_2", "10"), ("w_3", "20")]).unwrap();
        ks.hset("obj_1", "name", "one").unwrap();
        ks.hset("obj_2", "name", "two").unwrap();

        let by = SortOptions {
            by: Some("w_*".into()),
            ..Default::default()
        };
        assert_eq!(values(ks.sort("ids", &by).unwrap()), strings(&["2", "3", "1"]));

        let projected = SortOptions {
            by: Some("w_*".into()),
            get: vec!["#".into(), "obj_*->name".into()],
            ..Default::default()
        };
        assert_eq!(
            values(ks.sort("ids", &projected).unwrap()),
            vec![
                Some(Bytes::from("2")),
                Some(Bytes::from("two")),
                Some(Bytes::from("3")),
                None,
                Some(Bytes::from("1")),
                Some(Bytes::from("one")),
            ]
        );
    }

    #[test]
    fn limit_and_store() {
        let mut ks = Keyspace::new();
        ks.rpush("l", &[5i64, 3, 1, 4, 2]).unwrap();
        let opts = SortOptions {
            start: Some(1),
            num: Some(3),
            store: Some("out".into()),
            ..Default::default()
        };
        assert_eq!(ks.sort("l", &opts).unwrap(), SortResult::Stored(3));
        assert_eq!(ks.lrange("out", 0, -1).unwrap(), vec!["2", "3", "4"]);

        let half = SortOptions {
            start: Some(1),
            ..Default::default()
        };
        assert_eq!(
            ks.sort("l", &half),
            Err(StoreError::Syntax("start and num must both be specified"))
        );
    }

    #[test]
    fn by_without_star_keeps_order() {
        let mut ks = Keyspace::new();
        ks.rpush("l", &["b", "a", "c"]).unwrap();
        let opts = SortOptions {
            by: Some("nosort".into()),
            ..Default::default()
        };
        assert_eq!(values(ks.sort("l", &opts).unwrap()), strings(&["b", "a", "c"]));
    }

    #[test]
    fn sorts_zset_members_and_rejects_strings() {
        let mut ks = Keyspace::new();
        ks.zadd("z", &[(1.0, "30"), (2.0, "20")]).unwrap();
        assert_eq!(
            values(ks.sort("z", &SortOptions::default()).unwrap()),
            strings(&["20", "30"])
        );
        ks.set("s", "v", SetOptions::default()).unwrap();
        assert_eq!(ks.sort("s", &SortOptions::default()), Err(StoreError::WrongType));
    }

    #[test]
    fn c_double_prefixes() {
        assert_eq!(parse_c_double(b"  12abc"), Some(12.0));
        assert_eq!(parse_c_double(b"-1.5e3x"), Some(-1500.0));
        assert_eq!(parse_c_double(b"5."), Some(5.0));
        assert_eq!(parse_c_double(b".5"), Some(0.5));
        assert_eq!(parse_c_double(b"1e"), Some(1.0));
        assert_eq!(parse_c_double(b"inf"), Some(f64::INFINITY));
        assert_eq!(parse_c_double(b"abc"), None);
        assert_eq!(parse_c_double(b"."), None);
        assert_eq!(parse_c_double(b""), None);
    }
}
