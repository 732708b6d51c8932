use std::cmp::Ordering;
use std::collections::HashMap;

use bytes::Bytes;

use super::value::{ToBytes, Value};
use super::{Keyspace, inclusive_range, parse_f64};
use crate::error::StoreError;

/// How ZUNIONSTORE/ZINTERSTORE combine the weighted scores of a member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Aggregate {
    #[default]
    Sum,
    Min,
    Max,
}

impl Aggregate {
    /// `inf + -inf` yields 0 rather than NaN.
    fn combine(self, a: f64, b: f64) -> f64 {
        let combined = match self {
            Aggregate::Sum => a + b,
            Aggregate::Min => a.min(b),
            Aggregate::Max => a.max(b),
        };
        if combined.is_nan() { 0.0 } else { combined }
    }
}

/// A score range endpoint: a number, `-inf`/`+inf`, optionally `(`-prefixed
/// to make it exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ScoreBound {
    value: f64,
    exclusive: bool,
}

impl ScoreBound {
    fn parse(raw: &[u8]) -> Result<Self, StoreError> {
        let (exclusive, rest) = match raw.split_first() {
            Some((b'(', rest)) => (true, rest),
            _ => (false, raw),
        };
        Ok(Self {
            value: parse_f64(rest)?,
            exclusive,
        })
    }

    fn admits_from_below(&self, score: f64) -> bool {
        if self.exclusive {
            score > self.value
        } else {
            score >= self.value
        }
    }

    fn admits_from_above(&self, score: f64) -> bool {
        if self.exclusive {
            score < self.value
        } else {
            score <= self.value
        }
    }
}

/// Numeric score order; `-0.0` and `0.0` compare equal.
pub(crate) fn cmp_scores(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
}

/// Total order of a sorted set: score ascending, then member bytes.
fn cmp_entries(a: &(Bytes, f64), b: &(Bytes, f64)) -> Ordering {
    cmp_scores(a.1, b.1).then_with(|| a.0.cmp(&b.0))
}

pub(crate) fn ordered(zset: &HashMap<Bytes, f64>) -> Vec<(Bytes, f64)> {
    let mut entries: Vec<(Bytes, f64)> = zset.iter().map(|(m, s)| (m.clone(), *s)).collect();
    entries.sort_by(cmp_entries);
    entries
}

fn project(entries: Vec<(Bytes, f64)>, withscores: bool) -> Vec<(Bytes, Option<f64>)> {
    entries
        .into_iter()
        .map(|(m, s)| (m, withscores.then_some(s)))
        .collect()
}

/// LIMIT-style pagination: skip `start`, then take `num` (all if negative).
fn paginate<T>(items: Vec<T>, start: Option<i64>, num: Option<i64>) -> Result<Vec<T>, StoreError> {
    match (start, num) {
        (None, None) => Ok(items),
        (Some(start), Some(num)) => {
            if start < 0 {
                return Ok(Vec::new());
            }
            let iter = items.into_iter().skip(start as usize);
            Ok(if num < 0 {
                iter.collect()
            } else {
                iter.take(num as usize).collect()
            })
        }
        _ => Err(StoreError::Syntax("start and num must both be specified")),
    }
}

impl Keyspace {
    fn zset_ref(&mut self, key: &str) -> Result<Option<&HashMap<Bytes, f64>>, StoreError> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::ZSet(z)) => Ok(Some(z)),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    fn zset_mut(&mut self, key: &str) -> Result<Option<&mut HashMap<Bytes, f64>>, StoreError> {
        self.purge_expired();
        match self.data.get_mut(key) {
            None => Ok(None),
            Some(Value::ZSet(z)) => Ok(Some(z)),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    fn zset_entry(&mut self, key: &str) -> Result<&mut HashMap<Bytes, f64>, StoreError> {
        self.purge_expired();
        match self
            .data
            .entry(key.to_owned())
            .or_insert_with(|| Value::ZSet(HashMap::new()))
        {
            Value::ZSet(z) => Ok(z),
            _ => Err(StoreError::WrongType),
        }
    }

    fn zset_ordered(&mut self, key: &str) -> Result<Vec<(Bytes, f64)>, StoreError> {
        Ok(self.zset_ref(key)?.map(ordered).unwrap_or_default())
    }

    /// Returns how many members were newly inserted; score updates of
    /// existing members are not counted.
    pub fn zadd<M: ToBytes>(&mut self, key: &str, members: &[(f64, M)]) -> Result<usize, StoreError> {
        if members.is_empty() {
            return Err(StoreError::WrongArity("zadd"));
        }
        if members.iter().any(|(score, _)| score.is_nan()) {
            return Err(StoreError::NotFloat);
        }
        let zset = self.zset_entry(key)?;
        Ok(members
            .iter()
            .filter(|(score, member)| zset.insert(member.to_bytes(), *score).is_none())
            .count())
    }

    /// ZADD from raw alternating `score, member` arguments.
    pub fn zadd_args(&mut self, key: &str, args: &[impl ToBytes]) -> Result<usize, StoreError> {
        if args.is_empty() || args.len() % 2 != 0 {
            return Err(StoreError::WrongArity("zadd"));
        }
        let pairs = args
            .chunks(2)
            .map(|pair| Ok((parse_f64(&pair[0].to_bytes())?, pair[1].to_bytes())))
            .collect::<Result<Vec<_>, StoreError>>()?;
        self.zadd(key, &pairs)
    }

    pub fn zrem(&mut self, key: &str, members: &[impl ToBytes]) -> Result<usize, StoreError> {
        let removed = match self.zset_mut(key)? {
            Some(zset) => members
                .iter()
                .filter(|m| zset.remove(&m.to_bytes()).is_some())
                .count(),
            None => 0,
        };
        self.drop_if_empty(key);
        Ok(removed)
    }

    pub fn zcard(&mut self, key: &str) -> Result<usize, StoreError> {
        Ok(self.zset_ref(key)?.map_or(0, HashMap::len))
    }

    pub fn zscore(&mut self, key: &str, member: impl ToBytes) -> Result<Option<f64>, StoreError> {
        Ok(self
            .zset_ref(key)?
            .and_then(|z| z.get(&member.to_bytes()).copied()))
    }

    pub fn zincrby(
        &mut self,
        key: &str,
        increment: f64,
        member: impl ToBytes,
    ) -> Result<f64, StoreError> {
        let member = member.to_bytes();
        let current = self
            .zset_ref(key)?
            .and_then(|z| z.get(&member).copied())
            .unwrap_or(0.0);
        let next = current + increment;
        if next.is_nan() {
            return Err(StoreError::NotFloat);
        }
        self.zset_entry(key)?.insert(member, next);
        Ok(next)
    }

    pub fn zrank(&mut self, key: &str, member: impl ToBytes) -> Result<Option<usize>, StoreError> {
        let member = member.to_bytes();
        Ok(self
            .zset_ordered(key)?
            .iter()
            .position(|(m, _)| *m == member))
    }

    pub fn zrevrank(&mut self, key: &str, member: impl ToBytes) -> Result<Option<usize>, StoreError> {
        let member = member.to_bytes();
        Ok(self
            .zset_ordered(key)?
            .iter()
            .rev()
            .position(|(m, _)| *m == member))
    }

    pub fn zcount(
        &mut self,
        key: &str,
        min: impl ToBytes,
        max: impl ToBytes,
    ) -> Result<usize, StoreError> {
        let min = ScoreBound::parse(&min.to_bytes())?;
        let max = ScoreBound::parse(&max.to_bytes())?;
        Ok(self.zset_ref(key)?.map_or(0, |z| {
            z.values()
                .filter(|s| min.admits_from_below(**s) && max.admits_from_above(**s))
                .count()
        }))
    }

    /// Members ranked `[start, end]` (inclusive, negative from the end).
    pub fn zrange(
        &mut self,
        key: &str,
        start: i64,
        end: i64,
        withscores: bool,
    ) -> Result<Vec<(Bytes, Option<f64>)>, StoreError> {
        let entries = self.zset_ordered(key)?;
        Ok(project(slice_ranked(entries, start, end), withscores))
    }

    pub fn zrevrange(
        &mut self,
        key: &str,
        start: i64,
        end: i64,
        withscores: bool,
    ) -> Result<Vec<(Bytes, Option<f64>)>, StoreError> {
        let mut entries = self.zset_ordered(key)?;
        entries.reverse();
        Ok(project(slice_ranked(entries, start, end), withscores))
    }

    pub fn zrangebyscore(
        &mut self,
        key: &str,
        min: impl ToBytes,
        max: impl ToBytes,
        start: Option<i64>,
        num: Option<i64>,
        withscores: bool,
    ) -> Result<Vec<(Bytes, Option<f64>)>, StoreError> {
        let min = ScoreBound::parse(&min.to_bytes())?;
        let max = ScoreBound::parse(&max.to_bytes())?;
        let entries: Vec<_> = self
            .zset_ordered(key)?
            .into_iter()
            .filter(|(_, s)| min.admits_from_below(*s) && max.admits_from_above(*s))
            .collect();
        Ok(project(paginate(entries, start, num)?, withscores))
    }

    /// Like `zrangebyscore` in descending order; note `max` comes first.
    pub fn zrevrangebyscore(
        &mut self,
        key: &str,
        max: impl ToBytes,
        min: impl ToBytes,
        start: Option<i64>,
        num: Option<i64>,
        withscores: bool,
    ) -> Result<Vec<(Bytes, Option<f64>)>, StoreError> {
        let min = ScoreBound::parse(&min.to_bytes())?;
        let max = ScoreBound::parse(&max.to_bytes())?;
        let entries: Vec<_> = self
            .zset_ordered(key)?
            .into_iter()
            .rev()
            .filter(|(_, s)| min.admits_from_below(*s) && max.admits_from_above(*s))
            .collect();
        Ok(project(paginate(entries, start, num)?, withscores))
    }

    pub fn zremrangebyrank(&mut self, key: &str, start: i64, end: i64) -> Result<usize, StoreError> {
        let doomed = slice_ranked(self.zset_ordered(key)?, start, end);
        self.zrem_entries(key, doomed)
    }

    pub fn zremrangebyscore(
        &mut self,
        key: &str,
        min: impl ToBytes,
        max: impl ToBytes,
    ) -> Result<usize, StoreError> {
        let min = ScoreBound::parse(&min.to_bytes())?;
        let max = ScoreBound::parse(&max.to_bytes())?;
        let doomed: Vec<_> = self
            .zset_ordered(key)?
            .into_iter()
            .filter(|(_, s)| min.admits_from_below(*s) && max.admits_from_above(*s))
            .collect();
        self.zrem_entries(key, doomed)
    }

    fn zrem_entries(&mut self, key: &str, doomed: Vec<(Bytes, f64)>) -> Result<usize, StoreError> {
        if doomed.is_empty() {
            return Ok(0);
        }
        let members: Vec<Bytes> = doomed.into_iter().map(|(m, _)| m).collect();
        self.zrem(key, &members)
    }

    /// Union of the sources into `dest`. Plain sets count as sorted sets
    /// with every score 1.0.
    pub fn zunionstore(
        &mut self,
        dest: &str,
        keys: &[impl AsRef<str>],
        weights: Option<&[f64]>,
        aggregate: Aggregate,
    ) -> Result<usize, StoreError> {
        let sources = self.weighted_sources("zunionstore", keys, weights)?;
        let mut result: HashMap<Bytes, f64> = HashMap::new();
        for source in sources {
            for (member, score) in source {
                result
                    .entry(member)
                    .and_modify(|acc| *acc = aggregate.combine(*acc, score))
                    .or_insert(score);
            }
        }
        Ok(self.store_zset(dest, result))
    }

    /// Intersection of the sources into `dest`.
    pub fn zinterstore(
        &mut self,
        dest: &str,
        keys: &[impl AsRef<str>],
        weights: Option<&[f64]>,
        aggregate: Aggregate,
    ) -> Result<usize, StoreError> {
        let mut sources = self.weighted_sources("zinterstore", keys, weights)?.into_iter();
        let mut result = sources.next().unwrap_or_default();
        for source in sources {
            result = result
                .into_iter()
                .filter_map(|(member, acc)| {
                    let score = *source.get(&member)?;
                    Some((member, aggregate.combine(acc, score)))
                })
                .collect();
        }
        Ok(self.store_zset(dest, result))
    }

    fn weighted_sources(
        &mut self,
        command: &'static str,
        keys: &[impl AsRef<str>],
        weights: Option<&[f64]>,
    ) -> Result<Vec<HashMap<Bytes, f64>>, StoreError> {
        if keys.is_empty() {
            return Err(StoreError::WrongArity(command));
        }
        if weights.is_some_and(|w| w.len() != keys.len()) {
            return Err(StoreError::Syntax("weights must match the number of keys"));
        }
        let mut sources = Vec::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            let weight = weights.map_or(1.0, |w| w[i]);
            let source: HashMap<Bytes, f64> = match self.value(key.as_ref()) {
                None => HashMap::new(),
                Some(Value::ZSet(z)) => z.clone(),
                Some(Value::Set(s)) => s.iter().map(|m| (m.clone(), 1.0)).collect(),
                Some(_) => return Err(StoreError::WrongType),
            };
            sources.push(
                source
                    .into_iter()
                    .map(|(m, s)| {
                        let weighted = s * weight;
                        (m, if weighted.is_nan() { 0.0 } else { weighted })
                    })
                    .collect(),
            );
        }
        Ok(sources)
    }

    fn store_zset(&mut self, dest: &str, members: HashMap<Bytes, f64>) -> usize {
        let len = members.len();
        self.replace(dest, Value::ZSet(members));
        len
    }
}

fn slice_ranked(entries: Vec<(Bytes, f64)>, start: i64, end: i64) -> Vec<(Bytes, f64)> {
    match inclusive_range(start, end, entries.len()) {
        Some((s, e)) => entries.into_iter().skip(s).take(e - s + 1).collect(),
        None => Vec::new(),
    }
}
