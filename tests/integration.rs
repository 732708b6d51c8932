use std::thread;
use std::time::Duration;

use bytes::Bytes;
use fakestore::{
    Aggregate, Client, Config, Registry, Reply, SetOptions, SortOptions, SortResult, StoreError,
};

/// Fresh registry with default settings, bound to database 0.
fn client() -> Client {
    Registry::new(Config::default()).client(0).unwrap()
}

fn b(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}

fn sorted(set: std::collections::HashSet<Bytes>) -> Vec<Bytes> {
    let mut members: Vec<Bytes> = set.into_iter().collect();
    members.sort();
    members
}

#[test]
fn test_set_get_roundtrip() {
    let c = client();
    assert!(c.set("greeting", "hello", SetOptions::default()).unwrap());
    assert_eq!(c.get("greeting").unwrap(), Some(b("hello")));
    assert_eq!(c.get("missing").unwrap(), None);
}

#[test]
fn test_incr_semantics() {
    let c = client();
    assert_eq!(c.incr("n").unwrap(), 1);
    assert_eq!(c.incrby("n", 9).unwrap(), 10);

    c.set("word", "abc", SetOptions::default()).unwrap();
    assert_eq!(c.incr("word").unwrap_err(), StoreError::NotInteger);
    assert_eq!(c.get("word").unwrap(), Some(b("abc")));
}

#[test]
fn test_push_order() {
    let c = client();
    c.rpush("l", &["a", "b"]).unwrap();
    c.lpush("l", &["x", "y"]).unwrap();
    assert_eq!(c.lrange("l", 0, -1).unwrap(), vec![b("y"), b("x"), b("a"), b("b")]);
}

#[test]
fn test_zset_tie_break_by_member() {
    let c = client();
    c.zadd("z", &[(1.0, "b"), (1.0, "a"), (0.5, "c")]).unwrap();
    let members: Vec<Bytes> = c
        .zrange("z", 0, -1, false)
        .unwrap()
        .into_iter()
        .map(|(member, _)| member)
        .collect();
    assert_eq!(members, vec![b("c"), b("a"), b("b")]);
    assert_eq!(c.zrank("z", "b").unwrap(), Some(2));
}

#[test]
fn test_expiry_hides_key() {
    let c = client();
    c.set("temp", "v", SetOptions::default()).unwrap();
    assert!(c.pexpire("temp", 50).unwrap());
    assert!(c.pttl("temp").unwrap().is_some());

    thread::sleep(Duration::from_millis(120));
    assert_eq!(c.get("temp").unwrap(), None);
    assert_eq!(c.exists(&["temp"]).unwrap(), 0);
    assert_eq!(c.ttl("temp").unwrap(), None);
}

#[test]
fn test_set_with_expiry_option() {
    let c = client();
    let opts = SetOptions {
        px: Some(50),
        ..SetOptions::default()
    };
    c.set("k", "v", opts).unwrap();
    thread::sleep(Duration::from_millis(120));
    assert_eq!(c.dbsize().unwrap(), 0);
}

#[test]
fn test_set_algebra() {
    let c = client();
    c.sadd("a", &["1", "2", "3"]).unwrap();
    c.sadd("b", &["2", "3", "4"]).unwrap();
    assert_eq!(sorted(c.sinter(&["a", "b"]).unwrap()), vec![b("2"), b("3")]);
    assert_eq!(sorted(c.sdiff(&["a", "b"]).unwrap()), vec![b("1")]);
    assert_eq!(
        sorted(c.sunion(&["a", "b"]).unwrap()),
        vec![b("1"), b("2"), b("3"), b("4")]
    );
    assert_eq!(c.sinterstore("dest", &["a", "b"]).unwrap(), 2);
    assert_eq!(c.scard("dest").unwrap(), 2);
}

#[test]
fn test_sadd_is_idempotent() {
    let c = client();
    assert_eq!(c.sadd("s", &["m"]).unwrap(), 1);
    assert_eq!(c.sadd("s", &["m"]).unwrap(), 0);
    assert_eq!(c.scard("s").unwrap(), 1);
}

#[test]
fn test_sort_numeric_and_alpha() {
    let c = client();
    c.rpush("nums", &["10", "9", "100"]).unwrap();
    assert_eq!(
        c.sort("nums", &SortOptions::default()).unwrap(),
        SortResult::Values(vec![Some(b("9")), Some(b("10")), Some(b("100"))])
    );
    let alpha = SortOptions {
        alpha: true,
        ..SortOptions::default()
    };
    assert_eq!(
        c.sort("nums", &alpha).unwrap(),
        SortResult::Values(vec![Some(b("10")), Some(b("100")), Some(b("9"))])
    );

    c.rpush("words", &["pear", "apple"]).unwrap();
    assert_eq!(
        c.sort("words", &SortOptions::default()).unwrap_err(),
        StoreError::NotDouble
    );
}

#[test]
fn test_sort_by_external_weights() {
    let c = client();
    c.rpush("ids", &["1", "2", "3"]).unwrap();
    c.mset(&[("w_1", "30"), ("w_2", "10"), ("w_3", "20")]).unwrap();
    c.mset(&[("name_1", "one"), ("name_2", "two")]).unwrap();
    let opts = SortOptions {
        by: Some("w_*".into()),
        get: vec!["name_*".into(), "#".into()],
        ..SortOptions::default()
    };
    assert_eq!(
        c.sort("ids", &opts).unwrap(),
        SortResult::Values(vec![
            Some(b("two")),
            Some(b("2")),
            None,
            Some(b("3")),
            Some(b("one")),
            Some(b("1")),
        ])
    );
}

#[test]
fn test_wrongtype_leaves_value_untouched() {
    let c = client();
    c.rpush("list", &["a"]).unwrap();
    assert_eq!(c.sadd("list", &["x"]).unwrap_err(), StoreError::WrongType);
    assert_eq!(c.hset("list", "f", "v").unwrap_err(), StoreError::WrongType);
    assert_eq!(c.get("list").unwrap_err(), StoreError::WrongType);
    assert_eq!(c.lrange("list", 0, -1).unwrap(), vec![b("a")]);
}

#[test]
fn test_handles_share_database() {
    let registry = Registry::new(Config::default());
    let a = registry.client(2).unwrap();
    let b2 = registry.client(2).unwrap();
    let other = registry.client(3).unwrap();
    a.hset("h", "f", "v").unwrap();
    assert_eq!(b2.hget("h", "f").unwrap(), Some(b("v")));
    assert_eq!(other.hget("h", "f").unwrap(), None);
}

#[test]
fn test_flushall_clears_all_databases() {
    let registry = Registry::new(Config::default());
    let a = registry.client(0).unwrap();
    let c = registry.client(9).unwrap();
    a.set("x", 1, SetOptions::default()).unwrap();
    c.zadd("z", &[(1.0, "m")]).unwrap();
    a.flushall().unwrap();
    assert_eq!(a.dbsize().unwrap(), 0);
    assert_eq!(c.dbsize().unwrap(), 0);
}

#[test]
fn test_db_index_out_of_range() {
    let registry = Registry::new(Config {
        databases: 4,
        ..Config::default()
    });
    assert!(registry.client(3).is_ok());
    assert!(matches!(registry.client(4), Err(StoreError::DbIndexOutOfRange)));
}

#[test]
fn test_watch_conflict_keeps_external_value() {
    let c = client();
    c.set("balance", 100, SetOptions::default()).unwrap();

    let mut pipe = c.pipeline();
    pipe.watch(&["balance"]).unwrap();
    let other = c.registry().client(0).unwrap();
    other.set("balance", 50, SetOptions::default()).unwrap();

    pipe.multi().unwrap();
    pipe.decrby("balance", 10);
    assert_eq!(
        pipe.execute().unwrap_err(),
        StoreError::Watch(vec!["balance".into()])
    );
    assert_eq!(c.get("balance").unwrap(), Some(b("50")));
}

#[test]
fn test_pipeline_replies_in_order() {
    let c = client();
    let mut pipe = c.pipeline();
    pipe.multi().unwrap();
    pipe.rpush("l", &["a", "b"])
        .llen("l")
        .zadd("z", &[(2.0, "x")])
        .zunionstore("u", &["z"], Some(&[3.0]), Aggregate::Sum)
        .zscore("u", "x")
        .lpop("missing");
    assert_eq!(
        pipe.execute().unwrap(),
        vec![
            Reply::Int(2),
            Reply::Int(2),
            Reply::Int(1),
            Reply::Int(1),
            Reply::Float(6.0),
            Reply::Nil,
        ]
    );
}

#[test]
fn test_transaction_retries_after_conflict() {
    let c = client();
    c.set("counter", 0, SetOptions::default()).unwrap();
    let rival = c.registry().client(0).unwrap();

    let mut attempts = 0;
    let replies = c
        .transaction(&["counter"], |pipe| {
            attempts += 1;
            if attempts == 1 {
                rival.incr("counter")?;
            }
            pipe.multi()?;
            pipe.incr("counter");
            Ok(())
        })
        .unwrap();

    assert_eq!(attempts, 2);
    assert_eq!(replies, vec![Reply::Int(2)]);
    assert_eq!(c.get("counter").unwrap(), Some(b("2")));
}
