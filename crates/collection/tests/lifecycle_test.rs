use tokio::time::Duration;

use stormcache_collection::{ExpiringMap, Timeout, Ttl};

fn from_pairs(pairs: &[(&str, i32)]) -> ExpiringMap<String, i32> {
    let map = ExpiringMap::new();
    for (key, value) in pairs {
        map.set(key.to_string(), *value, Timeout::Refresh);
    }
    map
}

fn remaining(map: &ExpiringMap<String, i32>, key: &str) -> Duration {
    match map.ttl(key) {
        Some(Ttl::Expires(left)) => left,
        other => panic!("esperava timer ativo em '{key}', obtido {other:?}"),
    }
}

#[tokio::test]
async fn test_entry_expires_after_timeout() {
    let map = ExpiringMap::new();
    map.set("a".to_string(), 1, Duration::from_millis(100));
    assert_eq!(map.get("a"), Some(1));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(map.get("a"), None);
    assert_eq!(map.len(), 0);
}

#[tokio::test]
async fn test_entry_present_before_timeout() {
    let map = ExpiringMap::new();
    map.set("a".to_string(), 1, Duration::from_millis(200));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(map.peek("a"), Some(1));
    assert!(map.contains_key("a"));
}

#[tokio::test]
async fn test_tri_state_timeout() {
    let map = ExpiringMap::new();
    map.set("a".to_string(), 1, Duration::from_millis(200));
    tokio::time::sleep(Duration::from_millis(60)).await;

    // Keep: nem duração nem início mudam
    let before = remaining(&map, "a");
    map.set("a".to_string(), 2, Timeout::Keep);
    assert!(remaining(&map, "a") <= before);
    assert_eq!(map.timeout("a"), Some(Ttl::Expires(Duration::from_millis(200))));

    // Refresh: mesmo timeout, novo início
    map.set("a".to_string(), 3, Timeout::Refresh);
    assert!(remaining(&map, "a") > before);
    assert_eq!(map.timeout("a"), Some(Ttl::Expires(Duration::from_millis(200))));

    // Numérico: substitui os dois
    map.set("a".to_string(), 4, Duration::from_millis(500));
    assert_eq!(map.timeout("a"), Some(Ttl::Expires(Duration::from_millis(500))));

    map.set("a".to_string(), 5, Timeout::millis(-1));
    assert_eq!(map.ttl("a"), Some(Ttl::Permanent));
}

#[tokio::test]
async fn test_keep_on_permanent_entry() {
    let map = ExpiringMap::new();
    map.set("a".to_string(), 1, Timeout::Refresh);
    map.set("a".to_string(), 2, Timeout::Keep);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(map.get("a"), Some(2));
    assert_eq!(map.ttl("a"), Some(Ttl::Permanent));
}

#[tokio::test]
async fn test_sliding_read() {
    let map = ExpiringMap::new();
    map.set("a".to_string(), 1, Duration::from_millis(100));

    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(map.get("a"), Some(1));
    }

    let first = remaining(&map, "a");
    tokio::time::sleep(Duration::from_millis(20)).await;
    map.peek("a");
    assert!(remaining(&map, "a") < first);

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(map.get("a"), None);
}

#[tokio::test]
async fn test_copy_fidelity() {
    let map = ExpiringMap::new();
    map.set("a".to_string(), 1, Duration::from_millis(200));
    tokio::time::sleep(Duration::from_millis(120)).await;

    let copy = map.duplicate(false);
    assert!(remaining(&copy, "a") <= Duration::from_millis(80));

    tokio::time::sleep(Duration::from_millis(110)).await;
    assert_eq!(copy.get("a"), None);
}

#[tokio::test]
async fn test_expired_entries_never_copied() {
    let map = from_pairs(&[("keep", 1)]);
    map.set("gone".to_string(), 2, Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(60)).await;

    for refresh in [false, true] {
        assert!(!map.duplicate(refresh).contains_key("gone"));
        assert!(!map.filter(|_, _, _| true, refresh).contains_key("gone"));
        let (pass, fail) = map.partition(|_, _, _| true, refresh);
        assert!(!pass.contains_key("gone") && !fail.contains_key("gone"));
    }

    let target = from_pairs(&[]);
    target.concat(&map, true);
    assert_eq!(target.keys(), vec!["keep".to_string()]);
}

#[tokio::test]
async fn test_idempotent_clear() {
    let map = from_pairs(&[("a", 1), ("b", 2)]);
    map.set("c".to_string(), 3, Duration::from_millis(500));

    assert_eq!(map.clear(), 3);
    for key in ["a", "b", "c"] {
        assert_eq!(map.get(key), None);
    }
    assert_eq!(map.clear(), 0);

    // Timer cancelado não pode apagar uma chave recriada
    map.set("c".to_string(), 4, Timeout::Refresh);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(map.get("c"), Some(4));
}

#[tokio::test]
async fn test_set_algebra() {
    let a = from_pairs(&[("x", 1), ("y", 2)]);
    let b = from_pairs(&[("y", 2), ("z", 3)]);

    assert_eq!(a.intersect(&b, false), from_pairs(&[("y", 2)]));
    assert_eq!(a.difference(&b, false), from_pairs(&[("x", 1), ("z", 3)]));
}

#[tokio::test]
async fn test_partition_preserves_order() {
    let map = from_pairs(&[("1", 1), ("2", 2), ("3", 3), ("4", 4)]);
    let (even, odd) = map.partition(|value, _, _| value % 2 == 0, false);

    assert_eq!(even.entries(), vec![("2".into(), 2), ("4".into(), 4)]);
    assert_eq!(odd.entries(), vec![("1".into(), 1), ("3".into(), 3)]);
}

#[tokio::test]
async fn test_dropping_map_cancels_timers() {
    let map = ExpiringMap::new();
    map.set("a".to_string(), 1, Duration::from_millis(30));
    drop(map);

    // Nenhuma task deve entrar em pânico ao disparar sem dono.
    tokio::time::sleep(Duration::from_millis(60)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_expiration_on_multi_thread_runtime() {
    let map = ExpiringMap::new();
    for i in 0..100 {
        map.set(format!("k{i}"), i, Duration::from_millis(30));
    }
    map.set("permanent".to_string(), -1, Timeout::Refresh);

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(map.keys(), vec!["permanent".to_string()]);
}
