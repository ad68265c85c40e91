// tests/client_pool.rs
use activity_aggregator::{ClientConfig, ClientPool};
use std::sync::{Arc, Barrier};
use std::time::Duration;

#[test]
fn identical_configs_share_a_handle() {
    let pool = ClientPool::new();
    let cfg_a = ClientConfig {
        timeout: Duration::from_secs(10),
        skip_tls_verify: false,
        max_idle_per_host: 4,
        idle_timeout: Duration::from_secs(30),
    };
    // Field-for-field equal, separately constructed.
    let cfg_a2 = cfg_a.clone();

    let h1 = pool.acquire(&cfg_a).unwrap();
    let h2 = pool.acquire(&cfg_a2).unwrap();
    assert!(Arc::ptr_eq(&h1, &h2));

    let cfg_b = ClientConfig {
        skip_tls_verify: true,
        ..cfg_a
    };
    let h3 = pool.acquire(&cfg_b).unwrap();
    assert!(!Arc::ptr_eq(&h1, &h3));
    assert_eq!(pool.len(), 2);
}

#[test]
fn concurrent_first_acquire_has_single_winner() {
    let pool = Arc::new(ClientPool::new());
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                pool.acquire(&ClientConfig::default()).unwrap()
            })
        })
        .collect();

    let clients: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let first = &clients[0];
    assert!(clients.iter().all(|c| Arc::ptr_eq(c, first)));
    assert_eq!(pool.len(), 1);
}

#[test]
fn close_releases_pool_but_not_held_handles() {
    let pool = ClientPool::new();
    let held = pool.acquire(&ClientConfig::default()).unwrap();
    pool.acquire(&ClientConfig {
        max_idle_per_host: 1,
        ..ClientConfig::default()
    })
    .unwrap();
    assert_eq!(pool.len(), 2);

    pool.close();
    assert!(pool.is_empty());
    // pool no longer references it; we are the only owner now
    assert_eq!(Arc::strong_count(&held), 1);
}
