use std::sync::Arc;

use super::*;

#[test]
fn test_round_robin_cycles_in_order() {
    let rr = RoundRobin::new();
    let picks: Vec<usize> = (0..7).map(|_| rr.pick("cachea", 3)).collect();
    assert_eq!(picks, vec![0, 1, 2, 0, 1, 2, 0]);
}

#[test]
fn test_round_robin_counters_are_per_name() {
    let rr = RoundRobin::new();
    assert_eq!(rr.pick("a", 2), 0);
    assert_eq!(rr.pick("a", 2), 1);
    assert_eq!(rr.pick("b", 2), 0);
    assert_eq!(rr.pick("a", 2), 0);
}

#[test]
fn test_round_robin_forget_drops_counter() {
    let rr = RoundRobin::new();
    rr.pick("gone", 3);
    rr.pick("gone", 3);
    rr.pick("kept", 3);
    assert_eq!(rr.tracked(), 2);

    rr.forget("gone");
    rr.forget("never-seen");
    assert_eq!(rr.tracked(), 1);
    assert_eq!(rr.pick("gone", 3), 0);
    assert_eq!(rr.pick("kept", 3), 1);
}

#[test]
fn test_round_robin_is_fair_under_concurrency() {
    let rr = Arc::new(RoundRobin::new());
    let threads: Vec<_> = (0..4)
        .map(|_| {
            let rr = rr.clone();
            std::thread::spawn(move || (0..300).map(|_| rr.pick("shared", 3)).collect::<Vec<_>>())
        })
        .collect();

    let mut counts = [0usize; 3];
    for t in threads {
        for idx in t.join().unwrap() {
            counts[idx] += 1;
        }
    }
    assert_eq!(counts, [400, 400, 400]);
}

#[test]
fn test_random_pick_stays_in_range() {
    let random = RandomPick;
    for _ in 0..200 {
        assert!(random.pick("x", 4) < 4);
    }
    assert_eq!(random.pick("x", 1), 0);
}
