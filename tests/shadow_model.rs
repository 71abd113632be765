use proptest::prelude::*;
use rstb_fifo::shadow::{FifoShadow, FifoStatus};

fn check_invariants(s: &FifoStatus) {
    assert!(s.count <= s.depth);
    assert_eq!(s.write_count - s.read_count, s.count as u64);
    assert!(s.verified_count <= s.read_count);
    assert_eq!(s.empty, s.count == 0);
    assert_eq!(s.full, s.count == s.depth);
}

#[test]
fn writes_without_reader() {
    let shadow = FifoShadow::new(16).unwrap();
    for v in [1, 2, 3] {
        assert!(shadow.try_enqueue(v));
    }
    let s = shadow.snapshot();
    assert_eq!(s.count, 3);
    assert!(!s.empty);
    assert!(!s.full);
    assert_eq!(s.write_count, 3);
    assert_eq!(s.read_count, 0);
}

#[test]
fn rejects_when_full() {
    let shadow = FifoShadow::new(2).unwrap();
    assert!(shadow.try_enqueue(5));
    assert!(shadow.try_enqueue(6));
    assert!(!shadow.try_enqueue(7));
    let s = shadow.snapshot();
    assert!(s.full);
    assert_eq!(s.write_count, 2);
    assert_eq!(s.error_count, 0);
}

#[test]
fn verify_match() {
    let shadow = FifoShadow::new(4).unwrap();
    shadow.try_enqueue(9);
    assert!(shadow.verify_and_dequeue(9));
    let s = shadow.snapshot();
    assert_eq!(s.verified_count, 1);
    assert_eq!(s.error_count, 0);
    assert_eq!(s.count, 0);
}

#[test]
fn verify_on_empty_model_is_a_desync() {
    let shadow = FifoShadow::new(4).unwrap();
    assert!(!shadow.verify_and_dequeue(3));
    let s = shadow.snapshot();
    assert_eq!(s.error_count, 1);
    check_invariants(&s);
}

#[test]
fn mismatch_still_consumes_item() {
    let shadow = FifoShadow::new(4).unwrap();
    shadow.try_enqueue(4);
    assert!(!shadow.verify_and_dequeue(5));
    let s = shadow.snapshot();
    assert_eq!(s.error_count, 1);
    assert_eq!(s.count, 0);
    assert_eq!(s.read_count, 1);
    assert!(!shadow.data_ready().is_set());
}

#[test]
fn dequeue_on_empty_is_not_an_error() {
    let shadow = FifoShadow::new(1).unwrap();
    assert_eq!(shadow.try_dequeue(), None);
    assert_eq!(shadow.snapshot().error_count, 0);
}

#[test]
fn snapshot_is_idempotent() {
    let shadow = FifoShadow::new(3).unwrap();
    shadow.try_enqueue(1);
    shadow.verify_and_dequeue(2);
    assert_eq!(shadow.snapshot(), shadow.snapshot());
}

#[test]
fn depth_one_boundaries() {
    let shadow = FifoShadow::new(1).unwrap();
    let s = shadow.snapshot();
    assert!(s.almost_empty && s.almost_full && s.empty && !s.full);
    shadow.try_enqueue(1);
    assert!(shadow.snapshot().full);
    assert!(!shadow.try_enqueue(2));
}

#[derive(Debug, Clone)]
enum Op {
    Enqueue(u64),
    Dequeue,
    Verify(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..256).prop_map(Op::Enqueue),
        Just(Op::Dequeue),
        (0u64..256).prop_map(Op::Verify),
    ]
}

proptest! {
    #[test]
    fn invariants_hold_after_every_operation(depth in 1usize..8, ops in prop::collection::vec(op(), 0..64)) {
        let shadow = FifoShadow::new(depth).unwrap();
        for op in ops {
            match op {
                Op::Enqueue(v) => { shadow.try_enqueue(v); }
                Op::Dequeue => { shadow.try_dequeue(); }
                Op::Verify(v) => { shadow.verify_and_dequeue(v); }
            }
            let s = shadow.snapshot();
            check_invariants(&s);
            prop_assert_eq!(shadow.data_ready().is_set(), !s.empty);
        }
    }

    #[test]
    fn reads_come_out_in_write_order(values in prop::collection::vec(any::<u64>(), 1..32)) {
        let shadow = FifoShadow::new(values.len()).unwrap();
        for &v in &values {
            prop_assert!(shadow.try_enqueue(v));
        }
        for &v in &values {
            prop_assert!(shadow.verify_and_dequeue(v));
        }
        let s = shadow.snapshot();
        prop_assert_eq!(s.verified_count, values.len() as u64);
        prop_assert_eq!(s.error_count, 0);
    }
}
