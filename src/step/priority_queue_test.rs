use super::PriorityQueue;

#[test]
fn test_pops_lowest_priority_first() {
    let mut queue = PriorityQueue::new();
    queue.push(30, "c");
    queue.push(10, "a");
    queue.push(20, "b");

    assert_eq!(queue.peek_priority(), Some(10));
    assert_eq!(queue.pop(), Some((10, "a")));
    assert_eq!(queue.pop(), Some((20, "b")));
    assert_eq!(queue.pop(), Some((30, "c")));
    assert_eq!(queue.pop(), None);
    assert!(queue.is_empty());
}

#[test]
fn test_equal_priorities_keep_insertion_order() {
    let mut queue = PriorityQueue::new();
    for (i, priority) in [5, 1, 5, 1, 5, 0].into_iter().enumerate() {
        queue.push(priority, i);
    }
    assert_eq!(queue.len(), 6);

    let order: Vec<usize> = std::iter::from_fn(|| queue.pop().map(|(_, i)| i)).collect();
    assert_eq!(order, vec![5, 1, 3, 0, 2, 4]);
}

#[test]
fn test_interleaved_push_and_pop() {
    let mut queue = PriorityQueue::new();
    queue.push(2, "x");
    queue.push(2, "y");
    assert_eq!(queue.pop(), Some((2, "x")));
    queue.push(1, "z");
    queue.push(2, "w");
    assert_eq!(queue.pop(), Some((1, "z")));
    assert_eq!(queue.pop(), Some((2, "y")));
    assert_eq!(queue.pop(), Some((2, "w")));
}
