//! Tests for the Execution Tracker (C3).

use super::*;
use std::sync::Arc;
use std::thread;

mod single_worker_ordering {
    use super::*;

    #[test]
    fn positions_increment_per_worker() {
        let tracker = ExecutionTracker::new();
        let first = tracker.begin("worker-1", "thread-1", 1);
        tracker.complete(&first, "t1", "Test1", Outcome::Passed);
        let second = tracker.begin("worker-1", "thread-1", 1);

        assert_eq!(first.position_in_suite, 1);
        assert_eq!(second.position_in_suite, 2);
    }

    #[test]
    fn global_position_is_monotonic_across_workers() {
        let tracker = ExecutionTracker::new();
        let a = tracker.begin("worker-1", "thread-1", 1);
        let b = tracker.begin("worker-2", "thread-2", 1);
        assert_eq!(a.global_position, 1);
        assert_eq!(b.global_position, 2);
    }

    #[test]
    fn first_execution_has_no_previous_test() {
        let tracker = ExecutionTracker::new();
        let ctx = tracker.begin("worker-1", "thread-1", 1);
        assert!(ctx.previous_test_id.is_none());
        assert!(ctx.previous_test_outcome.is_none());
    }

    #[test]
    fn subsequent_execution_links_to_completed_predecessor() {
        let tracker = ExecutionTracker::new();
        let first = tracker.begin("worker-1", "thread-1", 1);
        tracker.complete(&first, "id-1", "FirstTest", Outcome::Failed);

        let second = tracker.begin("worker-1", "thread-1", 1);
        assert_eq!(second.previous_test_id, Some("id-1".to_string()));
        assert_eq!(second.previous_test_name, Some("FirstTest".to_string()));
        assert_eq!(second.previous_test_outcome, Some(Outcome::Failed));
    }

    #[test]
    fn uncompleted_execution_does_not_update_previous_linkage() {
        let tracker = ExecutionTracker::new();
        let first = tracker.begin("worker-1", "thread-1", 1);
        // Never call complete(&first, ...).
        let second = tracker.begin("worker-1", "thread-1", 1);
        assert!(second.previous_test_id.is_none());
    }
}

mod retry_position_reuse {
    use super::*;

    /// spec.md §8 scenario: retried attempts on the same worker share
    /// `positionInSuite` with the first attempt.
    #[test]
    fn retry_attempt_reuses_first_attempts_position() {
        let tracker = ExecutionTracker::new();
        let first = tracker.begin("worker-1", "thread-1", 1);
        tracker.complete(&first, "id-1", "FlakyTest", Outcome::Failed);

        let retry = tracker.begin("worker-1", "thread-1", 2);
        assert_eq!(retry.position_in_suite, first.position_in_suite);
    }

    #[test]
    fn retry_attempt_does_not_advance_global_position() {
        let tracker = ExecutionTracker::new();
        let first = tracker.begin("worker-1", "thread-1", 1);
        let retry_global_before = first.global_position;
        let retry = tracker.begin("worker-1", "thread-1", 2);
        assert_eq!(retry.global_position, retry_global_before + 1);
        assert_ne!(retry.position_in_suite, 0);
    }

    #[test]
    fn next_fresh_test_after_a_retry_advances_past_the_reused_position() {
        let tracker = ExecutionTracker::new();
        let first = tracker.begin("worker-1", "thread-1", 1);
        tracker.complete(&first, "id-1", "FlakyTest", Outcome::Failed);
        let retry = tracker.begin("worker-1", "thread-1", 2);
        tracker.complete(&retry, "id-1", "FlakyTest", Outcome::Passed);

        let next = tracker.begin("worker-1", "thread-1", 1);
        assert_eq!(next.position_in_suite, first.position_in_suite + 1);
    }
}

mod concurrency_reporting {
    use super::*;

    #[test]
    fn sequential_executions_are_not_parallelized() {
        let tracker = ExecutionTracker::new();
        let first = tracker.begin("worker-1", "thread-1", 1);
        tracker.complete(&first, "id-1", "Test1", Outcome::Passed);
        let second = tracker.begin("worker-1", "thread-1", 1);
        assert!(!second.was_parallelized);
        assert_eq!(second.concurrent_test_count, 1);
    }

    #[test]
    fn overlapping_executions_are_flagged_parallelized() {
        let tracker = ExecutionTracker::new();
        let first = tracker.begin("worker-1", "thread-1", 1);
        let second = tracker.begin("worker-2", "thread-2", 1);
        assert!(first.concurrent_test_count >= 1);
        assert!(second.was_parallelized);
        assert_eq!(second.concurrent_test_count, 2);
    }

    #[test]
    fn completing_an_execution_frees_its_concurrency_slot() {
        let tracker = ExecutionTracker::new();
        let first = tracker.begin("worker-1", "thread-1", 1);
        tracker.complete(&first, "id-1", "Test1", Outcome::Passed);
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn concurrent_begins_from_multiple_threads_are_thread_safe() {
        let tracker = Arc::new(ExecutionTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || {
                    let ctx = tracker.begin(format!("worker-{i}"), format!("thread-{i}"), 1);
                    tracker.complete(&ctx, format!("id-{i}"), format!("Test{i}"), Outcome::Passed);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(tracker.active_count(), 0);
    }
}
