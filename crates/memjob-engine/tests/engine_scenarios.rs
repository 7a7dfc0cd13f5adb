//! End-to-end scenarios against a real `Engine` — no mocked collaborators,
//! every test spins up an actual writer thread.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use memjob_core::{InvocationData, StateData};
use memjob_engine::{CancellationToken, Engine, JobRef};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn invocation() -> InvocationData {
    InvocationData::new("EmailJob", "Send", "[\"string\"]", "[\"hi\"]")
}

#[test]
fn fair_fetch_drains_queues_in_caller_given_order() {
    init_tracing();
    let engine = Engine::default();
    let connection = engine.connect();

    let critical_job = connection.create_expired_job(invocation(), vec![], Duration::from_secs(3600)).unwrap();
    let default_job = connection.create_expired_job(invocation(), vec![], Duration::from_secs(3600)).unwrap();
    connection.enqueue("default", default_job).unwrap();
    connection.enqueue("critical", critical_job).unwrap();

    let cancel = CancellationToken::new();
    let fetched = connection.fetch_next_job(&["critical".to_string(), "default".to_string()], &cancel).unwrap();
    assert_eq!(fetched.queue_name, "critical");
    assert_eq!(fetched.job_id, critical_job);

    let fetched = connection.fetch_next_job(&["critical".to_string(), "default".to_string()], &cancel).unwrap();
    assert_eq!(fetched.queue_name, "default");
    assert_eq!(fetched.job_id, default_job);
}

#[test]
fn fetch_next_job_blocks_until_a_matching_queue_gets_an_item() {
    init_tracing();
    let engine = Arc::new(Engine::default());
    let fetcher = engine.connect();
    let enqueuer = engine.connect();
    let barrier = Arc::new(Barrier::new(2));

    let job = enqueuer.create_expired_job(invocation(), vec![], Duration::from_secs(3600)).unwrap();

    let fetch_barrier = barrier.clone();
    let handle = thread::spawn(move || {
        fetch_barrier.wait();
        let cancel = CancellationToken::new();
        fetcher.fetch_next_job(&["default".to_string()], &cancel).unwrap()
    });

    barrier.wait();
    thread::sleep(Duration::from_millis(50));
    enqueuer.enqueue("default", job).unwrap();

    let fetched = handle.join().unwrap();
    assert_eq!(fetched.job_id, job);
    assert_eq!(fetched.queue_name, "default");
}

#[test]
fn cancelling_a_blocked_fetch_returns_promptly() {
    init_tracing();
    let engine = Engine::default();
    let connection = engine.connect();
    let cancel = CancellationToken::new();

    let cancel_clone = cancel.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        cancel_clone.cancel();
    });

    let started = std::time::Instant::now();
    let result = connection.fetch_next_job(&["nothing-ever-arrives".to_string()], &cancel);
    handle.join().unwrap();

    assert!(result.is_err());
    assert!(started.elapsed() < Duration::from_secs(1), "cancellation should wake the waiter promptly");
}

#[test]
fn two_connections_racing_for_the_same_lock_serialize() {
    init_tracing();
    let engine = Arc::new(Engine::default());
    let a = engine.connect();
    let b = engine.connect();

    let guard = a.acquire_distributed_lock("invoice-42", Duration::from_secs(5)).unwrap();

    let handle = thread::spawn(move || b.acquire_distributed_lock("invoice-42", Duration::from_secs(5)).unwrap());

    thread::sleep(Duration::from_millis(50));
    drop(guard);

    let second_guard = handle.join().unwrap();
    assert_eq!(second_guard.resource(), "invoice-42");
}

#[test]
fn lock_acquisition_times_out_if_never_released() {
    init_tracing();
    let engine = Engine::default();
    let a = engine.connect();
    let b = engine.connect();

    let _guard = a.acquire_distributed_lock("stuck", Duration::from_secs(5)).unwrap();
    let result = b.acquire_distributed_lock("stuck", Duration::from_millis(50));
    assert!(result.is_err());
}

#[test]
fn closing_a_connection_releases_every_lock_it_held() {
    init_tracing();
    let engine = Engine::default();
    let a = engine.connect();
    let b = engine.connect();

    let guard = a.acquire_distributed_lock("doc-7", Duration::from_secs(5)).unwrap();
    std::mem::forget(guard); // simulate the guard outliving its connection
    drop(a);

    let guard = b.acquire_distributed_lock("doc-7", Duration::from_secs(1)).unwrap();
    assert_eq!(guard.resource(), "doc-7");
}

#[test]
fn remove_timed_out_servers_only_removes_stale_heartbeats() {
    init_tracing();
    let engine = Engine::default();
    let connection = engine.connect();

    connection.announce_server("server-a", vec!["default".to_string()], 4).unwrap();
    connection.announce_server("server-b", vec!["default".to_string()], 4).unwrap();
    connection.announce_server("server-c", vec!["default".to_string()], 4).unwrap();

    thread::sleep(Duration::from_millis(60));
    connection.heartbeat("server-b").unwrap();
    thread::sleep(Duration::from_millis(10));

    let removed = connection.remove_timed_out_servers(Duration::from_millis(50)).unwrap();
    assert_eq!(removed, 2, "server-a and server-c never renewed their heartbeat");
}

#[test]
fn list_insert_is_head_first_and_range_respects_insertion_order() {
    init_tracing();
    let engine = Engine::default();
    let connection = engine.connect();

    connection.insert_to_list("recent-visits", "a").unwrap();
    connection.insert_to_list("recent-visits", "b").unwrap();
    connection.insert_to_list("recent-visits", "c").unwrap();

    let all = connection.get_all_items_from_list("recent-visits").unwrap();
    assert_eq!(all, vec!["c".to_string(), "b".to_string(), "a".to_string()]);

    let page = connection.get_range_from_list("recent-visits", 0, 1).unwrap();
    assert_eq!(page, vec!["c".to_string(), "b".to_string()]);
}

#[test]
fn transaction_creates_a_job_and_acts_on_it_before_commit_returns_an_id() {
    init_tracing();
    let engine = Engine::default();
    let connection = engine.connect();

    let mut txn = connection.create_write_transaction();
    let job_ref: JobRef = txn.create_expired_job(invocation(), vec![("retries".to_string(), Some("0".to_string()))], Duration::from_secs(3600));
    txn.set_job_state(job_ref, StateData::new("Enqueued"));
    txn.enqueue("default", job_ref);
    let outcome = txn.commit().unwrap();

    assert_eq!(outcome.created_jobs.len(), 1);
    let job_id = outcome.created_jobs[0];

    let data = connection.get_job_data(job_id).unwrap().expect("job should exist after commit");
    assert_eq!(data.state_name.as_deref(), Some("Enqueued"));

    let cancel = CancellationToken::new();
    let fetched = connection.fetch_next_job(&["default".to_string()], &cancel).unwrap();
    assert_eq!(fetched.job_id, job_id);
}

#[test]
fn sorted_set_lowest_score_queries_ignore_out_of_range_members() {
    init_tracing();
    let engine = Engine::default();
    let connection = engine.connect();

    connection.add_to_set("retry-times", "job-1", 100.0).unwrap();
    connection.add_to_set("retry-times", "job-2", 50.0).unwrap();
    connection.add_to_set("retry-times", "job-3", 200.0).unwrap();

    let lowest = connection.get_first_by_lowest_score_from_set("retry-times", 0.0, 150.0).unwrap();
    assert_eq!(lowest.as_deref(), Some("job-2"));

    let limited = connection.get_first_by_lowest_score_from_set_limited("retry-times", 0.0, 150.0, 2).unwrap();
    assert_eq!(limited, vec!["job-2".to_string(), "job-1".to_string()]);
}

#[test]
fn engine_reads_are_linearizable_with_respect_to_its_own_writes() {
    init_tracing();
    let engine = Arc::new(Engine::default());
    assert!(engine.linearizable_reads());
    let connection = engine.connect();

    connection.increment_counter("hits", 1, None).unwrap();
    connection.increment_counter("hits", 1, None).unwrap();
    assert_eq!(connection.get_counter("hits").unwrap(), 2);
}
