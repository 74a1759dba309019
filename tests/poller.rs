use arc_readiness::{
    error::{PollError, PolicyError, ProbeError},
    poll,
    poller::{CancelToken, PollState, Poller, StatusMatcher, StatusSample},
    PollPolicy,
};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(1);

fn policy(max_attempts: u32) -> PollPolicy {
    PollPolicy::new(TICK, max_attempts).unwrap()
}

fn registration() -> StatusMatcher {
    StatusMatcher::new(["Registered"], ["Failed"])
}

/// Probe that replays `script` and then repeats its last entry.
fn scripted<'a>(
    script: Vec<Result<&'static str, ProbeError>>,
    calls: &'a Cell<u32>,
) -> impl FnMut() -> Result<String, ProbeError> + 'a {
    let queue = RefCell::new(VecDeque::from(script));
    move || {
        calls.set(calls.get() + 1);
        let mut q = queue.borrow_mut();
        let next = if q.len() > 1 {
            q.pop_front().unwrap()
        } else {
            q.front().cloned().unwrap()
        };
        next.map(str::to_string)
    }
}

fn run(
    script: Vec<Result<&'static str, ProbeError>>,
    max_attempts: u32,
) -> (arc_readiness::PollOutcome<String>, u32) {
    let calls = Cell::new(0);
    let m = registration();
    let outcome = poll(
        scripted(script, &calls),
        |s: &String| m.is_terminal(s),
        |s: &String| m.is_success(s),
        &policy(max_attempts),
    );
    (outcome, calls.get())
}

#[test]
fn succeeds_on_third_attempt() {
    let (outcome, calls) = run(vec![Ok("Pending"), Ok("Pending"), Ok("Registered")], 3);
    assert_eq!(outcome.state(), PollState::Succeeded);
    assert_eq!(outcome.attempt_count(), 3);
    assert_eq!(calls, 3);
    assert_eq!(outcome.final_value().map(String::as_str), Some("Registered"));
}

#[test]
fn always_pending_times_out_with_every_sample() {
    for n in [1, 3, 7] {
        let (outcome, calls) = run(vec![Ok("Pending")], n);
        assert_eq!(outcome.state(), PollState::TimedOut);
        assert_eq!(outcome.attempt_count(), n as usize);
        assert_eq!(calls, n);
    }
}

#[test]
fn terminal_failure_stops_early() {
    let (outcome, calls) = run(vec![Ok("Pending"), Ok("Failed"), Ok("Registered")], 3);
    assert_eq!(outcome.state(), PollState::Failed);
    assert_eq!(outcome.attempt_count(), 2);
    assert_eq!(calls, 2);
    assert_eq!(outcome.final_value().map(String::as_str), Some("Failed"));
}

#[test]
fn does_not_over_poll_after_success() {
    let (outcome, calls) = run(vec![Ok("Registering"), Ok("Registered"), Ok("Failed")], 10);
    assert_eq!(outcome.state(), PollState::Succeeded);
    assert_eq!(outcome.attempt_count(), 2);
    assert_eq!(calls, 2);
}

#[test]
fn fatal_probe_error_fails_on_first_attempt() {
    let (outcome, calls) = run(vec![Err(ProbeError::Fatal("bad credentials".into()))], 5);
    assert_eq!(outcome.state(), PollState::Failed);
    assert_eq!(outcome.attempt_count(), 1);
    assert_eq!(calls, 1);
    assert!(outcome.final_value().is_none());
    assert_eq!(outcome.last_diagnostic(), Some("bad credentials"));
}

#[test]
fn transient_errors_are_retried_and_recorded() {
    let (outcome, _) = run(
        vec![
            Err(ProbeError::Transient("connection reset".into())),
            Ok("Registering"),
            Err(ProbeError::Transient("429".into())),
            Ok("Registered"),
        ],
        5,
    );
    assert_eq!(outcome.state(), PollState::Succeeded);
    assert_eq!(outcome.attempt_count(), 4);
    assert!(outcome.attempts()[0].is_error());
    assert_eq!(outcome.attempts()[0].raw.as_deref(), Some("connection reset"));
    assert!(!outcome.attempts()[1].is_error());
}

#[test]
fn timeout_keeps_last_transient_error_as_diagnostic() {
    let (outcome, _) = run(vec![Err(ProbeError::Transient("i/o timeout".into()))], 3);
    assert_eq!(outcome.state(), PollState::TimedOut);
    assert_eq!(outcome.attempt_count(), 3);
    assert!(outcome.last_diagnostic().unwrap().contains("i/o timeout"));
}

#[test]
fn samples_are_numbered_from_one() {
    let (outcome, _) = run(vec![Ok("Pending")], 4);
    let numbers: Vec<u32> = outcome.attempts().iter().map(|s| s.attempt).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
}

#[test]
fn repeated_sessions_agree() {
    let script = || vec![Ok("NotRegistered"), Ok("Registering"), Ok("Registered")];
    let (a, _) = run(script(), 5);
    let (b, _) = run(script(), 5);
    assert_eq!(a.state(), b.state());
    assert_eq!(a.attempt_count(), b.attempt_count());
}

#[test]
fn cancellation_cuts_the_interval_short() {
    let token = CancelToken::new();
    let calls = Cell::new(0);
    let observer = |_: &StatusSample<String>| token.cancel();

    let m = registration();
    let outcome = Poller::new(PollPolicy::new(Duration::from_secs(30), 10).unwrap())
        .with_cancel(&token)
        .with_observer(&observer)
        .poll(
            scripted(vec![Ok("Pending")], &calls),
            |s: &String| m.is_terminal(s),
            |s: &String| m.is_success(s),
        );

    assert_eq!(outcome.state(), PollState::Cancelled);
    assert_eq!(outcome.attempt_count(), 1);
    assert_eq!(calls.get(), 1);
    // The 30s interval after attempt 1 must have been cut short.
    assert!(outcome.elapsed() < Duration::from_secs(5));
}

#[test]
fn cancellation_between_attempts_stops_probing() {
    let token = CancelToken::new();
    let calls = Cell::new(0);
    let observer = |sample: &StatusSample<String>| {
        if sample.attempt == 2 {
            token.cancel();
        }
    };

    let m = registration();
    let outcome = Poller::new(policy(10))
        .with_cancel(&token)
        .with_observer(&observer)
        .poll(
            scripted(vec![Ok("Pending")], &calls),
            |s: &String| m.is_terminal(s),
            |s: &String| m.is_success(s),
        );

    assert_eq!(outcome.state(), PollState::Cancelled);
    assert_eq!(outcome.attempt_count(), 2);
    assert_eq!(calls.get(), 2);
}

#[test]
fn pre_cancelled_token_makes_no_calls() {
    let token = CancelToken::new();
    token.cancel();
    let calls = Cell::new(0);
    let outcome = Poller::new(policy(3)).with_cancel(&token).poll(
        scripted(vec![Ok("Pending")], &calls),
        |_| false,
        |_| false,
    );
    assert_eq!(outcome.state(), PollState::Cancelled);
    assert_eq!(outcome.attempt_count(), 0);
    assert_eq!(calls.get(), 0);
}

#[test]
fn cancel_from_another_thread_wakes_sleeper() {
    let token = CancelToken::new();
    let remote = token.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        remote.cancel();
    });
    let started = Instant::now();
    assert!(token.sleep(Duration::from_secs(30)));
    assert!(started.elapsed() < Duration::from_secs(5));
    handle.join().unwrap();
}

#[test]
fn uncancelled_sleep_runs_to_completion() {
    let token = CancelToken::new();
    assert!(!token.sleep(Duration::from_millis(5)));
    assert!(!token.is_cancelled());
}

#[test]
fn explicit_timeout_ends_session_before_attempt_cap() {
    let policy = PollPolicy::new(Duration::from_millis(20), 100)
        .unwrap()
        .with_timeout(Duration::from_millis(50))
        .unwrap();
    let outcome = poll(|| Ok::<_, ProbeError>("Pending".to_string()), |_| false, |_| false, &policy);
    assert_eq!(outcome.state(), PollState::TimedOut);
    assert!(outcome.attempt_count() < 100);
    assert!(outcome.attempt_count() >= 1);
}

#[test]
fn observer_sees_every_sample_in_order() {
    let seen = RefCell::new(Vec::new());
    let observer = |s: &StatusSample<String>| seen.borrow_mut().push(s.attempt);
    let calls = Cell::new(0);
    let m = registration();
    let outcome = Poller::new(policy(5)).with_observer(&observer).poll(
        scripted(vec![Ok("Pending"), Ok("Pending"), Ok("Registered")], &calls),
        |s: &String| m.is_terminal(s),
        |s: &String| m.is_success(s),
    );
    assert!(outcome.is_success());
    assert_eq!(*seen.borrow(), vec![1, 2, 3]);
}

#[test]
fn policy_rejects_invalid_values() {
    assert_eq!(PollPolicy::new(Duration::ZERO, 3), Err(PolicyError::ZeroInterval));
    assert_eq!(PollPolicy::new(TICK, 0), Err(PolicyError::ZeroAttempts));
    assert_eq!(
        PollPolicy::new(TICK, 3).unwrap().with_timeout(Duration::ZERO),
        Err(PolicyError::ZeroTimeout)
    );
}

#[test]
fn derived_timeout_is_interval_times_attempts() {
    let p = PollPolicy::new(Duration::from_secs(10), 30).unwrap();
    assert_eq!(p.timeout(), Duration::from_secs(300));
    assert_eq!(p.explicit_timeout(), None);
    assert_eq!(PollPolicy::default(), p);
}

#[test]
fn into_result_maps_states_to_errors() {
    let (ok, _) = run(vec![Ok("Registered")], 3);
    assert_eq!(ok.into_result("provider").unwrap(), "Registered");

    let (failed, _) = run(vec![Ok("Failed")], 3);
    assert!(matches!(
        failed.into_result("provider"),
        Err(PollError::TerminalStatus { ref status, attempts: 1, .. }) if status == "Failed"
    ));

    let (fatal, _) = run(vec![Err(ProbeError::Fatal("gone".into()))], 3);
    assert!(matches!(fatal.into_result("provider"), Err(PollError::Fatal { .. })));

    let (timed_out, _) = run(vec![Ok("Pending")], 2);
    match timed_out.into_result("provider") {
        Err(PollError::Timeout { attempts, last, .. }) => {
            assert_eq!(attempts, 2);
            assert_eq!(last, "Pending");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn matcher_ignores_case_and_whitespace() {
    let m = registration();
    assert!(m.is_success("registered\n"));
    assert!(m.is_failure(" FAILED "));
    assert!(m.is_terminal("Failed"));
    assert!(!m.is_terminal("Registering"));
}

#[test]
fn outcome_serializes_elapsed_as_millis() {
    let (outcome, _) = run(vec![Ok("Registered")], 1);
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["state"], "Succeeded");
    assert!(json["elapsed"].is_u64());
    assert_eq!(json["attempts"][0]["value"], "Registered");
}

#[test]
fn deserialized_policy_is_validated() {
    let zero_interval = r#"{"interval":{"secs":0,"nanos":0},"max_attempts":3,"timeout":null}"#;
    assert!(serde_json::from_str::<PollPolicy>(zero_interval).is_err());

    let zero_attempts = r#"{"interval":{"secs":1,"nanos":0},"max_attempts":0,"timeout":null}"#;
    assert!(serde_json::from_str::<PollPolicy>(zero_attempts).is_err());

    let zero_timeout =
        r#"{"interval":{"secs":1,"nanos":0},"max_attempts":3,"timeout":{"secs":0,"nanos":0}}"#;
    assert!(serde_json::from_str::<PollPolicy>(zero_timeout).is_err());

    let p = PollPolicy::new(Duration::from_secs(2), 5)
        .unwrap()
        .with_timeout(Duration::from_secs(7))
        .unwrap();
    let json = serde_json::to_string(&p).unwrap();
    assert_eq!(serde_json::from_str::<PollPolicy>(&json).unwrap(), p);
}
