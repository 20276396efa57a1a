use cpm_agente::{
    Error,
    bridge::{
        FailureKind, InferenceResult,
        fsm::{CallEvent, CallState, CallStateMachine},
    },
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use uuid::Uuid;

#[test]
fn test_fsm_initial_state() {
    let call_id = Uuid::new_v4();
    let fsm = CallStateMachine::new(call_id);

    assert_eq!(fsm.current_state(), CallState::Pending);
    assert_eq!(fsm.call_id(), call_id);
    assert!(!fsm.is_terminal());
}

#[rstest]
#[case(CallEvent::Completed, CallState::Succeeded)]
#[case(CallEvent::Failed, CallState::Failed)]
#[case(CallEvent::DeadlineElapsed, CallState::TimedOut)]
fn test_pending_reaches_each_terminal_state(#[case] event: CallEvent, #[case] expected: CallState) {
    let mut fsm = CallStateMachine::new(Uuid::new_v4());

    assert_eq!(fsm.transition(event).unwrap(), expected);
    assert_eq!(fsm.current_state(), expected);
    assert!(fsm.is_terminal());
}

#[rstest]
#[case(CallEvent::Completed)]
#[case(CallEvent::Failed)]
#[case(CallEvent::DeadlineElapsed)]
fn test_timed_out_call_rejects_further_events(#[case] late: CallEvent) {
    let mut fsm = CallStateMachine::new(Uuid::new_v4());
    fsm.transition(CallEvent::DeadlineElapsed).unwrap();

    let err = fsm.transition(late).unwrap_err();

    assert!(matches!(err, Error::InvalidTransition { .. }));
    assert_eq!(fsm.current_state(), CallState::TimedOut);
}

#[test]
fn test_succeeded_call_rejects_deadline() {
    let mut fsm = CallStateMachine::new(Uuid::new_v4());
    fsm.transition(CallEvent::Completed).unwrap();

    let err = fsm.transition(CallEvent::DeadlineElapsed).unwrap_err();

    assert_eq!(
        err.to_string(),
        "Invalid call state transition: Succeeded -> DeadlineElapsed"
    );
    assert_eq!(fsm.current_state(), CallState::Succeeded);
}

#[test]
fn test_event_from_result() {
    assert_eq!(
        CallEvent::from(&InferenceResult::success("ok")),
        CallEvent::Completed
    );
    assert_eq!(
        CallEvent::from(&InferenceResult::failure(FailureKind::Spawn, "no python")),
        CallEvent::Failed
    );
}
