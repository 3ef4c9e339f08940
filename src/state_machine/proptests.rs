//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::transition::*;
use super::*;
use crate::answer::{Answer, AnswerSource};
use crate::locale::{self, Language};
use crate::speech::TranscriptionError;
use chrono::Utc;
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> SessionContext {
    SessionContext::new("prop-session", "prop-user")
}

/// Structural invariants every reachable session satisfies
fn is_valid_session(session: &Session) -> bool {
    let language_consistent = match session.phase {
        Phase::LanguageUnset => session.language.is_none() && session.transcript.is_empty(),
        _ => session.language.is_some() && !session.transcript.is_empty(),
    };
    let pending_consistent =
        session.pending_voice_text.is_none() || session.phase == Phase::AwaitingInput;
    language_consistent && pending_consistent
}

/// Turns only ever get appended, except on Clear
fn is_prefix(before: &[Turn], after: &[Turn]) -> bool {
    after.len() >= before.len() && after.iter().zip(before).all(|(a, b)| a == b)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_language() -> impl Strategy<Value = Language> {
    prop_oneof![Just(Language::English), Just(Language::Tamil)]
}

fn arb_message_id() -> impl Strategy<Value = String> {
    prop_oneof![Just("m1".to_string()), Just("m2".to_string())]
}

fn arb_failure() -> impl Strategy<Value = TranscriptionError> {
    prop_oneof![
        Just(TranscriptionError::Timeout),
        Just(TranscriptionError::Unintelligible),
        "[a-z ]{1,10}".prop_map(TranscriptionError::ServiceUnavailable),
        "[a-z ]{1,10}".prop_map(TranscriptionError::Other),
    ]
}

fn arb_source() -> impl Strategy<Value = AnswerSource> {
    prop_oneof![
        Just(AnswerSource::Generative),
        Just(AnswerSource::KnowledgeBase),
        Just(AnswerSource::Fallback),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        arb_language().prop_map(|language| Event::ChooseLanguage { language }),
        ("[a-z ]{0,20}", arb_message_id())
            .prop_map(|(text, message_id)| Event::Submit { text, message_id }),
        Just(Event::StartListening),
        any::<bool>().prop_map(|another| Event::FollowUp { another }),
        Just(Event::Clear),
        ("[a-z ]{0,20}", arb_message_id())
            .prop_map(|(text, message_id)| Event::VoiceCaptured { text, message_id }),
        arb_failure().prop_map(|failure| Event::VoiceFailed { failure }),
        arb_message_id().prop_map(|message_id| Event::SubmitPendingVoice { message_id }),
        (arb_message_id(), "[a-z ]{1,30}", arb_source()).prop_map(|(message_id, text, source)| {
            Event::AnswerResolved {
                message_id,
                answer: Answer { text, source },
                resolved_at: Utc::now(),
            }
        }),
    ]
}

/// Reach a session by replaying events from a fresh one
fn arb_session() -> impl Strategy<Value = Session> {
    proptest::collection::vec(arb_event(), 0..15).prop_map(|events| {
        let ctx = test_context();
        let mut session = Session::new();
        for event in events {
            if let Ok(result) = transition(&session, &ctx, event) {
                session = result.new_state;
            }
        }
        session
    })
}

fn ended_session(language: Language) -> Session {
    let ctx = test_context();
    let events = [
        Event::ChooseLanguage { language },
        Event::Submit {
            text: "burn".to_string(),
            message_id: "m1".to_string(),
        },
        Event::AnswerResolved {
            message_id: "m1".to_string(),
            answer: Answer {
                text: "Cool the burn under running water.".to_string(),
                source: AnswerSource::KnowledgeBase,
            },
            resolved_at: Utc::now(),
        },
        Event::FollowUp { another: false },
    ];
    let mut session = Session::new();
    for event in events {
        if let Ok(result) = transition(&session, &ctx, event) {
            session = result.new_state;
        }
    }
    session
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Invariant 1: Every reachable session is structurally valid
    #[test]
    fn prop_transitions_preserve_validity(events in proptest::collection::vec(arb_event(), 0..30)) {
        let ctx = test_context();
        let mut session = Session::new();

        for event in events {
            let is_clear = event == Event::Clear;
            if let Ok(result) = transition(&session, &ctx, event) {
                prop_assert!(is_valid_session(&result.new_state), "Invalid session: {:?}", result.new_state);
                if !is_clear {
                    prop_assert!(
                        is_prefix(&session.transcript, &result.new_state.transcript),
                        "Transcript rewritten: {:?} -> {:?}",
                        session.transcript,
                        result.new_state.transcript
                    );
                }
                session = result.new_state;
            }
        }
    }

    // Invariant 2: Transition is total; rejection leaves nothing to apply
    #[test]
    fn prop_transition_is_total(session in arb_session(), event in arb_event()) {
        let before = session.clone();
        let _ = transition(&session, &test_context(), event);
        prop_assert_eq!(session, before);
    }

    // Invariant 3: Clear always resets
    #[test]
    fn prop_clear_resets(session in arb_session()) {
        let result = transition(&session, &test_context(), Event::Clear);
        prop_assert!(result.is_ok());
        let result = result.unwrap();
        prop_assert_eq!(result.new_state, Session::default());
        prop_assert!(result.effects.contains(&Effect::AbortPending));
    }

    // Invariant 4: Ended only accepts Clear
    #[test]
    fn prop_ended_rejects_everything_but_clear(language in arb_language(), event in arb_event()) {
        let session = ended_session(language);
        prop_assert_eq!(&session.phase, &Phase::Ended);

        let is_clear = event == Event::Clear;
        let result = transition(&session, &test_context(), event);
        prop_assert_eq!(result.is_ok(), is_clear);
    }

    // Invariant 5: Only answers for the pending message are accepted
    #[test]
    fn prop_answer_requires_matching_id(
        language in arb_language(),
        query in "[a-z]{1,10}( [a-z]{1,10}){0,3}",
        text in "[a-zA-Z ]{1,40}",
    ) {
        let ctx = test_context();
        let session = transition(&Session::new(), &ctx, Event::ChooseLanguage { language })
            .unwrap()
            .new_state;
        let busy = transition(&session, &ctx, Event::Submit {
            text: query.clone(),
            message_id: "m1".to_string(),
        })
        .unwrap()
        .new_state;

        let answer = Answer { text: text.clone(), source: AnswerSource::Generative };
        let stale = transition(&busy, &ctx, Event::AnswerResolved {
            message_id: "m2".to_string(),
            answer: answer.clone(),
            resolved_at: Utc::now(),
        });
        prop_assert_eq!(stale.unwrap_err(), TransitionError::StaleAnswer);

        let result = transition(&busy, &ctx, Event::AnswerResolved {
            message_id: "m1".to_string(),
            answer,
            resolved_at: Utc::now(),
        })
        .unwrap();
        prop_assert_eq!(&result.new_state.phase, &Phase::AwaitingFollowUp);
        prop_assert_eq!(
            result.new_state.transcript.last(),
            Some(&Turn::assistant(locale::follow_up(language)))
        );
        let persisted = result.effects.iter().filter(|e| matches!(e, Effect::PersistQuery { .. })).count();
        prop_assert_eq!(persisted, 1);
    }

    // Invariant 6: Busy sessions never start a second answer
    #[test]
    fn prop_busy_rejects_input(language in arb_language(), event in arb_event()) {
        let ctx = test_context();
        let session = transition(&Session::new(), &ctx, Event::ChooseLanguage { language })
            .unwrap()
            .new_state;
        let busy = transition(&session, &ctx, Event::Submit {
            text: "burn".to_string(),
            message_id: "m0".to_string(),
        })
        .unwrap()
        .new_state;

        let starts_work = matches!(
            event,
            Event::Submit { .. } | Event::StartListening | Event::SubmitPendingVoice { .. }
        );
        if let Ok(result) = transition(&busy, &ctx, event) {
            prop_assert!(!starts_work);
            prop_assert!(!result.effects.iter().any(|e| matches!(
                e,
                Effect::ResolveAnswer { .. } | Effect::CaptureVoice { .. }
            )), "busy state must not emit work-starting effects");
        }
    }

    // Invariant 7: Effects that start external work only come from accepted input
    #[test]
    fn prop_resolve_answer_matches_phase(session in arb_session(), event in arb_event()) {
        if let Ok(result) = transition(&session, &test_context(), event) {
            for effect in &result.effects {
                if let Effect::ResolveAnswer { message_id, query, .. } = effect {
                    let expected = Phase::AwaitingAnswer {
                        query: query.clone(),
                        message_id: message_id.clone(),
                    };
                    prop_assert_eq!(&result.new_state.phase, &expected);
                }
            }
        }
    }
}
