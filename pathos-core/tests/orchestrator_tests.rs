//! Turn pipeline tests
//!
//! Drive the public orchestrator API end to end with a scripted provider standing in
//! for the model.

use std::sync::Arc;
use std::time::Duration;

use pathos_core::prelude::*;

const LABELS: [&str; 3] = ["welcoming", "listening", "concerned"];

fn candidate_set() -> CandidateExpressionSet {
    CandidateExpressionSet::new(LABELS, "welcoming").expect("valid candidate set")
}

fn test_config() -> PathosConfig {
    let mut config = PathosConfig::default();
    config.expressions.labels = LABELS.iter().map(|l| l.to_string()).collect();
    config
}

fn orchestrator_with(
    provider: ScriptedProvider,
    config: &PathosConfig,
) -> (TurnOrchestrator, Arc<ScriptedProvider>) {
    let provider = Arc::new(provider);
    let client = InferenceClient::new(provider.clone(), config.inference.max_in_flight);
    let orchestrator = TurnOrchestrator::new(client, candidate_set(), config);
    (orchestrator, provider)
}

fn orchestrator(provider: ScriptedProvider) -> (TurnOrchestrator, Arc<ScriptedProvider>) {
    orchestrator_with(provider, &test_config())
}

/// The newest patient line of a reply prompt
fn patient_line(prompt: &str) -> String {
    prompt
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix("Patient: "))
        .unwrap_or_default()
        .to_string()
}

/// Provider whose reply echoes the user's message
fn echo_provider() -> ScriptedProvider {
    ScriptedProvider::new()
        .on(CallKind::Affect, ScriptedOutcome::text("calm, attentive"))
        .on_fn(CallKind::Reply, |request| {
            ScriptedOutcome::text(format!("re: {}", patient_line(request.prompt())))
        })
        .on(CallKind::Expression, ScriptedOutcome::text("listening"))
}

#[tokio::test]
async fn test_history_grows_two_messages_per_turn() {
    let (orchestrator, _) = orchestrator(echo_provider());

    let first = orchestrator
        .run_turn(TurnRequest::new("first"))
        .await
        .expect("turn succeeds");
    let session_id = first.session_id.clone();
    for message in ["second", "third"] {
        orchestrator
            .run_turn(TurnRequest::new(message).with_session(&session_id))
            .await
            .expect("turn succeeds");
    }

    let session = orchestrator
        .store()
        .snapshot(&session_id)
        .await
        .expect("session exists");
    let contents: Vec<_> = session.messages().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        contents,
        ["first", "re: first", "second", "re: second", "third", "re: third"]
    );
    assert_eq!(session.metadata().turn_count, 3);
}

#[tokio::test]
async fn test_result_reflects_committed_state() {
    let (orchestrator, _) = orchestrator(echo_provider());

    let result = orchestrator
        .run_turn(TurnRequest::new("I feel a bit off today"))
        .await
        .expect("turn succeeds");

    assert_eq!(result.reply, "re: I feel a bit off today");
    assert_eq!(result.affect_state, "calm, attentive");
    assert_eq!(result.expression_state, "listening");
    assert_eq!(result.num_messages, 2);
    assert!(result.outcomes.is_clean());

    let session = orchestrator.store().snapshot(&result.session_id).await.unwrap();
    assert_eq!(session.affect_state(), "calm, attentive");
    assert_eq!(session.expression_state(), "listening");
}

#[tokio::test]
async fn test_expression_is_always_a_candidate() {
    let answers = ["LISTENING!!", "curious", "", "  \"Concerned\"\nbecause", "smiling"];
    let provider = answers.iter().fold(
        ScriptedProvider::new()
            .on(CallKind::Affect, ScriptedOutcome::text("neutral"))
            .on(CallKind::Reply, ScriptedOutcome::text("Go on.")),
        |provider, answer| provider.on(CallKind::Expression, ScriptedOutcome::text(*answer)),
    );
    let (orchestrator, _) = orchestrator(provider);
    let set = candidate_set();

    let mut session_id = None;
    let mut chosen = Vec::new();
    for _ in answers {
        let mut request = TurnRequest::new("hello");
        request.session_id = session_id.clone();
        let result = orchestrator.run_turn(request).await.expect("turn succeeds");
        assert!(set.contains(&result.expression_state));
        session_id = Some(result.session_id);
        chosen.push(result.expression_state);
    }

    assert_eq!(
        chosen,
        ["listening", "welcoming", "welcoming", "concerned", "welcoming"]
    );
}

#[tokio::test]
async fn test_distinct_sessions_do_not_share_history() {
    let (orchestrator, provider) = orchestrator(echo_provider());
    let orchestrator = Arc::new(orchestrator);

    let a = orchestrator.run_turn(TurnRequest::new("alpha one")).await.unwrap();
    let b = orchestrator.run_turn(TurnRequest::new("bravo one")).await.unwrap();

    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let orchestrator = orchestrator.clone();
            let (id, text) = if i % 2 == 0 {
                (a.session_id.clone(), format!("alpha {}", i))
            } else {
                (b.session_id.clone(), format!("bravo {}", i))
            };
            tokio::spawn(async move {
                orchestrator
                    .run_turn(TurnRequest::new(text).with_session(id))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.expect("task joins").expect("turn succeeds");
    }

    let session_a = orchestrator.store().snapshot(&a.session_id).await.unwrap();
    let session_b = orchestrator.store().snapshot(&b.session_id).await.unwrap();
    assert!(session_a.messages().iter().all(|m| !m.content.contains("bravo")));
    assert!(session_b.messages().iter().all(|m| !m.content.contains("alpha")));
    assert_eq!(session_a.messages().len(), 6);
    assert_eq!(session_b.messages().len(), 6);

    for call in provider.calls_for(CallKind::Reply) {
        let current = patient_line(&call.prompt);
        let other = if current.starts_with("alpha") { "bravo" } else { "alpha" };
        assert!(!call.prompt.contains(other));
    }
}

#[tokio::test(start_paused = true)]
async fn test_same_session_turns_are_serialized() {
    let provider = ScriptedProvider::new()
        .on(
            CallKind::Affect,
            ScriptedOutcome::text("steady").with_delay(Duration::from_millis(30)),
        )
        .on_fn(CallKind::Reply, |request| {
            ScriptedOutcome::text(format!("re: {}", patient_line(request.prompt())))
                .with_delay(Duration::from_millis(50))
        })
        .on(CallKind::Expression, ScriptedOutcome::text("listening"));
    let mut config = test_config();
    config.session.history_window = 32;
    let (orchestrator, provider) = orchestrator_with(provider, &config);
    let session_id = orchestrator
        .run_turn(TurnRequest::new("m0"))
        .await
        .unwrap()
        .session_id;

    let turns = (1..=8).map(|i| {
        orchestrator.run_turn(TurnRequest::new(format!("m{}", i)).with_session(&session_id))
    });
    let results = futures::future::join_all(turns).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let session = orchestrator.store().snapshot(&session_id).await.unwrap();
    assert_eq!(session.messages().len(), 18);
    for pair in session.messages().chunks(2) {
        assert_eq!(pair[0].role, MessageRole::User);
        assert_eq!(pair[1].content, format!("re: {}", pair[0].content));
    }

    // each turn saw every earlier exchange
    let mut seen: Vec<usize> = provider
        .calls_for(CallKind::Reply)
        .iter()
        .map(|call| call.prompt.matches("Patient: ").count())
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, (1..=9).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn test_parallel_calls_overlap_in_timing() {
    let provider = ScriptedProvider::new()
        .on(
            CallKind::Affect,
            ScriptedOutcome::text("worried").with_delay(Duration::from_millis(100)),
        )
        .on(
            CallKind::Reply,
            ScriptedOutcome::text("I hear you.").with_delay(Duration::from_millis(300)),
        )
        .on(
            CallKind::Expression,
            ScriptedOutcome::text("concerned").with_delay(Duration::from_millis(50)),
        );
    let (orchestrator, _) = orchestrator(provider);

    let timing = orchestrator
        .run_turn(TurnRequest::new("My chest feels tight"))
        .await
        .unwrap()
        .timing;

    assert!(timing.affect_call_ms >= 100);
    assert!(timing.reply_call_ms >= 300);
    assert!(timing.expression_call_ms >= 50);
    assert!(timing.total_ms >= timing.affect_call_ms.max(timing.reply_call_ms));
    assert!(timing.total_ms >= timing.expression_call_ms);
    assert!(
        timing.total_ms < timing.affect_call_ms + timing.reply_call_ms + timing.expression_call_ms
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_reply_does_not_hold_back_affect() {
    let mut config = test_config();
    config.inference.reply_timeout = Duration::from_secs(1);
    let provider = ScriptedProvider::new()
        .on(CallKind::Affect, ScriptedOutcome::text("restless"))
        .on(
            CallKind::Reply,
            ScriptedOutcome::text("too late").with_delay(Duration::from_secs(5)),
        )
        .on(CallKind::Expression, ScriptedOutcome::text("listening"));
    let (orchestrator, _) = orchestrator_with(provider, &config);

    let result = orchestrator.run_turn(TurnRequest::new("hello?")).await.unwrap();

    assert_eq!(result.reply, config.fallback.unavailable_reply);
    assert!(result.outcomes.reply_fallback);
    assert_eq!(result.affect_state, "restless");
    assert!(result.timing.affect_call_ms < 1000);
    assert_eq!(result.timing.reply_call_ms, 1000);
}

#[tokio::test]
async fn test_affect_failure_carries_previous_affect() {
    let provider = ScriptedProvider::new()
        .on(CallKind::Affect, ScriptedOutcome::text("hopeful"))
        .on(CallKind::Affect, ScriptedOutcome::unavailable("connection refused"))
        .on(CallKind::Reply, ScriptedOutcome::text("Tell me more."))
        .on(CallKind::Expression, ScriptedOutcome::text("welcoming"));
    let (orchestrator, _) = orchestrator(provider);

    let first = orchestrator.run_turn(TurnRequest::new("hi")).await.unwrap();
    let second = orchestrator
        .run_turn(TurnRequest::new("still here").with_session(&first.session_id))
        .await
        .unwrap();

    assert_eq!(second.affect_state, "hopeful");
    assert_eq!(second.reply, "Tell me more.");
    assert!(second.outcomes.affect_fallback);
    assert!(!second.outcomes.reply_fallback);
    assert_eq!(second.num_messages, 4);
}

#[tokio::test]
async fn test_affect_failure_with_fixed_fallback() {
    let mut config = test_config();
    config.fallback.affect = AffectFallback::Fixed("unknown".to_string());
    let provider = ScriptedProvider::new()
        .on(CallKind::Affect, ScriptedOutcome::unavailable("down"))
        .on(CallKind::Reply, ScriptedOutcome::text("I'm here."))
        .on(CallKind::Expression, ScriptedOutcome::text("welcoming"));
    let (orchestrator, _) = orchestrator_with(provider, &config);

    let result = orchestrator.run_turn(TurnRequest::new("hi")).await.unwrap();

    assert_eq!(result.affect_state, "unknown");
}

#[tokio::test]
async fn test_both_parallel_failures_fail_the_turn() {
    let provider = ScriptedProvider::new()
        .on(CallKind::Affect, ScriptedOutcome::text("calm"))
        .on(CallKind::Affect, ScriptedOutcome::unavailable("down"))
        .on(CallKind::Reply, ScriptedOutcome::text("Hello."))
        .on(CallKind::Reply, ScriptedOutcome::unavailable("down"))
        .on(CallKind::Expression, ScriptedOutcome::text("listening"));
    let (orchestrator, provider) = orchestrator(provider);

    let first = orchestrator.run_turn(TurnRequest::new("hi")).await.unwrap();
    let err = orchestrator
        .run_turn(TurnRequest::new("anyone there?").with_session(&first.session_id))
        .await
        .unwrap_err();

    assert!(matches!(err, PathosError::TurnFailed { .. }));
    let session = orchestrator.store().snapshot(&first.session_id).await.unwrap();
    assert_eq!(session.messages().len(), 2);
    assert_eq!(session.affect_state(), "calm");
    assert_eq!(session.expression_state(), "listening");
    assert_eq!(session.metadata().turn_count, 1);
    // no expression call for the failed turn
    assert_eq!(provider.calls_for(CallKind::Expression).len(), 1);
}

#[tokio::test]
async fn test_expression_call_failure_uses_fallback_label() {
    let provider = ScriptedProvider::new()
        .on(CallKind::Affect, ScriptedOutcome::text("sad"))
        .on(CallKind::Reply, ScriptedOutcome::text("That sounds heavy."))
        .on(CallKind::Expression, ScriptedOutcome::unavailable("503"));
    let (orchestrator, _) = orchestrator(provider);

    let result = orchestrator.run_turn(TurnRequest::new("I lost my job")).await.unwrap();

    assert_eq!(result.expression_state, "welcoming");
    assert_eq!(result.outcomes.expression, ExpressionOutcome::CallFailed);
    assert_eq!(result.num_messages, 2);
}

#[tokio::test]
async fn test_surface_errors_fails_on_any_inference_failure() {
    let mut config = test_config();
    config.fallback.surface_errors = true;
    let provider = ScriptedProvider::new()
        .on(CallKind::Affect, ScriptedOutcome::unavailable("down"))
        .on(CallKind::Reply, ScriptedOutcome::text("Hello."))
        .on(CallKind::Expression, ScriptedOutcome::text("listening"));
    let (orchestrator, _) = orchestrator_with(provider, &config);

    let err = orchestrator.run_turn(TurnRequest::new("hi")).await.unwrap_err();

    match err {
        PathosError::TurnFailed { affect, reply } => {
            assert!(affect.contains("down"));
            assert_eq!(reply, "ok");
        }
        other => panic!("unexpected error: {other}"),
    }
    for id in orchestrator.store().ids() {
        let session = orchestrator.store().snapshot(&id).await.unwrap();
        assert!(session.history().is_empty());
    }
}

#[tokio::test]
async fn test_empty_message_is_rejected_before_any_state() {
    let (orchestrator, provider) = orchestrator(echo_provider());

    let err = orchestrator.run_turn(TurnRequest::new("   \n")).await.unwrap_err();

    assert!(matches!(err, PathosError::EmptyMessage));
    assert!(orchestrator.store().is_empty());
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_unknown_session_id_starts_fresh_session() {
    let (orchestrator, _) = orchestrator(echo_provider());

    let result = orchestrator
        .run_turn(TurnRequest::new("hello").with_session("not-a-real-session"))
        .await
        .unwrap();

    assert_ne!(result.session_id, "not-a-real-session");
    assert_eq!(result.num_messages, 2);
    assert!(orchestrator.store().contains(&result.session_id));
}

#[tokio::test]
async fn test_new_session_starts_from_defaults() {
    let (orchestrator, provider) = orchestrator(echo_provider());

    orchestrator.run_turn(TurnRequest::new("hello")).await.unwrap();

    let affect_prompt = &provider.calls_for(CallKind::Affect)[0].prompt;
    assert!(affect_prompt.contains("Previous state: emotionally neutral"));
    let expression_prompt = &provider.calls_for(CallKind::Expression)[0].prompt;
    assert!(expression_prompt.contains("Current expression: welcoming"));
    let reply_prompt = &provider.calls_for(CallKind::Reply)[0].prompt;
    assert!(reply_prompt.contains("(no earlier messages)"));
}

#[tokio::test]
async fn test_hints_override_previous_state() {
    let (orchestrator, provider) = orchestrator(echo_provider());

    orchestrator
        .run_turn(
            TurnRequest::new("hello")
                .with_hint_affect("nervous, shy")
                .with_hint_expression("Concerned"),
        )
        .await
        .unwrap();

    let affect_prompt = &provider.calls_for(CallKind::Affect)[0].prompt;
    assert!(affect_prompt.contains("Previous state: nervous, shy"));
    let reply_call = &provider.calls_for(CallKind::Reply)[0];
    assert!(
        reply_call
            .system_prompt
            .as_deref()
            .unwrap_or_default()
            .contains("nervous, shy")
    );
    let expression_prompt = &provider.calls_for(CallKind::Expression)[0].prompt;
    assert!(expression_prompt.contains("Current expression: concerned"));
}

#[tokio::test]
async fn test_invalid_expression_hint_is_ignored() {
    let (orchestrator, provider) = orchestrator(echo_provider());

    orchestrator
        .run_turn(
            TurnRequest::new("hello")
                .with_hint_affect("   ")
                .with_hint_expression("ecstatic"),
        )
        .await
        .unwrap();

    let affect_prompt = &provider.calls_for(CallKind::Affect)[0].prompt;
    assert!(affect_prompt.contains("Previous state: emotionally neutral"));
    let expression_prompt = &provider.calls_for(CallKind::Expression)[0].prompt;
    assert!(expression_prompt.contains("Current expression: welcoming"));
}

#[tokio::test]
async fn test_refreshed_expressions_apply_to_next_turn() {
    let provider = ScriptedProvider::new()
        .on(CallKind::Affect, ScriptedOutcome::text("calm"))
        .on(CallKind::Reply, ScriptedOutcome::text("Okay."))
        .on(CallKind::Expression, ScriptedOutcome::text("smiling"));
    let (orchestrator, provider) = orchestrator(provider);

    let before = orchestrator.run_turn(TurnRequest::new("hi")).await.unwrap();
    assert_eq!(before.expression_state, "welcoming");

    orchestrator.refresh_expressions(
        CandidateExpressionSet::new(["neutral", "smiling"], "neutral").unwrap(),
    );
    let after = orchestrator.run_turn(TurnRequest::new("hi")).await.unwrap();

    assert_eq!(after.expression_state, "smiling");
    let prompt = &provider.calls_for(CallKind::Expression)[1].prompt;
    assert!(prompt.contains("neutral, smiling"));
    assert_eq!(orchestrator.expressions().fallback(), "neutral");
}

#[tokio::test]
async fn test_stored_history_cap_drops_oldest_exchange() {
    let mut config = test_config();
    config.session.max_stored_messages = Some(4);
    let (orchestrator, _) = orchestrator_with(echo_provider(), &config);

    let id = orchestrator.run_turn(TurnRequest::new("one")).await.unwrap().session_id;
    for message in ["two", "three"] {
        orchestrator
            .run_turn(TurnRequest::new(message).with_session(&id))
            .await
            .unwrap();
    }

    let session = orchestrator.store().snapshot(&id).await.unwrap();
    assert_eq!(session.messages().len(), 4);
    assert_eq!(session.messages()[0].content, "two");
}

#[tokio::test]
async fn test_response_wire_shape() {
    let (orchestrator, _) = orchestrator(echo_provider());

    let result = orchestrator.run_turn(TurnRequest::new("hello")).await.unwrap();
    let json = serde_json::to_value(result.to_response()).unwrap();

    assert_eq!(json["session_id"], result.session_id.as_str());
    assert_eq!(json["reply"], "re: hello");
    assert_eq!(json["expression_state"], "listening");
    assert_eq!(json["debug"]["session_id"], result.session_id.as_str());
    assert_eq!(json["debug"]["num_messages"], 2);
    assert_eq!(json["debug"]["affect_state"], "calm, attentive");
    for key in ["affect_call_ms", "reply_call_ms", "expression_call_ms", "total_ms"] {
        assert!(json["debug"][key].is_u64(), "{key} missing");
    }
}

#[tokio::test]
async fn test_punctuated_label_matches_hint_and_answer() {
    let provider = ScriptedProvider::new()
        .on(CallKind::Affect, ScriptedOutcome::text("calm"))
        .on(CallKind::Reply, ScriptedOutcome::text("Glad to hear it."))
        .on(CallKind::Expression, ScriptedOutcome::text("Smile_"));
    let (orchestrator, provider) = orchestrator(provider);
    orchestrator.refresh_expressions(
        CandidateExpressionSet::new(["welcoming", "smile_"], "welcoming").unwrap(),
    );

    let result = orchestrator
        .run_turn(TurnRequest::new("good news").with_hint_expression("smile_"))
        .await
        .unwrap();

    assert_eq!(result.expression_state, "smile_");
    assert_eq!(result.outcomes.expression, ExpressionOutcome::Matched);
    let expression_prompt = &provider.calls_for(CallKind::Expression)[0].prompt;
    assert!(expression_prompt.contains("Current expression: smile_"));
}

/// Echo provider that also describes camera frames
fn vision_provider(observation: ScriptedOutcome) -> ScriptedProvider {
    echo_provider().on(CallKind::Observation, observation)
}

#[tokio::test]
async fn test_frame_is_observed_before_reply() {
    let provider = vision_provider(ScriptedOutcome::text("The patient is rubbing their eyes."));
    let (orchestrator, provider) = orchestrator(provider);

    let result = orchestrator
        .run_turn(TurnRequest::new("I'm so tired").with_image("data:image/jpeg;base64,/9j/4AAQ"))
        .await
        .unwrap();

    assert_eq!(
        result.observation.as_deref(),
        Some("The patient is rubbing their eyes.")
    );
    assert_eq!(result.outcomes.observation, ObservationOutcome::Described);
    assert!(result.outcomes.is_clean());

    let calls = provider.calls();
    assert_eq!(calls[0].kind, CallKind::Observation);
    assert_eq!(calls[0].images, ["/9j/4AAQ"]);
    assert_eq!(calls[0].model.as_deref(), Some("llava"));

    let reply_call = &provider.calls_for(CallKind::Reply)[0];
    let system = reply_call.system_prompt.as_deref().unwrap_or_default();
    assert!(system.contains("[VISION]: The patient is rubbing their eyes."));
    assert!(provider.calls_for(CallKind::Affect)[0].images.is_empty());

    let response = result.to_response();
    assert!(response.debug.use_vision);
    assert_eq!(response.debug.vision_text, "The patient is rubbing their eyes.");
    assert_eq!(response.reply, "re: I'm so tired");

    let session = orchestrator.store().snapshot(&result.session_id).await.unwrap();
    assert!(session.messages().iter().all(|m| !m.content.contains("rubbing")));
}

#[tokio::test]
async fn test_no_frame_means_no_observation_call() {
    let provider = vision_provider(ScriptedOutcome::text("unused"));
    let (orchestrator, provider) = orchestrator(provider);

    let plain = orchestrator.run_turn(TurnRequest::new("hi")).await.unwrap();
    let blank = orchestrator
        .run_turn(TurnRequest::new("hi again").with_image("data:image/png;base64,"))
        .await
        .unwrap();

    for result in [&plain, &blank] {
        assert_eq!(result.observation, None);
        assert_eq!(result.outcomes.observation, ObservationOutcome::NotRequested);
        assert_eq!(result.timing.observation_call_ms, 0);
        assert!(!result.to_response().debug.use_vision);
    }
    assert!(provider.calls_for(CallKind::Observation).is_empty());
}

#[tokio::test]
async fn test_failed_observation_falls_back_to_text_only() {
    let provider = vision_provider(ScriptedOutcome::unavailable("model llava not found"));
    let (orchestrator, provider) = orchestrator(provider);

    let result = orchestrator
        .run_turn(TurnRequest::new("hello").with_image("/9j/4AAQ"))
        .await
        .unwrap();

    assert_eq!(result.observation, None);
    assert_eq!(result.outcomes.observation, ObservationOutcome::CallFailed);
    assert!(!result.outcomes.is_clean());
    assert_eq!(result.reply, "re: hello");
    let system = provider.calls_for(CallKind::Reply)[0]
        .system_prompt
        .clone()
        .unwrap_or_default();
    assert!(!system.contains("[VISION]"));
}

#[tokio::test]
async fn test_failed_observation_surfaces_when_configured() {
    let mut config = test_config();
    config.fallback.surface_errors = true;
    let provider = vision_provider(ScriptedOutcome::unavailable("model llava not found"));
    let (orchestrator, provider) = orchestrator_with(provider, &config);

    let err = orchestrator
        .run_turn(TurnRequest::new("hello").with_image("/9j/4AAQ"))
        .await
        .unwrap_err();

    assert!(matches!(err, PathosError::ObservationFailed(ref reason) if reason.contains("llava")));
    assert!(provider.calls_for(CallKind::Reply).is_empty());
    assert!(provider.calls_for(CallKind::Affect).is_empty());
    for id in orchestrator.store().ids() {
        let session = orchestrator.store().snapshot(&id).await.unwrap();
        assert!(session.history().is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_observation_times_out_and_counts_in_total() {
    let mut config = test_config();
    config.inference.observation_timeout = Duration::from_secs(2);
    let provider = vision_provider(
        ScriptedOutcome::text("too late").with_delay(Duration::from_secs(10)),
    );
    let (orchestrator, _) = orchestrator_with(provider, &config);

    let result = orchestrator
        .run_turn(TurnRequest::new("hello").with_image("/9j/4AAQ"))
        .await
        .unwrap();

    assert_eq!(result.outcomes.observation, ObservationOutcome::CallFailed);
    assert_eq!(result.timing.observation_call_ms, 2000);
    assert!(result.timing.total_ms >= 2000);
}
