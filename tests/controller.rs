//! Interaction controller integration tests
//!
//! Drives whole ticks against scripted capabilities

use care_companion::channels::CaregiverCommand;
use care_companion::controller::{DeliveryReport, DialoguePhase, Feeling, TickOutcome};
use care_companion::events::{Scene, SceneEvent};
use care_companion::patient::Patient;
use care_companion::plan::TherapyPlan;
use care_companion::vision::PhotoArchive;
use care_companion::{Error, controller::dialogue};
use chrono::Duration;
use tokio::sync::broadcast;

mod common;
use common::{Scenario, hm, monday_at, plan_with};

fn drain_scenes(rx: &mut broadcast::Receiver<SceneEvent>) -> Vec<SceneEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn recap_at(feeling: Feeling, hour: u32, minute: u32) -> CaregiverCommand {
    CaregiverCommand::recap("Maria", feeling, monday_at(hour, minute)).unwrap()
}

#[tokio::test]
async fn test_correct_box_completes_round_with_recap() {
    let mut scenario = Scenario::new(vec![plan_with("monday", hm(8, 0), &[("Aspirina", "1")])]);
    scenario.script = vec![None, Some("bene"), Some("foto"), Some("avanti")];
    scenario.readings = vec![vec!["ASPIRINA"]];
    let (mut controller, rec) = scenario.build();
    let mut scenes = rec.scenes.subscribe();

    let outcome = controller.tick().await.unwrap();

    assert_eq!(
        outcome,
        TickOutcome::RoundCompleted(DeliveryReport { sent: 2, failed: 0 })
    );
    let recap = recap_at(Feeling::Good, 8, 0);
    assert_eq!(
        rec.sent().await,
        vec![("100".to_string(), recap.clone()), ("200".to_string(), recap)]
    );
    assert!(
        rec.said("Bene Maria è la scatola corretta, devi prenderne 1.")
            .await
    );
    assert!(rec.said("riepilogo ai tuoi caregiver").await);
    assert_eq!(controller.state().phase, DialoguePhase::Idle);
    assert!(controller.state().all_verified(1));

    let images: Vec<String> = drain_scenes(&mut scenes)
        .into_iter()
        .map(|e| e.image)
        .collect();
    let expected: Vec<String> = [
        Scene::Medication,
        Scene::Happy,
        Scene::Medication,
        Scene::Medication,
        Scene::Photo,
        Scene::Happy,
        Scene::Medication,
        Scene::Idle,
    ]
    .iter()
    .map(|s| s.asset().to_string())
    .collect();
    assert_eq!(images, expected);
}

#[tokio::test]
async fn test_wrong_box_is_retried_without_repeating_instructions() {
    let mut scenario = Scenario::new(vec![plan_with("monday", hm(8, 0), &[("Aspirina", "1")])]);
    scenario.script = vec![None, Some("bene"), Some("foto"), Some("ecco la foto"), Some("avanti")];
    scenario.readings = vec![vec!["IBUPROFENE"], vec!["ASPIRINA 500mg"]];
    let (mut controller, rec) = scenario.build();

    let outcome = controller.tick().await.unwrap();

    assert!(matches!(outcome, TickOutcome::RoundCompleted(_)));
    assert_eq!(*rec.captures.lock().await, 2);
    assert_eq!(rec.said_count(&dialogue::box_wrong()).await, 1);
    assert_eq!(rec.said_count("Prendi Aspirina").await, 1);
    assert_eq!(controller.state().completed[0].attempts, 2);
    assert_eq!(rec.sent().await.len(), 2);
}

#[tokio::test]
async fn test_doses_are_announced_and_verified_in_order() {
    let mut scenario = Scenario::new(vec![plan_with(
        "monday",
        hm(8, 0),
        &[("Tachipirina", "1"), ("Omeprazolo", "mezza compressa")],
    )]);
    scenario.script = vec![
        None,
        Some("bene"),
        Some("foto"),
        Some("avanti"),
        Some("foto"),
        Some("avanti"),
    ];
    scenario.readings = vec![vec!["TACHIPIRINA", "paracetamolo"], vec!["omeprazolo 20 mg"]];
    let (mut controller, rec) = scenario.build();

    controller.tick().await.unwrap();

    assert!(rec.said("i seguenti farmaci: Tachipirina, Omeprazolo.").await);
    assert!(rec.said("devi prenderne mezza compressa").await);
    let names: Vec<_> = controller
        .state()
        .completed
        .iter()
        .map(|a| a.medication.as_str())
        .collect();
    assert_eq!(names, vec!["Tachipirina", "Omeprazolo"]);
}

#[tokio::test]
async fn test_round_without_caregivers_sends_nothing() {
    let mut scenario = Scenario::new(vec![plan_with("monday", hm(8, 0), &[("Aspirina", "1")])]);
    scenario.patient = Patient::new("Maria", Vec::<String>::new());
    scenario.script = vec![None, Some("male"), Some("foto"), Some("avanti")];
    scenario.readings = vec![vec!["Aspirina"]];
    let (mut controller, rec) = scenario.build();

    let outcome = controller.tick().await.unwrap();

    assert_eq!(outcome, TickOutcome::RoundCompleted(DeliveryReport::default()));
    assert!(rec.sent().await.is_empty());
    // No help offer, so no yes/no reply was needed
    assert!(!rec.said("Vuoi inviare").await);
    assert!(!rec.said("riepilogo").await);
}

#[tokio::test]
async fn test_help_without_caregivers() {
    let mut scenario = Scenario::new(vec![plan_with("monday", hm(20, 0), &[("Aspirina", "1")])]);
    scenario.patient = Patient::new("Maria", Vec::<String>::new());
    scenario.script = vec![Some("aiuto")];
    let (mut controller, rec) = scenario.build();

    let outcome = controller.tick().await.unwrap();

    assert_eq!(outcome, TickOutcome::HelpSent(DeliveryReport::default()));
    assert!(rec.said("nessun caregiver").await);
    assert!(rec.sent().await.is_empty());
}

#[tokio::test]
async fn test_help_fires_once_per_utterance() {
    let mut scenario = Scenario::new(vec![plan_with("monday", hm(20, 0), &[("Aspirina", "1")])]);
    scenario.script = vec![Some("Aiuto, mi sono caduta"), None];
    let (mut controller, rec) = scenario.build();
    let mut scenes = rec.scenes.subscribe();

    let outcome = controller.tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::HelpSent(DeliveryReport { sent: 2, failed: 0 })
    );
    assert_eq!(controller.tick().await.unwrap(), TickOutcome::Idle);

    let help = CaregiverCommand::help_request("Maria");
    assert_eq!(
        rec.sent().await,
        vec![("100".to_string(), help.clone()), ("200".to_string(), help)]
    );
    assert!(rec.said("Maria invio un messaggio ai tuoi caregiver.").await);
    assert!(rec.said("ti contatteranno al più presto").await);

    let images: Vec<String> = drain_scenes(&mut scenes).into_iter().map(|e| e.image).collect();
    assert_eq!(
        images,
        vec![Scene::Alert.asset().to_string(), Scene::Idle.asset().to_string()]
    );
}

#[tokio::test]
async fn test_failed_notification_is_skipped() {
    let mut scenario = Scenario::new(vec![plan_with("monday", hm(20, 0), &[("Aspirina", "1")])]);
    scenario.script = vec![Some("aiuto")];
    scenario.failing = vec!["100"];
    let (mut controller, rec) = scenario.build();

    let outcome = controller.tick().await.unwrap();

    assert_eq!(
        outcome,
        TickOutcome::HelpSent(DeliveryReport { sent: 1, failed: 1 })
    );
    assert_eq!(rec.sent().await.len(), 1);
    assert_eq!(rec.sent().await[0].0, "200");
}

#[tokio::test]
async fn test_slot_is_consumed_once() {
    let mut scenario = Scenario::new(vec![plan_with("monday", hm(8, 0), &[("Aspirina", "1")])]);
    scenario.script = vec![None, Some("bene"), Some("foto"), Some("avanti"), None];
    scenario.readings = vec![vec!["ASPIRINA"]];
    let (mut controller, rec) = scenario.build();

    assert!(matches!(
        controller.tick().await.unwrap(),
        TickOutcome::RoundCompleted(_)
    ));
    // Same minute, second tick
    assert_eq!(controller.tick().await.unwrap(), TickOutcome::Idle);
    assert_eq!(rec.said_count("Ciao Maria").await, 1);
}

#[tokio::test]
async fn test_weekly_dose_fires_again_next_week() {
    let mut scenario = Scenario::new(vec![
        plan_with("monday", hm(8, 0), &[("Aspirina", "1")]),
        TherapyPlan::new("tuesday"),
    ]);
    scenario.script = vec![
        None,
        Some("bene"),
        Some("foto"),
        Some("avanti"),
        None,
        None,
        Some("bene"),
        Some("foto"),
        Some("avanti"),
    ];
    scenario.readings = vec![vec!["ASPIRINA"], vec!["ASPIRINA"]];
    let (mut controller, rec) = scenario.build();

    assert!(matches!(
        controller.tick().await.unwrap(),
        TickOutcome::RoundCompleted(_)
    ));

    rec.clock.set(monday_at(8, 0) + Duration::days(1));
    assert_eq!(controller.tick().await.unwrap(), TickOutcome::Idle);
    assert_eq!(controller.plan().day(), "tuesday");

    rec.clock.set(monday_at(8, 0) + Duration::weeks(1));
    let outcome = controller.tick().await.unwrap();

    assert_eq!(
        outcome,
        TickOutcome::RoundCompleted(DeliveryReport { sent: 2, failed: 0 })
    );
    assert_eq!(rec.said_count("Ciao Maria").await, 2);
    assert_eq!(rec.sent().await.len(), 4);
}

#[tokio::test]
async fn test_round_past_midnight_keeps_its_day() {
    let dir = tempfile::tempdir().unwrap();
    let archive = PhotoArchive::new(dir.path());

    let mut scenario = Scenario::new(vec![plan_with("monday", hm(23, 59), &[("Aspirina", "1")])]);
    scenario.now = monday_at(23, 59);
    scenario.clock_step_minutes = 1;
    scenario.script = vec![None, Some("bene"), Some("foto"), Some("avanti")];
    scenario.readings = vec![vec!["ASPIRINA"]];
    let (controller, rec) = scenario.build();
    let mut controller = controller.with_archive(archive.clone());

    controller.tick().await.unwrap();

    // The round finished at Tuesday 00:00 but belongs to Monday
    let recap = recap_at(Feeling::Good, 0, 0);
    assert!(matches!(recap, CaregiverCommand::SendRecap { ref day, .. } if day == "monday"));
    assert_eq!(rec.sent().await[0].1, recap);
    assert_eq!(archive.list("monday").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_day_rollover_replaces_plan() {
    let mut scenario = Scenario::new(vec![
        plan_with("monday", hm(8, 0), &[("Aspirina", "1")]),
        plan_with("tuesday", hm(9, 30), &[("Omeprazolo", "1")]),
    ]);
    scenario.now = monday_at(23, 59);
    scenario.script = vec![None, None];
    let (mut controller, rec) = scenario.build();

    controller.tick().await.unwrap();
    assert_eq!(controller.plan().day(), "monday");

    rec.clock.advance_minutes(1);
    controller.tick().await.unwrap();

    assert_eq!(controller.plan().day(), "tuesday");
    assert!(controller.plan().doses_at(hm(8, 0)).is_none());
    assert_eq!(controller.plan().doses_at(hm(9, 30)).unwrap()[0].medication, "Omeprazolo");
    assert_eq!(*rec.plan_requests.lock().await, vec!["monday", "tuesday"]);
}

#[tokio::test]
async fn test_missing_plan_is_fatal() {
    let scenario = Scenario::new(Vec::new());
    let (mut controller, _rec) = scenario.build();

    let err = controller.tick().await.unwrap_err();

    assert!(matches!(err, Error::ScheduleUnavailable { ref day, .. } if day == "monday"));
}

#[tokio::test]
async fn test_unclear_feeling_is_reprompted() {
    let mut scenario = Scenario::new(vec![plan_with("monday", hm(8, 0), &[("Aspirina", "1")])]);
    scenario.script = vec![None, Some("così così"), None, Some("benino"), Some("foto"), Some("avanti")];
    scenario.readings = vec![vec!["ASPIRINA"]];
    let (mut controller, rec) = scenario.build();

    controller.tick().await.unwrap();

    assert_eq!(rec.said_count(&dialogue::clarify_feeling()).await, 1);
    assert_eq!(controller.state().feeling, Feeling::Good);
}

#[tokio::test]
async fn test_bad_feeling_with_help_continues_round() {
    let mut scenario = Scenario::new(vec![plan_with("monday", hm(8, 0), &[("Aspirina", "1")])]);
    scenario.script = vec![
        None,
        Some("male"),
        Some("forse"),
        Some("sì"),
        Some("foto"),
        Some("avanti"),
    ];
    scenario.readings = vec![vec!["ASPIRINA"]];
    let (mut controller, rec) = scenario.build();
    let mut scenes = rec.scenes.subscribe();

    let outcome = controller.tick().await.unwrap();

    assert_eq!(
        outcome,
        TickOutcome::RoundCompleted(DeliveryReport { sent: 2, failed: 0 })
    );
    assert_eq!(rec.said_count(&dialogue::clarify_yes_no()).await, 1);
    let commands: Vec<_> = rec.sent().await.into_iter().map(|(_, c)| c).collect();
    let help = CaregiverCommand::help_request("Maria");
    let recap = recap_at(Feeling::Bad, 8, 0);
    assert_eq!(commands, vec![help.clone(), help, recap.clone(), recap]);

    let images: Vec<String> = drain_scenes(&mut scenes).into_iter().map(|e| e.image).collect();
    assert!(images.contains(&Scene::Sad.asset().to_string()));
    assert!(images.contains(&Scene::Alert.asset().to_string()));
}

#[tokio::test]
async fn test_bad_feeling_declining_help_sends_only_recap() {
    let mut scenario = Scenario::new(vec![plan_with("monday", hm(8, 0), &[("Aspirina", "1")])]);
    scenario.script = vec![None, Some("male"), Some("no grazie"), Some("foto"), Some("avanti")];
    scenario.readings = vec![vec!["ASPIRINA"]];
    let (mut controller, rec) = scenario.build();

    controller.tick().await.unwrap();

    let commands: Vec<_> = rec.sent().await.into_iter().map(|(_, c)| c).collect();
    let recap = recap_at(Feeling::Bad, 8, 0);
    assert_eq!(commands, vec![recap.clone(), recap]);
}

#[tokio::test]
async fn test_capture_failure_retries_dose() {
    let mut scenario = Scenario::new(vec![plan_with("monday", hm(8, 0), &[("Aspirina", "1")])]);
    scenario.script = vec![None, Some("bene"), Some("foto"), Some("foto"), Some("avanti")];
    scenario.camera = vec![Err(Error::CaptureUnavailable("no device".to_string()))];
    scenario.readings = vec![vec!["ASPIRINA"]];
    let (mut controller, rec) = scenario.build();

    let outcome = controller.tick().await.unwrap();

    assert!(matches!(outcome, TickOutcome::RoundCompleted(_)));
    assert!(rec.said("non sono riuscito a scattare la foto").await);
    assert_eq!(*rec.captures.lock().await, 2);
    // The failed capture never reached recognition
    assert_eq!(controller.state().completed[0].attempts, 1);
}

#[tokio::test]
async fn test_verification_bound_aborts_without_recap() {
    let mut scenario = Scenario::new(vec![plan_with("monday", hm(8, 0), &[("Aspirina", "1")])]);
    scenario.settings.max_verification_attempts = Some(2);
    scenario.script = vec![None, Some("bene"), Some("foto"), Some("foto")];
    scenario.readings = vec![vec!["IBUPROFENE"], vec![]];
    let (mut controller, rec) = scenario.build();

    let outcome = controller.tick().await.unwrap();

    assert_eq!(outcome, TickOutcome::RoundAborted);
    let commands: Vec<_> = rec.sent().await.into_iter().map(|(_, c)| c).collect();
    assert_eq!(commands.len(), 2);
    assert!(
        commands
            .iter()
            .all(|c| matches!(c, CaregiverCommand::SendHelp { .. }))
    );
    assert_eq!(controller.state().phase, DialoguePhase::Idle);
}

#[tokio::test]
async fn test_clarification_bound_aborts_round() {
    let mut scenario = Scenario::new(vec![plan_with("monday", hm(8, 0), &[("Aspirina", "1")])]);
    scenario.settings.max_clarifications = Some(1);
    scenario.script = vec![None, Some("boh"), Some("non so")];
    let (mut controller, rec) = scenario.build();

    let outcome = controller.tick().await.unwrap();

    assert_eq!(outcome, TickOutcome::RoundAborted);
    assert_eq!(rec.said_count(&dialogue::clarify_feeling()).await, 1);
    assert!(!rec.said("i seguenti farmaci").await);
    // Aborted slots stay consumed
    assert!(controller.state().slot_consumed(monday_at(8, 0)));
}

#[tokio::test]
async fn test_box_photos_are_archived() {
    let dir = tempfile::tempdir().unwrap();
    let archive = PhotoArchive::new(dir.path());

    let mut scenario = Scenario::new(vec![plan_with("monday", hm(8, 0), &[("Aspirina", "1")])]);
    scenario.script = vec![None, Some("bene"), Some("foto"), Some("foto"), Some("avanti")];
    scenario.readings = vec![vec!["IBUPROFENE"], vec!["ASPIRINA"]];
    let (controller, _rec) = scenario.build();
    let mut controller = controller.with_archive(archive.clone());

    controller.tick().await.unwrap();

    let photos = archive.list("monday").await.unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].0, "Aspirina");
}
