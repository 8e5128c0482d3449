//! Shared test utilities
//!
//! Scripted stand-ins for every controller capability. Each double records
//! what the controller did with it through an `Arc<Mutex<..>>` the test keeps.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tokio::sync::Mutex;

use care_companion::channels::{CaregiverCommand, Notifier};
use care_companion::controller::{Capabilities, Clock, Controller, DialogueSettings};
use care_companion::events::SceneBus;
use care_companion::patient::Patient;
use care_companion::plan::{Dose, TherapyPlan, TherapyPlanProvider};
use care_companion::vision::{BoxMatcher, Camera, Frame, TextFragment, TextRecognizer};
use care_companion::voice::{Listener, Speaker, Utterance};
use care_companion::{Error, Result};

/// 2024-01-01 was a Monday
pub fn monday_at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

/// Plan with one slot of `(medication, quantity)` doses
pub fn plan_with(day: &str, time: NaiveTime, doses: &[(&str, &str)]) -> TherapyPlan {
    TherapyPlan::new(day)
        .with_slot(
            time,
            doses.iter().map(|(m, q)| Dose::new(*m, *q)).collect(),
        )
        .unwrap()
}

/// Listener that replays a fixed script; `None` entries are silence
///
/// Running past the end of the script panics so a stuck dialogue fails
/// the test instead of hanging it.
pub struct ScriptedListener {
    script: VecDeque<Option<String>>,
    active: bool,
}

impl ScriptedListener {
    pub fn new(script: &[Option<&str>]) -> Self {
        Self {
            script: script.iter().map(|s| s.map(ToString::to_string)).collect(),
            active: false,
        }
    }
}

#[async_trait(?Send)]
impl Listener for ScriptedListener {
    fn resume(&mut self) -> Result<()> {
        self.active = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.active = false;
    }

    async fn listen(&mut self) -> Result<Option<Utterance>> {
        assert!(self.active, "listen called while paused");
        let next = self.script.pop_front().expect("listener script exhausted");
        Ok(next.map(Utterance::new))
    }
}

/// Speaker that records every prompt
pub struct RecordingSpeaker {
    pub spoken: Arc<Mutex<Vec<String>>>,
}

#[async_trait(?Send)]
impl Speaker for RecordingSpeaker {
    async fn say(&mut self, text: &str) -> Result<()> {
        self.spoken.lock().await.push(text.to_string());
        Ok(())
    }
}

/// Camera returning scripted results, then a dummy frame
pub struct FakeCamera {
    results: VecDeque<Result<Frame>>,
    pub captures: Arc<Mutex<usize>>,
}

impl FakeCamera {
    pub fn new(results: Vec<Result<Frame>>) -> Self {
        Self {
            results: results.into(),
            captures: Arc::new(Mutex::new(0)),
        }
    }
}

#[async_trait(?Send)]
impl Camera for FakeCamera {
    async fn capture(&mut self) -> Result<Frame> {
        *self.captures.lock().await += 1;
        self.results
            .pop_front()
            .unwrap_or_else(|| Ok(Frame::jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9])))
    }
}

/// Recognizer returning one scripted text per call, then nothing
pub struct FakeOcr {
    readings: Mutex<VecDeque<Vec<String>>>,
}

impl FakeOcr {
    pub fn new(readings: &[Vec<&str>]) -> Self {
        Self {
            readings: Mutex::new(
                readings
                    .iter()
                    .map(|r| r.iter().map(ToString::to_string).collect())
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl TextRecognizer for FakeOcr {
    async fn recognize(&self, _frame: &Frame) -> Result<Vec<TextFragment>> {
        let reading = self.readings.lock().await.pop_front().unwrap_or_default();
        Ok(reading
            .into_iter()
            .map(|text| TextFragment::new(text, 0.9))
            .collect())
    }
}

/// Notifier that records deliveries; chats in `failing` reject every send
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<(String, CaregiverCommand)>>>,
    pub failing: HashSet<String>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, chat_id: &str, command: &CaregiverCommand) -> Result<()> {
        if self.failing.contains(chat_id) {
            return Err(Error::NotificationDeliveryFailed {
                chat_id: chat_id.to_string(),
                reason: "blocked by user".to_string(),
            });
        }
        self.sent
            .lock()
            .await
            .push((chat_id.to_string(), command.clone()));
        Ok(())
    }
}

/// Clock the test moves by hand
///
/// With a non-zero `step`, every reading also advances the clock by that
/// many minutes.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<std::sync::Mutex<NaiveDateTime>>,
    step: i64,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self::stepping(now, 0)
    }

    pub fn stepping(now: NaiveDateTime, step: i64) -> Self {
        Self {
            now: Arc::new(std::sync::Mutex::new(now)),
            step,
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance_minutes(&self, minutes: i64) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::minutes(minutes);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        let mut now = self.now.lock().unwrap();
        let read = *now;
        *now += chrono::Duration::minutes(self.step);
        read
    }
}

/// Plans held in memory; unknown days are unavailable
pub struct StaticPlanProvider {
    plans: HashMap<String, TherapyPlan>,
    pub requests: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl TherapyPlanProvider for StaticPlanProvider {
    async fn plan_for(&self, day: &str) -> Result<TherapyPlan> {
        self.requests.lock().await.push(day.to_string());
        self.plans
            .get(day)
            .cloned()
            .ok_or_else(|| Error::ScheduleUnavailable {
                day: day.to_string(),
                reason: "no plan".to_string(),
            })
    }
}

/// Everything a test sets up before building a controller
pub struct Scenario {
    pub patient: Patient,
    pub script: Vec<Option<&'static str>>,
    pub camera: Vec<Result<Frame>>,
    pub readings: Vec<Vec<&'static str>>,
    pub plans: Vec<TherapyPlan>,
    pub now: NaiveDateTime,
    pub settings: DialogueSettings,
    pub failing: Vec<&'static str>,
    /// Minutes the clock moves on every reading
    pub clock_step_minutes: i64,
}

impl Scenario {
    /// Maria with caregivers "100" and "200", Monday 08:00
    pub fn new(plans: Vec<TherapyPlan>) -> Self {
        Self {
            patient: Patient::new("Maria", ["100".to_string(), "200".to_string()]),
            script: Vec::new(),
            camera: Vec::new(),
            readings: Vec::new(),
            plans,
            now: monday_at(8, 0),
            settings: DialogueSettings::default(),
            failing: Vec::new(),
            clock_step_minutes: 0,
        }
    }

    pub fn build(self) -> (Controller, Recorders) {
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let plan_requests = Arc::new(Mutex::new(Vec::new()));
        let clock = ManualClock::stepping(self.now, self.clock_step_minutes);
        let camera = FakeCamera::new(self.camera);
        let captures = Arc::clone(&camera.captures);
        let scenes = SceneBus::new();

        let caps = Capabilities {
            listener: Box::new(ScriptedListener::new(&self.script)),
            speaker: Box::new(RecordingSpeaker {
                spoken: Arc::clone(&spoken),
            }),
            camera: Box::new(camera),
            recognizer: Box::new(FakeOcr::new(&self.readings)),
            notifier: Box::new(RecordingNotifier {
                sent: Arc::clone(&sent),
                failing: self.failing.iter().map(ToString::to_string).collect(),
            }),
            plans: Box::new(StaticPlanProvider {
                plans: self
                    .plans
                    .into_iter()
                    .map(|p| (p.day().to_string(), p))
                    .collect(),
                requests: Arc::clone(&plan_requests),
            }),
            clock: Box::new(clock.clone()),
        };

        let recorders = Recorders {
            spoken,
            sent,
            plan_requests,
            captures,
            clock,
            scenes: scenes.clone(),
        };
        let controller = Controller::new(
            self.patient,
            caps,
            self.settings,
            BoxMatcher::default(),
            scenes,
        );
        (controller, recorders)
    }
}

/// Handles on what the controller did
pub struct Recorders {
    pub spoken: Arc<Mutex<Vec<String>>>,
    pub sent: Arc<Mutex<Vec<(String, CaregiverCommand)>>>,
    pub plan_requests: Arc<Mutex<Vec<String>>>,
    pub captures: Arc<Mutex<usize>>,
    pub clock: ManualClock,
    pub scenes: SceneBus,
}

impl Recorders {
    pub async fn spoken(&self) -> Vec<String> {
        self.spoken.lock().await.clone()
    }

    pub async fn sent(&self) -> Vec<(String, CaregiverCommand)> {
        self.sent.lock().await.clone()
    }

    /// Whether some prompt contains `needle`
    pub async fn said(&self, needle: &str) -> bool {
        self.spoken.lock().await.iter().any(|s| s.contains(needle))
    }

    /// How many prompts contain `needle`
    pub async fn said_count(&self, needle: &str) -> usize {
        self.spoken
            .lock()
            .await
            .iter()
            .filter(|s| s.contains(needle))
            .count()
    }
}
