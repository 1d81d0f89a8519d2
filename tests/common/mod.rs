//! Shared fakes for the recorder integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use fluency_capture::audio::{
    AudioChunk, AudioFormat, CaptureBackend, CaptureError, FragmentSink, Permission,
    PermissionGate,
};
use fluency_capture::notify::{Notice, Notifier};
use fluency_capture::settings::RecorderSettings;
use fluency_capture::RecorderView;

pub const SAMPLE_RATE: u32 = 16_000;

/// One 100ms fragment at `SAMPLE_RATE`, mono.
pub const FRAGMENT_SAMPLES: usize = 1_600;

pub fn settings(max_duration_secs: u32) -> RecorderSettings {
    RecorderSettings {
        max_duration_secs,
        ..Default::default()
    }
}

/// Permission gate whose answer the test can flip at any time.
#[derive(Clone)]
pub struct SwitchableGate {
    answer: Arc<Mutex<Permission>>,
    pub calls: Arc<AtomicUsize>,
}

impl SwitchableGate {
    pub fn granted() -> Self {
        Self::with(Permission::Granted)
    }

    pub fn denied() -> Self {
        Self::with(Permission::Denied {
            reason: "Permission denied by user".to_string(),
        })
    }

    fn with(answer: Permission) -> Self {
        Self {
            answer: Arc::new(Mutex::new(answer)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn grant(&self) {
        *self.answer.lock().unwrap() = Permission::Granted;
    }

    pub fn deny(&self) {
        *self.answer.lock().unwrap() = Permission::Denied {
            reason: "Permission denied by user".to_string(),
        };
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionGate for SwitchableGate {
    async fn request_access(&mut self) -> Permission {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.lock().unwrap().clone()
    }
}

/// What the fake device saw, shared with the test body.
#[derive(Default)]
pub struct BackendProbe {
    pub acquires: AtomicUsize,
    pub releases: AtomicUsize,
    pub active: AtomicBool,
    pub delivered: AtomicUsize,
    pub fail_next_acquire: Mutex<Option<CaptureError>>,
    sink: Mutex<Option<FragmentSink>>,
}

impl BackendProbe {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn acquires(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }

    /// Simulate the device failing mid-stream.
    pub fn fail_stream(&self, err: CaptureError) {
        let sink = self.sink.lock().unwrap().clone();
        sink.expect("no open stream").fail(err);
    }
}

/// Device that delivers silent 100ms fragments on the tokio clock.
pub struct SilentBackend {
    probe: Arc<BackendProbe>,
    paused: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl SilentBackend {
    pub fn new() -> (Self, Arc<BackendProbe>) {
        let probe = Arc::new(BackendProbe::default());
        (
            Self {
                probe: probe.clone(),
                paused: Arc::new(AtomicBool::new(false)),
                task: None,
            },
            probe,
        )
    }
}

#[async_trait]
impl CaptureBackend for SilentBackend {
    async fn acquire(&mut self, sink: FragmentSink) -> Result<AudioFormat, CaptureError> {
        if let Some(err) = self.probe.fail_next_acquire.lock().unwrap().take() {
            return Err(err);
        }
        if self.task.is_some() {
            return Err(CaptureError::DeviceBusy);
        }

        self.probe.acquires.fetch_add(1, Ordering::SeqCst);
        self.probe.active.store(true, Ordering::SeqCst);
        *self.probe.sink.lock().unwrap() = Some(sink.clone());
        self.paused.store(false, Ordering::SeqCst);

        let probe = self.probe.clone();
        let paused = self.paused.clone();
        let period = Duration::from_millis(100);
        self.task = Some(tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            loop {
                ticks.tick().await;
                if paused.load(Ordering::SeqCst) {
                    continue;
                }
                if !sink.deliver(AudioChunk::silence(FRAGMENT_SAMPLES)) {
                    break;
                }
                probe.delivered.fetch_add(1, Ordering::SeqCst);
            }
        }));

        Ok(AudioFormat {
            sample_rate: SAMPLE_RATE,
            channels: 1,
        })
    }

    fn pause(&mut self) -> Result<(), CaptureError> {
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), CaptureError> {
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.probe.releases.fetch_add(1, Ordering::SeqCst);
        }
        *self.probe.sink.lock().unwrap() = None;
        self.probe.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.task.is_some()
    }
}

/// Notifier that keeps every notice.
#[derive(Default)]
pub struct CollectingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl CollectingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.title.clone())
            .collect()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

/// Wait (on the tokio clock) until the view satisfies `pred`.
pub async fn wait_for_view<F>(rx: &mut watch::Receiver<RecorderView>, pred: F) -> RecorderView
where
    F: FnMut(&RecorderView) -> bool,
{
    let view = tokio::time::timeout(Duration::from_secs(120), rx.wait_for(pred))
        .await
        .expect("timed out waiting for recorder view")
        .expect("recorder loop closed");
    view.clone()
}

/// Poll `cond` on the tokio clock.
pub async fn wait_until<F>(mut cond: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}
