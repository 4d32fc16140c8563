use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use botvisor::config::ConfigFile;
use botvisor::engine::{Runtime, SupervisorEvent};
use botvisor::fs::mock::MockFileSystem;
use botvisor::fs::FileSystem;
use botvisor::supervisor::outcome::ExitStatusInfo;
use botvisor::transport::{InboundEvent, InboundPayload};
use botvisor::types::{ChatId, LogStream, UserId};

use crate::fake_backend::FakeProcessBackend;
use crate::fake_tools::RecordingToolRunner;
use crate::fake_transport::RecordingTransport;

pub const CHAT: ChatId = 100;
pub const USER: UserId = 7;

/// A runtime wired to fakes, driven one event at a time.
///
/// Background tasks (provisioning, input timeouts) report on `events`; the
/// test decides when those events are handled.
pub struct Harness {
    pub runtime: Runtime<FakeProcessBackend, RecordingTransport>,
    pub events: mpsc::Receiver<SupervisorEvent>,
    pub tx: mpsc::Sender<SupervisorEvent>,
    pub backend: FakeProcessBackend,
    pub transport: RecordingTransport,
    pub tools: RecordingToolRunner,
    pub fs: MockFileSystem,
}

impl Harness {
    pub fn new(cfg: &ConfigFile) -> Self {
        Self::with_fs(cfg, MockFileSystem::new())
    }

    pub fn with_fs(cfg: &ConfigFile, fs: MockFileSystem) -> Self {
        let (tx, events) = mpsc::channel(256);
        let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
        let backend = FakeProcessBackend::new();
        let transport = RecordingTransport::new();
        let tools = RecordingToolRunner::new().with_fs(shared.clone());

        let runtime = Runtime::new(
            cfg,
            shared,
            Arc::new(tools.clone()),
            backend.clone(),
            transport.clone(),
            tx.clone(),
        )
        .expect("runtime from valid config");

        Self {
            runtime,
            events,
            tx,
            backend,
            transport,
            tools,
            fs,
        }
    }

    pub async fn handle(&mut self, event: SupervisorEvent) -> bool {
        self.runtime
            .handle_event(event)
            .await
            .expect("handle_event never fails")
    }

    pub async fn inbound(&mut self, chat: ChatId, user: UserId, payload: InboundPayload) {
        self.handle(SupervisorEvent::Inbound(InboundEvent { chat, user, payload }))
            .await;
    }

    pub async fn text(&mut self, text: &str) {
        self.inbound(CHAT, USER, InboundPayload::Text(text.to_string()))
            .await;
    }

    pub async fn choice(&mut self, data: &str) {
        self.inbound(CHAT, USER, InboundPayload::Choice(data.to_string()))
            .await;
    }

    pub async fn document(&mut self, file_name: &str, bytes: impl Into<Vec<u8>>) {
        let file = self.transport.add_file(bytes);
        self.inbound(
            CHAT,
            USER,
            InboundPayload::Document {
                file,
                file_name: file_name.to_string(),
            },
        )
        .await;
    }

    /// Handle queued events until one matching `pred` has been handled.
    pub async fn pump_until(&mut self, pred: impl Fn(&SupervisorEvent) -> bool) {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), self.events.recv())
                .await
                .expect("timed out waiting for a runtime event")
                .expect("event channel closed");
            let done = pred(&event);
            self.handle(event).await;
            if done {
                return;
            }
        }
    }

    /// `/startbot <name>` and wait for provisioning to resolve. Returns the
    /// run id when the process was spawned.
    pub async fn start(&mut self, name: &str) -> Option<u64> {
        let before = self.backend.spawn_count();
        self.text(&format!("/startbot {name}")).await;
        let installing = self
            .runtime
            .registry()
            .get(name)
            .is_some_and(|p| p.install_ticket().is_some());
        if !installing {
            return None;
        }
        self.pump_until(|e| matches!(e, SupervisorEvent::ProvisionFinished { .. }))
            .await;
        (self.backend.spawn_count() > before)
            .then(|| self.backend.last_run_id())
            .flatten()
    }

    pub async fn stdout(&mut self, name: &str, run_id: u64, text: &str) {
        self.output(name, run_id, LogStream::Stdout, text).await;
    }

    pub async fn output(&mut self, name: &str, run_id: u64, stream: LogStream, text: &str) {
        self.handle(SupervisorEvent::ProcessOutput {
            project: name.to_string(),
            run_id,
            stream,
            text: text.to_string(),
        })
        .await;
    }

    pub async fn exit(&mut self, name: &str, run_id: u64, code: Option<i32>, signal: Option<i32>) -> bool {
        self.handle(SupervisorEvent::ProcessExited {
            project: name.to_string(),
            run_id,
            status: ExitStatusInfo { code, signal },
        })
        .await
    }

    /// Write a script directly and create the project through `/upload`.
    pub async fn create_bot(&mut self, name: &str, source: &str) {
        self.text("/upload").await;
        self.document(&format!("{name}.py"), source.as_bytes().to_vec())
            .await;
        assert!(
            self.runtime.registry().contains(name),
            "bot {name} should be registered"
        );
    }

    pub fn last_text(&self) -> String {
        self.transport.last_text(CHAT).unwrap_or_default()
    }
}
