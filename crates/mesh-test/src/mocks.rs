//! Recording doubles for the interface collaborators and the TMF transport

use mesh_core::{
    LinkLayer, MeshError, MessageInfo, NetifSubsystems, Result, Subsystem, TmfResponse,
    TmfTransport,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared, ordered log of collaborator calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Returns the recorded entries and empties the log.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

/// Subsystem that records `name:start` and `name:stop`.
#[derive(Debug)]
pub struct RecordingSubsystem {
    name: &'static str,
    log: CallLog,
}

impl RecordingSubsystem {
    pub fn new(name: &'static str, log: &CallLog) -> Self {
        Self {
            name,
            log: log.clone(),
        }
    }

    pub fn boxed(name: &'static str, log: &CallLog) -> Box<dyn Subsystem> {
        Box::new(Self::new(name, log))
    }
}

impl Subsystem for RecordingSubsystem {
    fn name(&self) -> &str {
        self.name
    }

    fn start(&mut self) {
        self.log.record(format!("{}:start", self.name));
    }

    fn stop(&mut self) {
        self.log.record(format!("{}:stop", self.name));
    }
}

/// Link layer that records `mac:true` and `mac:false`.
#[derive(Debug)]
pub struct RecordingLinkLayer {
    enabled: bool,
    log: CallLog,
}

impl RecordingLinkLayer {
    pub fn new(log: &CallLog) -> Self {
        Self {
            enabled: false,
            log: log.clone(),
        }
    }
}

impl LinkLayer for RecordingLinkLayer {
    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.log.record(format!("mac:{}", enabled));
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Collaborators for a node with only the mandatory subsystems.
pub fn minimal_subsystems(log: &CallLog) -> NetifSubsystems {
    NetifSubsystems::new(
        Box::new(RecordingLinkLayer::new(log)),
        RecordingSubsystem::boxed("forwarder", log),
    )
}

/// Collaborators with every optional subsystem present.
///
/// Pair with a configuration that enables all optional features.
pub fn full_subsystems(log: &CallLog) -> NetifSubsystems {
    let mut subsystems = minimal_subsystems(log);
    subsystems.channel_monitor = Some(RecordingSubsystem::boxed("channel-monitor", log));
    subsystems.dns_client = Some(RecordingSubsystem::boxed("dns", log));
    subsystems.sntp_client = Some(RecordingSubsystem::boxed("sntp", log));
    subsystems.secure_tmf = Some(RecordingSubsystem::boxed("secure-tmf", log));
    subsystems
}

/// Responses captured by a [`RecordingTransport`].
pub type SentResponses = Rc<RefCell<Vec<(TmfResponse, MessageInfo)>>>;

/// Transport that keeps every response it is asked to send.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: SentResponses,
    fail: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose every send fails with [`MeshError::NoBufs`].
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Handle for inspecting sent responses after the transport is boxed.
    pub fn sent(&self) -> SentResponses {
        Rc::clone(&self.sent)
    }
}

impl TmfTransport for RecordingTransport {
    fn send_response(&mut self, response: TmfResponse, info: &MessageInfo) -> Result<()> {
        if self.fail {
            return Err(MeshError::NoBufs);
        }
        self.sent.borrow_mut().push((response, *info));
        Ok(())
    }
}
