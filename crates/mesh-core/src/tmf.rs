//! Mesh-management (TMF) message dispatch and admission.
//!
//! Message bodies arrive already decoded into [`TmfField`]s; the CoAP and TLV
//! encodings belong to the transport behind [`TmfTransport`].

use crate::error::{MeshError, Result};
use crate::mle::Mle;
use mesh_types::{InterfaceIdentifier, Ip6Address};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Multicast listener registration.
pub const URI_MLR: &str = "n/mr";
/// Domain unicast address registration.
pub const URI_DUA_REGISTRATION: &str = "n/dr";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Confirmable,
    NonConfirmable,
    Acknowledgment,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    Empty,
    Get,
    Post,
    Put,
    Delete,
    /// 2.04 response.
    Changed,
}

/// Decoded message field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TmfField {
    Ip6Addresses(Vec<Ip6Address>),
    /// Registration lifetime in seconds.
    Timeout(u32),
    CommissionerSessionId(u16),
    TargetEid(Ip6Address),
    /// Mesh-local EID interface identifier of the requester.
    MlEid(InterfaceIdentifier),
    /// Seconds since the requester last used the address.
    LastTransactionTime(u32),
    Status(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Ip6Addresses,
    Timeout,
    CommissionerSessionId,
    TargetEid,
    MlEid,
    LastTransactionTime,
    Status,
}

impl TmfField {
    pub fn kind(&self) -> FieldKind {
        match self {
            TmfField::Ip6Addresses(_) => FieldKind::Ip6Addresses,
            TmfField::Timeout(_) => FieldKind::Timeout,
            TmfField::CommissionerSessionId(_) => FieldKind::CommissionerSessionId,
            TmfField::TargetEid(_) => FieldKind::TargetEid,
            TmfField::MlEid(_) => FieldKind::MlEid,
            TmfField::LastTransactionTime(_) => FieldKind::LastTransactionTime,
            TmfField::Status(_) => FieldKind::Status,
        }
    }
}

/// Typed access to a decoded field list.
pub trait TmfFields {
    fn fields(&self) -> &[TmfField];

    fn get_field(&self, kind: FieldKind) -> Option<&TmfField> {
        self.fields().iter().find(|f| f.kind() == kind)
    }

    fn has_field(&self, kind: FieldKind) -> bool {
        self.get_field(kind).is_some()
    }

    fn ip6_addresses(&self) -> Option<&[Ip6Address]> {
        match self.get_field(FieldKind::Ip6Addresses)? {
            TmfField::Ip6Addresses(addrs) => Some(addrs),
            _ => None,
        }
    }

    fn timeout(&self) -> Option<u32> {
        match self.get_field(FieldKind::Timeout)? {
            TmfField::Timeout(t) => Some(*t),
            _ => None,
        }
    }

    fn commissioner_session_id(&self) -> Option<u16> {
        match self.get_field(FieldKind::CommissionerSessionId)? {
            TmfField::CommissionerSessionId(id) => Some(*id),
            _ => None,
        }
    }

    fn target_eid(&self) -> Option<Ip6Address> {
        match self.get_field(FieldKind::TargetEid)? {
            TmfField::TargetEid(addr) => Some(*addr),
            _ => None,
        }
    }

    fn ml_eid(&self) -> Option<InterfaceIdentifier> {
        match self.get_field(FieldKind::MlEid)? {
            TmfField::MlEid(iid) => Some(*iid),
            _ => None,
        }
    }

    fn last_transaction_time(&self) -> Option<u32> {
        match self.get_field(FieldKind::LastTransactionTime)? {
            TmfField::LastTransactionTime(t) => Some(*t),
            _ => None,
        }
    }

    fn status(&self) -> Option<u8> {
        match self.get_field(FieldKind::Status)? {
            TmfField::Status(s) => Some(*s),
            _ => None,
        }
    }
}

/// Inbound management request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmfMessage {
    pub uri: String,
    pub message_type: MessageType,
    pub code: Code,
    pub token: Vec<u8>,
    pub fields: Vec<TmfField>,
}

impl TmfMessage {
    pub fn new(uri: impl Into<String>, message_type: MessageType, code: Code) -> Self {
        Self {
            uri: uri.into(),
            message_type,
            code,
            token: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Creates a confirmable POST.
    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(uri, MessageType::Confirmable, Code::Post)
    }

    pub fn with_token(mut self, token: impl Into<Vec<u8>>) -> Self {
        self.token = token.into();
        self
    }

    pub fn with_field(mut self, field: TmfField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn is_confirmable(&self) -> bool {
        self.message_type == MessageType::Confirmable
    }

    pub fn is_post(&self) -> bool {
        self.code == Code::Post
    }

    pub fn is_confirmable_post(&self) -> bool {
        self.is_confirmable() && self.is_post()
    }
}

impl TmfFields for TmfMessage {
    fn fields(&self) -> &[TmfField] {
        &self.fields
    }
}

/// Response to a management request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmfResponse {
    pub message_type: MessageType,
    pub code: Code,
    pub token: Vec<u8>,
    pub fields: Vec<TmfField>,
}

impl TmfResponse {
    /// Creates a 2.04 response matching `request`'s token, piggybacked on the
    /// acknowledgment when the request was confirmable.
    pub fn changed(request: &TmfMessage) -> Self {
        let message_type = if request.is_confirmable() {
            MessageType::Acknowledgment
        } else {
            MessageType::NonConfirmable
        };

        Self {
            message_type,
            code: Code::Changed,
            token: request.token.clone(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: TmfField) -> Self {
        self.fields.push(field);
        self
    }
}

impl TmfFields for TmfResponse {
    fn fields(&self) -> &[TmfField] {
        &self.fields
    }
}

/// Addressing of a received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageInfo {
    /// Source address.
    pub peer_addr: Ip6Address,
    pub peer_port: u16,
    /// Destination address.
    pub sock_addr: Ip6Address,
    pub sock_port: u16,
}

impl MessageInfo {
    pub fn new(peer_addr: Ip6Address, sock_addr: Ip6Address, port: u16) -> Self {
        Self {
            peer_addr,
            peer_port: port,
            sock_addr,
            sock_port: port,
        }
    }
}

/// Sends responses on behalf of the dispatcher.
pub trait TmfTransport {
    fn send_response(&mut self, response: TmfResponse, info: &MessageInfo) -> Result<()>;
}

/// Gate run before any resource handler sees a message.
pub trait MessageInterceptor {
    fn intercept(&self, message: &TmfMessage, info: &MessageInfo) -> Result<()>;
}

/// Admits only traffic scoped as mesh-management.
///
/// A message is admitted if its destination is mesh-local, link-local
/// multicast or realm-local multicast while its source is mesh-local, or if
/// both ends are link-local (the destination may be link-local multicast).
#[derive(Debug, Clone, Copy)]
pub struct TmfFilter<'a> {
    mle: &'a Mle,
}

impl<'a> TmfFilter<'a> {
    pub fn new(mle: &'a Mle) -> Self {
        Self { mle }
    }

    pub fn is_tmf_message(&self, info: &MessageInfo) -> bool {
        let src = &info.peer_addr;
        let dst = &info.sock_addr;

        let mesh_scoped = (self.mle.is_mesh_local_address(dst)
            || dst.is_link_local_multicast()
            || dst.is_realm_local_multicast())
            && self.mle.is_mesh_local_address(src);

        let link_scoped =
            (dst.is_link_local() || dst.is_link_local_multicast()) && src.is_link_local();

        mesh_scoped || link_scoped
    }
}

impl MessageInterceptor for TmfFilter<'_> {
    fn intercept(&self, _message: &TmfMessage, info: &MessageInfo) -> Result<()> {
        if self.is_tmf_message(info) {
            Ok(())
        } else {
            Err(MeshError::NotTmf)
        }
    }
}

/// Resource handler. `None` drops the request without a response.
pub type ResourceHandler = Box<dyn FnMut(&TmfMessage, &MessageInfo) -> Option<TmfResponse>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TmfStats {
    pub received: u64,
    pub filtered: u64,
    pub unknown_uri: u64,
    pub dropped: u64,
    pub responses_sent: u64,
}

/// Dispatches admitted messages to resources by URI path.
pub struct TmfAgent {
    port: Option<u16>,
    resources: BTreeMap<String, ResourceHandler>,
    transport: Box<dyn TmfTransport>,
    stats: TmfStats,
}

impl fmt::Debug for TmfAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TmfAgent")
            .field("port", &self.port)
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("stats", &self.stats)
            .finish()
    }
}

impl TmfAgent {
    pub fn new(transport: Box<dyn TmfTransport>) -> Self {
        Self {
            port: None,
            resources: BTreeMap::new(),
            transport,
            stats: TmfStats::default(),
        }
    }

    pub fn start(&mut self, port: u16) {
        info!(port, "TMF agent started");
        self.port = Some(port);
    }

    pub fn stop(&mut self) {
        if self.port.take().is_some() {
            info!("TMF agent stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.port.is_some()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Registers `handler` for `uri`, replacing any previous handler.
    pub fn add_resource(&mut self, uri: impl Into<String>, handler: ResourceHandler) {
        let uri = uri.into();
        debug!(uri = %uri, "Resource added");
        self.resources.insert(uri, handler);
    }

    pub fn remove_resource(&mut self, uri: &str) -> bool {
        let removed = self.resources.remove(uri).is_some();
        if removed {
            debug!(uri, "Resource removed");
        }
        removed
    }

    pub fn has_resource(&self, uri: &str) -> bool {
        self.resources.contains_key(uri)
    }

    pub fn stats(&self) -> &TmfStats {
        &self.stats
    }

    /// Runs `message` through `interceptor` and the matching resource.
    ///
    /// A response produced by the handler is sent exactly once. A handler
    /// that drops the request is not an error.
    pub fn handle_message(
        &mut self,
        message: &TmfMessage,
        info: &MessageInfo,
        interceptor: &dyn MessageInterceptor,
    ) -> Result<()> {
        if self.port.is_none() {
            return Err(MeshError::invalid_state("TMF agent is not running"));
        }

        self.stats.received += 1;

        if let Err(e) = interceptor.intercept(message, info) {
            self.stats.filtered += 1;
            debug!(
                uri = %message.uri,
                src = %info.peer_addr,
                dst = %info.sock_addr,
                "Message rejected by interceptor"
            );
            return Err(e);
        }

        let Some(handler) = self.resources.get_mut(&message.uri) else {
            self.stats.unknown_uri += 1;
            debug!(uri = %message.uri, "No resource for URI");
            return Err(MeshError::NotFound);
        };

        match handler(message, info) {
            Some(response) => {
                self.transport.send_response(response, info).map_err(|e| {
                    warn!(uri = %message.uri, error = %e, "Failed to send response");
                    e
                })?;
                self.stats.responses_sent += 1;
            }
            None => {
                self.stats.dropped += 1;
                debug!(uri = %message.uri, "Request dropped without response");
            }
        }

        Ok(())
    }
}
