//! Backbone router registration server.
//!
//! Answers multicast listener registrations (`n/mr`) and domain unicast
//! address registrations (`n/dr`) from mesh devices. Handlers are attached to
//! the TMF agent while the interface is up.

use crate::config::NodeConfig;
use crate::error::{MeshError, Result};
use crate::tmf::{
    MessageInfo, TmfAgent, TmfField, TmfFields, TmfMessage, TmfResponse, URI_DUA_REGISTRATION,
    URI_MLR,
};
use mesh_types::{InterfaceIdentifier, Ip6Address, Ip6Prefix};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Most addresses one MLR request may carry.
pub const MAX_MLR_ADDRESSES: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackboneRouterState {
    #[default]
    Disabled,
    Secondary,
    Primary,
}

impl fmt::Display for BackboneRouterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackboneRouterState::Disabled => "disabled",
            BackboneRouterState::Secondary => "secondary",
            BackboneRouterState::Primary => "primary",
        };
        write!(f, "{}", s)
    }
}

/// Multicast listener registration status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum MlrStatus {
    Success = 0,
    Invalid = 2,
    NoPersistent = 3,
    NoResources = 4,
    BbrNotPrimary = 5,
    GeneralFailure = 6,
}

impl From<MlrStatus> for u8 {
    fn from(status: MlrStatus) -> u8 {
        status as u8
    }
}

impl TryFrom<u8> for MlrStatus {
    type Error = MeshError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(MlrStatus::Success),
            2 => Ok(MlrStatus::Invalid),
            3 => Ok(MlrStatus::NoPersistent),
            4 => Ok(MlrStatus::NoResources),
            5 => Ok(MlrStatus::BbrNotPrimary),
            6 => Ok(MlrStatus::GeneralFailure),
            other => Err(MeshError::invalid_args(format!("unknown MLR status {}", other))),
        }
    }
}

/// Domain unicast address registration status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum DuaStatus {
    Success = 0,
    ReRegister = 1,
    Invalid = 2,
    Duplicate = 3,
    NoResources = 4,
    BbrNotPrimary = 5,
    GeneralFailure = 6,
}

impl From<DuaStatus> for u8 {
    fn from(status: DuaStatus) -> u8 {
        status as u8
    }
}

impl TryFrom<u8> for DuaStatus {
    type Error = MeshError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(DuaStatus::Success),
            1 => Ok(DuaStatus::ReRegister),
            2 => Ok(DuaStatus::Invalid),
            3 => Ok(DuaStatus::Duplicate),
            4 => Ok(DuaStatus::NoResources),
            5 => Ok(DuaStatus::BbrNotPrimary),
            6 => Ok(DuaStatus::GeneralFailure),
            other => Err(MeshError::invalid_args(format!("unknown DUA status {}", other))),
        }
    }
}

/// Bounded set of multicast groups proxied onto the backbone.
#[derive(Debug, Clone)]
pub struct MulticastListenerTable {
    capacity: usize,
    listeners: BTreeMap<Ip6Address, Instant>,
}

impl MulticastListenerTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            listeners: BTreeMap::new(),
        }
    }

    /// Adds `group`, or refreshes its expiry if already present.
    pub fn add(&mut self, group: Ip6Address, expires_at: Instant) -> Result<()> {
        if let Some(expiry) = self.listeners.get_mut(&group) {
            *expiry = expires_at;
            return Ok(());
        }

        if self.listeners.len() >= self.capacity {
            return Err(MeshError::NoBufs);
        }

        self.listeners.insert(group, expires_at);
        Ok(())
    }

    pub fn remove(&mut self, group: &Ip6Address) -> bool {
        self.listeners.remove(group).is_some()
    }

    pub fn contains(&self, group: &Ip6Address) -> bool {
        self.listeners.contains_key(group)
    }

    pub fn expiry(&self, group: &Ip6Address) -> Option<Instant> {
        self.listeners.get(group).copied()
    }

    /// Purges entries whose expiry is at or before `now`.
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|_, expiry| *expiry > now);
        before - self.listeners.len()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn groups(&self) -> impl Iterator<Item = &Ip6Address> + '_ {
        self.listeners.keys()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuaRegistration {
    pub target: Ip6Address,
    pub ml_iid: InterfaceIdentifier,
    pub last_transaction_time: Option<u32>,
    pub registered_at: Instant,
}

/// How a registration changed the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuaUpdate {
    Added,
    Refreshed,
    /// The device moved from the returned DUA to the new one.
    Replaced(Ip6Address),
}

/// Bounded DUA ownership registry. Each DUA has one owner and each owner
/// holds one DUA.
#[derive(Debug, Clone)]
pub struct DuaRegistry {
    capacity: usize,
    entries: Vec<DuaRegistration>,
}

impl DuaRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::new(),
        }
    }

    pub fn register(
        &mut self,
        target: Ip6Address,
        ml_iid: InterfaceIdentifier,
        last_transaction_time: Option<u32>,
        now: Instant,
    ) -> Result<DuaUpdate> {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.target == target) {
            if entry.ml_iid != ml_iid {
                return Err(MeshError::Duplicated);
            }
            entry.last_transaction_time = last_transaction_time;
            entry.registered_at = now;
            return Ok(DuaUpdate::Refreshed);
        }

        if let Some(entry) = self.entries.iter_mut().find(|e| e.ml_iid == ml_iid) {
            let previous = entry.target;
            entry.target = target;
            entry.last_transaction_time = last_transaction_time;
            entry.registered_at = now;
            return Ok(DuaUpdate::Replaced(previous));
        }

        if self.entries.len() >= self.capacity {
            return Err(MeshError::NoBufs);
        }

        self.entries.push(DuaRegistration {
            target,
            ml_iid,
            last_transaction_time,
            registered_at: now,
        });
        Ok(DuaUpdate::Added)
    }

    pub fn remove(&mut self, target: &Ip6Address) -> Option<DuaRegistration> {
        let pos = self.entries.iter().position(|e| e.target == *target)?;
        Some(self.entries.remove(pos))
    }

    pub fn find_by_target(&self, target: &Ip6Address) -> Option<&DuaRegistration> {
        self.entries.iter().find(|e| e.target == *target)
    }

    pub fn find_by_ml_iid(&self, ml_iid: &InterfaceIdentifier) -> Option<&DuaRegistration> {
        self.entries.iter().find(|e| e.ml_iid == *ml_iid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DuaRegistration> + '_ {
        self.entries.iter()
    }
}

/// Forced DUA response for certification runs.
///
/// Stays in force until cleared or reconfigured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuaResponseOverride {
    /// Only requests from this ML-IID are affected; `None` affects all.
    pub ml_iid: Option<InterfaceIdentifier>,
    pub status: DuaStatus,
}

impl DuaResponseOverride {
    pub fn applies_to(&self, ml_iid: &InterfaceIdentifier) -> bool {
        self.ml_iid.map_or(true, |target| target == *ml_iid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackboneRouterStats {
    pub mlr_requests: u64,
    pub mlr_dropped: u64,
    pub dua_requests: u64,
    pub dua_dropped: u64,
    pub dua_overridden: u64,
}

#[derive(Debug)]
pub struct BackboneRouterManager {
    state: BackboneRouterState,
    domain_prefix: Option<Ip6Prefix>,
    commissioner_session_id: Option<u16>,
    mlr_timeout: Duration,
    listeners: MulticastListenerTable,
    duas: DuaRegistry,
    reference_device: bool,
    dua_override: Option<DuaResponseOverride>,
    stats: BackboneRouterStats,
}

impl BackboneRouterManager {
    pub fn new(config: &NodeConfig) -> Self {
        let bbr = &config.backbone_router;
        Self {
            state: BackboneRouterState::Disabled,
            domain_prefix: bbr.domain_prefix,
            commissioner_session_id: None,
            mlr_timeout: config.mlr_timeout(),
            listeners: MulticastListenerTable::new(bbr.mlr_table_size),
            duas: DuaRegistry::new(bbr.dua_table_size),
            reference_device: config.features.reference_device,
            dua_override: None,
            stats: BackboneRouterStats::default(),
        }
    }

    pub fn state(&self) -> BackboneRouterState {
        self.state
    }

    pub fn is_primary(&self) -> bool {
        self.state == BackboneRouterState::Primary
    }

    /// Returns true if the state changed.
    pub fn set_state(&mut self, state: BackboneRouterState) -> bool {
        if self.state == state {
            return false;
        }
        info!(from = %self.state, to = %state, "Backbone router state changed");
        self.state = state;
        true
    }

    pub fn domain_prefix(&self) -> Option<&Ip6Prefix> {
        self.domain_prefix.as_ref()
    }

    pub fn set_domain_prefix(&mut self, prefix: Option<Ip6Prefix>) -> Result<()> {
        if let Some(p) = &prefix {
            if p.length() != 64 {
                return Err(MeshError::invalid_args(format!("{} is not a /64", p)));
            }
        }
        self.domain_prefix = prefix;
        Ok(())
    }

    pub fn commissioner_session_id(&self) -> Option<u16> {
        self.commissioner_session_id
    }

    pub fn set_commissioner_session_id(&mut self, id: Option<u16>) {
        self.commissioner_session_id = id;
    }

    pub fn listeners(&self) -> &MulticastListenerTable {
        &self.listeners
    }

    pub fn listeners_mut(&mut self) -> &mut MulticastListenerTable {
        &mut self.listeners
    }

    pub fn duas(&self) -> &DuaRegistry {
        &self.duas
    }

    pub fn stats(&self) -> &BackboneRouterStats {
        &self.stats
    }

    pub fn dua_response_override(&self) -> Option<&DuaResponseOverride> {
        self.dua_override.as_ref()
    }

    /// Forces the status of DUA responses, for every requester when `ml_iid`
    /// is `None` or only for the matching one.
    pub fn config_next_dua_registration_response(
        &mut self,
        ml_iid: Option<InterfaceIdentifier>,
        status: DuaStatus,
    ) -> Result<()> {
        if !self.reference_device {
            return Err(MeshError::Disabled("reference device"));
        }

        info!(ml_iid = ?ml_iid, status = ?status, "DUA response override configured");
        self.dua_override = Some(DuaResponseOverride { ml_iid, status });
        Ok(())
    }

    pub fn clear_next_dua_registration_response(&mut self) -> Result<()> {
        if !self.reference_device {
            return Err(MeshError::Disabled("reference device"));
        }

        self.dua_override = None;
        Ok(())
    }

    /// Registers both request handlers with `tmf`.
    pub fn attach(this: &Rc<RefCell<Self>>, tmf: &mut TmfAgent) {
        let mlr = Rc::clone(this);
        tmf.add_resource(
            URI_MLR,
            Box::new(move |msg, info| {
                mlr.try_borrow_mut()
                    .ok()?
                    .handle_multicast_listener_registration(msg, info, Instant::now())
            }),
        );

        let dua = Rc::clone(this);
        tmf.add_resource(
            URI_DUA_REGISTRATION,
            Box::new(move |msg, info| {
                dua.try_borrow_mut()
                    .ok()?
                    .handle_dua_registration(msg, info, Instant::now())
            }),
        );
    }

    pub fn detach(tmf: &mut TmfAgent) {
        tmf.remove_resource(URI_MLR);
        tmf.remove_resource(URI_DUA_REGISTRATION);
    }

    /// Handles an `n/mr` request. `None` drops a malformed request.
    #[instrument(skip_all, fields(src = %info.peer_addr))]
    pub fn handle_multicast_listener_registration(
        &mut self,
        message: &TmfMessage,
        info: &MessageInfo,
        now: Instant,
    ) -> Option<TmfResponse> {
        self.stats.mlr_requests += 1;

        let addresses = match mlr_addresses(message) {
            Ok(addrs) => addrs,
            Err(e) => {
                self.stats.mlr_dropped += 1;
                debug!(error = %e, "Dropping MLR request");
                return None;
            }
        };

        let (status, failed) = self.register_listeners(message, addresses, now);

        debug!(status = ?status, failed = failed.len(), "MLR processed");
        let mut response =
            TmfResponse::changed(message).with_field(TmfField::Status(status.into()));
        if !failed.is_empty() {
            response = response.with_field(TmfField::Ip6Addresses(failed));
        }
        Some(response)
    }

    fn register_listeners(
        &mut self,
        message: &TmfMessage,
        addresses: &[Ip6Address],
        now: Instant,
    ) -> (MlrStatus, Vec<Ip6Address>) {
        let purged = self.listeners.expire(now);
        if purged > 0 {
            debug!(purged, "Expired multicast listeners removed");
        }

        if !self.is_primary() {
            return (MlrStatus::BbrNotPrimary, Vec::new());
        }

        let mut timeout = self.mlr_timeout;
        if let Some(session_id) = message.commissioner_session_id() {
            if self.commissioner_session_id != Some(session_id) {
                return (MlrStatus::GeneralFailure, Vec::new());
            }
            if let Some(secs) = message.timeout() {
                timeout = Duration::from_secs(u64::from(secs));
            }
        }

        let mut status = MlrStatus::Success;
        let mut failed = Vec::new();

        for addr in addresses {
            let outcome = if !addr.is_multicast_larger_than_realm_local() {
                Err(MlrStatus::Invalid)
            } else if timeout.is_zero() {
                self.listeners.remove(addr);
                Ok(())
            } else {
                self.listeners.add(*addr, now + timeout).map_err(|_| {
                    warn!(group = %addr, "Multicast listener table full");
                    MlrStatus::NoResources
                })
            };

            if let Err(s) = outcome {
                if status == MlrStatus::Success {
                    status = s;
                }
                failed.push(*addr);
            }
        }

        (status, failed)
    }

    /// Handles an `n/dr` request. `None` drops a malformed request.
    #[instrument(skip_all, fields(src = %info.peer_addr))]
    pub fn handle_dua_registration(
        &mut self,
        message: &TmfMessage,
        info: &MessageInfo,
        now: Instant,
    ) -> Option<TmfResponse> {
        self.stats.dua_requests += 1;

        let (target, ml_iid) = match dua_fields(message) {
            Ok(fields) => fields,
            Err(e) => {
                self.stats.dua_dropped += 1;
                debug!(error = %e, "Dropping DUA registration");
                return None;
            }
        };

        let status = match self.dua_override.filter(|o| o.applies_to(&ml_iid)) {
            Some(forced) => {
                self.stats.dua_overridden += 1;
                debug!(target = %target, status = ?forced.status, "Answering with configured DUA status");
                forced.status
            }
            None => self.register_dua(target, ml_iid, message.last_transaction_time(), now),
        };

        Some(
            TmfResponse::changed(message)
                .with_field(TmfField::Status(status.into()))
                .with_field(TmfField::TargetEid(target)),
        )
    }

    fn register_dua(
        &mut self,
        target: Ip6Address,
        ml_iid: InterfaceIdentifier,
        last_transaction_time: Option<u32>,
        now: Instant,
    ) -> DuaStatus {
        if !self.is_primary() {
            return DuaStatus::BbrNotPrimary;
        }

        let Some(prefix) = self.domain_prefix else {
            return DuaStatus::GeneralFailure;
        };

        if !prefix.contains(&target) {
            return DuaStatus::Invalid;
        }

        match self.duas.register(target, ml_iid, last_transaction_time, now) {
            Ok(update) => {
                debug!(target = %target, ml_iid = %ml_iid, update = ?update, "DUA registered");
                DuaStatus::Success
            }
            Err(MeshError::Duplicated) => {
                warn!(target = %target, ml_iid = %ml_iid, "Duplicate DUA registration");
                DuaStatus::Duplicate
            }
            Err(_) => {
                warn!(target = %target, "DUA registry full");
                DuaStatus::NoResources
            }
        }
    }
}

/// Addresses of a well-formed MLR request.
fn mlr_addresses(message: &TmfMessage) -> Result<&[Ip6Address]> {
    if !message.is_confirmable_post() {
        return Err(MeshError::malformed("MLR request is not a confirmable POST"));
    }

    let addrs = message
        .ip6_addresses()
        .ok_or_else(|| MeshError::malformed("MLR request has no IPv6 addresses"))?;
    if addrs.is_empty() || addrs.len() > MAX_MLR_ADDRESSES {
        return Err(MeshError::malformed(format!(
            "MLR request carries {} addresses",
            addrs.len()
        )));
    }
    Ok(addrs)
}

/// Target EID and ML-EID of a well-formed DUA request.
fn dua_fields(message: &TmfMessage) -> Result<(Ip6Address, InterfaceIdentifier)> {
    if !message.is_confirmable_post() {
        return Err(MeshError::malformed("DUA request is not a confirmable POST"));
    }

    let target = message
        .target_eid()
        .ok_or_else(|| MeshError::malformed("DUA request has no target EID"))?;
    let ml_iid = message
        .ml_eid()
        .ok_or_else(|| MeshError::malformed("DUA request has no ML-EID"))?;
    Ok((target, ml_iid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmf::MessageType;
    use pretty_assertions::assert_eq;

    fn config(reference_device: bool) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.features.backbone_router = true;
        config.features.reference_device = reference_device;
        config.backbone_router.mlr_table_size = 2;
        config.backbone_router.dua_table_size = 2;
        config.backbone_router.domain_prefix = Some("fd00:7d03:7d03:7d03::/64".parse().unwrap());
        config
    }

    fn primary(reference_device: bool) -> BackboneRouterManager {
        let mut bbr = BackboneRouterManager::new(&config(reference_device));
        bbr.set_state(BackboneRouterState::Primary);
        bbr
    }

    fn info() -> MessageInfo {
        MessageInfo::new(
            "fdde:ad00:beef::ff:fe00:401".parse().unwrap(),
            "fdde:ad00:beef::ff:fe00:400".parse().unwrap(),
            61631,
        )
    }

    fn addr(s: &str) -> Ip6Address {
        s.parse().unwrap()
    }

    fn iid(last: u8) -> InterfaceIdentifier {
        InterfaceIdentifier::new([0x10, 0, 0, 0, 0, 0, 0, last])
    }

    fn dua(last: u16) -> Ip6Address {
        Ip6Address::new(0xfd00, 0x7d03, 0x7d03, 0x7d03, 0, 0, 0, last)
    }

    fn dua_request(target: Ip6Address, ml_iid: InterfaceIdentifier) -> TmfMessage {
        TmfMessage::post(URI_DUA_REGISTRATION)
            .with_field(TmfField::TargetEid(target))
            .with_field(TmfField::MlEid(ml_iid))
    }

    fn mlr_request(groups: &[&str]) -> TmfMessage {
        TmfMessage::post(URI_MLR).with_field(TmfField::Ip6Addresses(
            groups.iter().map(|g| g.parse().unwrap()).collect(),
        ))
    }

    fn dua_status(bbr: &mut BackboneRouterManager, target: Ip6Address, ml: InterfaceIdentifier) -> u8 {
        bbr.handle_dua_registration(&dua_request(target, ml), &info(), Instant::now())
            .and_then(|r| r.status())
            .unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(u8::from(MlrStatus::NoResources), 4);
        assert_eq!(u8::from(DuaStatus::Duplicate), 3);
        assert_eq!(DuaStatus::try_from(1).unwrap(), DuaStatus::ReRegister);
        assert!(MlrStatus::try_from(1).is_err());
    }

    #[test]
    fn test_mlr_registers_groups() {
        let mut bbr = primary(false);
        let now = Instant::now();
        let resp = bbr
            .handle_multicast_listener_registration(&mlr_request(&["ff04::1", "ff05::2"]), &info(), now)
            .unwrap();

        assert_eq!(resp.status(), Some(0));
        assert!(resp.ip6_addresses().is_none());
        assert_eq!(bbr.listeners().len(), 2);
        assert_eq!(
            bbr.listeners().expiry(&addr("ff04::1")),
            Some(now + Duration::from_secs(3600))
        );
    }

    #[test]
    fn test_mlr_rejects_small_scope_groups() {
        let mut bbr = primary(false);
        let resp = bbr
            .handle_multicast_listener_registration(
                &mlr_request(&["ff03::fc", "ff05::1", "2001:db8::1"]),
                &info(),
                Instant::now(),
            )
            .unwrap();

        assert_eq!(resp.status(), Some(MlrStatus::Invalid.into()));
        assert_eq!(
            resp.ip6_addresses().unwrap().to_vec(),
            vec![addr("ff03::fc"), addr("2001:db8::1")]
        );
        assert!(bbr.listeners().contains(&addr("ff05::1")));
    }

    #[test]
    fn test_mlr_table_full() {
        let mut bbr = primary(false);
        let resp = bbr
            .handle_multicast_listener_registration(
                &mlr_request(&["ff04::1", "ff04::2", "ff04::3"]),
                &info(),
                Instant::now(),
            )
            .unwrap();

        assert_eq!(resp.status(), Some(MlrStatus::NoResources.into()));
        assert_eq!(resp.ip6_addresses().unwrap().to_vec(), vec![addr("ff04::3")]);
    }

    #[test]
    fn test_mlr_expired_listeners_free_their_slots() {
        let mut bbr = primary(false);
        let start = Instant::now();
        bbr.handle_multicast_listener_registration(&mlr_request(&["ff04::1", "ff04::2"]), &info(), start)
            .unwrap();

        let later = start + Duration::from_secs(3601);
        let resp = bbr
            .handle_multicast_listener_registration(&mlr_request(&["ff04::3"]), &info(), later)
            .unwrap();

        assert_eq!(resp.status(), Some(MlrStatus::Success.into()));
        assert!(!bbr.listeners().contains(&addr("ff04::1")));
        assert!(bbr.listeners().contains(&addr("ff04::3")));
        assert_eq!(bbr.listeners().len(), 1);
    }

    #[test]
    fn test_request_shape_errors() {
        let mut non_confirmable = mlr_request(&["ff04::1"]);
        non_confirmable.message_type = MessageType::NonConfirmable;
        assert!(matches!(
            mlr_addresses(&non_confirmable),
            Err(MeshError::MalformedRequest(_))
        ));
        assert!(matches!(
            mlr_addresses(&mlr_request(&[])),
            Err(MeshError::MalformedRequest(_))
        ));
        assert_eq!(mlr_addresses(&mlr_request(&["ff04::1"])).unwrap().len(), 1);

        let missing_ml_eid = TmfMessage::post(URI_DUA_REGISTRATION).with_field(TmfField::TargetEid(dua(1)));
        assert!(matches!(
            dua_fields(&missing_ml_eid),
            Err(MeshError::MalformedRequest(_))
        ));
        assert_eq!(dua_fields(&dua_request(dua(1), iid(1))).unwrap(), (dua(1), iid(1)));
    }

    #[test]
    fn test_mlr_not_primary() {
        let mut bbr = BackboneRouterManager::new(&config(false));
        bbr.set_state(BackboneRouterState::Secondary);
        let resp = bbr
            .handle_multicast_listener_registration(&mlr_request(&["ff04::1"]), &info(), Instant::now())
            .unwrap();
        assert_eq!(resp.status(), Some(MlrStatus::BbrNotPrimary.into()));
        assert!(bbr.listeners().is_empty());
    }

    #[test]
    fn test_mlr_malformed_dropped() {
        let mut bbr = primary(false);
        let now = Instant::now();

        let no_addresses = TmfMessage::post(URI_MLR);
        assert!(bbr.handle_multicast_listener_registration(&no_addresses, &info(), now).is_none());

        let mut non_confirmable = mlr_request(&["ff04::1"]);
        non_confirmable.message_type = MessageType::NonConfirmable;
        assert!(bbr.handle_multicast_listener_registration(&non_confirmable, &info(), now).is_none());

        let too_many: Vec<String> = (1..=16).map(|i| format!("ff04::{:x}", i)).collect();
        let refs: Vec<&str> = too_many.iter().map(String::as_str).collect();
        assert!(bbr.handle_multicast_listener_registration(&mlr_request(&refs), &info(), now).is_none());

        assert_eq!(bbr.stats().mlr_dropped, 3);
    }

    #[test]
    fn test_mlr_commissioner_timeout() {
        let mut bbr = primary(false);
        bbr.set_commissioner_session_id(Some(0x1234));
        let now = Instant::now();

        let req = mlr_request(&["ff04::1"])
            .with_field(TmfField::CommissionerSessionId(0x1234))
            .with_field(TmfField::Timeout(60));
        bbr.handle_multicast_listener_registration(&req, &info(), now).unwrap();
        assert_eq!(
            bbr.listeners().expiry(&addr("ff04::1")),
            Some(now + Duration::from_secs(60))
        );

        let dereg = mlr_request(&["ff04::1"])
            .with_field(TmfField::CommissionerSessionId(0x1234))
            .with_field(TmfField::Timeout(0));
        let resp = bbr.handle_multicast_listener_registration(&dereg, &info(), now).unwrap();
        assert_eq!(resp.status(), Some(0));
        assert!(bbr.listeners().is_empty());

        let wrong_session = mlr_request(&["ff04::1"]).with_field(TmfField::CommissionerSessionId(1));
        let resp = bbr.handle_multicast_listener_registration(&wrong_session, &info(), now).unwrap();
        assert_eq!(resp.status(), Some(MlrStatus::GeneralFailure.into()));
    }

    #[test]
    fn test_timeout_ignored_without_commissioner() {
        let mut bbr = primary(false);
        let now = Instant::now();
        let req = mlr_request(&["ff04::1"]).with_field(TmfField::Timeout(0));
        bbr.handle_multicast_listener_registration(&req, &info(), now).unwrap();
        assert!(bbr.listeners().contains(&addr("ff04::1")));
    }

    #[test]
    fn test_listener_expiry() {
        let mut table = MulticastListenerTable::new(4);
        let now = Instant::now();
        table.add(addr("ff04::1"), now + Duration::from_secs(10)).unwrap();
        table.add("ff04::2".parse().unwrap(), now + Duration::from_secs(20)).unwrap();

        assert_eq!(table.expire(now + Duration::from_secs(10)), 1);
        assert_eq!(table.groups().count(), 1);
    }

    #[test]
    fn test_dua_registration_flow() {
        let mut bbr = primary(false);

        assert_eq!(dua_status(&mut bbr, dua(1), iid(1)), DuaStatus::Success as u8);
        // Re-registration by the same owner
        assert_eq!(dua_status(&mut bbr, dua(1), iid(1)), DuaStatus::Success as u8);
        // Someone else claims the same DUA
        assert_eq!(dua_status(&mut bbr, dua(1), iid(2)), DuaStatus::Duplicate as u8);
        assert_eq!(bbr.duas().len(), 1);
    }

    #[test]
    fn test_dua_owner_moves_to_new_address() {
        let mut bbr = primary(false);
        dua_status(&mut bbr, dua(1), iid(1));
        assert_eq!(dua_status(&mut bbr, dua(2), iid(1)), DuaStatus::Success as u8);

        assert!(bbr.duas().find_by_target(&dua(1)).is_none());
        assert_eq!(bbr.duas().find_by_ml_iid(&iid(1)).unwrap().target, dua(2));
    }

    #[test]
    fn test_dua_registry_full() {
        let mut bbr = primary(false);
        dua_status(&mut bbr, dua(1), iid(1));
        dua_status(&mut bbr, dua(2), iid(2));
        assert_eq!(dua_status(&mut bbr, dua(3), iid(3)), DuaStatus::NoResources as u8);
    }

    #[test]
    fn test_dua_domain_checks() {
        let mut bbr = primary(false);
        let outside: Ip6Address = "2001:db8::1".parse().unwrap();
        assert_eq!(dua_status(&mut bbr, outside, iid(1)), DuaStatus::Invalid as u8);

        bbr.set_domain_prefix(None).unwrap();
        assert_eq!(dua_status(&mut bbr, dua(1), iid(1)), DuaStatus::GeneralFailure as u8);

        assert!(bbr.set_domain_prefix(Some("fd00::/48".parse().unwrap())).is_err());
    }

    #[test]
    fn test_dua_response_carries_target() {
        let mut bbr = BackboneRouterManager::new(&config(false));
        let resp = bbr
            .handle_dua_registration(&dua_request(dua(5), iid(5)), &info(), Instant::now())
            .unwrap();
        assert_eq!(resp.status(), Some(DuaStatus::BbrNotPrimary.into()));
        assert_eq!(resp.target_eid(), Some(dua(5)));
    }

    #[test]
    fn test_dua_malformed_dropped() {
        let mut bbr = primary(false);
        let missing_iid = TmfMessage::post(URI_DUA_REGISTRATION).with_field(TmfField::TargetEid(dua(1)));
        assert!(bbr.handle_dua_registration(&missing_iid, &info(), Instant::now()).is_none());
        assert_eq!(bbr.stats().dua_dropped, 1);
    }

    #[test]
    fn test_override_requires_reference_device() {
        let mut bbr = primary(false);
        assert!(matches!(
            bbr.config_next_dua_registration_response(None, DuaStatus::Duplicate),
            Err(MeshError::Disabled(_))
        ));
        assert!(bbr.clear_next_dua_registration_response().is_err());
    }

    #[test]
    fn test_override_latch_for_all_targets() {
        let mut bbr = primary(true);
        bbr.config_next_dua_registration_response(None, DuaStatus::Duplicate)
            .unwrap();

        for i in 1..=3 {
            assert_eq!(dua_status(&mut bbr, dua(i), iid(i as u8)), DuaStatus::Duplicate as u8);
        }
        // Overridden requests never touch the registry
        assert!(bbr.duas().is_empty());

        bbr.clear_next_dua_registration_response().unwrap();
        assert_eq!(dua_status(&mut bbr, dua(1), iid(1)), DuaStatus::Success as u8);
    }

    #[test]
    fn test_override_for_specific_ml_iid() {
        let mut bbr = primary(true);
        bbr.config_next_dua_registration_response(Some(iid(7)), DuaStatus::NoResources)
            .unwrap();

        assert_eq!(dua_status(&mut bbr, dua(7), iid(7)), DuaStatus::NoResources as u8);
        assert_eq!(dua_status(&mut bbr, dua(7), iid(7)), DuaStatus::NoResources as u8);
        assert_eq!(dua_status(&mut bbr, dua(8), iid(8)), DuaStatus::Success as u8);
    }

    #[test]
    fn test_override_applies_before_primary_check() {
        let mut bbr = BackboneRouterManager::new(&config(true));
        bbr.config_next_dua_registration_response(None, DuaStatus::ReRegister)
            .unwrap();
        assert_eq!(dua_status(&mut bbr, dua(1), iid(1)), DuaStatus::ReRegister as u8);
    }

    #[test]
    fn test_attach_and_detach_resources() {
        use crate::tmf::{MessageInterceptor, TmfTransport};

        struct Sink(Rc<RefCell<Vec<TmfResponse>>>);
        impl TmfTransport for Sink {
            fn send_response(&mut self, response: TmfResponse, _: &MessageInfo) -> Result<()> {
                self.0.borrow_mut().push(response);
                Ok(())
            }
        }
        struct Open;
        impl MessageInterceptor for Open {
            fn intercept(&self, _: &TmfMessage, _: &MessageInfo) -> Result<()> {
                Ok(())
            }
        }

        let sent = Rc::new(RefCell::new(Vec::new()));
        let mut tmf = TmfAgent::new(Box::new(Sink(sent.clone())));
        tmf.start(61631);

        let bbr = Rc::new(RefCell::new(primary(false)));
        BackboneRouterManager::attach(&bbr, &mut tmf);
        assert!(tmf.has_resource(URI_MLR));
        assert!(tmf.has_resource(URI_DUA_REGISTRATION));

        tmf.handle_message(&dua_request(dua(1), iid(1)), &info(), &Open)
            .unwrap();
        assert_eq!(sent.borrow().len(), 1);
        assert_eq!(bbr.borrow().duas().len(), 1);

        BackboneRouterManager::detach(&mut tmf);
        assert!(matches!(
            tmf.handle_message(&dua_request(dua(2), iid(2)), &info(), &Open),
            Err(MeshError::NotFound)
        ));
    }
}
