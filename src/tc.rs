//! The transparent clock forwarding engine.
//!
//! Relays Sync/`Follow_Up` and `Delay_Req`/`Delay_Resp` between switch
//! ports, correlating asynchronous hardware transmit timestamps with
//! in-flight messages through the outstanding registries and patching
//! each relayed message's correctionField with residence time and port
//! asymmetry.
//!
//! A Sync message is forwarded to all other active ports. The ingress
//! timestamp arrives inline with the frame; the header is saved for
//! later use. A one-step Sync relayed by a two-step clock is converted
//! to two-step and the `Follow_Up` is synthesized here. When a two-step
//! copy is forwarded the egress timestamp is captured for residence-time
//! calculation; in one-step mode the hardware updates the correction
//! field in-flight. Forwarding to an internal port tunnels the rx
//! timestamp in the reserved header field; forwarding from an internal
//! port recovers it from there.

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::config::TcConfig;
use super::dispatch::{AgeTimer, TcEvent, TxDone};
use super::message::{
    self, DELAY_REQ_MESSAGE_LENGTH, DELAY_RESP_MESSAGE_LENGTH, FLAG_RESERVED_TS, FLAG_TWO_STEP,
    FOLLOW_UP_MESSAGE_LENGTH, PtpHeader, SYNC_MESSAGE_LENGTH,
};
use super::port::{FanOut, PortState, TcPort, VlanTag};
use super::registry::{
    DELAY_REQ_MAX_OUTSTANDING_TICKS, DelayReqEntry, DelayReqState, EntryKey, FollowUpAction,
    Occupancy, OutstandingList, SAVED_FRAME_MAX, SYNC_MAX_OUTSTANDING_TICKS, SyncEntry,
};
use super::transport::{
    GeneralFrame, LocalClock, PacketTransport, RegistryKind, TsContext, TxBuffer, TxMsgType,
};
use super::tunnel;

use std::net::SocketAddr;

/// A PTP transparent clock instance for one clock domain.
///
/// Owns the two outstanding registries and the port table. All methods
/// are synchronous; the owner serializes access between the ingress
/// path, drained TX-done events, and aging ticks (see the crate docs).
pub struct TransparentClock<T, C> {
    config: TcConfig,
    ports: Vec<TcPort>,
    delay_req_list: OutstandingList<DelayReqEntry, DelayReqState>,
    sync_list: OutstandingList<SyncEntry, FollowUpAction>,
    transport: T,
    local_clock: C,
    age_timer: Option<AgeTimer>,
}

impl<T: PacketTransport, C: LocalClock> TransparentClock<T, C> {
    /// Create a transparent clock instance.
    ///
    /// Both registries are sized to `config.max_outstanding_records` and
    /// every slot's per-port vectors are sized to the port count up
    /// front, so the forwarding path never allocates. The aging timer is
    /// not yet running; see [`enable`](Self::enable).
    ///
    /// Ports must be numbered contiguously from 1.
    pub fn new(config: TcConfig, ports: Vec<TcPort>, transport: T, local_clock: C) -> Self {
        debug_assert!(
            ports.iter().enumerate().all(|(i, p)| usize::from(p.number) == i + 1),
            "ports must be numbered contiguously from 1"
        );
        let capacity = config.max_outstanding_records;
        let mut delay_req_list: OutstandingList<DelayReqEntry, DelayReqState> =
            OutstandingList::new(capacity, DELAY_REQ_MAX_OUTSTANDING_TICKS);
        let mut sync_list: OutstandingList<SyncEntry, FollowUpAction> =
            OutstandingList::new(capacity, SYNC_MAX_OUTSTANDING_TICKS);
        for entry in delay_req_list.entries_mut() {
            entry.tx_time.resize(ports.len(), None);
        }
        for entry in sync_list.entries_mut() {
            entry.residence_time.resize(ports.len(), None);
        }
        trace!(
            records = capacity,
            ports = ports.len(),
            "allocated transparent clock outstanding data"
        );
        Self {
            config,
            ports,
            delay_req_list,
            sync_list,
            transport,
            local_clock,
            age_timer: None,
        }
    }

    /// Start the aging sweep, delivering [`TcEvent::AgeTick`] through
    /// `events`. Only used in two-step mode (one-step forwarding needs
    /// no outstanding-request tracking).
    ///
    /// Must be called within a tokio runtime.
    pub fn enable(&mut self, events: mpsc::Sender<TcEvent>) {
        debug!("start aging timer");
        self.age_timer = Some(AgeTimer::start(self.config.age_tick_period, events));
    }

    /// Stop the aging sweep.
    pub fn disable(&mut self) {
        debug!("stop aging timer");
        if let Some(timer) = self.age_timer.take() {
            timer.stop();
        }
    }

    /// Apply one delivered event.
    pub fn handle_event(&mut self, event: TcEvent) {
        match event {
            TcEvent::TxDone(done) => self.handle_tx_done(&done),
            TcEvent::AgeTick => self.age_tick(),
        }
    }

    /// One tick of the aging sweep over both registries.
    ///
    /// This is the sole recovery mechanism for entries whose completion
    /// notification was lost; it is expected self-healing, not an error.
    pub fn age_tick(&mut self) {
        let freed_req = self.delay_req_list.age_tick();
        let freed_sync = self.sync_list.age_tick();
        if freed_req + freed_sync > 0 {
            debug!(freed_req, freed_sync, "aged out outstanding entries");
        }
        trace!("age processing");
    }

    /// Dispatch a TX-done completion to the owning registry entry.
    pub fn handle_tx_done(&mut self, done: &TxDone) {
        match done.context.registry {
            RegistryKind::Sync => self.sync_event_transmitted(done),
            RegistryKind::DelayReq => self.delay_req_event_transmitted(done),
        }
    }

    /// The port table.
    #[must_use]
    pub fn ports(&self) -> &[TcPort] {
        &self.ports
    }

    /// Mutable access to the port table (state/asymmetry updates).
    pub fn ports_mut(&mut self) -> &mut Vec<TcPort> {
        &mut self.ports
    }

    /// The transport collaborator.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the transport collaborator.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Number of unresolved entries in the Sync registry.
    #[must_use]
    pub fn sync_outstanding(&self) -> usize {
        self.sync_list.occupied()
    }

    /// Number of unresolved entries in the `Delay_Req` registry.
    #[must_use]
    pub fn delay_req_outstanding(&self) -> usize {
        self.delay_req_list.occupied()
    }

    fn port_by_number(&self, number: u16) -> Option<&TcPort> {
        self.ports.get(usize::from(number.checked_sub(1)?))
    }

    /// Recover the tunneled rx timestamp of a frame received on an
    /// internal port. Returns `false` when the frame carries none, in
    /// which case it must not be forwarded.
    fn consume_tunneled_rx_time(
        local_clock: &C,
        buffer: &mut TxBuffer,
        header: &mut PtpHeader,
    ) -> bool {
        match tunnel::extract_rx_timestamp(buffer.payload_mut()) {
            Some(packed) => {
                header.flags &= !FLAG_RESERVED_TS;
                buffer.hw_time = local_clock.hw_ticks_from_tunnel(packed);
                info!(
                    reserved = packed,
                    hw_time = buffer.hw_time,
                    "recovered rx timestamp from reserved field"
                );
                true
            }
            None => false,
        }
    }

    // ===== Sync / Follow_Up =====

    /// Forward an ingress Sync to all other active ports.
    ///
    /// Returns whether the message was forwarded (to external ports; see
    /// the error-handling contract in the crate docs for what `false`
    /// covers).
    pub fn forward_sync(
        &mut self,
        buffer: &mut TxBuffer,
        header: &mut PtpHeader,
        sender: SocketAddr,
        rx_port: u16,
    ) -> bool {
        let Some(origin_timestamp) = message::unpack_origin_timestamp(buffer.payload()) else {
            warn!("Sync message too short");
            return false;
        };
        info!(
            seq = header.sequence_id,
            rx_time = buffer.hw_time,
            correction = header.correction_field.nanos(),
            "forwarding Sync"
        );
        let Some(rx) = self.port_by_number(rx_port) else {
            warn!(port = rx_port, "Sync from unknown port");
            return false;
        };
        let rx_internal = rx.internal;
        let rx_correction = rx.peer_mean_path_delay;
        trace!(internal = rx_internal, "ingress port");
        if rx_internal
            && !Self::consume_tunneled_rx_time(&self.local_clock, buffer, header)
        {
            return false;
        }

        let mut forwarded = false;
        let mut one_step_origin = false;
        let fan;
        let mut internal_frame: Option<GeneralFrame> = None;
        let mut internal_tag = VlanTag::default();

        trace!(two_step = self.config.two_step, "clock mode");
        if self.config.two_step {
            let key = EntryKey {
                source_port_identity: header.source_port_identity,
                sequence_id: header.sequence_id,
            };
            if self.sync_list.find(&key).is_some() {
                // previous exchange for this key is still unresolved
                info!(
                    port = rx_port,
                    seq = header.sequence_id,
                    "missed follow-up or previous Sync not yet forwarded"
                );
                debug!("waiting for previous follow-up; Sync not forwarded");
                return false;
            }
            one_step_origin = header.flags & FLAG_TWO_STEP == 0;
            let action = if one_step_origin {
                FollowUpAction::Create
            } else {
                FollowUpAction::AwaitTransmit
            };
            let Some(index) = self.sync_list.allocate(action) else {
                warn!(seq = header.sequence_id, "Sync outstanding list full");
                return false;
            };
            fan = FanOut::partition(&self.ports, rx_port);
            {
                let entry = &mut self.sync_list.slot_mut(index).entry;
                entry.sender = Some(sender);
                if one_step_origin {
                    trace!("one-step origin, Follow_Up will be synthesized");
                    // save the encapsulation header for the synthesized Follow_Up
                    if buffer.header_len <= SAVED_FRAME_MAX {
                        entry
                            .saved_frame
                            .extend_from_slice(&buffer.frame[..buffer.header_len]);
                        entry.saved_header_len = buffer.header_len;
                    } else {
                        warn!(header_len = buffer.header_len, "encapsulation header too long");
                    }
                }
                entry.header = *header;
                entry.rx_correction = rx_correction;
                entry.origin_timestamp = origin_timestamp;
                entry.ingress_time = self.local_clock.time_from_ticks(buffer.hw_time);
                entry.pending_ports = fan.external_mask;
                debug!(
                    entry = index,
                    seq = header.sequence_id,
                    "saved data for follow-up"
                );
            }
            let mut flags = header.flags;
            if one_step_origin {
                flags |= FLAG_TWO_STEP;
            }
            message::write_flags(buffer.payload_mut(), flags);
            if let Some(pi) = fan.last_external {
                buffer.tag = self.ports[pi].tag;
            }
            if fan.internal_mask != 0 {
                // duplicate for internal forwarding before the original
                // buffer is reshaped for transmission
                if let Some(mut frame) = self
                    .transport
                    .prepare_general_packet(&self.config.primary_address, SYNC_MESSAGE_LENGTH)
                {
                    let n = frame.data.len().min(buffer.frame.len());
                    frame.data[..n].copy_from_slice(&buffer.frame[..n]);
                    if let Some(pi) = fan.last_internal {
                        internal_tag = self.ports[pi].tag;
                    }
                    internal_frame = Some(frame);
                }
            }
            if fan.external_mask == 0 {
                self.sync_list.release(index);
            } else {
                self.transport.prepare_tx_buffer(buffer, SYNC_MESSAGE_LENGTH);
                buffer.msg_type = TxMsgType::TwoStep;
                buffer.ts_done = Some(TsContext {
                    registry: RegistryKind::Sync,
                    index,
                });
                match self.transport.tx_msg(fan.external_mask, buffer) {
                    Ok(_) => {
                        debug!("forwarded two-step Sync to ports {:#x}", fan.external_mask);
                    }
                    Err(err) => {
                        self.sync_list.release(index);
                        info!("could not forward two-step Sync to ports {:#x}: {err}", fan.external_mask);
                    }
                }
                forwarded = true;
            }
        } else {
            // one-step forwarding (applies to one-step and two-step Sync events)
            fan = FanOut::partition(&self.ports, rx_port);
            if fan.internal_mask != 0 {
                if let Some(mut frame) = self
                    .transport
                    .prepare_general_packet(&self.config.primary_address, SYNC_MESSAGE_LENGTH)
                {
                    let n = frame.data.len().min(buffer.frame.len());
                    frame.data[..n].copy_from_slice(&buffer.frame[..n]);
                    if let Some(pi) = fan.last_internal {
                        internal_tag = self.ports[pi].tag;
                    }
                    internal_frame = Some(frame);
                }
            }
            if fan.external_mask != 0 {
                self.transport.prepare_tx_buffer(buffer, SYNC_MESSAGE_LENGTH);
                buffer.msg_type = TxMsgType::CorrectionField;
                buffer.ts_done = None;
                if self.transport.tx_msg(fan.external_mask, buffer).is_ok() {
                    debug!("forwarded one-step Sync to ports {:#x}", fan.external_mask);
                }
                forwarded = true;
            }
        }

        if fan.internal_mask != 0 {
            if let Some(mut frame) = internal_frame {
                if one_step_origin {
                    // a one-step original stays one-step across the stack
                    message::clear_flag(frame.payload_mut(), FLAG_TWO_STEP);
                }
                let receive_time = self.local_clock.time_from_ticks(buffer.hw_time);
                tunnel::embed_rx_timestamp(frame.payload_mut(), receive_time.nanoseconds);
                match self.transport.tx_general(fan.internal_mask, &frame, &internal_tag) {
                    Ok(()) => {
                        info!("forwarded Sync to internal ports {:#x}", fan.internal_mask);
                    }
                    Err(err) => {
                        warn!("could not forward Sync to internal ports {:#x}: {err}", fan.internal_mask);
                    }
                }
            }
        }
        forwarded
    }

    /// Completion of a two-step Sync transmit on one egress port.
    fn sync_event_transmitted(&mut self, done: &TxDone) {
        debug!(port = done.port, "Sync event transmitted");
        let Some(port) = self.port_by_number(done.port) else {
            warn!(port = done.port, "Sync TX-done for unknown port");
            return;
        };
        let port = port.clone();
        if !port.is_active() || !self.config.two_step {
            return;
        }
        let index = done.context.index;
        let slot = self.sync_list.slot_mut(index);
        let Occupancy::Occupied(action) = slot.occupancy else {
            trace!(entry = index, "Sync TX-done for released entry");
            return;
        };
        let entry = &mut slot.entry;
        let egress_time = self.local_clock.time_from_ticks(done.tx_time);
        let pi = usize::from(done.port - 1);
        let residence = egress_time.interval_since(&entry.ingress_time);
        entry.residence_time[pi] = Some(residence);
        info!(
            port = done.port,
            tx_time = done.tx_time,
            action = ?action,
            seq = entry.header.sequence_id,
            "Sync event transmitted"
        );
        debug!(%residence, "residence time");
        trace!(egress = %egress_time, ingress = %entry.ingress_time, "timestamps");

        match action {
            FollowUpAction::Create => {
                let correction = residence + port.delay_asymmetry + entry.rx_correction;
                entry.pending_ports &= !port.port_mask();
                let dst = entry.sender.unwrap_or(self.config.primary_address);
                if let Some(mut frame) = self
                    .transport
                    .prepare_general_packet(&dst, FOLLOW_UP_MESSAGE_LENGTH)
                {
                    if entry.saved_header_len != frame.header_len {
                        warn!(
                            saved = entry.saved_header_len,
                            prepared = frame.header_len,
                            "encapsulation size mismatch"
                        );
                    }
                    let n = frame
                        .header_len
                        .min(entry.saved_frame.len())
                        .min(frame.data.len());
                    frame.data[..n].copy_from_slice(&entry.saved_frame[..n]);
                    message::pack_transparent_follow_up(
                        frame.payload_mut(),
                        &entry.header,
                        &entry.origin_timestamp,
                        correction,
                    );
                    if self
                        .transport
                        .tx_general(port.port_mask(), &frame, &port.tag)
                        .is_ok()
                    {
                        debug!(port = done.port, "created and sent transparent Follow_Up");
                    }
                }
            }
            FollowUpAction::AwaitTransmitReady => {
                // the Follow_Up already arrived; a copy is buffered in the entry
                let correction = residence + port.delay_asymmetry + entry.rx_correction;
                entry.pending_ports &= !port.port_mask();
                let dst = entry.sender.unwrap_or(self.config.primary_address);
                if let Some(mut frame) = self
                    .transport
                    .prepare_general_packet(&dst, FOLLOW_UP_MESSAGE_LENGTH)
                {
                    debug!(port = done.port, "transmit-ready Follow_Up");
                    let payload = frame.payload_mut();
                    let n = payload.len().min(entry.saved_frame.len());
                    payload[..n].copy_from_slice(&entry.saved_frame[..n]);
                    message::update_correction_field(frame.payload_mut(), correction);
                    if self
                        .transport
                        .tx_general(port.port_mask(), &frame, &port.tag)
                        .is_ok()
                    {
                        debug!(port = done.port, "forwarded Follow_Up");
                    }
                }
            }
            FollowUpAction::AwaitTransmit => {
                // residence time recorded; the real Follow_Up has not
                // arrived yet, so there is nothing to send
            }
        }
        if self.sync_list.slot(index).entry.pending_ports == 0 {
            self.sync_list.release(index);
        }
    }

    /// Forward an ingress `Follow_Up` to all other active ports.
    ///
    /// External ports whose relayed Sync already has a known transmit
    /// timestamp get a patched copy immediately; ports still waiting get
    /// the payload buffered until their TX-done fires.
    pub fn forward_follow_up(
        &mut self,
        buffer: &mut TxBuffer,
        header: &PtpHeader,
        sender: SocketAddr,
        rx_port: u16,
    ) -> bool {
        let mut forwarded = false;
        let Some(rx) = self.port_by_number(rx_port) else {
            warn!(port = rx_port, "Follow_Up from unknown port");
            return false;
        };
        if rx.internal {
            if message::has_flag(buffer.payload(), FLAG_RESERVED_TS) {
                message::clear_flag(buffer.payload_mut(), FLAG_RESERVED_TS);
            } else {
                return false;
            }
        }
        if self.config.two_step {
            let key = EntryKey {
                source_port_identity: header.source_port_identity,
                sequence_id: header.sequence_id,
            };
            let found = self.sync_list.find(&key);
            debug!(entry = ?found, seq = header.sequence_id, "Follow_Up in two-step mode");
            if let Some(index) = found {
                for pi in 0..self.ports.len() {
                    let port = self.ports[pi].clone();
                    if port.number == rx_port || !port.is_active() || port.internal {
                        continue;
                    }
                    let slot = self.sync_list.slot_mut(index);
                    let Occupancy::Occupied(action) = slot.occupancy else {
                        break;
                    };
                    let entry = &mut slot.entry;
                    let seq_matches = header.sequence_id == entry.header.sequence_id;
                    if let Some(residence) = entry.residence_time[pi].filter(|_| seq_matches) {
                        let correction = residence + port.delay_asymmetry + entry.rx_correction;
                        entry.pending_ports &= !port.port_mask();
                        let pending = entry.pending_ports;
                        if let Some(mut frame) = self
                            .transport
                            .prepare_general_packet(&sender, FOLLOW_UP_MESSAGE_LENGTH)
                        {
                            if buffer.header_len != frame.header_len {
                                warn!(
                                    ingress = buffer.header_len,
                                    prepared = frame.header_len,
                                    "encapsulation size mismatch"
                                );
                            }
                            let n = frame
                                .data
                                .len()
                                .min(buffer.header_len + FOLLOW_UP_MESSAGE_LENGTH)
                                .min(buffer.frame.len());
                            frame.data[..n].copy_from_slice(&buffer.frame[..n]);
                            message::update_correction_field(frame.payload_mut(), correction);
                            if self
                                .transport
                                .tx_general(port.port_mask(), &frame, &port.tag)
                                .is_ok()
                            {
                                debug!(port = port.number, "forwarded Follow_Up");
                            }
                        }
                        if pending == 0 {
                            self.sync_list.release(index);
                        }
                    } else if action == FollowUpAction::AwaitTransmit
                        && entry.residence_time[pi].is_none()
                        && seq_matches
                    {
                        // the Follow_Up beat the forwarded Sync's transmit
                        // timestamp; buffer it until TX-done fires
                        info!(
                            seq = header.sequence_id,
                            "Follow_Up saved, waiting for Sync tx timestamp"
                        );
                        let payload = buffer.payload();
                        let n = payload.len().min(FOLLOW_UP_MESSAGE_LENGTH);
                        entry.saved_frame.clear();
                        entry.saved_frame.extend_from_slice(&payload[..n]);
                        slot.occupancy = Occupancy::Occupied(FollowUpAction::AwaitTransmitReady);
                    } else {
                        info!(
                            port = port.number,
                            action = ?action,
                            seq = header.sequence_id,
                            expected_seq = entry.header.sequence_id,
                            "not waiting for Follow_Up"
                        );
                    }
                }
            }
            // internal forwarding happens without a registry entry
            let fan = FanOut::partition(&self.ports, rx_port);
            if fan.internal_mask != 0 {
                message::set_flag(buffer.payload_mut(), FLAG_RESERVED_TS);
                self.transport
                    .prepare_tx_buffer(buffer, FOLLOW_UP_MESSAGE_LENGTH);
                buffer.msg_type = TxMsgType::General;
                buffer.ts_done = None;
                match self.transport.tx_msg(fan.internal_mask, buffer) {
                    Ok(_) => {
                        debug!("forwarded Follow_Up to internal ports {:#x}", fan.internal_mask);
                    }
                    Err(err) => {
                        warn!("could not forward Follow_Up to internal ports {:#x}: {err}", fan.internal_mask);
                    }
                }
                forwarded = true;
            }
        } else {
            debug!("Follow_Up in one-step mode, forwarding unchanged");
            let fan = FanOut::partition(&self.ports, rx_port);
            if fan.internal_mask != 0 {
                if let Some(mut frame) = self
                    .transport
                    .prepare_general_packet(&self.config.primary_address, FOLLOW_UP_MESSAGE_LENGTH)
                {
                    let n = frame.data.len().min(buffer.frame.len());
                    frame.data[..n].copy_from_slice(&buffer.frame[..n]);
                    message::set_flag(frame.payload_mut(), FLAG_RESERVED_TS);
                    let tag = fan
                        .last_internal
                        .map_or_else(VlanTag::default, |pi| self.ports[pi].tag);
                    if self.transport.tx_general(fan.internal_mask, &frame, &tag).is_ok() {
                        info!("forwarded Follow_Up to internal ports {:#x}", fan.internal_mask);
                    }
                }
            }
            if fan.external_mask != 0 {
                self.transport
                    .prepare_tx_buffer(buffer, FOLLOW_UP_MESSAGE_LENGTH);
                buffer.msg_type = TxMsgType::General;
                buffer.ts_done = None;
                if self.transport.tx_msg(fan.external_mask, buffer).is_ok() {
                    debug!("forwarded Follow_Up to external ports {:#x}", fan.external_mask);
                }
                forwarded = true;
            }
        }
        forwarded
    }

    // ===== Delay_Req / Delay_Resp =====

    /// Forward an ingress `Delay_Req` to all other active ports.
    ///
    /// The source identity, sequence ID and ingress timestamp are saved
    /// in a registry entry; in two-step mode the egress timestamp
    /// arrives later via TX-done and completes the `Delay_Resp`
    /// correction.
    pub fn forward_delay_req(
        &mut self,
        buffer: &mut TxBuffer,
        header: &mut PtpHeader,
        sender: SocketAddr,
        rx_port: u16,
    ) -> bool {
        trace!(seq = header.sequence_id, "forwarding Delay_Req");
        let Some(rx) = self.port_by_number(rx_port) else {
            warn!(port = rx_port, "Delay_Req from unknown port");
            return false;
        };
        let rx_internal = rx.internal;
        let rx_tag = rx.tag;
        if rx_internal
            && !Self::consume_tunneled_rx_time(&self.local_clock, buffer, header)
        {
            return false;
        }

        let key = EntryKey {
            source_port_identity: header.source_port_identity,
            sequence_id: header.sequence_id,
        };
        if self.delay_req_list.find(&key).is_some() {
            // previous exchange for this key is still unresolved
            info!(
                port = rx_port,
                seq = header.sequence_id,
                "missed response from master"
            );
            debug!("waiting for response; Delay_Req not forwarded");
            return false;
        }
        let Some(index) = self.delay_req_list.allocate(DelayReqState::AwaitingResponse) else {
            warn!(seq = header.sequence_id, "no free entry for Delay_Req forwarding");
            return false;
        };
        let fan = FanOut::partition(&self.ports, rx_port);
        {
            let entry = &mut self.delay_req_list.slot_mut(index).entry;
            entry.source_port_identity = header.source_port_identity;
            entry.sequence_id = header.sequence_id;
            entry.origin_port = rx_port;
            entry.sender = Some(sender);
        }
        info!(seq = header.sequence_id, entry = index, "Delay_Req accepted");

        let mut forwarded = false;
        if fan.external_mask != 0 {
            buffer.tag = rx_tag;
            self.transport
                .prepare_tx_buffer(buffer, DELAY_REQ_MESSAGE_LENGTH);
            if self.config.two_step {
                let rx_time = self.local_clock.time_from_ticks(buffer.hw_time);
                self.delay_req_list.slot_mut(index).entry.rx_time = rx_time;
                buffer.msg_type = TxMsgType::TwoStep;
                buffer.ts_done = Some(TsContext {
                    registry: RegistryKind::DelayReq,
                    index,
                });
                match self.transport.tx_msg(fan.external_mask, buffer) {
                    Ok(_) => {
                        debug!("forwarded two-step Delay_Req to ports {:#x}", fan.external_mask);
                    }
                    Err(err) => {
                        self.delay_req_list.release(index);
                        warn!("could not forward two-step Delay_Req to ports {:#x}: {err}", fan.external_mask);
                    }
                }
            } else {
                buffer.msg_type = TxMsgType::CorrectionField;
                buffer.ts_done = None;
                match self.transport.tx_msg(fan.external_mask, buffer) {
                    Ok(_) => {
                        debug!("forwarded one-step Delay_Req to ports {:#x}", fan.external_mask);
                    }
                    Err(err) => {
                        self.delay_req_list.release(index);
                        warn!("could not forward one-step Delay_Req to ports {:#x}: {err}", fan.external_mask);
                    }
                }
            }
            forwarded = true;
        }
        if fan.internal_mask != 0 {
            if let Some(mut frame) = self
                .transport
                .prepare_general_packet(&self.config.primary_address, DELAY_REQ_MESSAGE_LENGTH)
            {
                let n = frame.data.len().min(buffer.frame.len());
                frame.data[..n].copy_from_slice(&buffer.frame[..n]);
                let receive_time = self.local_clock.time_from_ticks(buffer.hw_time);
                tunnel::embed_rx_timestamp(frame.payload_mut(), receive_time.nanoseconds);
                let tag = fan
                    .last_internal
                    .map_or_else(VlanTag::default, |pi| self.ports[pi].tag);
                match self.transport.tx_general(fan.internal_mask, &frame, &tag) {
                    Ok(()) => {
                        info!("forwarded Delay_Req to internal ports {:#x}", fan.internal_mask);
                    }
                    Err(err) => {
                        warn!("could not forward Delay_Req to internal ports {:#x}: {err}", fan.internal_mask);
                    }
                }
            }
        }
        if fan.external_mask == 0 && fan.internal_mask == 0 {
            self.delay_req_list.release(index);
        }
        forwarded
    }

    /// Completion of a two-step `Delay_Req` transmit on one egress port.
    fn delay_req_event_transmitted(&mut self, done: &TxDone) {
        let Some(port) = self.port_by_number(done.port) else {
            warn!(port = done.port, "Delay_Req TX-done for unknown port");
            return;
        };
        let port = port.clone();
        if port.state != PortState::E2eTransparent {
            return;
        }
        let index = done.context.index;
        let slot = self.delay_req_list.slot_mut(index);
        let Occupancy::Occupied(state) = slot.occupancy else {
            trace!(entry = index, "Delay_Req TX-done for released entry");
            return;
        };
        let entry = &mut slot.entry;
        let tx_time = self.local_clock.time_from_ticks(done.tx_time);
        let pi = usize::from(done.port - 1);
        entry.tx_time[pi] = Some(tx_time);
        info!(tx = %tx_time, rx = %entry.rx_time, "Delay_Req event transmitted");
        let DelayReqState::AwaitingTransmit { master_port } = state else {
            info!(state = ?state, port = done.port, "no buffered response for this port");
            return;
        };
        if master_port != done.port {
            info!(master_port, port = done.port, "not the designated master port");
            return;
        }
        // the Delay_Resp arrived first and is buffered; complete it now
        let correction = tx_time.interval_since(&entry.rx_time) - port.delay_asymmetry;
        message::update_correction_field(&mut entry.saved_resp, correction);
        let dst = entry.resp_sender.unwrap_or(self.config.primary_address);
        if let Some(mut frame) = self
            .transport
            .prepare_general_packet(&dst, DELAY_RESP_MESSAGE_LENGTH)
        {
            let payload = frame.payload_mut();
            let n = payload.len().min(entry.saved_resp.len());
            payload[..n].copy_from_slice(&entry.saved_resp[..n]);
            let forward_mask = 1u64 << (entry.origin_port - 1);
            if self
                .transport
                .tx_general(forward_mask, &frame, &port.tag)
                .is_ok()
            {
                info!(port = entry.origin_port, "sent delay response");
            }
        }
        self.delay_req_list.release(index);
    }

    /// Forward an ingress `Delay_Resp` back out the port its request
    /// came in on, patching the correctionField with the forwarded
    /// request's residence time.
    pub fn forward_delay_resp(
        &mut self,
        buffer: &mut TxBuffer,
        header: &PtpHeader,
        sender: SocketAddr,
        rx_port: u16,
    ) -> bool {
        let Some(requesting) = message::unpack_requesting_port_identity(buffer.payload()) else {
            warn!("Delay_Resp message too short");
            return false;
        };
        let key = EntryKey {
            source_port_identity: requesting,
            sequence_id: header.sequence_id,
        };
        let Some(index) = self.delay_req_list.find(&key) else {
            debug!(seq = header.sequence_id, "unexpected delay response");
            return false;
        };
        info!(seq = header.sequence_id, entry = index, "Delay_Resp matched");
        let Some(rx) = self.port_by_number(rx_port) else {
            warn!(port = rx_port, "Delay_Resp from unknown port");
            return false;
        };
        let rx_internal = rx.internal;
        let rx_asymmetry = rx.delay_asymmetry;
        if rx_internal {
            if message::has_flag(buffer.payload(), FLAG_RESERVED_TS) {
                message::clear_flag(buffer.payload_mut(), FLAG_RESERVED_TS);
            } else {
                return false;
            }
        }

        let entry = &mut self.delay_req_list.slot_mut(index).entry;
        let forward_mask = 1u64 << (entry.origin_port - 1);
        let origin = self
            .ports
            .get(usize::from(entry.origin_port.saturating_sub(1)));
        if let Some(origin) = origin {
            buffer.tag = origin.tag;
            if origin.internal {
                // the response continues over a stacking link
                message::set_flag(buffer.payload_mut(), FLAG_RESERVED_TS);
            }
        }
        let mut forwarded = false;
        let mut buffer_response = false;
        let pi = usize::from(rx_port - 1);
        if rx_internal {
            forwarded = true;
        } else if self.config.two_step {
            if let Some(tx_time) = entry.tx_time[pi] {
                // only modify the correction field in two-step mode
                let correction = tx_time.interval_since(&entry.rx_time) - rx_asymmetry;
                message::update_correction_field(buffer.payload_mut(), correction);
                forwarded = true;
            } else {
                // the response beat the forwarded request's TX-done
                debug!("received Delay_Resp before Delay_Req transmit timestamp");
                let payload = buffer.payload();
                let n = payload.len().min(DELAY_RESP_MESSAGE_LENGTH);
                entry.saved_resp.clear();
                entry.saved_resp.extend_from_slice(&payload[..n]);
                entry.resp_sender = Some(sender);
                buffer_response = true;
            }
        }
        if buffer_response {
            self.delay_req_list.slot_mut(index).occupancy =
                Occupancy::Occupied(DelayReqState::AwaitingTransmit {
                    master_port: rx_port,
                });
        }
        if !self.config.two_step {
            forwarded = true;
        }
        if forwarded {
            self.delay_req_list.release(index);
            self.transport
                .prepare_tx_buffer(buffer, DELAY_RESP_MESSAGE_LENGTH);
            buffer.msg_type = TxMsgType::General;
            buffer.ts_done = None;
            if self.transport.tx_msg(forward_mask, buffer).is_ok() {
                info!("forwarded delay response to ports {forward_mask:#x}");
            }
        }
        forwarded
    }
}

impl<T, C> Drop for TransparentClock<T, C> {
    fn drop(&mut self) {
        if let Some(timer) = self.age_timer.take() {
            timer.stop();
        }
    }
}
