//! Outstanding-request registries.
//!
//! Fixed-capacity slot tables keyed by `(sourcePortIdentity, sequenceId)`,
//! used independently by the `Delay_Req` and Sync forwarding paths. The
//! tables run in the real-time forwarding path: capacity is fixed at
//! creation, linear scans are bounded by `max_outstanding_records`, and
//! slot storage stays allocated across free/occupied transitions so no
//! per-packet allocation ever happens.
//!
//! Slots are reclaimed in three ways: by the completion path (response
//! emitted or fan-out fully resolved), by a forwarding failure, or by the
//! periodic aging sweep — the safety valve that recovers entries whose
//! completion notification was lost.

use std::net::SocketAddr;

use super::message::{PortIdentity, PtpHeader};
use super::timestamp::{PtpTimestamp, TimeInterval};

/// Aging threshold for outstanding `Delay_Req` entries, in sweep ticks.
///
/// A `Delay_Req` stays outstanding across a full request-response round
/// trip through the upstream master, so its window is wider than Sync's.
pub const DELAY_REQ_MAX_OUTSTANDING_TICKS: u32 = 4;

/// Aging threshold for outstanding Sync entries, in sweep ticks.
pub const SYNC_MAX_OUTSTANDING_TICKS: u32 = 2;

/// Upper bound on the saved-frame scratch buffer of a registry entry
/// (encapsulation header or a buffered general-message payload).
pub const SAVED_FRAME_MAX: usize = 128;

/// Registry key: the globally unique identity of one in-flight exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryKey {
    /// Source (Sync, `Delay_Req`) or requesting (`Delay_Resp`) port identity.
    pub source_port_identity: PortIdentity,
    /// PTP sequence ID.
    pub sequence_id: u16,
}

/// An entry type storable in an [`OutstandingList`].
pub trait Outstanding {
    /// The key this entry is matched by while occupied.
    fn key(&self) -> EntryKey;

    /// Reset all fields to their post-allocation state. Retained
    /// allocations (per-port vectors, scratch buffers) keep their
    /// capacity.
    fn reset(&mut self);
}

/// Occupancy tag of a registry slot, carrying the per-entry protocol
/// state while occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupancy<S> {
    /// Slot is free; the entry's fields are semantically invalid.
    Free,
    /// Slot is occupied and in protocol state `S`.
    Occupied(S),
}

impl<S> Occupancy<S> {
    /// Whether the slot is occupied.
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        matches!(self, Self::Occupied(_))
    }
}

/// One registry slot: age counter, occupancy tag, entry storage.
#[derive(Debug)]
pub struct Slot<T, S> {
    /// Sweep ticks since allocation.
    pub age: u32,
    /// Occupancy tag and protocol state.
    pub occupancy: Occupancy<S>,
    /// Entry storage (valid only while occupied).
    pub entry: T,
}

/// A fixed-capacity outstanding-request table.
///
/// At most one occupied entry per key exists at any time; enforcing that
/// is the caller's duty via [`find`](Self::find) before
/// [`allocate`](Self::allocate) (a duplicate key is a protocol anomaly
/// handled by the forwarder, not the table).
#[derive(Debug)]
pub struct OutstandingList<T, S> {
    slots: Vec<Slot<T, S>>,
    max_age: u32,
}

impl<T: Outstanding + Default, S> OutstandingList<T, S> {
    /// Create a table of `capacity` slots reclaimed after `max_age`
    /// sweep ticks.
    #[must_use]
    pub fn new(capacity: usize, max_age: u32) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot {
            age: 0,
            occupancy: Occupancy::Free,
            entry: T::default(),
        });
        Self { slots, max_age }
    }

    /// Find the occupied slot matching `key`.
    #[must_use]
    pub fn find(&self, key: &EntryKey) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.occupancy.is_occupied() && slot.entry.key() == *key)
    }

    /// Claim a free slot, resetting its entry and putting it in `state`.
    ///
    /// Returns `None` when the table is full; the caller must drop the
    /// triggering message (never block or retry).
    pub fn allocate(&mut self, state: S) -> Option<usize> {
        let index = self
            .slots
            .iter()
            .position(|slot| !slot.occupancy.is_occupied())?;
        let slot = &mut self.slots[index];
        slot.age = 0;
        slot.occupancy = Occupancy::Occupied(state);
        slot.entry.reset();
        Some(index)
    }

    /// Return a slot to the free pool.
    pub fn release(&mut self, index: usize) {
        self.slots[index].occupancy = Occupancy::Free;
    }

    /// Advance every occupied slot's age by one tick, freeing slots that
    /// exceed the table's maximum outstanding age. Returns the number of
    /// slots freed.
    pub fn age_tick(&mut self) -> usize {
        let mut freed = 0;
        for slot in &mut self.slots {
            if slot.occupancy.is_occupied() {
                slot.age += 1;
                if slot.age > self.max_age {
                    slot.occupancy = Occupancy::Free;
                    freed += 1;
                }
            }
        }
        freed
    }

    /// Borrow a slot.
    #[must_use]
    pub fn slot(&self, index: usize) -> &Slot<T, S> {
        &self.slots[index]
    }

    /// Mutably borrow a slot.
    pub fn slot_mut(&mut self, index: usize) -> &mut Slot<T, S> {
        &mut self.slots[index]
    }

    /// Iterate mutably over all entry storage (occupied or not); used at
    /// creation time to size per-port vectors.
    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().map(|slot| &mut slot.entry)
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.occupancy.is_occupied())
            .count()
    }

    /// Table capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

// ===== Delay_Req entries =====

/// Protocol state of an outstanding `Delay_Req` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayReqState {
    /// Forwarded; waiting for the matching `Delay_Resp`.
    AwaitingResponse,
    /// The `Delay_Resp` arrived before the forwarded request's transmit
    /// timestamp was known; its payload is buffered in the entry until
    /// the TX-done event for `master_port` fires.
    AwaitingTransmit {
        /// Egress port on which the matching `Delay_Resp` was received
        /// and whose transmit timestamp completes the correction.
        master_port: u16,
    },
}

/// An outstanding forwarded `Delay_Req`.
#[derive(Debug, Default)]
pub struct DelayReqEntry {
    /// Source port identity of the original request.
    pub source_port_identity: PortIdentity,
    /// Sequence ID of the original request.
    pub sequence_id: u16,
    /// 1-based ingress port the request arrived on (the port the
    /// response will be forwarded back out of).
    pub origin_port: u16,
    /// Receive timestamp of the original request.
    pub rx_time: PtpTimestamp,
    /// Per-egress-port transmit timestamp of the forwarded request,
    /// indexed by port number − 1. Populated lazily by TX-done events.
    pub tx_time: Vec<Option<PtpTimestamp>>,
    /// Transport address the request came from.
    pub sender: Option<SocketAddr>,
    /// Buffered `Delay_Resp` payload (when the response beat the
    /// transmit timestamp).
    pub saved_resp: Vec<u8>,
    /// Transport address the buffered response came from.
    pub resp_sender: Option<SocketAddr>,
}

impl Outstanding for DelayReqEntry {
    fn key(&self) -> EntryKey {
        EntryKey {
            source_port_identity: self.source_port_identity,
            sequence_id: self.sequence_id,
        }
    }

    fn reset(&mut self) {
        self.source_port_identity = PortIdentity::default();
        self.sequence_id = 0;
        self.origin_port = 0;
        self.rx_time = PtpTimestamp::ZERO;
        self.tx_time.iter_mut().for_each(|t| *t = None);
        self.sender = None;
        self.saved_resp.clear();
        self.resp_sender = None;
    }
}

// ===== Sync entries =====

/// What must happen when the relayed Sync's transmit timestamp becomes
/// known for an egress port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUpAction {
    /// The inbound Sync was one-step: this switch synthesizes the
    /// `Follow_Up` itself from the saved header and origin timestamp.
    Create,
    /// The inbound Sync was two-step: the upstream `Follow_Up` will
    /// arrive separately and must be patched before re-emission.
    AwaitTransmit,
    /// The upstream `Follow_Up` already arrived and is buffered in the
    /// entry, waiting only for the local transmit timestamp.
    AwaitTransmitReady,
}

/// An outstanding forwarded Sync.
#[derive(Debug)]
pub struct SyncEntry {
    /// Saved header of the inbound Sync (flags as received).
    pub header: PtpHeader,
    /// Origin timestamp carried by the inbound Sync.
    pub origin_timestamp: PtpTimestamp,
    /// Receive timestamp of the inbound Sync.
    pub ingress_time: PtpTimestamp,
    /// Per-egress-port residence time, indexed by port number − 1.
    /// Populated lazily by TX-done events.
    pub residence_time: Vec<Option<TimeInterval>>,
    /// Mask of external egress ports whose completion is still pending.
    /// The entry is released exactly when this reaches zero.
    pub pending_ports: u64,
    /// Rx-side correction added to every emitted `Follow_Up`: the
    /// ingress port's peer mean path delay (zero in E2E configurations).
    /// Each egress port's own delay asymmetry is added per emission.
    pub rx_correction: TimeInterval,
    /// Transport address the Sync came from.
    pub sender: Option<SocketAddr>,
    /// Scratch buffer: the saved encapsulation header when the action is
    /// [`FollowUpAction::Create`], or the buffered upstream `Follow_Up`
    /// payload when [`FollowUpAction::AwaitTransmitReady`].
    pub saved_frame: Vec<u8>,
    /// Encapsulation length of the saved header (Create only).
    pub saved_header_len: usize,
}

impl Default for SyncEntry {
    fn default() -> Self {
        Self {
            header: PtpHeader::default(),
            origin_timestamp: PtpTimestamp::ZERO,
            ingress_time: PtpTimestamp::ZERO,
            residence_time: Vec::new(),
            pending_ports: 0,
            rx_correction: TimeInterval::ZERO,
            sender: None,
            saved_frame: Vec::new(),
            saved_header_len: 0,
        }
    }
}

impl Outstanding for SyncEntry {
    fn key(&self) -> EntryKey {
        EntryKey {
            source_port_identity: self.header.source_port_identity,
            sequence_id: self.header.sequence_id,
        }
    }

    fn reset(&mut self) {
        self.header = PtpHeader::default();
        self.origin_timestamp = PtpTimestamp::ZERO;
        self.ingress_time = PtpTimestamp::ZERO;
        self.residence_time.iter_mut().for_each(|r| *r = None);
        self.pending_ports = 0;
        self.rx_correction = TimeInterval::ZERO;
        self.sender = None;
        self.saved_frame.clear();
        self.saved_header_len = 0;
    }
}
