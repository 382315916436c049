use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use portable_atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use crate::stack::CharacteristicHandle;

/// Where a streaming session sends its notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamTarget {
    pub conn_id: u16,
    pub characteristic: CharacteristicHandle,
    /// Generation of the connection the target was captured from.
    pub generation: u32,
}

/// Summary published when a streaming session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamReport {
    pub conn_id: u16,
    /// Batches the stack accepted for notification.
    pub batches: u32,
    pub notify_failures: u32,
    /// A batch was acquired after the connection went away and was dropped.
    pub abandoned_batch: bool,
}

impl StreamReport {
    pub const fn new(conn_id: u16) -> Self {
        Self { conn_id, batches: 0, notify_failures: 0, abandoned_batch: false }
    }
}

/// Connection state shared by the event loop and the stream coordinator.
///
/// The event loop is the only writer of the connection fields. The
/// connection id and generation are stored before `active` is raised with
/// release ordering, and readers load `active` with acquire ordering, so a
/// reader that sees the link active also sees the id it belongs to.
///
/// Each activation bumps a generation counter. A [`StreamTarget`] is only
/// current while both its connection id and its generation match, so a
/// session captured from an earlier connection stays stale even if the
/// stack reuses the same connection id.
pub struct ConnectionContext<M: RawMutex> {
    conn_id: AtomicU16,
    active: AtomicBool,
    generation: AtomicU32,
    notifications: AtomicBool,
    streaming: AtomicBool,
    start: Signal<M, StreamTarget>,
    stopped: Signal<M, StreamReport>,
}

impl<M: RawMutex> ConnectionContext<M> {
    pub const fn new() -> Self {
        Self {
            conn_id: AtomicU16::new(0),
            active: AtomicBool::new(false),
            generation: AtomicU32::new(0),
            notifications: AtomicBool::new(false),
            streaming: AtomicBool::new(false),
            start: Signal::new(),
            stopped: Signal::new(),
        }
    }

    /// Publish a new active connection and return its generation.
    pub fn activate(&self, conn_id: u16) -> u32 {
        self.conn_id.store(conn_id, Ordering::Relaxed);
        let generation =
            self.generation.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        self.notifications.store(false, Ordering::Relaxed);
        self.active.store(true, Ordering::Release);
        generation
    }

    /// Invalidate the active connection if it is `conn_id`.
    ///
    /// Returns false when no connection is active or the id belongs to
    /// another connection; the context is left untouched in that case.
    pub fn deactivate(&self, conn_id: u16) -> bool {
        if !self.active.load(Ordering::Acquire)
            || self.conn_id.load(Ordering::Relaxed) != conn_id
        {
            return false;
        }
        self.active.store(false, Ordering::Release);
        self.notifications.store(false, Ordering::Relaxed);
        true
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Id of the active connection, if any.
    pub fn connection_id(&self) -> Option<u16> {
        if self.active.load(Ordering::Acquire) {
            Some(self.conn_id.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Whether `target` still addresses the active connection.
    pub fn is_current(&self, target: &StreamTarget) -> bool {
        self.active.load(Ordering::Acquire)
            && self.generation.load(Ordering::Relaxed) == target.generation
            && self.conn_id.load(Ordering::Relaxed) == target.conn_id
    }

    /// Record the client's notification setting from the CCCD.
    pub fn set_notifications(&self, enabled: bool) {
        self.notifications.store(enabled, Ordering::Relaxed);
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications.load(Ordering::Relaxed)
    }

    /// Ask the coordinator to start streaming to `target`. A request that
    /// has not been picked up yet is replaced.
    pub fn request_stream(&self, target: StreamTarget) {
        self.start.signal(target);
    }

    pub async fn wait_stream_request(&self) -> StreamTarget {
        self.start.wait().await
    }

    /// Take a pending stream request without waiting.
    pub fn take_stream_request(&self) -> Option<StreamTarget> {
        self.start.try_take()
    }

    /// Claim the single streaming slot. Returns `None` while another
    /// session holds it.
    pub fn claim_stream(&self) -> Option<StreamClaim<'_, M>> {
        self.streaming
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| StreamClaim { ctx: self })
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    pub fn report_stopped(&self, report: StreamReport) {
        self.stopped.signal(report);
    }

    /// Wait for the next streaming session to end.
    pub async fn wait_stream_stopped(&self) -> StreamReport {
        self.stopped.wait().await
    }

    pub fn take_stream_report(&self) -> Option<StreamReport> {
        self.stopped.try_take()
    }
}

impl<M: RawMutex> Default for ConnectionContext<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the streaming slot of a [`ConnectionContext`] until dropped.
pub struct StreamClaim<'a, M: RawMutex> {
    ctx: &'a ConnectionContext<M>,
}

impl<M: RawMutex> Drop for StreamClaim<'_, M> {
    fn drop(&mut self) {
        self.ctx.streaming.store(false, Ordering::Release);
    }
}
