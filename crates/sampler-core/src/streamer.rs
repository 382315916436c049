use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;

use crate::batcher::{SampleBatcher, SampleSource};
use crate::context::{ConnectionContext, StreamReport, StreamTarget};
use crate::error::StreamError;
use crate::stack::BleStack;

/// Streams sample batches to the connected central.
///
/// Runs as its own task next to the event loop. It never gets cancelled:
/// before acquiring a batch and again before notifying it, it checks that
/// its target is still the active connection, and it returns once that is
/// no longer the case. After a disconnect it therefore stops within one
/// batch acquisition, and a batch that was in flight is dropped instead of
/// being sent to a stale connection.
pub struct StreamCoordinator<'a, M: RawMutex, S: BleStack, Src, D> {
    ctx: &'a ConnectionContext<M>,
    stack: &'a S,
    batcher: SampleBatcher<Src, D>,
    batch_size: usize,
}

impl<'a, M, S, Src, D> StreamCoordinator<'a, M, S, Src, D>
where
    M: RawMutex,
    S: BleStack,
    Src: SampleSource,
    D: DelayNs,
{
    pub fn new(
        ctx: &'a ConnectionContext<M>,
        stack: &'a S,
        batcher: SampleBatcher<Src, D>,
        batch_size: usize,
    ) -> Self {
        Self { ctx, stack, batcher, batch_size }
    }

    pub fn batcher(&self) -> &SampleBatcher<Src, D> {
        &self.batcher
    }

    /// Serve stream requests forever, one session per connection. Each
    /// finished session is published through the context's stop report.
    pub async fn run(&mut self) -> ! {
        loop {
            let target = self.ctx.wait_stream_request().await;
            match self.stream(target).await {
                Ok(report) => {
                    info!(
                        "stream to {} ended after {} batches, {} failed",
                        report.conn_id,
                        report.batches,
                        report.notify_failures
                    );
                    self.ctx.report_stopped(report);
                }
                Err(e) => {
                    warn!("stream to {} not started: {:?}", target.conn_id, e)
                }
            }
        }
    }

    /// Stream to `target` until it is no longer the active connection.
    ///
    /// Fails right away if another session holds the context's streaming
    /// slot. Notify failures are counted and the next batch is attempted.
    pub async fn stream(
        &mut self,
        target: StreamTarget,
    ) -> Result<StreamReport, StreamError> {
        let _claim =
            self.ctx.claim_stream().ok_or(StreamError::AlreadyStreaming)?;
        info!("streaming to {}", target.conn_id);

        let mut report = StreamReport::new(target.conn_id);
        while self.ctx.is_current(&target) {
            let payload = self.batcher.acquire_batch(self.batch_size).await;

            if !self.ctx.is_current(&target) {
                debug!("dropping batch for stale connection {}", target.conn_id);
                report.abandoned_batch = true;
                break;
            }

            match self.stack.send_notify(
                target.conn_id,
                target.characteristic,
                payload.as_bytes(),
                false,
            ) {
                Ok(()) => {
                    report.batches = report.batches.saturating_add(1);
                    trace!("notified {} bytes", payload.len());
                }
                Err(e) => {
                    report.notify_failures =
                        report.notify_failures.saturating_add(1);
                    warn!("notify to {} failed: {:?}", target.conn_id, e);
                }
            }
        }
        Ok(report)
    }
}
