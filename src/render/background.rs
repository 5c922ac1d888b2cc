//! Image resampling off the caller's thread.
//!
//! Every item owns a ticket counter; submitting a job bumps it, which makes
//! older jobs for the same item stop at their next row and discards their
//! results on [`BackgroundResampler::poll`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::core::{ArrayRef, LutState};
use crate::items::{ImageItem, ItemId};
use crate::render::{resample_cancellable, ImageTile, Interpolation, ResamplePlan};

/// Snapshot of everything a worker needs; the scene is never touched.
#[derive(Debug, Clone)]
pub struct ResampleJob {
    item: ItemId,
    plan: ResamplePlan,
    data: ArrayRef,
    lut: LutState,
    interpolation: Interpolation,
    alpha: f64,
}

impl ResampleJob {
    #[must_use]
    pub fn new(item: ItemId, image: &ImageItem, plan: ResamplePlan) -> Self {
        Self {
            item,
            plan,
            data: image.data().clone(),
            lut: image.lut().clone(),
            interpolation: image.interpolation,
            alpha: image.alpha,
        }
    }

    fn run(&self, keep_going: &dyn Fn() -> bool) -> Option<ImageTile> {
        let pixels = match self
            .data
            .with_view(|view| resample_cancellable(&view, &self.plan, &self.lut, self.interpolation, keep_going))
        {
            Ok(pixels) => pixels?,
            Err(err) => {
                debug!(item = %self.item, error = %err, "background resample dropped");
                return None;
            }
        };
        let (width, height) = self.plan.tile_size();
        Some(ImageTile {
            dest: self.plan.dest(),
            width,
            height,
            pixels: Arc::from(pixels),
            alpha: self.alpha,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ResampleResult {
    pub item: ItemId,
    pub ticket: u64,
    pub tile: ImageTile,
}

#[derive(Debug)]
pub struct BackgroundResampler {
    tickets: HashMap<ItemId, Arc<AtomicU64>>,
    sender: Sender<ResampleResult>,
    receiver: Receiver<ResampleResult>,
}

impl Default for BackgroundResampler {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundResampler {
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Self {
            tickets: HashMap::new(),
            sender,
            receiver,
        }
    }

    /// Queues `job` on the rayon pool and returns its ticket.
    pub fn submit(&mut self, job: ResampleJob) -> u64 {
        let counter = Arc::clone(self.tickets.entry(job.item).or_default());
        let ticket = counter.fetch_add(1, Ordering::AcqRel) + 1;
        let sender = self.sender.clone();
        trace!(item = %job.item, ticket, "background resample queued");
        rayon::spawn(move || {
            let current = || counter.load(Ordering::Acquire) == ticket;
            let Some(tile) = job.run(&current) else {
                return;
            };
            if current() {
                let _ = sender.send(ResampleResult {
                    item: job.item,
                    ticket,
                    tile,
                });
            }
        });
        ticket
    }

    /// Cancels any outstanding job for `item`.
    pub fn cancel(&mut self, item: ItemId) {
        if let Some(counter) = self.tickets.get(&item) {
            counter.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Drains finished jobs whose ticket is still current.
    pub fn poll(&mut self) -> Vec<ResampleResult> {
        self.receiver
            .try_iter()
            .filter(|result| {
                self.tickets
                    .get(&result.item)
                    .is_some_and(|counter| counter.load(Ordering::Acquire) == result.ticket)
            })
            .collect()
    }
}
