//! Bounded worker pool that deregisters images and deletes their snapshots.
//!
//! Workers are spawned up front and block on a shared unbounded channel.
//! [`DeletionPipeline::run`] enqueues every job, drops the only sender to
//! close the queue, and joins the workers once they have drained it. Each
//! worker records a per-job outcome instead of unwinding: provider errors and
//! provider panics alike become [`StepFailure`]s, so one bad call never
//! shrinks the pool. Workers log through the subscriber that was current
//! when the pipeline started.

use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use crate::image::ImageDescriptor;
use crate::provider::{ImageProvider, ProviderError};

/// Processing stage in which a deletion step failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobStage {
    /// The image itself was being deregistered.
    Deregistering,
    /// One of the image's snapshots was being deleted.
    DeletingSnapshots,
}

/// One failed provider call within a job.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StepFailure {
    /// Stage the job was in.
    pub stage: JobStage,
    /// Image or snapshot the call targeted.
    pub resource_id: String,
    /// Error returned by the provider.
    pub error: ProviderError,
}

/// Image whose deletion did not fully succeed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FailedDeletion {
    /// Image name.
    pub name: String,
    /// Provider identifier of the image.
    pub image_id: String,
    /// Every failed step, in the order attempted.
    pub failures: Vec<StepFailure>,
}

/// Outcome of a drained pipeline, listed in enqueue order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeletionReport {
    /// Names of every image the workers processed.
    pub processed: Vec<String>,
    /// Names of images deregistered with all snapshots deleted.
    pub succeeded: Vec<String>,
    /// Images with at least one failed step.
    pub failed: Vec<FailedDeletion>,
}

impl DeletionReport {
    /// Returns `true` when every processed image was fully deleted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Errors that break the pool itself rather than a single job.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PipelineError {
    /// Raised when a worker thread cannot be started.
    #[error("failed to spawn deletion worker: {message}")]
    Spawn {
        /// Operating system error string.
        message: String,
    },
    /// Raised when jobs cannot be enqueued because every worker is gone.
    #[error("deletion queue closed with {undelivered} jobs undelivered")]
    QueueClosed {
        /// Jobs that never reached a worker.
        undelivered: usize,
    },
    /// Raised when worker threads panicked outside a provider call.
    #[error("{count} deletion workers panicked")]
    WorkerPanicked {
        /// Number of workers that did not exit cleanly.
        count: usize,
    },
}

struct Job {
    index: usize,
    image: ImageDescriptor,
}

struct Completed {
    index: usize,
    image: ImageDescriptor,
    failures: Vec<StepFailure>,
}

/// Fixed-size pool of deletion workers sharing one job queue.
#[derive(Debug)]
pub struct DeletionPipeline {
    queue: Sender<Job>,
    workers: Vec<JoinHandle<Vec<Completed>>>,
}

impl DeletionPipeline {
    /// Spawns `workers` idle workers that share `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Spawn`] when a thread cannot be created. Any
    /// workers already running exit once the partially built pool is dropped.
    pub fn start<P>(provider: Arc<P>, workers: NonZeroUsize) -> Result<Self, PipelineError>
    where
        P: ImageProvider + 'static,
    {
        let (queue, jobs) = crossbeam_channel::unbounded();
        let dispatch = tracing::dispatcher::get_default(Clone::clone);
        let handles = (0..workers.get())
            .map(|worker| {
                let receiver = jobs.clone();
                let shared = Arc::clone(&provider);
                let worker_dispatch = dispatch.clone();
                thread::Builder::new()
                    .name(format!("imgcull-worker-{worker}"))
                    .spawn(move || {
                        tracing::dispatcher::with_default(&worker_dispatch, || {
                            drain(worker, shared.as_ref(), &receiver)
                        })
                    })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| PipelineError::Spawn {
                message: err.to_string(),
            })?;
        tracing::debug!(workers = handles.len(), "deletion workers started");

        Ok(Self {
            queue,
            workers: handles,
        })
    }

    /// Number of workers in the pool.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Enqueues `jobs`, closes the queue and waits for every worker to exit.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::WorkerPanicked`] when a worker died and
    /// [`PipelineError::QueueClosed`] when jobs could not be delivered.
    /// Provider failures are reported in the [`DeletionReport`] instead.
    pub fn run(self, jobs: Vec<ImageDescriptor>) -> Result<DeletionReport, PipelineError> {
        let Self { queue, workers } = self;
        let total = jobs.len();

        let mut delivered = 0;
        for (index, image) in jobs.into_iter().enumerate() {
            if queue.send(Job { index, image }).is_err() {
                break;
            }
            delivered += 1;
        }
        drop(queue);

        let mut completed = Vec::with_capacity(delivered);
        let mut panicked = 0;
        for handle in workers {
            match handle.join() {
                Ok(done) => completed.extend(done),
                Err(_) => panicked += 1,
            }
        }

        if panicked > 0 {
            return Err(PipelineError::WorkerPanicked { count: panicked });
        }
        if delivered < total {
            return Err(PipelineError::QueueClosed {
                undelivered: total - delivered,
            });
        }

        completed.sort_by_key(|done| done.index);
        Ok(build_report(completed))
    }

    /// Closes the queue without enqueueing anything and waits for the
    /// workers to exit.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::WorkerPanicked`] when a worker died.
    pub fn shutdown(self) -> Result<(), PipelineError> {
        self.run(Vec::new()).map(drop)
    }
}

fn build_report(completed: Vec<Completed>) -> DeletionReport {
    let mut report = DeletionReport::default();
    for done in completed {
        report.processed.push(done.image.name.clone());
        if done.failures.is_empty() {
            report.succeeded.push(done.image.name);
        } else {
            report.failed.push(FailedDeletion {
                name: done.image.name,
                image_id: done.image.image_id,
                failures: done.failures,
            });
        }
    }
    report
}

/// Worker loop: processes jobs until the queue is closed and empty.
fn drain<P>(worker: usize, provider: &P, jobs: &Receiver<Job>) -> Vec<Completed>
where
    P: ImageProvider + ?Sized,
{
    let mut completed = Vec::new();
    while let Ok(job) = jobs.recv() {
        let failures = delete_image(worker, provider, &job.image);
        completed.push(Completed {
            index: job.index,
            image: job.image,
            failures,
        });
    }
    tracing::debug!(worker, jobs = completed.len(), "deletion worker exiting");
    completed
}

/// Runs one provider call, converting a panic into [`ProviderError::Panicked`].
fn guarded<F>(action: &str, resource_id: &str, call: F) -> Result<(), ProviderError>
where
    F: FnOnce() -> Result<(), ProviderError>,
{
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        Err(ProviderError::Panicked {
            action: action.to_owned(),
            resource_id: resource_id.to_owned(),
            message: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("non-string panic payload"))
}

/// Deregisters `image`, then deletes each of its snapshots.
///
/// Snapshots are left alone when deregistration fails. A failed snapshot
/// deletion does not stop the remaining ones.
fn delete_image<P>(worker: usize, provider: &P, image: &ImageDescriptor) -> Vec<StepFailure>
where
    P: ImageProvider + ?Sized,
{
    tracing::info!(worker, image_id = %image.image_id, "Deregistering {}", image.name);
    let deregistered = guarded("image delete", &image.image_id, || {
        provider.deregister_image(&image.image_id)
    });
    if let Err(error) = deregistered {
        tracing::warn!(
            worker,
            image_id = %image.image_id,
            %error,
            "failed to deregister {}",
            image.name
        );
        return vec![StepFailure {
            stage: JobStage::Deregistering,
            resource_id: image.image_id.clone(),
            error,
        }];
    }

    image
        .snapshot_ids()
        .filter_map(|snapshot_id| {
            tracing::info!(worker, image = %image.name, "Deleting snapshot {snapshot_id}");
            let error = guarded("snapshot delete", snapshot_id, || {
                provider.delete_snapshot(snapshot_id)
            })
            .err()?;
            tracing::warn!(worker, %error, "failed to delete snapshot {snapshot_id}");
            Some(StepFailure {
                stage: JobStage::DeletingSnapshots,
                resource_id: snapshot_id.to_owned(),
                error,
            })
        })
        .collect()
}
