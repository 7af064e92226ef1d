//! Parallel batch conversion.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver};
use rayon::prelude::*;

use super::{ConvertResult, Converter};
use crate::detect::DocumentFormat;
use crate::error::Error;

/// One file to convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub input: PathBuf,
    pub target: DocumentFormat,
}

impl BatchJob {
    pub fn new(input: impl Into<PathBuf>, target: DocumentFormat) -> Self {
        Self {
            input: input.into(),
            target,
        }
    }
}

/// Progress of a batch. `index` is the job's position in the submitted list.
#[derive(Debug)]
pub enum BatchEvent {
    Started { index: usize, input: PathBuf },
    Finished { index: usize, result: Box<ConvertResult> },
    Failed { index: usize, input: PathBuf, error: Error },
}

impl BatchEvent {
    pub fn index(&self) -> usize {
        match self {
            BatchEvent::Started { index, .. }
            | BatchEvent::Finished { index, .. }
            | BatchEvent::Failed { index, .. } => *index,
        }
    }

    /// Whether this event ends its job.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BatchEvent::Started { .. })
    }
}

impl Converter {
    /// Convert `jobs` on rayon's thread pool.
    ///
    /// Returns immediately. Every job yields a `Started` event followed by
    /// `Finished` or `Failed`; the channel closes once all jobs are done.
    /// One failing job does not stop the others.
    pub fn convert_batch(self: &Arc<Self>, jobs: Vec<BatchJob>) -> Receiver<BatchEvent> {
        let (sender, receiver) = unbounded();
        let converter = Arc::clone(self);

        thread::spawn(move || {
            log::debug!("Starting batch of {} jobs", jobs.len());
            jobs.into_par_iter()
                .enumerate()
                .for_each_with(sender, |sender, (index, job)| {
                    // A dropped receiver only means nobody is listening.
                    let _ = sender.send(BatchEvent::Started {
                        index,
                        input: job.input.clone(),
                    });
                    let event = match converter.convert_file(&job.input, job.target) {
                        Ok(result) => BatchEvent::Finished {
                            index,
                            result: Box::new(result),
                        },
                        Err(error) => BatchEvent::Failed {
                            index,
                            input: job.input,
                            error,
                        },
                    };
                    let _ = sender.send(event);
                });
        });

        receiver
    }
}
