// Detection worker pool: fans one grayscale frame out to every classifier
// and gathers the face lists back in classifier-definition order.

use crate::pipeline::detection::{CascadeDetector, DetectorParams, FaceDetector, FrameDetector};
use crate::run_context::ClassifierSpec;
use anyhow::{anyhow, Context, Result};
use crossbeam::channel::{self, Receiver, Sender};
use opencv::core::{Mat, Rect};
use std::thread::JoinHandle;

/// One classifier assigned to a worker thread.
struct AssignedClassifier {
    slot: usize,
    label: String,
    detector: Box<dyn FaceDetector>,
}

/// Result of running one classifier against one frame.
struct TaskResult {
    slot: usize,
    faces: Result<Vec<Rect>>,
}

/// Fixed pool of detection workers, created once and reused for every frame.
///
/// Classifier handles are distributed round-robin across the workers at spawn
/// and live on their worker thread for the whole session. Per frame the pool
/// fans out one task per classifier and blocks until all of them have
/// reported back; tasks share no mutable state (each receives its own copy of
/// the grayscale projection), so the only coordination is the channel pair.
pub struct DetectorPool {
    job_txs: Vec<Sender<Mat>>,
    results_rx: Receiver<TaskResult>,
    handles: Vec<JoinHandle<()>>,
    classifier_count: usize,
}

impl DetectorPool {
    /// Spawns `worker_count` threads and loads each cascade on the thread
    /// that will run it. Fails if any definition fails to load.
    pub fn spawn(
        specs: &[ClassifierSpec],
        params: DetectorParams,
        worker_count: usize,
    ) -> Result<Self> {
        if specs.is_empty() {
            anyhow::bail!("Detector pool needs at least one classifier");
        }
        let worker_count = worker_count.clamp(1, specs.len());

        let (result_tx, results_rx) = channel::unbounded::<TaskResult>();
        let (ready_tx, ready_rx) = channel::bounded::<Result<String>>(specs.len());

        let mut job_txs = Vec::with_capacity(worker_count);
        let mut handles = Vec::with_capacity(worker_count);

        for assigned in assign_round_robin(specs, worker_count) {
            let (tx, rx) = channel::bounded::<Mat>(1);
            let result_tx = result_tx.clone();
            let ready_tx = ready_tx.clone();

            let handle = std::thread::spawn(move || {
                // Each worker loads its own cascades inside the thread
                let mut detectors = Vec::with_capacity(assigned.len());
                for (slot, spec) in assigned {
                    match CascadeDetector::open(&spec.path, params) {
                        Ok(detector) => {
                            if ready_tx.send(Ok(spec.label.clone())).is_err() {
                                return;
                            }
                            detectors.push(AssignedClassifier {
                                slot,
                                label: spec.label,
                                detector: Box::new(detector),
                            });
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    }
                }
                drop(ready_tx);
                detection_worker(rx, result_tx, detectors);
            });

            job_txs.push(tx);
            handles.push(handle);
        }
        drop(result_tx);
        drop(ready_tx);

        // Block until every cascade is loaded so a bad definition fails the
        // run at startup instead of on the first frame.
        for _ in 0..specs.len() {
            let label = ready_rx
                .recv()
                .context("Detection worker exited before loading its cascades")??;
            tracing::info!("Loaded cascade classifier '{}'", label);
        }

        tracing::info!(
            "Detection pool ready: {} classifiers across {} workers",
            specs.len(),
            worker_count
        );

        Ok(Self {
            job_txs,
            results_rx,
            handles,
            classifier_count: specs.len(),
        })
    }
}

impl FrameDetector for DetectorPool {
    /// Fans the frame out to every worker and gathers one face list per
    /// classifier, reassembled in definition order regardless of completion
    /// order. Any classifier error aborts the frame.
    fn detect_all(&mut self, gray: &Mat) -> Result<Vec<Vec<Rect>>> {
        for tx in &self.job_txs {
            tx.send(gray.clone())
                .map_err(|_| anyhow!("Detection worker is no longer running"))?;
        }
        gather_in_order(&self.results_rx, self.classifier_count)
    }
}

impl Drop for DetectorPool {
    fn drop(&mut self) {
        // Closing the job channels ends the worker loops
        self.job_txs.clear();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Distributes classifiers across workers, keeping their definition slots.
fn assign_round_robin(
    specs: &[ClassifierSpec],
    worker_count: usize,
) -> Vec<Vec<(usize, ClassifierSpec)>> {
    let mut assignments: Vec<Vec<(usize, ClassifierSpec)>> = vec![Vec::new(); worker_count];
    for (slot, spec) in specs.iter().enumerate() {
        assignments[slot % worker_count].push((slot, spec.clone()));
    }
    assignments
}

/// Worker loop: for every incoming frame, run each assigned classifier in
/// slot order and report one result per classifier.
fn detection_worker(
    rx: Receiver<Mat>,
    tx: Sender<TaskResult>,
    mut detectors: Vec<AssignedClassifier>,
) {
    for gray in rx {
        for assigned in detectors.iter_mut() {
            let faces = assigned
                .detector
                .detect(&gray)
                .with_context(|| format!("Classifier '{}' failed", assigned.label));
            if tx
                .send(TaskResult {
                    slot: assigned.slot,
                    faces,
                })
                .is_err()
            {
                return; // Pool torn down
            }
        }
    }
}

/// Collects exactly one result per classifier slot and restores definition
/// order.
fn gather_in_order(rx: &Receiver<TaskResult>, count: usize) -> Result<Vec<Vec<Rect>>> {
    let mut gathered: Vec<Option<Vec<Rect>>> = vec![None; count];
    for _ in 0..count {
        let result = rx
            .recv()
            .context("Detection workers disconnected mid-frame")?;
        gathered[result.slot] = Some(result.faces?);
    }
    gathered
        .into_iter()
        .enumerate()
        .map(|(slot, faces)| faces.ok_or_else(|| anyhow!("No result for classifier slot {}", slot)))
        .collect()
}
