//! Background runner for the tag use cases
//!
//! A [`UhfWorker`] owns the driver and runs one use case at a time on its own
//! thread. The caller never blocks: it starts a task, may request a stop,
//! and receives exactly one completion callback per start.

use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::config::{WorkerConfig, WriteMask};
use crate::probe::{BankLengthProber, ProbeOutcome};
use crate::reader::{UhfModule, EPC_PC_WORD_ADDRESS};
use crate::tag::TagRecord;
use crate::transport::RfidTransport;
use crate::types::{MemoryBank, UhfError};

/// Access password used for tags that were never secured.
const DEFAULT_ACCESS_PASSWORD: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    None = 0,
    /// Last module check failed
    Broken = 1,
    Ready = 2,
    Verify = 3,
    DetectSingle = 4,
    WriteSingle = 5,
    WriteKey = 6,
    /// Stop requested by the owner
    Stop = 7,
}

impl From<u8> for WorkerState {
    fn from(value: u8) -> Self {
        match value {
            1 => WorkerState::Broken,
            2 => WorkerState::Ready,
            3 => WorkerState::Verify,
            4 => WorkerState::DetectSingle,
            5 => WorkerState::WriteSingle,
            6 => WorkerState::WriteKey,
            7 => WorkerState::Stop,
            _ => WorkerState::None,
        }
    }
}

/// Use case to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerTask {
    /// Check that a module answers with its version strings
    Verify,
    /// Wait for a tag and read its TID and User banks
    DetectSingle,
    /// Copy the banks selected by the write mask from a captured tag
    WriteSingle(TagRecord),
    /// Copy the kill and access passwords from a captured tag
    WriteKey(TagRecord),
}

impl WorkerTask {
    fn state(&self) -> WorkerState {
        match self {
            WorkerTask::Verify => WorkerState::Verify,
            WorkerTask::DetectSingle => WorkerState::DetectSingle,
            WorkerTask::WriteSingle(_) => WorkerState::WriteSingle,
            WorkerTask::WriteKey(_) => WorkerState::WriteKey,
        }
    }
}

/// Completion reported to the callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerEvent {
    Success,
    Fail,
    /// Polling gave up without seeing a tag
    NoTagDetected,
    /// Stopped by the owner
    Aborted,
    /// The destination already carries the source EPC
    CardDetected,
}

pub struct UhfWorker<T: RfidTransport + Send + 'static> {
    module: Arc<Mutex<UhfModule<T>>>,
    state: Arc<AtomicU8>,
    config: WorkerConfig,
    handle: Option<JoinHandle<()>>,
}

impl<T: RfidTransport + Send + 'static> UhfWorker<T> {
    pub fn new(module: UhfModule<T>, config: WorkerConfig) -> Self {
        Self {
            module: Arc::new(Mutex::new(module)),
            state: Arc::new(AtomicU8::new(WorkerState::None as u8)),
            config,
            handle: None,
        }
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from(self.state.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Shared handle to the driver, for direct operations between runs.
    ///
    /// Locking it while a run is active blocks until the run finishes.
    pub fn module(&self) -> Arc<Mutex<UhfModule<T>>> {
        Arc::clone(&self.module)
    }

    /// Run `task` on the worker thread.
    ///
    /// `callback` is invoked exactly once, on the worker thread, with the
    /// outcome and the tag involved (the read tag, or the destination as it
    /// was polled).
    pub fn start<F>(&mut self, task: WorkerTask, callback: F) -> Result<(), UhfError>
    where
        F: FnOnce(WorkerEvent, Option<TagRecord>) + Send + 'static,
    {
        if self.is_running() {
            return Err(UhfError::WorkerBusy);
        }
        if let Some(finished) = self.handle.take() {
            join_run(finished);
        }

        let task_state = task.state();
        self.state.store(task_state as u8, Ordering::SeqCst);
        info!("Worker starting {:?}", task_state);

        let run = Run {
            module: Arc::clone(&self.module),
            state: Arc::clone(&self.state),
            config: self.config.clone(),
        };

        self.handle = Some(thread::spawn(move || {
            let (event, tag) = run.execute(task);
            let next = match (task_state, event) {
                (WorkerState::Verify, WorkerEvent::Fail) => WorkerState::Broken,
                _ => WorkerState::Ready,
            };
            // A stop request keeps the state at Stop
            let _ = run.state.compare_exchange(
                task_state as u8,
                next as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            info!("Worker finished {:?}: {:?}", task_state, event);
            callback(event, tag);
        }));
        Ok(())
    }

    /// Ask the current run to stop and return at once.
    ///
    /// The run notices the request between module exchanges and then
    /// reports `Aborted` through its callback.
    pub fn request_stop(&self) {
        self.state.store(WorkerState::Stop as u8, Ordering::SeqCst);
    }

    /// Request a stop and wait for the current run to report.
    ///
    /// Blocks for up to about one response timeout. Use
    /// [`UhfWorker::request_stop`] from threads that must not block.
    pub fn stop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            join_run(handle);
        }
    }
}

fn join_run(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        error!("Worker thread panicked");
    }
}

impl<T: RfidTransport + Send + 'static> Drop for UhfWorker<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything one run needs, moved onto the worker thread.
struct Run<T: RfidTransport> {
    module: Arc<Mutex<UhfModule<T>>>,
    state: Arc<AtomicU8>,
    config: WorkerConfig,
}

type Outcome = (WorkerEvent, Option<TagRecord>);

impl<T: RfidTransport> Run<T> {
    fn stopped(&self) -> bool {
        self.state.load(Ordering::SeqCst) == WorkerState::Stop as u8
    }

    fn lock(&self) -> MutexGuard<'_, UhfModule<T>> {
        self.module.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn execute(&self, task: WorkerTask) -> Outcome {
        let mut module = self.lock();
        let result = match task {
            WorkerTask::Verify => self.verify(&mut module),
            WorkerTask::DetectSingle => self.detect_single(&mut module),
            WorkerTask::WriteSingle(source) => {
                let banks = write_banks(&self.config.write_mask);
                self.write_tag(&mut module, &source, &banks)
            }
            WorkerTask::WriteKey(source) => {
                self.write_tag(&mut module, &source, &[MemoryBank::Reserved])
            }
        };
        result.unwrap_or_else(|event| (event, None))
    }

    fn verify(&self, module: &mut UhfModule<T>) -> Result<Outcome, WorkerEvent> {
        let queries: [(&str, fn(&mut UhfModule<T>) -> Result<String, UhfError>); 3] = [
            ("hardware", UhfModule::get_hardware_version),
            ("software", UhfModule::get_software_version),
            ("manufacturer", UhfModule::get_manufacturer),
        ];

        for (what, query) in queries {
            if self.stopped() {
                return Err(WorkerEvent::Aborted);
            }
            match query(module) {
                Ok(text) if !text.is_empty() => info!("Module {}: {}", what, text),
                Ok(_) => {
                    warn!("Module returned empty {} string", what);
                    return Err(WorkerEvent::Fail);
                }
                Err(e) => {
                    warn!("Module {} query failed: {}", what, e);
                    return Err(WorkerEvent::Fail);
                }
            }
        }
        Ok((WorkerEvent::Success, None))
    }

    fn detect_single(&self, module: &mut UhfModule<T>) -> Result<Outcome, WorkerEvent> {
        let mut tag = self.poll_for_tag(module)?;
        info!("Detected tag {}", tag.epc_hex());

        self.retry("select", || module.set_select(&tag))?;

        let prober = BankLengthProber::new(self.config.probe);
        let cancelled = || self.stopped();
        for bank in [MemoryBank::Tid, MemoryBank::User] {
            let report =
                prober.probe(&mut *module, &mut tag, bank, DEFAULT_ACCESS_PASSWORD, &cancelled);
            match report.outcome {
                ProbeOutcome::Aborted => return Err(WorkerEvent::Aborted),
                ProbeOutcome::Inconclusive => warn!(
                    "{:?} length unconfirmed, keeping {:?} words",
                    bank, report.best_words
                ),
                ProbeOutcome::Converged => {}
            }
        }

        Ok((WorkerEvent::Success, Some(tag)))
    }

    fn write_tag(
        &self,
        module: &mut UhfModule<T>,
        source: &TagRecord,
        banks: &[MemoryBank],
    ) -> Result<Outcome, WorkerEvent> {
        let destination = self.poll_for_tag(module)?;
        if destination.same_epc(source) {
            info!("Tag {} already carries the source EPC", destination.epc_hex());
            return Ok((WorkerEvent::CardDetected, Some(destination)));
        }

        for &bank in banks {
            if source.bank_data(bank).is_empty() {
                debug!("Source {:?} bank empty, skipping", bank);
                continue;
            }
            let word_address = match bank {
                MemoryBank::Epc => EPC_PC_WORD_ADDRESS,
                _ => 0,
            };
            self.retry("write", || {
                module.write_bank(
                    source,
                    &destination,
                    bank,
                    word_address,
                    DEFAULT_ACCESS_PASSWORD,
                )
            })?;
        }

        Ok((WorkerEvent::Success, Some(destination)))
    }

    fn poll_for_tag(&self, module: &mut UhfModule<T>) -> Result<TagRecord, WorkerEvent> {
        let mut attempts = 0u32;
        loop {
            if self.stopped() {
                return Err(WorkerEvent::Aborted);
            }
            if self.config.max_poll_attempts.is_some_and(|max| attempts >= max) {
                info!("No tag after {} polls", attempts);
                return Err(WorkerEvent::NoTagDetected);
            }
            attempts += 1;

            match module.single_poll() {
                Ok(Some(tag)) => return Ok(tag),
                Ok(None) => {}
                Err(UhfError::Module(status)) => {
                    error!("Module rejected poll: {}", status);
                    return Err(WorkerEvent::Fail);
                }
                Err(e) => debug!("Poll {} failed: {}", attempts, e),
            }

            if !self.config.poll_interval.is_zero() {
                thread::sleep(self.config.poll_interval);
            }
        }
    }

    fn retry<R>(
        &self,
        what: &str,
        mut op: impl FnMut() -> Result<R, UhfError>,
    ) -> Result<R, WorkerEvent> {
        let attempts = self.config.write_retries.max(1);
        for attempt in 1..=attempts {
            if self.stopped() {
                return Err(WorkerEvent::Aborted);
            }
            match op() {
                Ok(value) => return Ok(value),
                Err(e) => warn!("{} attempt {}/{} failed: {}", what, attempt, attempts, e),
            }
        }
        error!("Giving up on {}", what);
        Err(WorkerEvent::Fail)
    }
}

/// Banks to copy, EPC last since rewriting it changes what the select matches.
fn write_banks(mask: &WriteMask) -> Vec<MemoryBank> {
    [
        (mask.user, MemoryBank::User),
        (mask.tid, MemoryBank::Tid),
        (mask.epc, MemoryBank::Epc),
    ]
    .into_iter()
    .filter_map(|(enabled, bank)| enabled.then_some(bank))
    .collect()
}
