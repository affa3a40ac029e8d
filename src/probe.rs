//! Bank length discovery
//!
//! Tags do not advertise how many words their TID and User banks hold.
//! The prober binary-searches the largest word count that reads back
//! without a memory overrun, leaving the data of the largest successful
//! read in the tag record.

use log::{debug, warn};

use crate::config::ProbeConfig;
use crate::reader::UhfModule;
use crate::tag::TagRecord;
use crate::transport::RfidTransport;
use crate::types::{MemoryBank, ReadOutcome, UhfError};

/// Something that can read a number of words from a tag bank.
pub trait BankReader {
    fn read_words(
        &mut self,
        tag: &mut TagRecord,
        bank: MemoryBank,
        access_password: u32,
        word_count: u16,
    ) -> Result<ReadOutcome, UhfError>;
}

impl<T: RfidTransport> BankReader for UhfModule<T> {
    fn read_words(
        &mut self,
        tag: &mut TagRecord,
        bank: MemoryBank,
        access_password: u32,
        word_count: u16,
    ) -> Result<ReadOutcome, UhfError> {
        self.read_bank(tag, bank, access_password, word_count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The search bracket closed
    Converged,
    /// The retry budget ran out before the bracket closed
    Inconclusive,
    /// Cancelled between probes
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub outcome: ProbeOutcome,
    /// Largest word count that read back successfully
    pub best_words: Option<u16>,
    /// Reads issued
    pub probes: u32,
}

pub struct BankLengthProber {
    config: ProbeConfig,
}

impl BankLengthProber {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Search the readable length of `bank`.
    ///
    /// `cancelled` is checked before every read. Failed reads, whether the
    /// tag did not answer or the exchange itself failed, use up the retry
    /// budget and repeat the same word count.
    pub fn probe<R: BankReader + ?Sized>(
        &self,
        reader: &mut R,
        tag: &mut TagRecord,
        bank: MemoryBank,
        access_password: u32,
        cancelled: &dyn Fn() -> bool,
    ) -> ProbeReport {
        let mut low = self.config.word_low;
        let mut high = self.config.word_high;
        let mut retries = self.config.retries;
        let mut best = None;
        let mut probes = 0;

        let report = |outcome, best, probes| ProbeReport {
            outcome,
            best_words: best,
            probes,
        };

        loop {
            if cancelled() {
                debug!("{:?} probe cancelled after {} reads", bank, probes);
                return report(ProbeOutcome::Aborted, best, probes);
            }
            if low >= high {
                debug!("{:?} bank holds {:?} words ({} reads)", bank, best, probes);
                return report(ProbeOutcome::Converged, best, probes);
            }

            let words = low + (high - low) / 2;
            probes += 1;

            match reader.read_words(tag, bank, access_password, words) {
                Ok(ReadOutcome::Success) => {
                    best = Some(words);
                    low = words + 1;
                }
                Ok(ReadOutcome::MemoryOverrun) => {
                    high = words.saturating_sub(1);
                }
                failed => {
                    warn!("{:?} probe of {} words failed: {:?}", bank, words, failed);
                    retries = retries.saturating_sub(1);
                    if retries == 0 {
                        warn!("{:?} probe out of retries, best so far {:?}", bank, best);
                        return report(ProbeOutcome::Inconclusive, best, probes);
                    }
                }
            }
        }
    }
}
