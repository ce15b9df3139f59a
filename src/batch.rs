//! Resumable batch geocoding
//!
//! A run starts in one of three ways: from scratch, continuing after the
//! records already present in the previous output, or re-trying only the
//! records the previous output could not geocode. Records are then processed
//! one at a time and the accumulated output is checkpointed every
//! `checkpoint_interval` records and once more at the end.

use std::fmt;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::geocode::Geocoder;
use crate::models::{LocationRecord, RunSummary};
use crate::store::RecordStore;
use crate::{GeocoderError, Result};

/// Default number of processed records between checkpoints
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 10;

/// Lifecycle of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No usable previous output, or a restart was requested
    Fresh,
    /// Previous output exists and the caller must choose between continuing and restarting
    ResumePrompt,
    /// Keep previous output and process the input tail after it
    Resuming,
    /// Keep geocoded records and requeue the ones without coordinates
    RetryFailed,
    /// Looking up the pending records
    Running,
    /// Final output written
    Done,
}

impl RunState {
    /// Starting state derived from what is on disk and the retry flag
    #[must_use]
    pub fn initial(has_prior: bool, retry: bool) -> Self {
        match (has_prior, retry) {
            (false, _) => Self::Fresh,
            (true, true) => Self::RetryFailed,
            (true, false) => Self::ResumePrompt,
        }
    }

    /// Apply the caller's choice to a pending prompt; other states are unchanged
    #[must_use]
    pub fn resolve(self, decision: ResumeDecision) -> Self {
        match (self, decision) {
            (Self::ResumePrompt, ResumeDecision::Continue) => Self::Resuming,
            (Self::ResumePrompt, ResumeDecision::Restart) => Self::Fresh,
            (state, _) => state,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fresh => "fresh",
            Self::ResumePrompt => "resume-prompt",
            Self::Resuming => "resuming",
            Self::RetryFailed => "retry-failed",
            Self::Running => "running",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Answer to "continue from where it stopped?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDecision {
    Continue,
    Restart,
}

/// What a run starts with and what it still has to look up
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    /// State the run was planned from
    pub state: RunState,
    /// Records carried over unchanged into the output
    pub results: Vec<LocationRecord>,
    /// Records to geocode, in order
    pub pending: Vec<LocationRecord>,
    /// Position of the first pending record, for progress display
    pub start_index: usize,
    /// Number of input records
    pub total: usize,
}

impl BatchPlan {
    /// Decide which records remain to be processed.
    ///
    /// `decide` is only consulted when previous output exists and `retry` is
    /// off; it receives the counts of that output.
    pub fn build<F>(
        input: Vec<LocationRecord>,
        prior: Option<Vec<LocationRecord>>,
        retry: bool,
        decide: F,
    ) -> Self
    where
        F: FnOnce(&RunSummary) -> ResumeDecision,
    {
        let prior = prior.filter(|records| !records.is_empty());
        let total = input.len();

        let mut state = RunState::initial(prior.is_some(), retry);
        if state == RunState::ResumePrompt {
            let summary = prior
                .as_deref()
                .map(RunSummary::from_records)
                .unwrap_or_default();
            state = state.resolve(decide(&summary));
        }

        match (state, prior) {
            (RunState::Resuming, Some(prior)) => {
                let start_index = prior.len();
                let pending = input.into_iter().skip(start_index).collect();
                Self {
                    state,
                    results: prior,
                    pending,
                    start_index,
                    total,
                }
            }
            (RunState::RetryFailed, Some(prior)) => {
                let (results, failed): (Vec<_>, Vec<_>) =
                    prior.into_iter().partition(LocationRecord::is_geocoded);
                info!("Keeping {} successful cities", results.len());
                info!("Retrying {} failed cities", failed.len());
                Self {
                    state,
                    start_index: results.len(),
                    results,
                    pending: failed,
                    total,
                }
            }
            _ => Self {
                state: RunState::Fresh,
                results: Vec::new(),
                pending: input,
                start_index: 0,
                total,
            },
        }
    }
}

/// Drives lookups for a plan and checkpoints the results
pub struct BatchProcessor<G, S> {
    geocoder: G,
    store: S,
    output_path: PathBuf,
    checkpoint_interval: usize,
    state: RunState,
}

impl<G: Geocoder, S: RecordStore> BatchProcessor<G, S> {
    pub fn new(geocoder: G, store: S, output_path: impl Into<PathBuf>) -> Self {
        Self {
            geocoder,
            store,
            output_path: output_path.into(),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            state: RunState::Fresh,
        }
    }

    /// Save every `interval` processed records; zero is treated as one
    #[must_use]
    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval.max(1);
        self
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn geocoder(&self) -> &G {
        &self.geocoder
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Geocode every pending record, then write the final output.
    ///
    /// Checkpoint failures are logged and the run continues; a failed final
    /// save is returned as an error.
    pub async fn run(&mut self, plan: BatchPlan) -> Result<RunSummary> {
        self.state = plan.state;
        info!("Starting {} run", self.state);

        let BatchPlan {
            mut results,
            pending,
            start_index,
            total,
            ..
        } = plan;

        info!("Processing {} locations...", pending.len());
        self.state = RunState::Running;

        for (i, record) in pending.into_iter().enumerate() {
            let index = start_index + i + 1;
            info!("[{}/{}] Processing: {}", index, total, record.display_name);
            debug!("Province: {}", record.province);

            let outcome = self
                .geocoder
                .lookup(&record.api_name, &record.province)
                .await;
            let record = record.with_coordinates(outcome.coordinates());

            match record.coordinates {
                Some(coordinates) => info!("Found: {}", coordinates),
                None => info!("Not found - coordinates set to null"),
            }
            results.push(record);

            if (i + 1) % self.checkpoint_interval == 0 {
                self.checkpoint(&results, total);
            }
        }

        self.state = RunState::Done;
        self.store
            .save(&self.output_path, &results)
            .map_err(|e| GeocoderError::storage(format!("Error saving final results: {e}")))?;

        Ok(RunSummary::from_records(&results))
    }

    fn checkpoint(&self, results: &[LocationRecord], total: usize) {
        match self.store.save(&self.output_path, results) {
            Ok(()) => {
                let summary = RunSummary::from_records(results);
                info!(
                    "Progress saved ({}/{}) - Success rate: {:.1}%",
                    results.len(),
                    total,
                    summary.success_rate()
                );
            }
            Err(e) => warn!("Error saving progress: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::GeocodeOutcome;
    use crate::models::Coordinates;
    use async_trait::async_trait;
    use rstest::rstest;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    /// Answers from a fixed table and records every query
    #[derive(Default)]
    struct ScriptedGeocoder {
        answers: HashMap<String, Coordinates>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedGeocoder {
        fn answering(pairs: &[(&str, f64, f64)]) -> Self {
            Self {
                answers: pairs
                    .iter()
                    .map(|(name, lat, lon)| (name.to_string(), Coordinates::new(*lat, *lon)))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Geocoder for ScriptedGeocoder {
        async fn lookup(&self, api_name: &str, _province: &str) -> GeocodeOutcome {
            self.calls.lock().unwrap().push(api_name.to_string());
            match self.answers.get(api_name) {
                Some(coordinates) => GeocodeOutcome::Found {
                    coordinates: *coordinates,
                    display_name: api_name.to_string(),
                    kind: "city".to_string(),
                },
                None => GeocodeOutcome::NotFound,
            }
        }
    }

    /// Keeps every saved snapshot; selected save calls (0-based) fail
    #[derive(Default)]
    struct MemoryStore {
        saves: Mutex<Vec<Vec<LocationRecord>>>,
        failing_calls: Vec<usize>,
        calls: Mutex<usize>,
    }

    impl MemoryStore {
        fn failing(calls: &[usize]) -> Self {
            Self {
                failing_calls: calls.to_vec(),
                ..Self::default()
            }
        }

        fn snapshot_lengths(&self) -> Vec<usize> {
            self.saves.lock().unwrap().iter().map(Vec::len).collect()
        }

        fn last(&self) -> Vec<LocationRecord> {
            self.saves.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    impl RecordStore for MemoryStore {
        fn load(&self, _path: &Path) -> Result<Vec<LocationRecord>> {
            Ok(self.last())
        }

        fn save(&self, _path: &Path, records: &[LocationRecord]) -> Result<()> {
            let mut calls = self.calls.lock().unwrap();
            let call = *calls;
            *calls += 1;
            if self.failing_calls.contains(&call) {
                return Err(GeocoderError::storage("disk full"));
            }
            self.saves.lock().unwrap().push(records.to_vec());
            Ok(())
        }
    }

    fn cities(n: usize) -> Vec<LocationRecord> {
        (1..=n)
            .map(|i| LocationRecord::new(format!("Kota {i}"), format!("City {i}"), "Jawa Barat"))
            .collect()
    }

    fn geocoded(record: &LocationRecord, lat: f64, lon: f64) -> LocationRecord {
        record
            .clone()
            .with_coordinates(Some(Coordinates::new(lat, lon)))
    }

    fn never_asked(_: &RunSummary) -> ResumeDecision {
        panic!("resume decision should not be requested")
    }

    fn processor(
        geocoder: ScriptedGeocoder,
        store: MemoryStore,
    ) -> BatchProcessor<ScriptedGeocoder, MemoryStore> {
        BatchProcessor::new(geocoder, store, "cities_with_coordinates.json")
    }

    #[rstest]
    #[case(false, false, RunState::Fresh)]
    #[case(false, true, RunState::Fresh)]
    #[case(true, true, RunState::RetryFailed)]
    #[case(true, false, RunState::ResumePrompt)]
    fn test_initial_state(#[case] has_prior: bool, #[case] retry: bool, #[case] expected: RunState) {
        assert_eq!(RunState::initial(has_prior, retry), expected);
    }

    #[test]
    fn test_prompt_resolution() {
        assert_eq!(
            RunState::ResumePrompt.resolve(ResumeDecision::Continue),
            RunState::Resuming
        );
        assert_eq!(
            RunState::ResumePrompt.resolve(ResumeDecision::Restart),
            RunState::Fresh
        );
        assert_eq!(
            RunState::RetryFailed.resolve(ResumeDecision::Restart),
            RunState::RetryFailed
        );
    }

    #[test]
    fn test_plan_fresh_without_prior() {
        let plan = BatchPlan::build(cities(3), None, false, never_asked);
        assert_eq!(plan.state, RunState::Fresh);
        assert!(plan.results.is_empty());
        assert_eq!(plan.pending, cities(3));
        assert_eq!(plan.total, 3);
    }

    #[test]
    fn test_plan_empty_prior_is_fresh() {
        let plan = BatchPlan::build(cities(3), Some(Vec::new()), true, never_asked);
        assert_eq!(plan.state, RunState::Fresh);
        assert_eq!(plan.pending.len(), 3);
    }

    #[test]
    fn test_plan_resume_continue() {
        let input = cities(5);
        let prior = vec![geocoded(&input[0], 1.0, 2.0), input[1].clone()];

        let plan = BatchPlan::build(input.clone(), Some(prior.clone()), false, |summary| {
            assert_eq!(summary.total, 2);
            assert_eq!(summary.successful, 1);
            ResumeDecision::Continue
        });

        assert_eq!(plan.state, RunState::Resuming);
        assert_eq!(plan.results, prior);
        assert_eq!(plan.pending, input[2..].to_vec());
        assert_eq!(plan.start_index, 2);
    }

    #[test]
    fn test_plan_resume_restart_discards_prior() {
        let input = cities(3);
        let prior = vec![geocoded(&input[0], 1.0, 2.0)];

        let plan = BatchPlan::build(input.clone(), Some(prior), false, |_| ResumeDecision::Restart);
        assert_eq!(plan.state, RunState::Fresh);
        assert!(plan.results.is_empty());
        assert_eq!(plan.pending, input);
    }

    #[test]
    fn test_plan_resume_prior_longer_than_input() {
        let plan = BatchPlan::build(cities(2), Some(cities(4)), false, |_| ResumeDecision::Continue);
        assert!(plan.pending.is_empty());
        assert_eq!(plan.results.len(), 4);
    }

    #[test]
    fn test_plan_retry_partitions() {
        let input = cities(3);
        let prior = vec![
            geocoded(&input[0], 1.0, 2.0),
            input[1].clone(),
            geocoded(&input[2], 3.0, 4.0),
        ];

        let plan = BatchPlan::build(input.clone(), Some(prior), true, never_asked);
        assert_eq!(plan.state, RunState::RetryFailed);
        assert_eq!(
            plan.results,
            vec![geocoded(&input[0], 1.0, 2.0), geocoded(&input[2], 3.0, 4.0)]
        );
        assert_eq!(plan.pending, vec![input[1].clone()]);
        assert_eq!(plan.total, 3);
    }

    #[tokio::test]
    async fn test_not_found_written_as_null() {
        let input = vec![LocationRecord::new("Kota Bandung", "Bandung", "Jawa Barat")];
        let plan = BatchPlan::build(input.clone(), None, false, never_asked);

        let mut processor = processor(ScriptedGeocoder::default(), MemoryStore::default());
        let summary = processor.run(plan).await.unwrap();

        assert_eq!(processor.store().last(), input);
        assert_eq!(summary.failed, 1);
        assert_eq!(processor.state(), RunState::Done);
    }

    #[tokio::test]
    async fn test_found_written_as_numbers() {
        let input = vec![LocationRecord::new("Kota Bandung", "Bandung", "Jawa Barat")];
        let plan = BatchPlan::build(input.clone(), None, false, never_asked);

        let geocoder = ScriptedGeocoder::answering(&[("Kota Bandung", -6.9, 107.6)]);
        let mut processor = processor(geocoder, MemoryStore::default());
        let summary = processor.run(plan).await.unwrap();

        assert_eq!(processor.store().last(), vec![geocoded(&input[0], -6.9, 107.6)]);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.success_rate(), 100.0);
    }

    #[rstest]
    #[case(9, vec![9])]
    #[case(10, vec![10, 10])]
    #[case(25, vec![10, 20, 25])]
    #[tokio::test]
    async fn test_checkpoint_cadence(#[case] n: usize, #[case] expected: Vec<usize>) {
        let plan = BatchPlan::build(cities(n), None, false, never_asked);
        let mut processor = processor(ScriptedGeocoder::default(), MemoryStore::default());
        processor.run(plan).await.unwrap();

        assert_eq!(processor.store().snapshot_lengths(), expected);
    }

    #[tokio::test]
    async fn test_checkpoint_counts_processed_not_output() {
        let input = cities(8);
        let plan = BatchPlan::build(input.clone(), Some(input[..3].to_vec()), false, |_| {
            ResumeDecision::Continue
        });

        let mut processor =
            processor(ScriptedGeocoder::default(), MemoryStore::default()).with_checkpoint_interval(2);
        processor.run(plan).await.unwrap();

        // 5 processed after 3 carried over: saves after the 2nd and 4th, then final
        assert_eq!(processor.store().snapshot_lengths(), vec![5, 7, 8]);
    }

    #[tokio::test]
    async fn test_checkpoint_failure_does_not_stop_run() {
        let plan = BatchPlan::build(cities(12), None, false, never_asked);
        let mut processor = processor(ScriptedGeocoder::default(), MemoryStore::failing(&[0]));
        let summary = processor.run(plan).await.unwrap();

        assert_eq!(summary.total, 12);
        assert_eq!(processor.geocoder().calls().len(), 12);
        assert_eq!(processor.store().snapshot_lengths(), vec![12]);
    }

    #[tokio::test]
    async fn test_final_save_failure_is_error() {
        let plan = BatchPlan::build(cities(3), None, false, never_asked);
        let mut processor = processor(ScriptedGeocoder::default(), MemoryStore::failing(&[0]));
        let err = processor.run(plan).await.unwrap_err();

        assert!(matches!(err, GeocoderError::Storage { .. }));
        assert!(err.to_string().contains("Error saving final results"));
    }

    #[tokio::test]
    async fn test_resume_when_complete_is_idempotent() {
        let input = cities(4);
        let prior = vec![
            geocoded(&input[0], 1.0, 1.0),
            input[1].clone(),
            geocoded(&input[2], 3.0, 3.0),
            input[3].clone(),
        ];
        let plan = BatchPlan::build(input, Some(prior.clone()), false, |_| ResumeDecision::Continue);

        let mut processor = processor(ScriptedGeocoder::default(), MemoryStore::default());
        let summary = processor.run(plan).await.unwrap();

        assert!(processor.geocoder().calls().is_empty());
        assert_eq!(processor.store().last(), prior);
        assert_eq!(summary.total, 4);
    }

    #[tokio::test]
    async fn test_retry_only_looks_up_failed() {
        let input = cities(3);
        let prior = vec![
            geocoded(&input[0], 1.0, 1.0),
            input[1].clone(),
            geocoded(&input[2], 3.0, 3.0),
        ];
        let plan = BatchPlan::build(input.clone(), Some(prior), true, never_asked);

        let geocoder = ScriptedGeocoder::answering(&[("Kota 2", 2.0, 2.0), ("Kota 1", 9.0, 9.0)]);
        let mut processor = processor(geocoder, MemoryStore::default());
        let summary = processor.run(plan).await.unwrap();

        assert_eq!(processor.geocoder().calls(), vec!["Kota 2"]);
        assert_eq!(
            processor.store().last(),
            vec![
                geocoded(&input[0], 1.0, 1.0),
                geocoded(&input[2], 3.0, 3.0),
                geocoded(&input[1], 2.0, 2.0),
            ]
        );
        assert_eq!(summary.total, 3);
        assert_eq!(summary.successful, 3);
    }

    #[tokio::test]
    async fn test_every_output_record_keeps_coordinate_pairs() {
        let input = cities(6);
        let plan = BatchPlan::build(input, None, false, never_asked);
        let geocoder = ScriptedGeocoder::answering(&[("Kota 2", 2.0, 2.5), ("Kota 5", 5.0, 5.5)]);

        let mut processor = processor(geocoder, MemoryStore::default());
        processor.run(plan).await.unwrap();

        let json = serde_json::to_value(processor.store().last()).unwrap();
        for record in json.as_array().unwrap() {
            assert_eq!(record["lat"].is_null(), record["lon"].is_null());
        }
    }
}
