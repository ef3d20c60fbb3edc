//! Drives videos through transcript, model, parser and store.
//!
//! Runs strictly one video at a time. Only listing is allowed to fail the
//! run; anything that goes wrong for a single video is logged with its id and
//! the loop moves on.

use crate::config::{ExportLayout, PersistPolicy, PipelineConfig};
use crate::core::gate::Gate;
use crate::core::model::Generator;
use crate::core::parser::{ParseIssue, ParseOutcome, parse_response};
use crate::core::playlist::{Video, VideoLister};
use crate::core::prompt::build_prompt;
use crate::core::record::AnalysisRecord;
use crate::core::storage::RecordStore;
use crate::core::transcript::TranscriptSource;
use crate::error::Result;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub pace: Duration,
    pub confirm_before_analysis: bool,
    pub confirm_results: bool,
    pub max_attempts: u32,
    pub persist_policy: PersistPolicy,
    pub export_path: PathBuf,
    pub export_layout: ExportLayout,
}

impl PipelineOptions {
    pub fn new(config: &PipelineConfig, export_path: PathBuf, export_layout: ExportLayout) -> Self {
        Self {
            pace: config.pace(),
            confirm_before_analysis: config.confirm_before_analysis,
            confirm_results: config.confirm_results,
            max_attempts: config.max_attempts.max(1),
            persist_policy: config.persist_policy,
            export_path,
            export_layout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoTranscript,
    Declined,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoOutcome {
    Recorded { record: AnalysisRecord, persisted: bool },
    Skipped(SkipReason),
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub records: Vec<AnalysisRecord>,
    pub persisted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub exported: Option<PathBuf>,
}

pub struct Pipeline<'a> {
    transcripts: &'a dyn TranscriptSource,
    generator: &'a dyn Generator,
    store: &'a RecordStore,
    gate: &'a mut dyn Gate,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        transcripts: &'a dyn TranscriptSource,
        generator: &'a dyn Generator,
        store: &'a RecordStore,
        gate: &'a mut dyn Gate,
        options: PipelineOptions,
    ) -> Self {
        Self {
            transcripts,
            generator,
            store,
            gate,
            options,
        }
    }

    /// Lists the collection once, processes every video in order, then
    /// exports the accumulated records.
    pub async fn run(
        &mut self,
        lister: &dyn VideoLister,
        collection_id: &str,
    ) -> Result<RunSummary> {
        let videos = lister.list_videos(collection_id).await?;
        let mut summary = RunSummary::default();

        if videos.is_empty() {
            println!("No videos found in playlist.");
            return Ok(summary);
        }
        tracing::info!(count = videos.len(), collection_id, "listed videos");

        for (index, video) in videos.iter().enumerate() {
            if index > 0 && !self.options.pace.is_zero() {
                tokio::time::sleep(self.options.pace).await;
            }

            match self.analyze_one(video).await {
                Ok(VideoOutcome::Recorded { record, persisted }) => {
                    if persisted {
                        summary.persisted += 1;
                    }
                    summary.records.push(record);
                }
                Ok(VideoOutcome::Skipped(reason)) => {
                    tracing::info!(video_id = %video.id, ?reason, "skipped video");
                    summary.skipped += 1;
                }
                Err(e) => {
                    tracing::error!(video_id = %video.id, error = %e, "error processing video");
                    summary.failed += 1;
                }
            }
        }

        let export_path = &self.options.export_path;
        match self
            .store
            .export_all(&summary.records, export_path, self.options.export_layout)
        {
            Ok(()) => {
                println!("Results successfully saved to {}", export_path.display());
                summary.exported = Some(export_path.clone());
            }
            Err(e) => {
                tracing::error!(path = %export_path.display(), error = %e, "error exporting results");
            }
        }

        Ok(summary)
    }

    /// Runs one video through fetch, gate, analysis, review and persistence.
    pub async fn analyze_one(&mut self, video: &Video) -> Result<VideoOutcome> {
        println!("\nProcessing video: {}", video.title);

        let Some(transcript) = self.transcripts.transcript(&video.id).await? else {
            println!("No transcript available, skipping...");
            return Ok(VideoOutcome::Skipped(SkipReason::NoTranscript));
        };

        if self.options.confirm_before_analysis
            && !self.gate.confirm(&format!(
                "Proceed with analyzing the transcript for video '{}'?",
                video.title
            ))?
        {
            return Ok(VideoOutcome::Skipped(SkipReason::Declined));
        }

        let prompt = build_prompt(&transcript, Some(&video.title));

        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;
            let outcome = self.analyze(&prompt, &video.id).await;
            print_outcome(&outcome);

            if !self.options.confirm_results
                || self.gate.confirm("Accept this analysis?")?
            {
                break outcome;
            }
            if attempt >= self.options.max_attempts {
                tracing::warn!(
                    video_id = %video.id,
                    attempts = attempt,
                    "analysis rejected on every attempt"
                );
                return Ok(VideoOutcome::Skipped(SkipReason::Rejected));
            }
            tracing::info!(video_id = %video.id, attempt, "re-analyzing");
        };

        let record = outcome
            .picks
            .into_record(video.id.clone(), Some(video.title.clone()));
        let persisted = self.persist(&record);

        Ok(VideoOutcome::Recorded { record, persisted })
    }

    /// Prompt in, parsed picks out. Model failures degrade to empty picks.
    async fn analyze(&self, prompt: &str, video_id: &str) -> ParseOutcome {
        let outcome = match self.generator.generate(prompt).await {
            Ok(raw) => {
                tracing::debug!(video_id, response = %raw, "model response");
                parse_response(&raw)
            }
            Err(e) => ParseOutcome::failed(ParseIssue::ModelCall(e.to_string())),
        };

        if let Some(issue) = &outcome.issue {
            tracing::warn!(video_id, %issue, "analysis produced no usable result");
        }
        outcome
    }

    fn persist(&self, record: &AnalysisRecord) -> bool {
        if self.options.persist_policy == PersistPolicy::RequireEventName
            && record.event_name.is_none()
        {
            tracing::warn!(video_id = %record.video_id, "no event name; not saved to database");
            return false;
        }

        match self.store.upsert(record) {
            Ok(()) => {
                println!("Successfully saved to database");
                true
            }
            Err(e) => {
                tracing::error!(video_id = %record.video_id, error = %e, "error saving to database");
                false
            }
        }
    }
}

fn print_outcome(outcome: &ParseOutcome) {
    println!("Analysis Result:");
    match serde_json::to_string_pretty(&outcome.picks) {
        Ok(json) => println!("{json}"),
        Err(_) => println!("{:?}", outcome.picks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use std::cell::{Cell, RefCell};
    use std::collections::{HashMap, VecDeque};

    struct FakeLister {
        videos: Option<Vec<Video>>,
    }

    #[async_trait(?Send)]
    impl VideoLister for FakeLister {
        async fn list_videos(&self, _collection_id: &str) -> Result<Vec<Video>> {
            self.videos
                .clone()
                .ok_or_else(|| Error::custom("playlist unreachable"))
        }
    }

    #[derive(Default)]
    struct FakeTranscripts {
        texts: HashMap<String, String>,
        broken: Vec<String>,
    }

    #[async_trait(?Send)]
    impl TranscriptSource for FakeTranscripts {
        async fn transcript(&self, video_id: &str) -> Result<Option<String>> {
            if self.broken.iter().any(|id| id == video_id) {
                return Err(Error::custom("caption endpoint exploded"));
            }
            Ok(self.texts.get(video_id).cloned())
        }
    }

    /// Answers keyed by a marker the transcript embeds in the prompt; each
    /// marker has a queue so retries can see a different answer.
    #[derive(Default)]
    struct FakeModel {
        answers: RefCell<HashMap<String, VecDeque<Result<String>>>>,
        calls: Cell<usize>,
    }

    impl FakeModel {
        fn answer(self, marker: &str, reply: &str) -> Self {
            self.answers
                .borrow_mut()
                .entry(marker.to_string())
                .or_default()
                .push_back(Ok(reply.to_string()));
            self
        }

        fn fail(self, marker: &str) -> Self {
            self.answers
                .borrow_mut()
                .entry(marker.to_string())
                .or_default()
                .push_back(Err(Error::custom("quota exceeded")));
            self
        }
    }

    #[async_trait(?Send)]
    impl Generator for FakeModel {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            let mut answers = self.answers.borrow_mut();
            let queue = answers
                .iter_mut()
                .find(|(marker, _)| prompt.contains(marker.as_str()))
                .map(|(_, queue)| queue)
                .ok_or_else(|| Error::custom("unexpected prompt"))?;
            queue
                .pop_front()
                .unwrap_or_else(|| Err(Error::custom("no answer left")))
        }
    }

    struct ScriptedGate {
        answers: VecDeque<bool>,
        asked: Vec<String>,
    }

    impl ScriptedGate {
        fn new(answers: &[bool]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                asked: Vec::new(),
            }
        }
    }

    impl Gate for ScriptedGate {
        fn confirm(&mut self, question: &str) -> Result<bool> {
            self.asked.push(question.to_string());
            self.answers
                .pop_front()
                .ok_or_else(|| Error::custom("gate asked more than scripted"))
        }
    }

    fn video(id: &str) -> Video {
        Video {
            id: id.to_string(),
            title: format!("{id} picks"),
        }
    }

    fn transcripts(pairs: &[(&str, &str)]) -> FakeTranscripts {
        FakeTranscripts {
            texts: pairs
                .iter()
                .map(|(id, text)| (id.to_string(), text.to_string()))
                .collect(),
            broken: Vec::new(),
        }
    }

    fn options(dir: &tempfile::TempDir) -> PipelineOptions {
        PipelineOptions {
            pace: Duration::ZERO,
            confirm_before_analysis: false,
            confirm_results: false,
            max_attempts: 3,
            persist_policy: PersistPolicy::Always,
            export_path: dir.path().join("podcast_analysis.csv"),
            export_layout: ExportLayout::Joined,
        }
    }

    #[tokio::test]
    async fn runs_every_video_and_exports_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open_in_memory().unwrap();
        let lister = FakeLister {
            videos: Some(vec![video("v1"), video("v2"), video("v3")]),
        };
        let source = transcripts(&[("v1", "transcript-one"), ("v3", "transcript-three")]);
        let model = FakeModel::default()
            .answer(
                "transcript-one",
                "```json\n{\"fighters\": [\"Jon Jones\", \"Tom Aspinall \"], \"event_name\": \"UFC 300\"}\n```",
            )
            .answer(
                "transcript-three",
                r#"Sure! {"fighter_picks": [" Alex Pereira"], "event_name": null}"#,
            );
        let mut gate = ScriptedGate::new(&[]);

        let summary = Pipeline::new(&source, &model, &store, &mut gate, options(&dir))
            .run(&lister, "PL123")
            .await
            .unwrap();

        assert_eq!(summary.records.len(), 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.persisted, 2);
        assert_eq!(summary.records[0].fighters, vec!["Jon Jones", "Tom Aspinall"]);
        assert_eq!(summary.records[1].fighters, vec!["Alex Pereira"]);
        assert_eq!(summary.records[1].event_name, None);

        assert_eq!(store.count().unwrap(), 2);
        let csv = std::fs::read_to_string(summary.exported.unwrap()).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.contains("v1,UFC 300,\"Jon Jones, Tom Aspinall\""));
    }

    #[tokio::test]
    async fn listing_failure_aborts_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open_in_memory().unwrap();
        let lister = FakeLister { videos: None };
        let source = FakeTranscripts::default();
        let model = FakeModel::default();
        let mut gate = ScriptedGate::new(&[]);
        let opts = options(&dir);
        let export_path = opts.export_path.clone();

        let result = Pipeline::new(&source, &model, &store, &mut gate, opts)
            .run(&lister, "PL123")
            .await;

        assert!(result.is_err());
        assert_eq!(model.calls.get(), 0);
        assert!(!export_path.exists());
    }

    #[tokio::test]
    async fn per_video_errors_do_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open_in_memory().unwrap();
        let lister = FakeLister {
            videos: Some(vec![video("bad"), video("good")]),
        };
        let mut source = transcripts(&[("good", "transcript-good")]);
        source.broken.push("bad".to_string());
        let model = FakeModel::default().answer(
            "transcript-good",
            r#"{"fighters": ["Islam Makhachev"], "event_name": "UFC 302"}"#,
        );
        let mut gate = ScriptedGate::new(&[]);

        let summary = Pipeline::new(&source, &model, &store, &mut gate, options(&dir))
            .run(&lister, "PL123")
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.records.len(), 1);
        assert_eq!(summary.records[0].video_id, "good");
    }

    #[tokio::test]
    async fn model_failure_yields_empty_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open_in_memory().unwrap();
        let lister = FakeLister {
            videos: Some(vec![video("v1")]),
        };
        let source = transcripts(&[("v1", "transcript-one")]);
        let model = FakeModel::default().fail("transcript-one");
        let mut gate = ScriptedGate::new(&[]);

        let summary = Pipeline::new(&source, &model, &store, &mut gate, options(&dir))
            .run(&lister, "PL123")
            .await
            .unwrap();

        assert_eq!(summary.records.len(), 1);
        assert!(summary.records[0].fighters.is_empty());
        assert_eq!(summary.records[0].event_name, None);
    }

    #[tokio::test]
    async fn declined_video_costs_no_model_call() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open_in_memory().unwrap();
        let lister = FakeLister {
            videos: Some(vec![video("v1"), video("v2")]),
        };
        let source = transcripts(&[("v1", "transcript-one"), ("v2", "transcript-two")]);
        let model = FakeModel::default().answer(
            "transcript-two",
            r#"{"fighters": ["Belal Muhammad"], "event_name": "UFC 304"}"#,
        );
        let mut gate = ScriptedGate::new(&[false, true]);
        let mut opts = options(&dir);
        opts.confirm_before_analysis = true;

        let summary = Pipeline::new(&source, &model, &store, &mut gate, opts)
            .run(&lister, "PL123")
            .await
            .unwrap();

        assert_eq!(model.calls.get(), 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.records[0].video_id, "v2");
        assert_eq!(
            gate.asked[0],
            "Proceed with analyzing the transcript for video 'v1 picks'?"
        );
    }

    #[tokio::test]
    async fn rejected_analysis_is_retried_with_the_same_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open_in_memory().unwrap();
        let source = transcripts(&[("v1", "transcript-one")]);
        let model = FakeModel::default()
            .answer("transcript-one", r#"{"fighters": ["Wrong Guy"], "event_name": null}"#)
            .answer(
                "transcript-one",
                r#"{"fighters": ["Dricus Du Plessis"], "event_name": "UFC 305"}"#,
            );
        let mut gate = ScriptedGate::new(&[false, true]);
        let mut opts = options(&dir);
        opts.confirm_results = true;

        let outcome = Pipeline::new(&source, &model, &store, &mut gate, opts)
            .analyze_one(&video("v1"))
            .await
            .unwrap();

        assert_eq!(model.calls.get(), 2);
        match outcome {
            VideoOutcome::Recorded { record, persisted } => {
                assert!(persisted);
                assert_eq!(record.fighters, vec!["Dricus Du Plessis"]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        let stored = store.get("v1").unwrap().unwrap();
        assert_eq!(stored.record.event_name.as_deref(), Some("UFC 305"));
    }

    #[tokio::test]
    async fn re_analysis_stops_at_the_attempt_cap() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open_in_memory().unwrap();
        let source = transcripts(&[("v1", "transcript-one")]);
        let model = FakeModel::default()
            .answer("transcript-one", r#"{"fighters": ["A"], "event_name": null}"#)
            .answer("transcript-one", r#"{"fighters": ["B"], "event_name": null}"#);
        let mut gate = ScriptedGate::new(&[false, false]);
        let mut opts = options(&dir);
        opts.confirm_results = true;
        opts.max_attempts = 2;

        let outcome = Pipeline::new(&source, &model, &store, &mut gate, opts)
            .analyze_one(&video("v1"))
            .await
            .unwrap();

        assert_eq!(outcome, VideoOutcome::Skipped(SkipReason::Rejected));
        assert_eq!(model.calls.get(), 2);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn require_event_name_policy_skips_storage_but_keeps_export() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open_in_memory().unwrap();
        let lister = FakeLister {
            videos: Some(vec![video("v1"), video("v2")]),
        };
        let source = transcripts(&[("v1", "transcript-one"), ("v2", "transcript-two")]);
        let model = FakeModel::default()
            .answer("transcript-one", r#"{"fighters": ["Kayla Harrison"], "event_name": null}"#)
            .answer(
                "transcript-two",
                r#"{"fighters": ["Julianna Pena"], "event_name": "UFC 307"}"#,
            );
        let mut gate = ScriptedGate::new(&[]);
        let mut opts = options(&dir);
        opts.persist_policy = PersistPolicy::RequireEventName;

        let summary = Pipeline::new(&source, &model, &store, &mut gate, opts)
            .run(&lister, "PL123")
            .await
            .unwrap();

        assert_eq!(summary.records.len(), 2);
        assert_eq!(summary.persisted, 1);
        assert!(store.get("v1").unwrap().is_none());
        assert!(store.get("v2").unwrap().is_some());
    }

    #[tokio::test]
    async fn empty_playlist_exports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open_in_memory().unwrap();
        let lister = FakeLister {
            videos: Some(Vec::new()),
        };
        let source = FakeTranscripts::default();
        let model = FakeModel::default();
        let mut gate = ScriptedGate::new(&[]);

        let summary = Pipeline::new(&source, &model, &store, &mut gate, options(&dir))
            .run(&lister, "PL123")
            .await
            .unwrap();

        assert!(summary.exported.is_none());
        assert!(summary.records.is_empty());
    }

    #[tokio::test]
    async fn storage_failure_still_exports_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open_in_memory().unwrap();
        store.drop_table().unwrap();
        let lister = FakeLister {
            videos: Some(vec![video("v1"), video("v2")]),
        };
        let source = transcripts(&[("v1", "transcript-one"), ("v2", "transcript-two")]);
        let model = FakeModel::default()
            .answer("transcript-one", r#"{"fighters": ["Sean O'Malley"], "event_name": "UFC 306"}"#)
            .answer("transcript-two", r#"{"fighters": ["Merab Dvalishvili"], "event_name": null}"#);
        let mut gate = ScriptedGate::new(&[]);

        let summary = Pipeline::new(&source, &model, &store, &mut gate, options(&dir))
            .run(&lister, "PL123")
            .await
            .unwrap();

        assert_eq!(summary.records.len(), 2);
        assert_eq!(summary.persisted, 0);
        assert_eq!(summary.failed, 0);
        let csv = std::fs::read_to_string(summary.exported.unwrap()).unwrap();
        assert!(csv.contains("v1,UFC 306,Sean O'Malley"));
        assert!(csv.contains("v2,,Merab Dvalishvili"));
    }

    #[tokio::test(start_paused = true)]
    async fn pace_applies_between_videos_even_after_a_skip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open_in_memory().unwrap();
        let lister = FakeLister {
            videos: Some(vec![video("v1"), video("v2")]),
        };
        let source = transcripts(&[("v2", "transcript-two")]);
        let model = FakeModel::default().answer(
            "transcript-two",
            r#"{"fighters": ["Ilia Topuria"], "event_name": "UFC 308"}"#,
        );
        let mut gate = ScriptedGate::new(&[]);
        let mut opts = options(&dir);
        opts.pace = Duration::from_millis(500);

        let started = tokio::time::Instant::now();
        let summary = Pipeline::new(&source, &model, &store, &mut gate, opts)
            .run(&lister, "PL123")
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.records.len(), 1);
        assert_eq!(summary.records[0].video_id, "v2");
    }
}
