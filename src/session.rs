//! Edit session — the state machine driving iterative track editing.
//!
//! An [`EditSession`] owns the original track, the working copy, the current
//! region partition, and at most one candidate clip. The generator is
//! injected behind the [`Generator`] seam; the splicer and waveform writer
//! are invoked directly.
//!
//! ```text
//! Empty → Loaded → Segmented → Previewing → Committed → Finalized
//!                      ↑            │            │
//!                      └── split ───┴────────────┘
//! ```
//!
//! Regions are snapshots of the timeline at split time. A commit changes the
//! timeline, so it invalidates the whole partition: reusing a pre-commit
//! region id is rejected and an explicit re-split is required. The candidate
//! snapshots its region's bounds, so the commit itself never consults the
//! region list.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::audio::pcm::Track;
use crate::audio::{splice, wav};
use crate::collector::{GenerationRequest, Generator};
use crate::{Error, Result};

/// A contiguous time region of the working track, computed at split time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// 1-indexed region id.
    pub id: usize,
    pub start_s: f64,
    pub end_s: f64,
    pub name: String,
}

impl Region {
    pub fn length_s(&self) -> f64 {
        self.end_s - self.start_s
    }
}

/// A generated clip awaiting commit, tagged with the region it replaces.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Bounds snapshotted at regeneration time.
    pub region: Region,
    pub track: Track,
}

/// Lifecycle of an edit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Loaded,
    Segmented,
    Previewing,
    Committed,
    Finalized,
}

impl SessionState {
    /// Lowercase name for logs and wire responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Empty => "empty",
            SessionState::Loaded => "loaded",
            SessionState::Segmented => "segmented",
            SessionState::Previewing => "previewing",
            SessionState::Committed => "committed",
            SessionState::Finalized => "finalized",
        }
    }
}

/// One track-editing context.
pub struct EditSession<G> {
    generator: G,
    state: SessionState,
    original: Option<Track>,
    working: Option<Track>,
    regions: Vec<Region>,
    candidate: Option<Candidate>,
}

impl<G: Generator> EditSession<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            state: SessionState::Empty,
            original: None,
            working: None,
            regions: Vec::new(),
            candidate: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The current region partition; empty after a commit until re-split.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn candidate(&self) -> Option<&Candidate> {
        self.candidate.as_ref()
    }

    pub fn working(&self) -> Option<&Track> {
        self.working.as_ref()
    }

    pub fn original(&self) -> Option<&Track> {
        self.original.as_ref()
    }

    /// Supply the source track. Clones it into the working copy and resets
    /// regions and candidate. `Empty → Loaded`.
    pub fn load(&mut self, source: Track) -> Result<()> {
        if self.state != SessionState::Empty {
            return Err(Error::Session(format!(
                "cannot load a track in the {} state",
                self.state.as_str()
            )));
        }
        if source.is_empty() {
            return Err(Error::Session("cannot load an empty track".into()));
        }
        tracing::info!(duration_s = source.duration_s(), "track loaded");
        self.working = Some(source.clone());
        self.original = Some(source);
        self.regions.clear();
        self.candidate = None;
        self.state = SessionState::Loaded;
        Ok(())
    }

    /// Partition the working track into `n` equal contiguous regions.
    ///
    /// Idempotent between commits: splitting twice with the same `n` yields
    /// identical lists. Discards any live candidate — it was generated
    /// against the previous partition.
    pub fn split(&mut self, n: usize) -> Result<&[Region]> {
        match self.state {
            SessionState::Loaded | SessionState::Segmented | SessionState::Committed => {}
            _ => {
                return Err(Error::Session(format!(
                    "cannot split in the {} state",
                    self.state.as_str()
                )))
            }
        }
        if n == 0 {
            return Err(Error::Session("split count must be at least 1".into()));
        }
        let working = self
            .working
            .as_ref()
            .ok_or_else(|| Error::Session("no working track".into()))?;

        let segment_s = working.duration_s() / n as f64;
        self.regions = (0..n)
            .map(|i| Region {
                id: i + 1,
                start_s: round2(i as f64 * segment_s),
                end_s: round2((i + 1) as f64 * segment_s),
                name: format!("Section {}", i + 1),
            })
            .collect();
        self.candidate = None;
        self.state = SessionState::Segmented;
        tracing::info!(regions = n, segment_s, "track split");
        Ok(&self.regions)
    }

    /// Generate a replacement clip for `region_id`. `→ Previewing`.
    ///
    /// Any prior candidate is discarded *before* the generation starts, so a
    /// failure leaves no candidate rather than resurrecting a stale preview.
    /// The requested clip runs half a crossfade window long on top of the
    /// region length, to feed the blend at each junction.
    pub async fn regenerate(
        &mut self,
        region_id: usize,
        prompt: &str,
        bpm: u32,
        guidance: f64,
        density: f64,
        crossfade_s: f64,
    ) -> Result<&Candidate> {
        match self.state {
            SessionState::Segmented | SessionState::Previewing | SessionState::Committed => {}
            _ => {
                return Err(Error::Session(format!(
                    "cannot regenerate in the {} state",
                    self.state.as_str()
                )))
            }
        }
        let region = self
            .regions
            .iter()
            .find(|r| r.id == region_id)
            .cloned()
            .ok_or_else(|| {
                Error::Session(format!(
                    "no region with id {region_id} — regions are invalidated by commits, re-split first"
                ))
            })?;

        self.candidate = None;
        if self.state == SessionState::Previewing {
            self.state = SessionState::Segmented;
        }

        let request = GenerationRequest {
            prompt: prompt.to_string(),
            duration_s: region.length_s() + crossfade_s / 2.0,
            bpm,
            guidance,
            density,
        };
        tracing::info!(
            region = region.id,
            clip_s = request.duration_s,
            "regenerating region"
        );

        let pcm = self.generator.generate(&request).await?;
        let track = Track::from_pcm_bytes(&pcm);
        tracing::info!(region = region.id, candidate_s = track.duration_s(), "candidate ready");

        self.candidate = Some(Candidate { region, track });
        self.state = SessionState::Previewing;
        Ok(self.candidate.as_ref().unwrap())
    }

    /// Splice the candidate into the working track. `Previewing → Committed`.
    ///
    /// On success the working track is replaced atomically, the candidate is
    /// consumed, and the region partition is invalidated. On failure the
    /// state stays `Previewing` and the working track is untouched.
    pub fn commit(&mut self, crossfade_ms: u32) -> Result<()> {
        if self.state != SessionState::Previewing {
            return Err(Error::Session(format!(
                "cannot commit in the {} state",
                self.state.as_str()
            )));
        }
        let candidate = self
            .candidate
            .as_ref()
            .ok_or_else(|| Error::Session("no candidate to commit".into()))?;
        let working = self
            .working
            .as_ref()
            .ok_or_else(|| Error::Session("no working track".into()))?;

        let merged = splice::splice(
            working,
            &candidate.track,
            candidate.region.start_s,
            candidate.region.end_s,
            crossfade_ms,
        )?;

        tracing::info!(
            region = candidate.region.id,
            old_s = working.duration_s(),
            new_s = merged.duration_s(),
            "region committed"
        );

        // The new track is fully built; only now mutate session state.
        self.working = Some(merged);
        self.candidate = None;
        self.regions.clear();
        self.state = SessionState::Committed;
        Ok(())
    }

    /// Persist the working track as the session's artifact. Irreversible:
    /// regions and candidate are discarded and every later call is rejected.
    pub fn finalize(&mut self, path: impl AsRef<Path>) -> Result<PathBuf> {
        match self.state {
            SessionState::Loaded
            | SessionState::Segmented
            | SessionState::Previewing
            | SessionState::Committed => {}
            _ => {
                return Err(Error::Session(format!(
                    "cannot finalize in the {} state",
                    self.state.as_str()
                )))
            }
        }
        let working = self
            .working
            .as_ref()
            .ok_or_else(|| Error::Session("no working track".into()))?;

        wav::write_wav(&path, working)?;
        self.candidate = None;
        self.regions.clear();
        self.state = SessionState::Finalized;

        let path = path.as_ref().to_path_buf();
        tracing::info!(path = %path.display(), "session finalized");
        Ok(path)
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::audio::FORMAT;

    /// Deterministic generator: emits the requested duration of a marker
    /// sample, or fails on demand.
    struct FakeGenerator {
        marker: i16,
        fail: AtomicBool,
        last_request: Mutex<Option<GenerationRequest>>,
    }

    impl FakeGenerator {
        fn new(marker: i16) -> Arc<Self> {
            Arc::new(Self {
                marker,
                fail: AtomicBool::new(false),
                last_request: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl Generator for FakeGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>> {
            *self.last_request.lock().unwrap() = Some(request.clone());
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Transport("backend unreachable".into()));
            }
            request.validate()?;
            let frames = FORMAT.frame_at(request.duration_s);
            let samples = vec![self.marker; frames * 2];
            Ok(Track::from_samples(samples).to_pcm_bytes())
        }
    }

    fn source_track(seconds: f64) -> Track {
        let frames = FORMAT.frame_at(seconds);
        let samples = (0..frames * 2).map(|i| (i % 20_000) as i16).collect();
        Track::from_samples(samples)
    }

    fn loaded_session(seconds: f64) -> (EditSession<Arc<FakeGenerator>>, Arc<FakeGenerator>) {
        let generator = FakeGenerator::new(1111);
        let mut session = EditSession::new(generator.clone());
        session.load(source_track(seconds)).unwrap();
        (session, generator)
    }

    #[test]
    fn test_load_only_from_empty() {
        let (mut session, _) = loaded_session(10.0);
        assert_eq!(session.state(), SessionState::Loaded);
        assert!(matches!(
            session.load(source_track(5.0)),
            Err(Error::Session(_))
        ));
    }

    #[test]
    fn test_split_is_idempotent() {
        let (mut session, _) = loaded_session(20.0);
        let first = session.split(4).unwrap().to_vec();
        let second = session.split(4).unwrap().to_vec();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        assert_eq!(first[0].start_s, 0.0);
        assert_eq!(first[0].end_s, 5.0);
        assert_eq!(first[3].end_s, 20.0);
        assert_eq!(first[2].name, "Section 3");
    }

    #[tokio::test]
    async fn test_single_candidate_invariant() {
        let (mut session, _) = loaded_session(20.0);
        session.split(4).unwrap();

        session
            .regenerate(1, "calm piano", 90, 7.0, 0.5, 2.0)
            .await
            .unwrap();
        assert_eq!(session.candidate().unwrap().region.id, 1);

        session
            .regenerate(3, "driving drums", 120, 7.0, 0.8, 2.0)
            .await
            .unwrap();
        // Only the second candidate survives.
        assert_eq!(session.candidate().unwrap().region.id, 3);
        assert_eq!(session.state(), SessionState::Previewing);
    }

    #[tokio::test]
    async fn test_regenerate_requests_crossfade_allowance() {
        let (mut session, generator) = loaded_session(20.0);
        session.split(4).unwrap();
        session
            .regenerate(2, "ambient pads", 80, 6.0, 0.4, 3.0)
            .await
            .unwrap();

        let request = generator.last_request.lock().unwrap().clone().unwrap();
        // 5s region + half the 3s crossfade window.
        assert!((request.duration_s - 6.5).abs() < 1e-9);
        assert_eq!(request.bpm, 80);
    }

    #[tokio::test]
    async fn test_failed_regeneration_discards_candidate_and_working_survives() {
        let (mut session, generator) = loaded_session(20.0);
        session.split(4).unwrap();
        session
            .regenerate(1, "calm piano", 90, 7.0, 0.5, 2.0)
            .await
            .unwrap();

        let before = session.working().unwrap().clone();
        generator.fail.store(true, Ordering::SeqCst);
        match session.regenerate(2, "noise", 90, 7.0, 0.5, 2.0).await {
            Err(Error::Transport(_)) => {}
            other => panic!("expected transport error, got {other:?}"),
        }

        // The stale candidate is not resurrected and the state fell back.
        assert!(session.candidate().is_none());
        assert_eq!(session.state(), SessionState::Segmented);
        assert_eq!(session.working().unwrap(), &before);
    }

    #[tokio::test]
    async fn test_commit_applies_duration_formula() {
        let (mut session, _) = loaded_session(20.0);
        session.split(4).unwrap();
        // Region 2 = [5, 10). Clip = 5s + 2s/2 = 6s.
        session
            .regenerate(2, "new groove", 100, 7.0, 0.6, 2.0)
            .await
            .unwrap();
        session.commit(1000).unwrap();

        // 20 - 5 + 6, minus the two 1s fade overlaps.
        let expected = FORMAT.frame_at(19.0);
        assert_eq!(session.working().unwrap().frames(), expected);
        assert_eq!(session.state(), SessionState::Committed);
        assert!(session.candidate().is_none());

        // The original stays pristine.
        assert_eq!(session.original().unwrap().frames(), FORMAT.frame_at(20.0));
    }

    #[tokio::test]
    async fn test_stale_region_rejected_after_commit() {
        let (mut session, _) = loaded_session(20.0);
        session.split(4).unwrap();
        session
            .regenerate(2, "new groove", 100, 7.0, 0.6, 2.0)
            .await
            .unwrap();
        session.commit(1000).unwrap();

        // The partition died with the commit: re-split is required.
        assert!(session.regions().is_empty());
        match session.regenerate(3, "more", 100, 7.0, 0.6, 2.0).await {
            Err(Error::Session(msg)) => assert!(msg.contains("re-split")),
            other => panic!("expected session error, got {other:?}"),
        }

        // After re-splitting the session is usable again.
        session.split(3).unwrap();
        session
            .regenerate(1, "intro", 100, 7.0, 0.6, 2.0)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_commit_without_preview_is_rejected() {
        let (mut session, _) = loaded_session(20.0);
        session.split(2).unwrap();
        let before = session.working().unwrap().clone();
        assert!(matches!(session.commit(1000), Err(Error::Session(_))));
        assert_eq!(session.working().unwrap(), &before);
        assert_eq!(session.state(), SessionState::Segmented);
    }

    #[tokio::test]
    async fn test_finalize_writes_artifact_and_locks_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.wav");

        let (mut session, _) = loaded_session(10.0);
        session.split(2).unwrap();
        session
            .regenerate(2, "outro", 95, 7.0, 0.5, 2.0)
            .await
            .unwrap();
        session.commit(1000).unwrap();

        let artifact = session.finalize(&path).unwrap();
        assert_eq!(artifact, path);
        assert_eq!(session.state(), SessionState::Finalized);

        let exported = wav::read_wav(&path).unwrap();
        assert_eq!(&exported, session.working().unwrap());

        // Irreversible within the session.
        assert!(matches!(session.split(2), Err(Error::Session(_))));
        assert!(matches!(
            session.finalize(dir.path().join("again.wav")),
            Err(Error::Session(_))
        ));
    }

    #[tokio::test]
    async fn test_split_discards_candidate() {
        let (mut session, _) = loaded_session(20.0);
        session.split(4).unwrap();
        session
            .regenerate(1, "calm piano", 90, 7.0, 0.5, 2.0)
            .await
            .unwrap();
        session.split(5).unwrap();
        assert!(session.candidate().is_none());
        assert_eq!(session.state(), SessionState::Segmented);
    }
}
