//! End-to-end cycles over real directories.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use anyhow::{Result, bail};
use iagp2p_config::{AgencyIdSet, IngestConfig, TorrentSettings};
use iagp2p_ingest::{
    ArchiveRecord, Descriptor, DescriptorBuilder, FailureKind, IngestError, IngestResult,
    PipelineRunner, QuarantineStatus, SummaryResult,
};
use iagp2p_telemetry::Metrics;
use tempfile::TempDir;

struct Fixture {
    _temp: TempDir,
    config: IngestConfig,
}

impl Fixture {
    fn new(retry_limit: Option<u32>) -> Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix("iagp2p-ingest-e2e-")
            .tempdir()?;
        let root = temp.path();
        let config = IngestConfig {
            agencies: AgencyIdSet::from_values(["7", "12"])?,
            source_dir: root.join("incoming"),
            archive_dir: root.join("archive"),
            error_dir: root.join("errors"),
            poll_interval: Duration::from_secs(5),
            descriptor_retry_limit: retry_limit,
            torrent: TorrentSettings {
                output_dir: root.join("torrents"),
                announce_url: None,
                piece_length: 256 * 1024,
                created_by: "iagp2p".into(),
            },
        };
        Ok(Self {
            _temp: temp,
            config,
        })
    }

    fn runner(&self, builder: Arc<dyn DescriptorBuilder>) -> Result<PipelineRunner> {
        let runner = PipelineRunner::new(&self.config, builder, Metrics::new()?);
        runner.prepare()?;
        Ok(runner)
    }

    fn source(&self, name: &str) -> PathBuf {
        self.config.source_dir.join(name)
    }

    fn archived(&self, name: &str) -> PathBuf {
        self.config.archive_dir.join(name)
    }

    fn quarantined(&self, name: &str) -> PathBuf {
        self.config.error_dir.join(name)
    }

    fn write_source(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.source(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

fn entries(dir: &Path) -> Result<Vec<String>> {
    let mut names = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<Vec<_>, _>>()?;
    names.sort();
    Ok(names)
}

/// Records build order and fails for names containing `bad`.
#[derive(Default)]
struct RecordingBuilder {
    calls: Mutex<Vec<String>>,
}

impl RecordingBuilder {
    fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl DescriptorBuilder for RecordingBuilder {
    fn build(&self, archived: &ArchiveRecord) -> IngestResult<Descriptor> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(archived.file_name.clone());
        }
        if archived.file_name.contains("bad") {
            return Err(IngestError::descriptor_build(
                archived.file_name.clone(),
                "builder rejected content",
            ));
        }
        Ok(Descriptor {
            name: format!("{}.torrent", archived.file_name),
            path: archived.path.with_extension("torrent"),
            fingerprint: None,
        })
    }
}

#[test]
fn valid_file_is_archived_and_removed_from_source() -> Result<()> {
    let fixture = Fixture::new(None)?;
    let builder = Arc::new(RecordingBuilder::default());
    let runner = fixture.runner(builder.clone())?;
    let payload = b"agency 007 payload bytes".repeat(64);
    fixture.write_source("007sample.itag", &payload)?;

    let report = runner.run_cycle()?;

    assert_eq!(fs::read(fixture.archived("007sample.itag"))?, payload);
    assert!(entries(&fixture.config.source_dir)?.is_empty());
    assert_eq!(
        report.summary.get("007sample.itag"),
        Some(&SummaryResult::Descriptor("007sample.itag.torrent".into()))
    );
    assert_eq!(
        report.summary.entries()[0].to_string(),
        "007sample.itag -> 007sample.itag.torrent"
    );
    assert!(!report.has_failures());
    Ok(())
}

#[test]
fn unknown_agency_is_quarantined_with_sidecar() -> Result<()> {
    let fixture = Fixture::new(None)?;
    let runner = fixture.runner(Arc::new(RecordingBuilder::default()))?;
    fixture.write_source("999sample.itag", b"foreign")?;

    let report = runner.run_cycle()?;

    assert!(entries(&fixture.config.source_dir)?.is_empty());
    assert_eq!(fs::read(fixture.quarantined("999sample.itag"))?, b"foreign");
    let sidecar = fs::read_to_string(fixture.quarantined("999sample.itag.ERROR"))?;
    assert_eq!(sidecar, "999sample.itag\nInvalid home agency: 999");
    assert!(report.summary.is_empty(), "quarantined files are not summarized");
    assert_eq!(report.quarantined.len(), 1);
    assert_eq!(report.quarantined[0].reason, FailureKind::InvalidHomeAgency);
    assert!(entries(&fixture.config.archive_dir)?.is_empty());
    Ok(())
}

#[test]
fn unknown_extension_is_quarantined() -> Result<()> {
    let fixture = Fixture::new(None)?;
    let runner = fixture.runner(Arc::new(RecordingBuilder::default()))?;
    fixture.write_source("007sample.txt", b"text")?;

    let report = runner.run_cycle()?;

    assert!(!fixture.source("007sample.txt").exists());
    let sidecar = fs::read_to_string(fixture.quarantined("007sample.txt.ERROR"))?;
    assert_eq!(sidecar, "007sample.txt\nInvalid file type: .txt");
    assert_eq!(report.quarantined[0].reason, FailureKind::InvalidFileType);
    Ok(())
}

#[test]
fn failing_descriptor_is_retried_every_cycle() -> Result<()> {
    let fixture = Fixture::new(None)?;
    let builder = Arc::new(RecordingBuilder::default());
    let runner = fixture.runner(builder.clone())?;
    fixture.write_source("007bad.itag", b"broken")?;

    for _ in 0..4 {
        let report = runner.run_cycle()?;
        assert_eq!(
            report.summary.get("007bad.itag"),
            Some(&SummaryResult::Failed(FailureKind::DescriptorBuildFailure))
        );
        assert_eq!(
            report.summary.entries()[0].to_string(),
            "007bad.itag: ERROR: DescriptorBuildFailure"
        );
        assert!(report.quarantined.is_empty());
    }

    assert!(fixture.source("007bad.itag").exists());
    assert!(entries(&fixture.config.error_dir)?.is_empty());
    assert_eq!(builder.calls().len(), 4);
    Ok(())
}

#[test]
fn retry_limit_quarantines_after_repeated_failures() -> Result<()> {
    let fixture = Fixture::new(Some(3))?;
    let runner = fixture.runner(Arc::new(RecordingBuilder::default()))?;
    fixture.write_source("007bad.itag", b"broken")?;

    for _ in 0..2 {
        assert!(runner.run_cycle()?.quarantined.is_empty());
        assert!(fixture.source("007bad.itag").exists());
    }

    let report = runner.run_cycle()?;
    assert_eq!(report.quarantined.len(), 1);
    assert_eq!(
        report.quarantined[0].reason,
        FailureKind::DescriptorBuildFailure
    );
    assert!(report.quarantined[0].status.succeeded());
    assert!(!fixture.source("007bad.itag").exists());
    assert_eq!(
        fs::read_to_string(fixture.quarantined("007bad.itag.ERROR"))?,
        "007bad.itag\nDescriptor build failed after 3 attempts"
    );

    let report = runner.run_cycle()?;
    assert!(report.summary.is_empty());
    Ok(())
}

#[test]
fn archived_but_undeleted_source_is_reprocessed_without_copy() -> Result<()> {
    let fixture = Fixture::new(None)?;
    fs::create_dir_all(&fixture.config.archive_dir)?;
    fs::write(fixture.archived("007crash.itag"), b"archived before crash")?;
    let archived_mtime = fs::metadata(fixture.archived("007crash.itag"))?.modified()?;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let observed = Arc::clone(&seen);
    let builder = move |archived: &ArchiveRecord| -> IngestResult<Descriptor> {
        if let Ok(mut seen) = observed.lock() {
            seen.push(archived.freshly_copied);
        }
        Ok(Descriptor {
            name: format!("{}.torrent", archived.file_name),
            path: archived.path.clone(),
            fingerprint: None,
        })
    };
    let runner = fixture.runner(Arc::new(builder))?;
    fixture.write_source("007crash.itag", b"source content")?;

    let report = runner.run_cycle()?;

    assert!(matches!(
        report.summary.get("007crash.itag"),
        Some(SummaryResult::Descriptor(_))
    ));
    assert!(!fixture.source("007crash.itag").exists());
    assert_eq!(
        fs::read(fixture.archived("007crash.itag"))?,
        b"archived before crash"
    );
    assert_eq!(
        fs::metadata(fixture.archived("007crash.itag"))?.modified()?,
        archived_mtime
    );
    let seen = seen.lock().map(|seen| seen.clone()).unwrap_or_default();
    assert_eq!(seen, vec![false]);
    Ok(())
}

#[test]
fn valid_files_are_processed_oldest_first() -> Result<()> {
    let fixture = Fixture::new(None)?;
    let builder = Arc::new(RecordingBuilder::default());
    let runner = fixture.runner(builder.clone())?;
    let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);

    for (name, offset) in [("007a.itag", 300), ("007b.iclp", 100), ("012c.itgu", 200)] {
        let path = fixture.write_source(name, name.as_bytes())?;
        File::options()
            .write(true)
            .open(&path)?
            .set_modified(base + Duration::from_secs(offset))?;
    }

    let report = runner.run_cycle()?;

    assert_eq!(builder.calls(), vec!["007b.iclp", "012c.itgu", "007a.itag"]);
    let summarized: Vec<_> = report
        .summary
        .entries()
        .iter()
        .map(|entry| entry.source_name.as_str())
        .collect();
    assert_eq!(summarized, vec!["007b.iclp", "012c.itgu", "007a.itag"]);
    Ok(())
}

#[test]
fn quarantine_collision_leaves_second_file_in_source() -> Result<()> {
    let fixture = Fixture::new(None)?;
    let runner = fixture.runner(Arc::new(RecordingBuilder::default()))?;

    fixture.write_source("999dup.itag", b"first")?;
    runner.run_cycle()?;
    fixture.write_source("999dup.itag", b"second")?;
    let report = runner.run_cycle()?;

    let QuarantineStatus::Failed(err) = &report.quarantined[0].status else {
        bail!("second quarantine must fail");
    };
    assert!(matches!(err, IngestError::DestinationExists { .. }));
    assert!(report.has_failures());
    assert_eq!(fs::read(fixture.quarantined("999dup.itag"))?, b"first");
    assert_eq!(
        fs::read_to_string(fixture.quarantined("999dup.itag.ERROR"))?,
        "999dup.itag\nInvalid home agency: 999"
    );
    assert_eq!(fs::read(fixture.source("999dup.itag"))?, b"second");
    Ok(())
}

#[test]
fn mixed_batch_continues_past_failures() -> Result<()> {
    let fixture = Fixture::new(None)?;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let builder = move |archived: &ArchiveRecord| -> IngestResult<Descriptor> {
        counter.fetch_add(1, Ordering::SeqCst);
        if archived.file_name.starts_with("007bad") {
            return Err(IngestError::descriptor_build(
                archived.file_name.clone(),
                "rejected",
            ));
        }
        Ok(Descriptor {
            name: format!("{}.torrent", archived.file_name),
            path: archived.path.clone(),
            fingerprint: None,
        })
    };
    let runner = fixture.runner(Arc::new(builder))?;
    for name in ["007bad.itag", "007good.itag", "012ok.ICLP", "notes.md", "555x.itag"] {
        fixture.write_source(name, name.as_bytes())?;
    }
    fs::create_dir(fixture.source("007nested.itag"))?;

    let report = runner.run_cycle()?;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.summary.len(), 3);
    assert_eq!(report.quarantined.len(), 2);
    assert_eq!(
        entries(&fixture.config.source_dir)?,
        vec!["007bad.itag", "007nested.itag"]
    );
    assert_eq!(
        entries(&fixture.config.archive_dir)?,
        vec!["007bad.itag", "007good.itag", "012ok.ICLP"]
    );
    Ok(())
}

#[test]
fn panicking_builder_does_not_block_later_files() -> Result<()> {
    let fixture = Fixture::new(Some(2))?;
    let builder = |archived: &ArchiveRecord| -> IngestResult<Descriptor> {
        assert!(
            !archived.file_name.contains("poison"),
            "builder crashed on {}",
            archived.file_name
        );
        Ok(Descriptor {
            name: format!("{}.torrent", archived.file_name),
            path: archived.path.clone(),
            fingerprint: None,
        })
    };
    let runner = fixture.runner(Arc::new(builder))?;
    let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    for (name, offset) in [("007poison.itag", 100), ("007good.itag", 200)] {
        let path = fixture.write_source(name, name.as_bytes())?;
        File::options()
            .write(true)
            .open(&path)?
            .set_modified(base + Duration::from_secs(offset))?;
    }

    let report = runner.run_cycle()?;
    assert_eq!(
        report.summary.entries()[0].to_string(),
        "007poison.itag: ERROR: DescriptorBuildFailure"
    );
    assert_eq!(
        report.summary.get("007good.itag"),
        Some(&SummaryResult::Descriptor("007good.itag.torrent".into()))
    );
    assert!(!fixture.source("007good.itag").exists());
    assert!(fixture.source("007poison.itag").exists());
    assert!(report.quarantined.is_empty());

    let report = runner.run_cycle()?;
    assert_eq!(report.quarantined.len(), 1);
    assert_eq!(
        report.quarantined[0].reason,
        FailureKind::DescriptorBuildFailure
    );
    assert!(report.quarantined[0].status.succeeded());
    assert!(!fixture.source("007poison.itag").exists());
    assert_eq!(
        fs::read_to_string(fixture.quarantined("007poison.itag.ERROR"))?,
        "007poison.itag\nDescriptor build failed after 2 attempts"
    );
    assert!(fixture.archived("007poison.itag").exists());
    Ok(())
}

#[test]
fn archive_copy_failure_keeps_source_for_next_cycle() -> Result<()> {
    let fixture = Fixture::new(None)?;
    let builder = Arc::new(RecordingBuilder::default());
    let runner = fixture.runner(builder.clone())?;
    fs::remove_dir(&fixture.config.archive_dir)?;
    fixture.write_source("007a.itag", b"payload")?;

    let report = runner.run_cycle()?;
    assert_eq!(
        report.summary.get("007a.itag"),
        Some(&SummaryResult::Failed(FailureKind::CopyToArchiveFailure))
    );
    assert_eq!(
        report.summary.entries()[0].to_string(),
        "007a.itag: ERROR: CopyToArchiveFailure"
    );
    assert!(report.quarantined.is_empty());
    assert_eq!(fs::read(fixture.source("007a.itag"))?, b"payload");
    assert!(builder.calls().is_empty());
    assert!(entries(&fixture.config.error_dir)?.is_empty());

    fs::create_dir(&fixture.config.archive_dir)?;
    let report = runner.run_cycle()?;
    assert_eq!(
        report.summary.get("007a.itag"),
        Some(&SummaryResult::Descriptor("007a.itag.torrent".into()))
    );
    assert!(!fixture.source("007a.itag").exists());
    assert_eq!(fs::read(fixture.archived("007a.itag"))?, b"payload");
    assert_eq!(entries(&fixture.config.archive_dir)?, vec!["007a.itag"]);
    assert_eq!(builder.calls(), vec!["007a.itag"]);
    Ok(())
}
