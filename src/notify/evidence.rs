use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::detect::CandidateRegion;
use crate::frame::EvidenceFrame;
use crate::notify::NotificationSink;
use crate::{Notification, PresenceEvent};

const EVIDENCE_PREFIX: &str = "detected_object_";
const EVIDENCE_EXT: &str = "jpg";

pub fn evidence_file_name(at: DateTime<Utc>) -> String {
    format!("{}{}.{}", EVIDENCE_PREFIX, at.format("%Y%m%d%H%M%S"), EVIDENCE_EXT)
}

/// Writes the confirmation frame of each incident to a directory as JPEG.
pub struct EvidenceSink {
    dir: PathBuf,
    annotate: bool,
}

impl EvidenceSink {
    pub fn new(dir: impl AsRef<Path>, annotate: bool) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create evidence dir {}", dir.display()))?;
        Ok(Self { dir, annotate })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(
        &self,
        evidence: &EvidenceFrame,
        regions: &[CandidateRegion],
        at: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let bytes = if self.annotate && !regions.is_empty() {
            evidence.encode_annotated_jpeg(regions)?
        } else {
            evidence.encode_jpeg()?
        };
        let path = self.dir.join(evidence_file_name(at));
        std::fs::write(&path, bytes)
            .with_context(|| format!("write evidence {}", path.display()))?;
        Ok(path)
    }
}

impl NotificationSink for EvidenceSink {
    fn name(&self) -> &'static str {
        "evidence"
    }

    fn deliver(&mut self, notification: &Notification) -> Result<()> {
        let PresenceEvent::Confirmed {
            confirmed_at,
            evidence,
            regions,
            ..
        } = &notification.event
        else {
            return Ok(());
        };
        let path = self.write(evidence, regions, *confirmed_at)?;
        log::info!(
            "{}: evidence frame saved to {}",
            notification.incident_id,
            path.display()
        );
        Ok(())
    }
}

/// Remove evidence images written by `EvidenceSink`. Other files are left alone.
pub fn clean_dir(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("read evidence dir {}", dir.display()))?
    {
        let path = entry?.path();
        let is_evidence = path.is_file()
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(EVIDENCE_PREFIX))
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(EVIDENCE_EXT));
        if is_evidence {
            std::fs::remove_file(&path)
                .with_context(|| format!("remove evidence {}", path.display()))?;
            removed += 1;
        }
    }
    Ok(removed)
}
