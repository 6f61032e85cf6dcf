use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use vision_core::interfaces::{FrameRecord, Recorder};

pub const TRACKS_FILE: &str = "tracks.jsonl";

/// Writes `frame_NNNNNN.png` per annotated frame plus one JSON line of tracking output each.
pub struct PngSequenceRecorder {
    dir: PathBuf,
    tracks: BufWriter<File>,
    written: u64,
}

impl PngSequenceRecorder {
    pub fn create(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let tracks = BufWriter::new(File::create(dir.join(TRACKS_FILE))?);
        Ok(Self { dir, tracks, written: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl Recorder for PngSequenceRecorder {
    fn record(&mut self, record: &FrameRecord) -> io::Result<()> {
        let path = self.dir.join(format!("frame_{:06}.png", record.frame_id));
        record
            .image
            .save(&path)
            .map_err(|e| io::Error::other(format!("{}: {e}", path.display())))?;
        serde_json::to_writer(&mut self.tracks, record.tracking)?;
        self.tracks.write_all(b"\n")?;
        self.written += 1;
        debug!(path = %path.display(), "frame recorded");
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.tracks.flush()
    }
}
