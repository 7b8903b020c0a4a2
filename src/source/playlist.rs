//! A directory of WAV files played back to back.

use std::path::{Path, PathBuf};

use super::{FrameSource, WavSource};
use crate::SourceError;

/// Several WAV files of one format presented as a single [`FrameSource`].
///
/// Files are played in path order. Files whose sample rate or channel count
/// differ from the first playable file are skipped with a warning.
pub struct Playlist {
    entries: Vec<PathBuf>,
    current: usize,
    source: WavSource,
    /// Frames in the entries before `current`.
    offset: u64,
    total: u64,
}

impl Playlist {
    /// Collects the `.wav` files in `dir`.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Io` if the directory cannot be listed and
    /// `SourceError::EmptyPlaylist` if no file in it can be played.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| SourceError::io(dir, e))? {
            let path = entry.map_err(|e| SourceError::io(dir, e))?.path();
            let is_wav = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
            if is_wav && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        Self::from_paths(paths).map_err(|e| match e {
            SourceError::EmptyPlaylist { .. } => SourceError::EmptyPlaylist {
                path: dir.to_path_buf(),
            },
            other => other,
        })
    }

    /// Builds a playlist from explicit paths, in the given order.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::EmptyPlaylist` if none of the files can be played.
    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Result<Self, SourceError> {
        let mut entries = Vec::new();
        let mut first: Option<WavSource> = None;
        let mut total = 0;

        for path in paths {
            let source = match WavSource::open(&path) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            if let Some(head) = &first {
                if source.sample_rate() != head.sample_rate() || source.channels() != head.channels() {
                    let e = SourceError::FormatMismatch {
                        path: path.clone(),
                        rate: head.sample_rate(),
                        channels: head.channels(),
                        found_rate: source.sample_rate(),
                        found_channels: source.channels(),
                    };
                    tracing::warn!("Skipping {}", e);
                    continue;
                }
            }
            total += source.total_frames();
            entries.push(path);
            if first.is_none() {
                first = Some(source);
            }
        }

        let source = first.ok_or_else(|| SourceError::EmptyPlaylist {
            path: PathBuf::new(),
        })?;
        tracing::info!("Playlist of {} files, {} frames", entries.len(), total);

        Ok(Self {
            entries,
            current: 0,
            source,
            offset: 0,
            total,
        })
    }

    /// Paths in play order.
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Index of the file currently playing.
    pub fn current_index(&self) -> usize {
        self.current
    }

    fn advance(&mut self) -> Result<bool, SourceError> {
        let next = self.current + 1;
        let Some(path) = self.entries.get(next) else {
            return Ok(false);
        };
        let source = WavSource::open(path)?;
        tracing::debug!("Playlist advancing to {}", path.display());
        self.offset += self.source.total_frames();
        self.source = source;
        self.current = next;
        Ok(true)
    }
}

impl FrameSource for Playlist {
    fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    fn channels(&self) -> u16 {
        self.source.channels()
    }

    fn read(&mut self, dst: &mut [f32], frames: usize) -> Result<usize, SourceError> {
        let channels = usize::from(self.channels());
        let frames = frames.min(dst.len() / channels);
        let mut filled = 0;

        while filled < frames {
            let read = self
                .source
                .read(&mut dst[filled * channels..frames * channels], frames - filled)?;
            filled += read;
            if read == 0 && !self.advance()? {
                break;
            }
        }
        Ok(filled)
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        if self.current == 0 {
            self.source.rewind()?;
        } else {
            self.source = WavSource::open(&self.entries[0])?;
            self.current = 0;
        }
        self.offset = 0;
        Ok(())
    }

    fn position_frames(&self) -> u64 {
        self.offset + self.source.position_frames()
    }

    fn total_frames(&self) -> u64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_files_chain_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("b.wav"), 8000, 1, &[3 << 12, 4 << 12]);
        write_wav(&dir.path().join("a.wav"), 8000, 1, &[1 << 12, 2 << 12]);
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut playlist = Playlist::from_dir(dir.path()).unwrap();
        assert_eq!(playlist.entries().len(), 2);
        assert_eq!(playlist.total_frames(), 4);

        let mut buf = [0.0f32; 4];
        assert_eq!(playlist.read(&mut buf, 3).unwrap(), 3);
        assert_eq!(&buf[..3], &[0.125, 0.25, 0.375]);
        assert_eq!(playlist.current_index(), 1);
        assert_eq!(playlist.position_frames(), 3);

        assert_eq!(playlist.read(&mut buf, 3).unwrap(), 1);
        assert_eq!(buf[0], 0.5);
        assert_eq!(playlist.read(&mut buf, 3).unwrap(), 0);
        assert!(playlist.is_end_of_stream());

        playlist.rewind().unwrap();
        assert_eq!(playlist.current_index(), 0);
        assert_eq!(playlist.position_frames(), 0);
        assert_eq!(playlist.read(&mut buf, 1).unwrap(), 1);
        assert_eq!(buf[0], 0.125);
    }

    #[test]
    fn test_mismatched_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("1.wav"), 8000, 1, &[0; 4]);
        write_wav(&dir.path().join("2.wav"), 16000, 1, &[0; 4]);
        write_wav(&dir.path().join("3.wav"), 8000, 2, &[0; 4]);
        write_wav(&dir.path().join("4.wav"), 8000, 1, &[0; 6]);

        let playlist = Playlist::from_dir(dir.path()).unwrap();
        let names: Vec<_> = playlist
            .entries()
            .iter()
            .filter_map(|p| p.file_name())
            .collect();
        assert_eq!(names, ["1.wav", "4.wav"]);
        assert_eq!(playlist.total_frames(), 10);
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = Playlist::from_dir(dir.path()).err().unwrap();
        match err {
            SourceError::EmptyPlaylist { path } => assert_eq!(path, dir.path()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_directory() {
        assert!(matches!(
            Playlist::from_dir("/nonexistent/loops"),
            Err(SourceError::Io { .. })
        ));
    }
}
