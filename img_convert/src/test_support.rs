//! In-memory codec and recording sink for unit tests.

use crate::cancel::CancelToken;
use crate::codec::ImageCodec;
use crate::conversion_api::{FileTask, OUTPUT_SUFFIX};
use crate::events::{ConversionEvent, EventSink};
use crate::formats::OutputFormat;
use image::{ColorType, DynamicImage, Rgba, RgbaImage};
use shared_utils::img_errors::{CodecError, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Create empty files named `names` under `dir` and return them as tasks.
pub fn touch_inputs(dir: &Path, names: &[&str]) -> Vec<FileTask> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            std::fs::write(&path, b"fake").unwrap();
            FileTask::new(path)
        })
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Codec whose behaviour is scripted per source file name.
#[derive(Default)]
pub struct FakeCodec {
    latency: HashMap<String, Duration>,
    corrupt: HashSet<String>,
    vanish: HashSet<String>,
    panics: HashSet<String>,
    fail_encode: bool,
    decode_calls: AtomicUsize,
    /// Decoded sources by file stem, so encode can find its source.
    decoded: Mutex<HashMap<String, PathBuf>>,
    encoded: Mutex<Vec<(PathBuf, OutputFormat, ColorType, i32)>>,
    /// Whether the source was still on disk when encode ran, per encode call.
    source_present_at_encode: Mutex<Vec<bool>>,
}

impl FakeCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latency(mut self, name: &str, millis: u64) -> Self {
        self.latency
            .insert(name.to_string(), Duration::from_millis(millis));
        self
    }

    pub fn corrupt(mut self, name: &str) -> Self {
        self.corrupt.insert(name.to_string());
        self
    }

    /// Decode reports the file as gone, as if deleted mid-run.
    pub fn vanish_on(mut self, name: &str) -> Self {
        self.vanish.insert(name.to_string());
        self
    }

    pub fn panic_on(mut self, name: &str) -> Self {
        self.panics.insert(name.to_string());
        self
    }

    pub fn fail_encode(mut self) -> Self {
        self.fail_encode = true;
        self
    }

    pub fn decode_calls(&self) -> usize {
        self.decode_calls.load(Ordering::SeqCst)
    }

    pub fn source_present_at_encode(&self) -> Vec<bool> {
        self.source_present_at_encode.lock().unwrap().clone()
    }

    /// `(output path, format, color type handed to encode, heic quality)`
    pub fn encoded(&self) -> Vec<(PathBuf, OutputFormat, ColorType, i32)> {
        self.encoded.lock().unwrap().clone()
    }
}

impl ImageCodec for FakeCodec {
    fn decode(&self, path: &Path) -> Result<DynamicImage> {
        self.decode_calls.fetch_add(1, Ordering::SeqCst);
        let name = file_name(path);
        self.decoded
            .lock()
            .unwrap()
            .insert(file_stem(path), path.to_path_buf());

        if let Some(delay) = self.latency.get(&name) {
            std::thread::sleep(*delay);
        }
        if self.panics.contains(&name) {
            panic!("decoder exploded on {}", name);
        }
        if self.vanish.contains(&name) {
            return Err(CodecError::NotFound(path.to_path_buf()));
        }
        if self.corrupt.contains(&name) {
            return Err(CodecError::ImageRead(format!("corrupt data in {}", name)));
        }

        Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            2,
            2,
            Rgba([10, 20, 30, 255]),
        )))
    }

    fn encode(
        &self,
        img: &DynamicImage,
        format: OutputFormat,
        path: &Path,
        heic_quality: i32,
    ) -> Result<()> {
        if self.fail_encode {
            return Err(CodecError::Io(std::io::Error::other("disk full")));
        }
        let stem = file_stem(path);
        let source_stem = stem.strip_suffix(OUTPUT_SUFFIX).unwrap_or(stem.as_str());
        let present = self
            .decoded
            .lock()
            .unwrap()
            .get(source_stem)
            .is_some_and(|source| source.exists());
        self.source_present_at_encode.lock().unwrap().push(present);

        std::fs::write(path, format.extension())?;
        self.encoded
            .lock()
            .unwrap()
            .push((path.to_path_buf(), format, img.color(), heic_quality));
        Ok(())
    }
}

/// Sink that records every event in arrival order.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ConversionEvent>>,
    cancel_at: Option<(usize, CancelToken)>,
}

impl RecordingSink {
    /// Raise `token` once the completed count reaches `at`.
    pub fn cancel_on_completed(mut self, at: usize, token: CancelToken) -> Self {
        self.cancel_at = Some((at, token));
        self
    }

    fn push(&self, event: ConversionEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<ConversionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ConversionEvent::Progress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn completed(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ConversionEvent::CompletedCount(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    pub fn logs(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ConversionEvent::FileLog(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ConversionEvent::Error(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn finished_count(&self) -> usize {
        self.events().iter().filter(|e| e.is_terminal()).count()
    }
}

impl EventSink for RecordingSink {
    fn on_progress(&self, percent: u8) {
        self.push(ConversionEvent::Progress(percent));
    }
    fn on_completed_count(&self, completed: usize) {
        self.push(ConversionEvent::CompletedCount(completed));
        if let Some((at, token)) = &self.cancel_at {
            if completed >= *at {
                token.cancel();
            }
        }
    }
    fn on_file_log(&self, line: &str) {
        self.push(ConversionEvent::FileLog(line.to_string()));
    }
    fn on_error(&self, message: &str) {
        self.push(ConversionEvent::Error(message.to_string()));
    }
    fn on_finished(&self) {
        self.push(ConversionEvent::Finished);
    }
}
