/// Rodio playback engine
///
/// Production adapter: one `Sink` per handle on a shared output stream, with
/// decoded asset bytes cached in memory per source ref.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use super::effects::fade::FADE_STEPS;
use super::effects::{clamp01, Fade};
use super::engine::{CreateOptions, EngineEvent, EngineHandle, PlaybackEngine};
use crate::error::AudioError;

/// Minimum delay between attempts to open the output device
const OPEN_RETRY_INTERVAL: Duration = Duration::from_millis(500);

struct SinkEntry {
    sink: Arc<Mutex<Sink>>,
    /// Logical volume before the master volume is applied
    volume: f32,
    started: bool,
    end_reported: bool,
    /// Bumped to cancel the running fade thread
    fade_generation: Arc<AtomicU64>,
}

impl SinkEntry {
    fn cancel_fade(&self) {
        self.fade_generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Playback engine backed by rodio
pub struct RodioEngine {
    output: Option<(OutputStream, OutputStreamHandle)>,
    last_open_attempt: Option<Instant>,
    asset_root: PathBuf,
    cache: HashMap<String, Arc<Vec<u8>>>,
    sinks: HashMap<EngineHandle, SinkEntry>,
    events: Option<Sender<EngineEvent>>,
    next_handle: u64,
    master_volume: f32,
}

impl RodioEngine {
    /// Create the engine. Relative source refs resolve against `asset_root`.
    /// If no output device is available yet, the engine stays unready and
    /// retries on `poll`.
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        let mut engine = Self {
            output: None,
            last_open_attempt: None,
            asset_root: asset_root.into(),
            cache: HashMap::new(),
            sinks: HashMap::new(),
            events: None,
            next_handle: 0,
            master_volume: 1.0,
        };
        engine.try_open_output();
        engine
    }

    fn try_open_output(&mut self) -> bool {
        if self.output.is_some() {
            return true;
        }
        self.last_open_attempt = Some(Instant::now());

        match OutputStream::try_default() {
            Ok(output) => {
                tracing::info!("✓ Audio output opened");
                self.output = Some(output);
                // Native output has no autoplay policy
                self.emit(EngineEvent::Ready);
                self.emit(EngineEvent::Unlocked);
                true
            }
            Err(e) => {
                tracing::warn!("Audio output unavailable, will retry: {}", e);
                false
            }
        }
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn resolve_path(&self, source_ref: &str) -> PathBuf {
        let path = Path::new(source_ref);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.asset_root.join(path)
        }
    }

    /// Read and verify an asset, caching the bytes
    fn load_bytes(&mut self, source_ref: &str) -> Result<Arc<Vec<u8>>, AudioError> {
        if let Some(bytes) = self.cache.get(source_ref) {
            return Ok(Arc::clone(bytes));
        }

        let path = self.resolve_path(source_ref);
        let data = std::fs::read(&path).map_err(|e| AudioError::load(source_ref, e))?;

        // Verify the audio can be decoded before handing out a handle
        let cursor = std::io::Cursor::new(data.clone());
        Decoder::new(cursor).map_err(|e| AudioError::load(source_ref, e))?;

        tracing::info!("Loaded audio {} ({} bytes)", path.display(), data.len());
        let bytes = Arc::new(data);
        self.cache.insert(source_ref.to_string(), Arc::clone(&bytes));
        Ok(bytes)
    }

    fn build_source(
        source_ref: &str,
        bytes: &Arc<Vec<u8>>,
        options: &CreateOptions,
    ) -> Result<Box<dyn Source<Item = i16> + Send>, AudioError> {
        // rodio's Decoder requires owned data with 'static lifetime
        let cursor = std::io::Cursor::new((**bytes).clone());

        let mut source: Box<dyn Source<Item = i16> + Send> = if options.looped {
            Box::new(Decoder::new_looped(cursor).map_err(|e| AudioError::load(source_ref, e))?)
        } else {
            Box::new(Decoder::new(cursor).map_err(|e| AudioError::load(source_ref, e))?)
        };

        if (options.rate - 1.0).abs() > f32::EPSILON && options.rate > 0.0 {
            source = Box::new(source.speed(options.rate));
        }
        Ok(source)
    }

    fn allocate(&mut self) -> EngineHandle {
        self.next_handle += 1;
        EngineHandle(self.next_handle)
    }
}

impl PlaybackEngine for RodioEngine {
    fn attach(&mut self, events: Sender<EngineEvent>) {
        self.events = Some(events);
        if self.output.is_some() {
            self.emit(EngineEvent::Ready);
            self.emit(EngineEvent::Unlocked);
        }
    }

    fn is_ready(&self) -> bool {
        self.output.is_some()
    }

    fn is_unlocked(&self) -> bool {
        self.output.is_some()
    }

    fn try_unlock(&mut self) -> bool {
        self.try_open_output()
    }

    fn create(&mut self, source_ref: &str, options: CreateOptions) -> Result<EngineHandle, AudioError> {
        let stream_handle = match &self.output {
            Some((_, handle)) => handle.clone(),
            None => return Err(AudioError::EngineUnavailable),
        };

        let bytes = self.load_bytes(source_ref)?;
        let source = Self::build_source(source_ref, &bytes, &options)?;

        let sink = Sink::try_new(&stream_handle).map_err(|e| AudioError::OutputUnavailable(e.to_string()))?;
        sink.pause();
        let volume = clamp01(options.volume);
        sink.set_volume(volume * self.master_volume);
        sink.append(source);

        let handle = self.allocate();
        self.sinks.insert(
            handle,
            SinkEntry {
                sink: Arc::new(Mutex::new(sink)),
                volume,
                started: false,
                end_reported: false,
                fade_generation: Arc::new(AtomicU64::new(0)),
            },
        );

        tracing::debug!(%handle, source_ref, looped = options.looped, "Created sink");
        self.emit(EngineEvent::Loaded { handle });
        Ok(handle)
    }

    fn preload(&mut self, source_ref: &str) -> Result<EngineHandle, AudioError> {
        self.load_bytes(source_ref)?;
        let handle = self.allocate();
        self.emit(EngineEvent::Loaded { handle });
        Ok(handle)
    }

    fn play(&mut self, handle: EngineHandle) {
        let Some(entry) = self.sinks.get_mut(&handle) else {
            return;
        };
        entry.sink.lock().play();
        entry.started = true;
        entry.end_reported = false;
        self.emit(EngineEvent::Started { handle });
    }

    fn pause(&mut self, handle: EngineHandle) {
        if let Some(entry) = self.sinks.get(&handle) {
            entry.sink.lock().pause();
        }
    }

    fn stop(&mut self, handle: EngineHandle) {
        if let Some(entry) = self.sinks.get_mut(&handle) {
            entry.cancel_fade();
            entry.sink.lock().stop();
            // A stopped sink drains; that is not a natural end
            entry.end_reported = true;
        }
    }

    fn release(&mut self, handle: EngineHandle) {
        match self.sinks.remove(&handle) {
            Some(entry) => {
                entry.cancel_fade();
                entry.sink.lock().stop();
            }
            None => tracing::debug!(%handle, "Release of unknown handle ignored"),
        }
    }

    fn fade(&mut self, handle: EngineHandle, fade: Fade) {
        let Some(entry) = self.sinks.get_mut(&handle) else {
            return;
        };
        let generation = entry.fade_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let master = self.master_volume;
        entry.volume = fade.to;
        entry.sink.lock().set_volume(fade.from * master);

        let sink = Arc::clone(&entry.sink);
        let current = Arc::clone(&entry.fade_generation);
        let events = self.events.clone();

        // Spawn thread to step the volume
        std::thread::spawn(move || {
            for (pause, level) in fade.steps(FADE_STEPS) {
                std::thread::sleep(pause);
                if current.load(Ordering::SeqCst) != generation {
                    return;
                }
                sink.lock().set_volume(level * master);
            }
            if current.load(Ordering::SeqCst) == generation {
                if let Some(tx) = events {
                    let _ = tx.send(EngineEvent::FadeComplete { handle });
                }
            }
        });
    }

    fn set_volume(&mut self, handle: EngineHandle, volume: f32) {
        if let Some(entry) = self.sinks.get_mut(&handle) {
            entry.cancel_fade();
            entry.volume = clamp01(volume);
            entry.sink.lock().set_volume(entry.volume * self.master_volume);
        }
    }

    fn volume(&self, handle: EngineHandle) -> Option<f32> {
        let entry = self.sinks.get(&handle)?;
        // The sink holds the live level while a fade thread steps it
        if self.master_volume > 0.0 {
            Some(clamp01(entry.sink.lock().volume() / self.master_volume))
        } else {
            Some(entry.volume)
        }
    }

    fn is_playing(&self, handle: EngineHandle) -> bool {
        self.sinks.get(&handle).is_some_and(|entry| {
            let sink = entry.sink.lock();
            entry.started && !sink.is_paused() && !sink.empty()
        })
    }

    fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = clamp01(volume);
        for entry in self.sinks.values() {
            entry.sink.lock().set_volume(entry.volume * self.master_volume);
        }
    }

    fn poll(&mut self) {
        if self.output.is_none() {
            let due = self
                .last_open_attempt
                .map_or(true, |at| at.elapsed() >= OPEN_RETRY_INTERVAL);
            if due {
                self.try_open_output();
            }
            return;
        }

        let mut ended = Vec::new();
        for (handle, entry) in self.sinks.iter_mut() {
            if entry.started && !entry.end_reported && entry.sink.lock().empty() {
                entry.end_reported = true;
                ended.push(*handle);
            }
        }
        for handle in ended {
            self.emit(EngineEvent::Ended { handle });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests stay away from the output device; rodio needs real audio
    // hardware for anything past construction.

    #[test]
    fn test_relative_refs_resolve_against_root() {
        let engine = RodioEngine {
            output: None,
            last_open_attempt: None,
            asset_root: PathBuf::from("/assets"),
            cache: HashMap::new(),
            sinks: HashMap::new(),
            events: None,
            next_handle: 0,
            master_volume: 1.0,
        };
        assert_eq!(engine.resolve_path("music/theme.mp3"), PathBuf::from("/assets/music/theme.mp3"));
        assert_eq!(engine.resolve_path("/abs/hit.wav"), PathBuf::from("/abs/hit.wav"));
    }

    #[test]
    fn test_missing_file_is_a_load_failure() {
        let mut engine = RodioEngine {
            output: None,
            last_open_attempt: None,
            asset_root: std::env::temp_dir(),
            cache: HashMap::new(),
            sinks: HashMap::new(),
            events: None,
            next_handle: 0,
            master_volume: 1.0,
        };
        let result = engine.preload("definitely-not-here.mp3");
        assert!(matches!(result, Err(AudioError::LoadFailed { .. })));
    }

    #[test]
    fn test_create_without_output_is_unavailable() {
        let mut engine = RodioEngine {
            output: None,
            last_open_attempt: Some(Instant::now()),
            asset_root: std::env::temp_dir(),
            cache: HashMap::new(),
            sinks: HashMap::new(),
            events: None,
            next_handle: 0,
            master_volume: 1.0,
        };
        assert!(!engine.is_ready());
        let result = engine.create("theme.mp3", CreateOptions::default());
        assert!(matches!(result, Err(AudioError::EngineUnavailable)));
    }
}
