use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;

use audio_session::audio_system::{AudioSession, MusicOptions, RodioEngine, SfxOptions, VoiceOptions};
use audio_session::logging::initialize_tracing;
use audio_session::persistence::JsonFileStore;
use audio_session::{AppResult, SessionConfig};

struct Args {
    config: Option<PathBuf>,
    music: Option<String>,
    voice: Option<String>,
    sfx: Vec<String>,
    seconds: u64,
    status: bool,
}

fn print_usage() {
    println!("Usage: audio-session [options]");
    println!();
    println!("  --config <file>    Session config (JSON)");
    println!("  --music <ref>      Background music to loop");
    println!("  --voice <ref>      Voice line to play once");
    println!("  --sfx <ref>        Sound effect, repeated every 2s (may be given more than once)");
    println!("  --seconds <n>      How long to run (default 10)");
    println!("  --status           Print the session status as JSON on exit");
}

fn parse_args() -> AppResult<Option<Args>> {
    let mut args = Args {
        config: None,
        music: None,
        voice: None,
        sfx: Vec::new(),
        seconds: 10,
        status: false,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |name: &str| iter.next().with_context(|| format!("{} needs a value", name));
        match arg.as_str() {
            "--config" => args.config = Some(PathBuf::from(value("--config")?)),
            "--music" => args.music = Some(value("--music")?),
            "--voice" => args.voice = Some(value("--voice")?),
            "--sfx" => args.sfx.push(value("--sfx")?),
            "--seconds" => {
                args.seconds = value("--seconds")?
                    .parse()
                    .context("--seconds expects a whole number")?
            }
            "--status" => args.status = true,
            "-h" | "--help" => {
                print_usage();
                return Ok(None);
            }
            other => anyhow::bail!("Unknown argument: {}", other),
        }
    }
    Ok(Some(args))
}

fn main() -> AppResult<()> {
    initialize_tracing();

    let Some(args) = parse_args()? else {
        return Ok(());
    };

    let config = match &args.config {
        Some(path) => SessionConfig::load(path),
        None => SessionConfig::load_default(),
    }
    .context("Failed to load session config")?;

    println!("===========================================");
    println!("  Audio Session");
    println!("===========================================\n");
    println!("✓ Configuration loaded");
    println!("  Assets: {}", config.asset_root().display());
    println!("  Settings: {}\n", config.settings_path().display());

    let store = JsonFileStore::open(config.settings_path());
    let engine = RodioEngine::new(config.asset_root());
    let mut session = AudioSession::with_config(engine, Box::new(store), &config);

    let (events, _subscriber) = session.subscribe();

    if !args.sfx.is_empty() {
        session.preload(args.sfx.as_slice(), |report| {
            println!("✓ Preloaded {} sound(s), {} failed", report.loaded, report.failed);
        });
    }
    if let Some(music) = &args.music {
        session.play_background_music(music, MusicOptions::default());
    }
    if let Some(voice) = &args.voice {
        session.play_voice_line(
            voice,
            VoiceOptions::default().on_end(|| println!("  Voice line finished")),
        );
    }

    let poll = Duration::from_millis(config.engine_poll_interval_ms);
    let sfx_every = Duration::from_secs(2);
    let started = Instant::now();
    let mut last_sfx: Option<Instant> = None;
    let mut next_sfx = 0;

    while started.elapsed() < Duration::from_secs(args.seconds) {
        session.pump();

        for event in events.try_iter() {
            println!("  {}", event.description());
        }

        if !args.sfx.is_empty() && last_sfx.map_or(true, |at| at.elapsed() >= sfx_every) {
            let sfx = &args.sfx[next_sfx % args.sfx.len()];
            session.play_sound_effect(sfx, SfxOptions::default());
            last_sfx = Some(Instant::now());
            next_sfx += 1;
        }

        thread::sleep(poll);
    }

    session.stop_background_music(None);
    let fade_deadline = Instant::now() + Duration::from_millis(config.default_stop_fade_ms + 200);
    while session.fading_out_count() > 0 && Instant::now() < fade_deadline {
        session.pump();
        thread::sleep(poll);
    }

    if args.status {
        let status = serde_json::to_string_pretty(&session.get_status())?;
        println!("{}", status);
    }

    session.dispose();
    println!("\n✓ Audio session closed");
    Ok(())
}
