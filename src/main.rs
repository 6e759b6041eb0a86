//! lockbridge - headless driver
//!
//! Runs the render loop on an offscreen EGL context with the built-in
//! prompt scene, plays the input producer over the pipe (keymap, typing,
//! pointer, auth replies) and optionally saves the last frame as PNG.

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use std::io::Write;
use std::os::fd::{IntoRawFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use xkbcommon::xkb;

use lockbridge::channel::{read_event, send, write_event, Event, EventKind};
use lockbridge::config::Config;
use lockbridge::constants::DEFAULT_POOL_SLOTS;
use lockbridge::ffi::{ForeignBuffer, RawForeignBuffer};
use lockbridge::input::keycodes::{BTN_LEFT, KEY_A, KEY_ENTER};
use lockbridge::input::{ButtonState, KeyState};
use lockbridge::render::{BufferPool, GlTarget, LoopOptions, PromptScene, RenderLoop};
use lockbridge::state;

/// How long to wait for the requested frames
const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Print help message
fn print_help() {
    println!(
        r#"lockbridge {} - input/render bridge for a screen-lock renderer

USAGE:
    lockbridge [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    -c, --config PATH       Use this config file instead of the search path
    -n, --frames N          Number of frames to collect (default: 1)
    -s, --snapshot FILE     Save the last frame as PNG

CONFIG FILE:
    $LOCKBRIDGE_CONFIG
    ~/.config/lockbridge/config.toml
    /etc/lockbridge/config.toml
"#,
        env!("CARGO_PKG_VERSION")
    );
}

struct Options {
    config: Option<PathBuf>,
    frames: usize,
    snapshot: Option<PathBuf>,
}

fn parse_options(args: &[String]) -> Result<Options> {
    let mut options = Options {
        config: None,
        frames: 1,
        snapshot: None,
    };
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = || {
            iter.next()
                .ok_or_else(|| anyhow!("{} requires a value", arg))
        };
        match arg.as_str() {
            "--config" | "-c" => options.config = Some(PathBuf::from(value()?)),
            "--frames" | "-n" => {
                let n = value()?;
                options.frames = n
                    .parse()
                    .with_context(|| format!("Invalid frame count: {}", n))?;
            }
            "--snapshot" | "-s" => options.snapshot = Some(PathBuf::from(value()?)),
            other => return Err(anyhow!("Unknown argument: {} (see --help)", other)),
        }
    }
    Ok(options)
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // --help
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    // --version
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("lockbridge {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let options = parse_options(&args)?;
    let config = match &options.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load(),
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log.level))
        .init();
    info!("lockbridge starting...");

    let width = config.render.width;
    let height = config.render.height;
    let (app, producer) = state::connect(&config.render.asset_path, width, height)?;

    let pool = BufferPool::new(width, height, DEFAULT_POOL_SLOTS);
    let mut render = RenderLoop::initialize(
        app,
        LoopOptions {
            poll_slice: Duration::from_millis(config.render.poll_slice_ms),
            repeat: config.keyboard.repeat_info(),
        },
    );
    render.set_provider(Box::new(pool.clone()));

    let background = config.clear_color();
    render.start(move |iface| GlTarget::new(iface, PromptScene::new(background)))?;

    play_input(&producer.input)?;

    let last = collect_frames(&producer, &pool, options.frames)?;
    render.cleanup();

    if let Some(path) = options.snapshot {
        let pixels = last.ok_or_else(|| anyhow!("No frame was produced"))?;
        save_snapshot(&path, width, height, &pixels)?;
        info!("Snapshot saved: {}", path.display());
    }

    Ok(())
}

/// Act as the input producer: keymap, a typed secret, a click
fn play_input(input: &OwnedFd) -> Result<()> {
    match keymap_fd() {
        Ok((fd, size)) => {
            send(input, EventKind::KeyboardKeymap, fd as u64, size as u64)?;
            for code in [KEY_A, KEY_A, KEY_ENTER] {
                send(input, EventKind::KeyboardKey, u64::from(code), KeyState::Pressed as u64)?;
                send(input, EventKind::KeyboardKey, u64::from(code), KeyState::Released as u64)?;
            }
        }
        Err(e) => warn!("No system keymap, skipping keyboard input: {:#}", e),
    }

    write_event(input, &Event::motion(12.5, 34.0))?;
    for state in [ButtonState::Pressed, ButtonState::Released] {
        send(input, EventKind::PointerButton, u64::from(BTN_LEFT), state as u64)?;
    }
    Ok(())
}

/// Compile the default system keymap and hand it over as an unlinked file
///
/// Returns the raw fd (ownership passes to the receiver) and its size.
fn keymap_fd() -> Result<(i32, usize)> {
    let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
    let keymap = xkb::Keymap::new_from_names(&context, "", "", "", "", None, xkb::KEYMAP_COMPILE_NO_FLAGS)
        .ok_or_else(|| anyhow!("Failed to compile default keymap"))?;
    let mut text = keymap.get_as_string(xkb::KEYMAP_FORMAT_TEXT_V1).into_bytes();
    text.push(0);

    let path = std::env::temp_dir().join(format!("lockbridge-keymap-{}", std::process::id()));
    let mut file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(&text)?;
    drop(file);
    let file = std::fs::File::open(&path)?;
    std::fs::remove_file(&path)?;

    debug!("Keymap: {} bytes", text.len());
    Ok((OwnedFd::from(file).into_raw_fd(), text.len()))
}

/// Wait for `count` frames, answering auth submissions on the way
///
/// Returns the pixels of the last frame.
fn collect_frames(
    producer: &state::ProducerEnds,
    pool: &BufferPool,
    count: usize,
) -> Result<Option<Vec<u8>>> {
    let deadline = Instant::now() + FRAME_TIMEOUT;
    let mut frames = 0;
    let mut last = None;

    while frames < count {
        if Instant::now() >= deadline {
            warn!("Timed out after {} of {} frames", frames, count);
            break;
        }
        let Some(event) = read_event(&producer.output)? else {
            std::thread::sleep(Duration::from_millis(5));
            continue;
        };

        match event.kind {
            EventKind::Renderer => {
                last = pool.with_frame(event.param1, |pixels| pixels.to_vec());
                pool.release(event.param1);
                frames += 1;
                info!("Frame {} ready (slot {})", frames, event.param1);
            }
            EventKind::AuthSubmit => {
                // SAFETY: the scene hands the buffer over with the event
                let secret =
                    unsafe { ForeignBuffer::from_raw(event.param1 as *mut RawForeignBuffer) };
                let len = secret.as_ref().map_or(0, |s| s.len());
                info!("Auth submitted ({} bytes)", len);
                send(&producer.input, EventKind::AuthPending, 0, 0)?;
                send(&producer.input, EventKind::AuthSuccess, 0, 0)?;
            }
            other => debug!("Ignoring {:?}", other),
        }
    }
    Ok(last)
}

/// Write a BGRA frame as RGBA PNG
fn save_snapshot(path: &Path, width: u32, height: u32, bgra: &[u8]) -> Result<()> {
    let mut rgba = bgra.to_vec();
    for pixel in rgba.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut encoder = png::Encoder::new(std::io::BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&rgba)?;
    Ok(())
}
