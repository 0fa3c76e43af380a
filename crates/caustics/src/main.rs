use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use caustics::{CpuBackend, CpuDevice, InputFrame, SceneLoadOutcome, Session, SessionConfig};
use clap::Parser;
use render_protocol::ScenePayload;
use scene::{Scene, default_scene, load_scene};

#[derive(Parser)]
#[command(author, version, about = "Render a 2D caustics scene progressively on the CPU")]
struct Arguments {
    /// Scene file to render. Uses the built-in scene when omitted.
    #[arg(long, short = 's', value_parser)]
    scene: Option<PathBuf>,
    /// Session config file (JSON).
    #[arg(long, short = 'c', value_parser)]
    config: Option<PathBuf>,
    /// Number of frames to run.
    #[arg(long, short = 'n', default_value_t = 64)]
    frames: u32,
    /// Screenshot written after the last frame.
    #[arg(long, short = 'o', value_parser, default_value = "image.png")]
    output: PathBuf,
    /// Write the final scene, including the view window, to this file.
    #[arg(long, value_parser)]
    save_scene: Option<PathBuf>,
    /// Scroll steps applied at the image center over the first frames. Positive zooms in.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    zoom_steps: i32,
    /// Scene file loaded halfway through the run.
    #[arg(long, value_parser)]
    reload: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let arguments = Arguments::parse();

    let config = match &arguments.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    let scene = match &arguments.scene {
        Some(path) => load_scene(path)?,
        None => default_scene(config.texture_width, config.texture_height),
    };

    let device = CpuDevice::new();
    let mut session = start_session(&device, &config, scene)?;
    let framebuffer_size = [config.texture_width as i32, config.texture_height as i32];
    let cursor = [
        framebuffer_size[0] as f32 * 0.5,
        framebuffer_size[1] as f32 * 0.5,
    ];

    let started = Instant::now();
    for frame in 0..arguments.frames {
        if frame == arguments.frames / 2 {
            if let Some(path) = &arguments.reload {
                let outcome = session
                    .load_scene_from(path)
                    .with_context(|| format!("reload scene {}", path.display()))?;
                if outcome == SceneLoadOutcome::RestartRequired {
                    let pending = session
                        .take_pending_scene()
                        .context("restart requested without a pending scene")?;
                    drop(session);
                    log::info!("[caustics] restarting renderer for the larger scene");
                    session = start_session(&device, &config, pending)?;
                }
            }
        }

        let mut input = InputFrame {
            cursor,
            ..InputFrame::idle(framebuffer_size)
        };
        if frame < arguments.zoom_steps.unsigned_abs() {
            input.scroll_delta = arguments.zoom_steps.signum() as f32;
        }
        session.run_frame(&input, Instant::now());
        if session.accumulation().is_converged() {
            log::info!("[caustics] converged after {} frames", frame + 1);
            break;
        }
    }

    if let Some(path) = &arguments.save_scene {
        session
            .save_scene_to(path)
            .with_context(|| format!("save scene {}", path.display()))?;
    }
    session
        .save_screenshot_to(&arguments.output)
        .with_context(|| format!("save screenshot {}", arguments.output.display()))?;
    log::info!(
        "[caustics] {} samples in {:.2}s, wrote {}",
        session.accumulation().sample_index(),
        started.elapsed().as_secs_f64(),
        arguments.output.display()
    );
    Ok(())
}

fn start_session(
    device: &CpuDevice,
    config: &SessionConfig,
    scene: Scene,
) -> Result<Session<CpuBackend>> {
    let payload = ScenePayload::from_scene(&scene, &config.uniform_limits)
        .context("scene does not fit the uniform limits")?;
    let backend = CpuBackend::new(device, config.texture_width, config.texture_height, &payload)
        .context("create CPU backend")?;
    let session = Session::new(config.clone(), backend, scene).context("start session")?;
    Ok(session)
}
