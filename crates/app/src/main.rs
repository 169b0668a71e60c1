use std::f32::consts::TAU;
use std::path::PathBuf;

use audiomate_core::{
    AppConfig, BufferSource, CapturePipeline, ContainerFormat, EffectRegistry, FrequencyAnalyzer,
    InMemoryEncoder, PresentationSurface, RenderLoop,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const SAMPLE_RATE: u32 = 48_000;
const TICK_SECONDS: f64 = 1.0 / 60.0;

fn main() -> audiomate_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Effects => list_effects(),
        Commands::Demo { effect, seconds } => run_demo(&effect, seconds),
        Commands::Capture {
            effect,
            seconds,
            output,
        } => run_capture(&effect, seconds, &output),
    }
}

fn list_effects() -> audiomate_core::Result<()> {
    let registry = EffectRegistry::with_builtin_effects();
    for name in registry.names() {
        println!("{name}");
    }
    Ok(())
}

fn run_demo(effect: &str, seconds: f64) -> audiomate_core::Result<()> {
    tracing::info!(effect, seconds, "starting headless demo");

    let mut engine = build_engine()?;
    let mut source = test_tone(seconds);
    engine.attach_audio(source.node());
    engine.switch_effect(effect)?;

    let mut now = 0.0;
    while now < seconds && engine.tick(now)? {
        source.advance(TICK_SECONDS);
        now += TICK_SECONDS;
    }

    tracing::info!(
        renderables = engine.scene().renderable_count(),
        "demo finished"
    );
    engine.cancel();
    engine.teardown_session();
    Ok(())
}

fn run_capture(effect: &str, seconds: f64, output: &PathBuf) -> audiomate_core::Result<()> {
    tracing::info!(effect, seconds, ?output, "starting capture run");

    let config = AppConfig::default();
    let mut engine = build_engine()?;
    let mut source = test_tone(seconds);
    let node = source.node();
    engine.attach_audio(node.clone());
    engine.switch_effect(effect)?;

    let surface = PresentationSurface::new(800, 600);
    let pipeline = CapturePipeline::new(
        vec![ContainerFormat::Webm, ContainerFormat::Mp4],
        config.capture.base_name.clone(),
    );
    let mut session = pipeline.start(&surface, Some(&node), Box::<InMemoryEncoder>::default())?;

    let mut now = 0.0;
    while now < seconds && engine.tick(now)? {
        source.advance(TICK_SECONDS);
        session.capture_frame(&surface);
        now += TICK_SECONDS;
    }

    engine.cancel();
    engine.teardown_session();

    let artifact = session.stop();
    let path = output.join(&artifact.file_name);
    std::fs::write(&path, &artifact.data)?;
    tracing::info!(?path, bytes = artifact.data.len(), "capture written");
    Ok(())
}

fn build_engine() -> audiomate_core::Result<RenderLoop> {
    let config = AppConfig::default();
    let analyzer = FrequencyAnalyzer::with_ceiling(
        config.analyzer.fft_size,
        config.analyzer.smoothing,
        config.analyzer.min_decibels,
        config.analyzer.max_decibels,
    )?;
    Ok(RenderLoop::new(
        EffectRegistry::with_builtin_effects(),
        analyzer,
    ))
}

/// Bass pulse plus a treble sweep, enough to exercise both band paths.
fn test_tone(seconds: f64) -> BufferSource {
    let total = (seconds * SAMPLE_RATE as f64) as usize;
    let samples: Vec<f32> = (0..total)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            let bass = (TAU * 60.0 * t).sin() * 0.6;
            let sweep = (TAU * (2_000.0 + 4_000.0 * t) * t).sin() * 0.3;
            bass + sweep
        })
        .collect();
    BufferSource::new(samples, SAMPLE_RATE)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive animation studio", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the registered effect types.
    Effects,
    /// Run an effect headlessly against a synthesized test tone.
    Demo {
        /// Effect-type identifier to run.
        #[arg(short, long, default_value = "GlitchCircle")]
        effect: String,
        /// How long to run, in seconds.
        #[arg(short, long, default_value_t = 2.0)]
        seconds: f64,
    },
    /// Record a session and write the combined artifact to disk.
    Capture {
        /// Effect-type identifier to record.
        #[arg(short, long, default_value = "MatrixShape")]
        effect: String,
        /// Recording length, in seconds.
        #[arg(short, long, default_value_t = 10.0)]
        seconds: f64,
        /// Directory the artifact is written into.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}
