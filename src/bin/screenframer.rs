use std::{path::PathBuf, process::ExitCode, time::Instant};

use anyhow::Context as _;
use clap::{ArgAction, Parser, ValueEnum};
use screenframer::{
    BackendKind, Catalog, FfmpegSink, FourCc, OutputDescriptor, Overlayer, Padding, RgbColor,
    TemplateDescriptor, VideoReader, VideoSourceInfo, catalog::catalog_path, create_backend,
    derive_output_size, probe_video,
};

/// Embed a screen recording into a device template.
#[derive(Parser, Debug)]
#[command(name = "screenframer", version, disable_help_flag = true)]
struct Cli {
    /// Input video.
    input: PathBuf,

    /// Output video.
    output: PathBuf,

    /// Device template as `device[_color]`, or `auto` to match the input's aspect ratio.
    #[arg(short = 't', long, default_value = "auto")]
    template: String,

    /// Output width; height follows the template's aspect ratio.
    #[arg(short = 'w', long, default_value_t = 0, conflicts_with = "height")]
    width: u32,

    /// Output height; width follows the template's aspect ratio.
    #[arg(short = 'h', long, default_value_t = 0)]
    height: u32,

    /// Background color as `#RRGGBB`.
    #[arg(short = 'c', long, default_value = "#000000")]
    color: RgbColor,

    /// Border around the template: `0.1`, `0.1:` (horizontal) or `:0.1` (vertical).
    #[arg(short = 'p', long)]
    padding: Option<String>,

    /// Four-character codec tag.
    #[arg(long, default_value = "avc1")]
    codec: FourCc,

    /// Pixel backend.
    #[arg(long, value_enum, default_value_t = BackendChoice::Cpu)]
    backend: BackendChoice,

    /// Directory holding `contents.json` and the template images.
    #[arg(long, env = "SCREENFRAMER_RESOURCES", default_value = "resources")]
    resources: PathBuf,

    /// More log output: `-v` for info, `-vv` for debug.
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Print help.
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendChoice {
    Cpu,
    Parallel,
}

impl From<BackendChoice> for BackendKind {
    fn from(choice: BackendChoice) -> Self {
        match choice {
            BackendChoice::Cpu => BackendKind::Cpu,
            BackendChoice::Parallel => BackendKind::Parallel,
        }
    }
}

/// Failure classes, each with its own exit status.
enum Failure {
    Usage(anyhow::Error),
    InputMissing(PathBuf),
    Template(anyhow::Error),
    Processing(anyhow::Error),
}

impl Failure {
    fn exit_code(&self) -> u8 {
        match self {
            Failure::Usage(_) => 1,
            Failure::InputMissing(_) => 2,
            Failure::Template(_) => 3,
            Failure::Processing(_) => 4,
        }
    }

    fn report(&self) {
        match self {
            Failure::InputMissing(path) => {
                eprintln!("error: input video does not exist at: {}", path.display())
            }
            Failure::Usage(e) | Failure::Template(e) | Failure::Processing(e) => {
                eprintln!("error: {e:#}")
            }
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            failure.report();
            ExitCode::from(failure.exit_code())
        }
    }
}

/// Filter used when `RUST_LOG` is unset.
fn default_log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "screenframer=warn",
        1 => "screenframer=info",
        _ => "screenframer=debug",
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter(verbose)));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn run(cli: Cli) -> Result<(), Failure> {
    if !cli.input.exists() {
        return Err(Failure::InputMissing(cli.input));
    }

    let catalog = Catalog::load(&catalog_path(&cli.resources))
        .context("could not load the template catalog")
        .map_err(Failure::Template)?;
    let fixed = if cli.template == "auto" {
        None
    } else {
        Some(
            catalog
                .resolve(&cli.template, &cli.resources)
                .map_err(|e| Failure::Template(e.into()))?,
        )
    };

    let info = probe_video(&cli.input)
        .with_context(|| format!("could not read '{}'", cli.input.display()))
        .map_err(Failure::Processing)?;
    tracing::info!(
        width = info.width,
        height = info.height,
        fps = info.fps,
        frames = ?info.frame_count,
        "input metadata read"
    );

    let descriptor = match fixed {
        Some(descriptor) => descriptor,
        None => {
            let (_, descriptor) = catalog
                .auto_resolve(info.width, info.height, &cli.resources)
                .map_err(|e| Failure::Template(e.into()))?;
            descriptor
        }
    };

    let output = output_descriptor(&cli, &descriptor, info.fps)?;
    tracing::info!(
        width = output.width,
        height = output.height,
        fps = output.fps,
        color = %output.background,
        "output configuration"
    );

    let overlayer = Overlayer::load(descriptor).map_err(|e| Failure::Template(e.into()))?;
    composite(&overlayer, output, cli.backend.into(), info).map_err(Failure::Processing)
}

fn output_descriptor(
    cli: &Cli,
    descriptor: &TemplateDescriptor,
    fps: f64,
) -> Result<OutputDescriptor, Failure> {
    let (width, height) = derive_output_size(descriptor, cli.width, cli.height)
        .map_err(|e| Failure::Usage(e.into()))?;
    let mut output = OutputDescriptor::new(&cli.output, fps, width, height)
        .with_background(cli.color)
        .with_codec(cli.codec);
    if let Some(spec) = &cli.padding {
        let padding =
            Padding::parse(spec, (width, height)).map_err(|e| Failure::Usage(e.into()))?;
        output = output.with_padding(padding);
    }
    Ok(output)
}

fn composite(
    overlayer: &Overlayer,
    output: OutputDescriptor,
    backend: BackendKind,
    info: VideoSourceInfo,
) -> anyhow::Result<()> {
    let started = Instant::now();
    let out_path = output.path.clone();
    let total = info.frame_count;
    let mut task = overlayer.task(output, create_backend(backend), FfmpegSink::new())?;
    task.initialize()?;

    let reader = VideoReader::open(info)?;
    for (index, frame) in reader.enumerate() {
        let frame = frame.with_context(|| format!("failed to decode frame {index}"))?;
        task.feed_frame(&frame)?;
        log_progress(index as u64 + 1, total);
    }
    task.finalize()?;

    tracing::info!(
        frames = task.frames_written(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "wrote {}",
        out_path.display()
    );
    Ok(())
}

fn log_progress(done: u64, total: Option<u64>) {
    if !done.is_multiple_of(100) {
        return;
    }
    match total {
        Some(total) if total > 0 => {
            tracing::info!("{done}/{total} frames ({}%)", done * 100 / total)
        }
        _ => tracing::info!("{done} frames"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_by_default_and_each_flag_raises_one_level() {
        assert_eq!(default_log_filter(0), "screenframer=warn");
        assert_eq!(default_log_filter(1), "screenframer=info");
        assert_eq!(default_log_filter(2), "screenframer=debug");
        assert_eq!(default_log_filter(5), "screenframer=debug");
    }
}
