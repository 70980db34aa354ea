use std::time::{Duration, Instant};

use anyhow::Context as _;
use serde_json::json;

use screenframer::{
    BackendKind, ByteBuf, MemorySink, OutputDescriptor, Overlayer, ScreenBounds,
    TemplateDescriptor, TemplateImage, create_backend,
};

#[derive(Clone, Debug)]
struct BenchArgs {
    template_width: u32,
    template_height: u32,
    frame_width: u32,
    frame_height: u32,
    frames: u32,
    backends: Vec<BackendKind>,
}

#[derive(Clone, Debug)]
struct RunMetrics {
    backend: &'static str,
    task_create: Duration,
    frame_mean: Duration,
    frame_max: Duration,
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> anyhow::Result<()> {
    let args = parse_args()?;
    if args.template_width < 16 || args.template_height < 16 {
        anyhow::bail!("--template-width/--template-height must be >= 16");
    }
    if args.frame_width == 0 || args.frame_height == 0 || args.frames == 0 {
        anyhow::bail!("--frame-width, --frame-height and --frames must be > 0");
    }

    let overlayer = synth_overlayer(args.template_width, args.template_height)?;
    let frame = ByteBuf::filled(args.frame_width, args.frame_height, &[0xff, 0xff, 0xff]);

    let mut runs = Vec::with_capacity(args.backends.len());
    for &kind in &args.backends {
        let metrics = run_once(&overlayer, &frame, kind, args.frames)?;
        eprintln!(
            "{}: task creation {} us, mean frame {} us, max frame {} us",
            metrics.backend,
            metrics.task_create.as_micros(),
            metrics.frame_mean.as_micros(),
            metrics.frame_max.as_micros()
        );
        runs.push(metrics);
    }

    let report = json!({
        "template": [args.template_width, args.template_height],
        "frame": [args.frame_width, args.frame_height],
        "frames": args.frames,
        "runs": runs.iter().map(|m| json!({
            "backend": m.backend,
            "task_create_us": m.task_create.as_micros() as u64,
            "frame_mean_us": m.frame_mean.as_micros() as u64,
            "frame_max_us": m.frame_max.as_micros() as u64,
        })).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_once(
    overlayer: &Overlayer,
    frame: &ByteBuf,
    kind: BackendKind,
    frames: u32,
) -> anyhow::Result<RunMetrics> {
    let (tw, th) = overlayer.image().dims();
    let out_path = std::env::temp_dir().join("screenframer-bench.mp4");
    let output = OutputDescriptor::new(out_path, 60.0, tw, th);

    let started = Instant::now();
    let mut task = overlayer.task(output, create_backend(kind), MemorySink::discarding())?;
    let task_create = started.elapsed();
    task.initialize()?;

    let mut total = Duration::ZERO;
    let mut frame_max = Duration::ZERO;
    for _ in 0..frames {
        let t0 = Instant::now();
        task.feed_frame(frame)?;
        let dt = t0.elapsed();
        total += dt;
        frame_max = frame_max.max(dt);
    }
    task.finalize()?;

    Ok(RunMetrics {
        backend: kind_name(kind),
        task_create,
        frame_mean: total / frames,
        frame_max,
    })
}

/// A light-grey device body with an opaque bezel and a transparent screen cut-out.
fn synth_overlayer(width: u32, height: u32) -> anyhow::Result<Overlayer> {
    let bounds = ScreenBounds::new(
        (width / 12) as i32,
        (height / 10) as i32,
        (width - width / 12) as i32,
        (height - height / 10) as i32,
    );
    let mut bgr = Vec::with_capacity(width as usize * height as usize * 3);
    let mut mask = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            let inside =
                x >= bounds.left && x < bounds.right && y >= bounds.top && y < bounds.bottom;
            bgr.extend_from_slice(&[0xd0, 0xd0, 0xd0]);
            mask.push(if inside { 0 } else { 0xff });
        }
    }
    let image = TemplateImage::from_layers(
        ByteBuf::from_raw(width, height, 3, bgr)?,
        ByteBuf::from_raw(width, height, 1, mask)?,
    )?;
    let descriptor = TemplateDescriptor::new("synthetic.png", bounds, width, height);
    Ok(Overlayer::from_image(descriptor, image))
}

fn kind_name(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Cpu => "cpu",
        BackendKind::Parallel => "parallel",
    }
}

fn parse_args() -> anyhow::Result<BenchArgs> {
    let mut args = std::env::args().skip(1);

    // Template size matches a tall phone mockup; the frame is a typical screen recording.
    let mut out = BenchArgs {
        template_width: 2286,
        template_height: 4000,
        frame_width: 886,
        frame_height: 1920,
        frames: 300,
        backends: vec![BackendKind::Cpu, BackendKind::Parallel],
    };

    while let Some(a) = args.next() {
        match a.as_str() {
            "--template-width" => {
                out.template_width = parse_u32(args.next(), "--template-width")?
            }
            "--template-height" => {
                out.template_height = parse_u32(args.next(), "--template-height")?
            }
            "--frame-width" => out.frame_width = parse_u32(args.next(), "--frame-width")?,
            "--frame-height" => out.frame_height = parse_u32(args.next(), "--frame-height")?,
            "--frames" => out.frames = parse_u32(args.next(), "--frames")?,
            "--backend" => {
                let v = args.next().ok_or_else(|| {
                    anyhow::anyhow!("missing value for --backend (cpu|parallel|all)")
                })?;
                out.backends = match v.as_str() {
                    "cpu" => vec![BackendKind::Cpu],
                    "parallel" => vec![BackendKind::Parallel],
                    "all" => vec![BackendKind::Cpu, BackendKind::Parallel],
                    _ => anyhow::bail!("unknown --backend '{v}' (expected cpu, parallel or all)"),
                };
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => anyhow::bail!("unknown arg '{a}' (try --help)"),
        }
    }

    Ok(out)
}

fn parse_u32(v: Option<String>, flag: &str) -> anyhow::Result<u32> {
    let v = v.ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))?;
    v.parse::<u32>()
        .with_context(|| format!("parse {flag} value '{v}'"))
}

fn print_help() {
    eprintln!(
        "screenframer-bench\n\n\
         Options:\n  \
         --template-width N   (default 2286)\n  \
         --template-height N  (default 4000)\n  \
         --frame-width N      (default 886)\n  \
         --frame-height N     (default 1920)\n  \
         --frames N           (default 300)\n  \
         --backend KIND       cpu|parallel|all (default all)"
    );
}
