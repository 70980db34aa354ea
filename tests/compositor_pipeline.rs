use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
};

use screenframer::{
    BackendKind, ByteBuf, CpuBackend, FramerResult, FrameCompositor, LayoutPolicy, MemorySink,
    OutputDescriptor, Overlayer, Padding, Rect, RgbColor, ScreenBounds, SinkParams,
    TemplateDescriptor, TemplateImage, VideoSink, create_backend,
};

fn descriptor_4x4() -> TemplateDescriptor {
    TemplateDescriptor::new("in-memory.png", ScreenBounds::new(1, 1, 3, 3), 4, 4)
}

/// Mask that is opaque everywhere except `hole`.
fn mask_with_hole(width: u32, height: u32, hole: Rect) -> ByteBuf {
    let mut mask = ByteBuf::filled(width, height, &[255]);
    mask.fill_region(hole, &[0]).unwrap();
    mask
}

fn pixel(frame: &ByteBuf, x: u32, y: u32) -> [u8; 3] {
    let px = frame.pixel(x, y).unwrap();
    [px[0], px[1], px[2]]
}

#[test]
fn opaque_white_template_yields_white_output() {
    let mut task = FrameCompositor::new(
        &ByteBuf::filled(4, 4, &[255, 255, 255]),
        &ByteBuf::filled(4, 4, &[255]),
        &descriptor_4x4(),
        OutputDescriptor::new("mem.mp4", 30.0, 4, 4),
        Box::new(CpuBackend),
        MemorySink::new(),
    )
    .unwrap();
    task.initialize().unwrap();
    task.feed_frame(&ByteBuf::filled(2, 2, &[255, 255, 255])).unwrap();

    let frames = task.sink().frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].dims(), (4, 4));
    assert!(frames[0].as_slice().iter().all(|&v| v == 255));
}

#[test]
fn transparent_screen_shows_frame_content_over_black_template() {
    let screen = Rect::new(1, 1, 2, 2);
    let mut task = FrameCompositor::new(
        &ByteBuf::filled(4, 4, &[0, 0, 0]),
        &mask_with_hole(4, 4, screen),
        &descriptor_4x4(),
        OutputDescriptor::new("mem.mp4", 30.0, 4, 4),
        Box::new(CpuBackend),
        MemorySink::new(),
    )
    .unwrap();
    task.initialize().unwrap();
    // Pure blue in BGR order.
    task.feed_frame(&ByteBuf::filled(2, 2, &[255, 0, 0])).unwrap();

    let out = &task.sink().frames()[0];
    for y in 0..4 {
        for x in 0..4 {
            let expected = if screen.contains(&Rect::new(x, y, 1, 1)) {
                [255, 0, 0]
            } else {
                [0, 0, 0]
            };
            assert_eq!(pixel(out, x, y), expected, "pixel ({x}, {y})");
        }
    }
}

#[test]
fn template_png_is_split_into_bgr_and_alpha() {
    let dir = PathBuf::from("target").join("compositor_pipeline");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("red_device.png");

    let mut img = image::RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 255]));
    for y in 1..3 {
        for x in 1..3 {
            img.put_pixel(x, y, image::Rgba([255, 0, 0, 0]));
        }
    }
    img.save(&path).unwrap();

    let descriptor = TemplateDescriptor::new(&path, ScreenBounds::new(1, 1, 3, 3), 4, 4);
    let overlayer = Overlayer::load(descriptor).unwrap();
    assert_eq!(overlayer.image().dims(), (4, 4));
    assert_eq!(overlayer.image().bgr().pixel(0, 0).unwrap(), &[0, 0, 255]);
    assert_eq!(overlayer.image().mask().pixel(1, 1).unwrap(), &[0]);

    let mut task = overlayer
        .task(
            OutputDescriptor::new("mem.mp4", 24.0, 8, 8),
            Box::new(CpuBackend),
            MemorySink::new(),
        )
        .unwrap();
    assert_eq!(task.layout().screen, Rect::new(2, 2, 4, 4));
    task.initialize().unwrap();
    task.feed_frame(&ByteBuf::filled(3, 3, &[255, 255, 255])).unwrap();

    let out = &task.sink().frames()[0];
    assert_eq!(pixel(out, 0, 0), [0, 0, 255]);
    assert_eq!(pixel(out, 4, 4), [255, 255, 255]);
}

#[test]
fn rgb_template_without_alpha_is_rejected() {
    let dir = PathBuf::from("target").join("compositor_pipeline");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("no_alpha.png");
    image::RgbImage::from_pixel(4, 4, image::Rgb([1, 2, 3]))
        .save(&path)
        .unwrap();

    let descriptor = TemplateDescriptor::new(&path, ScreenBounds::new(1, 1, 3, 3), 4, 4);
    let err = Overlayer::load(descriptor).unwrap_err();
    assert!(err.is_validation(), "{err}");
}

#[test]
fn padding_policy_insets_template_in_background() {
    let descriptor =
        TemplateDescriptor::new("in-memory.png", ScreenBounds::new(2, 2, 8, 8), 10, 10);
    let background = "#102030".parse::<RgbColor>().unwrap();
    let output = OutputDescriptor::new("mem.mp4", 30.0, 12, 12)
        .with_padding(Padding::uniform(0.1))
        .with_background(background);
    assert!(matches!(output.layout_policy(), LayoutPolicy::Padding(_)));

    let mut task = FrameCompositor::new(
        &ByteBuf::filled(10, 10, &[0, 0, 0]),
        &mask_with_hole(10, 10, Rect::new(2, 2, 6, 6)),
        &descriptor,
        output,
        Box::new(CpuBackend),
        MemorySink::new(),
    )
    .unwrap();
    assert_eq!(task.layout().frame, Rect::new(1, 1, 10, 10));
    assert_eq!(task.layout().screen, Rect::new(3, 3, 6, 6));

    task.initialize().unwrap();
    task.feed_frame(&ByteBuf::filled(6, 6, &[200, 200, 200])).unwrap();

    let out = &task.sink().frames()[0];
    assert_eq!(pixel(out, 0, 0), [0x30, 0x20, 0x10]);
    assert_eq!(pixel(out, 11, 11), [0x30, 0x20, 0x10]);
    assert_eq!(pixel(out, 1, 1), [0, 0, 0]);
    assert_eq!(pixel(out, 5, 5), [200, 200, 200]);
}

/// Row 5 of a 12x12 canvas with the screen at (4, 4, 4, 4), a fully transparent
/// mask and a white background.
fn safety_border_row(padding: Option<Padding>) -> Vec<u8> {
    let descriptor =
        TemplateDescriptor::new("in-memory.png", ScreenBounds::new(4, 4, 8, 8), 12, 12);
    let mut output = OutputDescriptor::new("mem.mp4", 30.0, 12, 12)
        .with_background("#FFFFFF".parse::<RgbColor>().unwrap());
    if let Some(padding) = padding {
        output = output.with_padding(padding);
    }
    let mut task = FrameCompositor::new(
        &ByteBuf::filled(12, 12, &[255, 255, 255]),
        &ByteBuf::filled(12, 12, &[0]),
        &descriptor,
        output,
        Box::new(CpuBackend),
        MemorySink::new(),
    )
    .unwrap();
    assert_eq!(task.layout().screen, Rect::new(4, 4, 4, 4));
    task.initialize().unwrap();
    task.feed_frame(&ByteBuf::filled(4, 4, &[100, 100, 100])).unwrap();

    let out = &task.sink().frames()[0];
    (0..12)
        .map(|x| {
            let [b, g, r] = pixel(out, x, 5);
            assert!(b == g && g == r, "pixel ({x}, 5) is not gray");
            b
        })
        .collect()
}

#[test]
fn bounds_scaling_blacks_out_two_pixels_around_the_screen() {
    assert_eq!(
        safety_border_row(None),
        [255, 255, 0, 0, 100, 100, 100, 100, 0, 0, 255, 255]
    );
}

#[test]
fn padding_blacks_out_one_pixel_around_the_screen() {
    assert_eq!(
        safety_border_row(Some(Padding::uniform(0.0))),
        [255, 255, 255, 0, 100, 100, 100, 100, 0, 255, 255, 255]
    );
}

#[test]
fn mismatched_frame_aspect_is_stretched_not_rejected() {
    let mut task = FrameCompositor::new(
        &ByteBuf::filled(4, 4, &[0, 0, 0]),
        &mask_with_hole(4, 4, Rect::new(1, 1, 2, 2)),
        &descriptor_4x4(),
        OutputDescriptor::new("mem.mp4", 30.0, 4, 4),
        Box::new(CpuBackend),
        MemorySink::new(),
    )
    .unwrap();
    task.initialize().unwrap();
    for (w, h) in [(7, 3), (1, 9), (2, 2), (640, 480)] {
        task.feed_frame(&ByteBuf::filled(w, h, &[10, 20, 30])).unwrap();
    }

    assert_eq!(task.frames_written(), 4);
    for frame in task.sink().frames() {
        assert_eq!(frame.dims(), (4, 4));
        assert_eq!(pixel(frame, 1, 1), [10, 20, 30]);
        assert_eq!(pixel(frame, 2, 2), [10, 20, 30]);
    }
}

#[test]
fn sink_receives_output_parameters() {
    let output = OutputDescriptor::new("clips/out.mov", 59.94, 4, 4)
        .with_codec("mp4v".parse().unwrap());
    let mut task = FrameCompositor::new(
        &ByteBuf::filled(4, 4, &[0, 0, 0]),
        &ByteBuf::filled(4, 4, &[255]),
        &descriptor_4x4(),
        output,
        Box::new(CpuBackend),
        MemorySink::new(),
    )
    .unwrap();
    task.initialize().unwrap();

    let params = task.sink().params().unwrap();
    assert_eq!(params.path, PathBuf::from("clips/out.mov"));
    assert_eq!(params.codec.to_string(), "mp4v");
    assert_eq!((params.width, params.height), (4, 4));
    assert_eq!(params.fps, 59.94);
}

#[test]
fn parallel_backend_matches_cpu_output() {
    let (w, h) = (24, 40);
    let mut bgr = ByteBuf::new(w, h, 3);
    for (i, v) in bgr.as_mut_slice().iter_mut().enumerate() {
        *v = (i * 37 % 251) as u8;
    }
    let mut mask = ByteBuf::new(w, h, 1);
    for (i, v) in mask.as_mut_slice().iter_mut().enumerate() {
        *v = (i * 13 % 256) as u8;
    }
    let mut frame = ByteBuf::new(13, 29, 3);
    for (i, v) in frame.as_mut_slice().iter_mut().enumerate() {
        *v = (i * 7 % 256) as u8;
    }
    let descriptor =
        TemplateDescriptor::new("in-memory.png", ScreenBounds::new(3, 5, 21, 35), w, h);

    let render = |kind: BackendKind| {
        let output = OutputDescriptor::new("mem.mp4", 30.0, 37, 61)
            .with_background(RgbColor::new(9, 99, 199));
        let mut task = FrameCompositor::new(
            &bgr,
            &mask,
            &descriptor,
            output,
            create_backend(kind),
            MemorySink::new(),
        )
        .unwrap();
        task.initialize().unwrap();
        task.feed_frame(&frame).unwrap();
        task.feed_frame(&frame).unwrap();
        task.sink().frames().to_vec()
    };

    assert_eq!(render(BackendKind::Cpu), render(BackendKind::Parallel));
}

/// Counts `close` calls through a shared handle so they stay visible after the task is gone.
struct CountingSink {
    open: bool,
    closes: Arc<AtomicU32>,
}

impl VideoSink for CountingSink {
    fn open(&mut self, _params: &SinkParams) -> FramerResult<()> {
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write_frame(&mut self, _frame: &ByteBuf) -> FramerResult<()> {
        Ok(())
    }

    fn close(&mut self) -> FramerResult<()> {
        self.open = false;
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn dropping_an_active_task_closes_the_sink_once() {
    let closes = Arc::new(AtomicU32::new(0));
    let sink = CountingSink {
        open: false,
        closes: Arc::clone(&closes),
    };
    let mut task = FrameCompositor::new(
        &ByteBuf::filled(4, 4, &[0, 0, 0]),
        &ByteBuf::filled(4, 4, &[255]),
        &descriptor_4x4(),
        OutputDescriptor::new("mem.mp4", 30.0, 4, 4),
        Box::new(CpuBackend),
        sink,
    )
    .unwrap();
    task.initialize().unwrap();
    assert!(task.is_active());
    drop(task);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn invalid_output_fails_construction() {
    let err = FrameCompositor::new(
        &ByteBuf::filled(4, 4, &[0, 0, 0]),
        &ByteBuf::filled(4, 4, &[255]),
        &descriptor_4x4(),
        OutputDescriptor::new("mem.mp4", 0.0, 4, 4),
        Box::new(CpuBackend),
        MemorySink::new(),
    )
    .err()
    .unwrap();
    assert!(err.is_validation());

    let err = FrameCompositor::new(
        &ByteBuf::filled(4, 4, &[0, 0, 0]),
        &ByteBuf::filled(4, 4, &[255]),
        &descriptor_4x4(),
        OutputDescriptor::new("mem.mp4", 30.0, 4, 4).with_padding(Padding::uniform(0.5)),
        Box::new(CpuBackend),
        MemorySink::new(),
    )
    .err()
    .unwrap();
    assert!(err.is_validation());
}

#[test]
fn template_image_from_layers_checks_shapes() {
    let err =
        TemplateImage::from_layers(ByteBuf::new(4, 4, 3), ByteBuf::new(4, 4, 3)).unwrap_err();
    assert!(err.is_validation());
}
