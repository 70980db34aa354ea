//! The frame compositing task: embeds each incoming frame into the template's screen.
//!
//! A [`FrameCompositor`] is built once per output video. Construction validates every input
//! and precomputes the blend layers, so a task either exists fully formed or not at all.
//! Frames then flow through `initialize → feed_frame* → finalize`.

use crate::{
    buffer::{ByteBuf, FloatBuf, PixelBackend},
    encode::{SinkParams, VideoSink},
    foundation::error::{FramerError, FramerResult},
    layout::{Layout, resolve_layout},
    output::OutputDescriptor,
    prepare::{PreparedLayers, prepare_layers},
    template::{TemplateDescriptor, TemplateImage, validate_layers},
};

/// Lifecycle of a [`FrameCompositor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Uninitialized,
    Active,
    Finalized,
}

struct WorkBuffers {
    /// Background color with the latest frame written into the screen rect.
    accumulation: FloatBuf,
    blended: FloatBuf,
    output: ByteBuf,
    /// Incoming frame stretched to the screen size.
    resized: ByteBuf,
}

pub struct FrameCompositor<S: VideoSink> {
    backend: Box<dyn PixelBackend>,
    sink: S,
    output: OutputDescriptor,
    layout: Layout,
    layers: PreparedLayers,
    state: TaskState,
    buffers: Option<WorkBuffers>,
    frames_written: u64,
}

impl<S: VideoSink> FrameCompositor<S> {
    /// Validates the template and output, resolves the layout and prepares the blend layers.
    pub fn new(
        template_bgr: &ByteBuf,
        mask: &ByteBuf,
        descriptor: &TemplateDescriptor,
        output: OutputDescriptor,
        backend: Box<dyn PixelBackend>,
        sink: S,
    ) -> FramerResult<Self> {
        descriptor.validate_geometry()?;
        output.validate()?;
        validate_layers(template_bgr, mask)?;

        let layout = resolve_layout(descriptor, template_bgr.dims(), &output)?;
        let layers = prepare_layers(
            backend.as_ref(),
            template_bgr,
            mask,
            layout.frame.width,
            layout.frame.height,
        )?;
        tracing::info!(
            backend = backend.name(),
            width = output.width,
            height = output.height,
            policy = ?layout.policy,
            "compositing task created"
        );

        Ok(Self {
            backend,
            sink,
            output,
            layout,
            layers,
            state: TaskState::Uninitialized,
            buffers: None,
            frames_written: 0,
        })
    }

    /// Allocates the working buffers and opens the sink.
    pub fn initialize(&mut self) -> FramerResult<()> {
        if self.state != TaskState::Uninitialized {
            return Err(FramerError::state(format!(
                "initialize called on a {:?} task",
                self.state
            )));
        }

        let (width, height) = (self.output.width, self.output.height);
        let background = self.output.background.to_bgr_f32();
        let mut accumulation = FloatBuf::filled(width, height, &background);
        accumulation.fill_region(self.layout.safety_border(), &[0.0; 3])?;
        let buffers = WorkBuffers {
            accumulation,
            blended: FloatBuf::filled(width, height, &background),
            output: ByteBuf::new(width, height, 3),
            resized: ByteBuf::new(self.layout.screen.width, self.layout.screen.height, 3),
        };

        let params = SinkParams {
            path: self.output.path.clone(),
            codec: self.output.codec,
            fps: self.output.fps,
            width,
            height,
        };
        self.sink.open(&params).map_err(|e| {
            FramerError::resource(format!(
                "could not open video sink for '{}': {e}",
                params.path.display()
            ))
        })?;

        self.buffers = Some(buffers);
        self.state = TaskState::Active;
        tracing::debug!(path = %params.path.display(), codec = %params.codec, "task initialized");
        Ok(())
    }

    /// Composites one BGR frame and hands it to the sink.
    ///
    /// The frame may have any size; it is stretched to the screen rectangle.
    pub fn feed_frame(&mut self, frame: &ByteBuf) -> FramerResult<()> {
        if self.state != TaskState::Active {
            return Err(FramerError::state(format!(
                "feed_frame called on a {:?} task",
                self.state
            )));
        }
        if frame.is_empty() || frame.channels() != 3 {
            return Err(FramerError::validation(format!(
                "frames must be non-empty 3-channel BGR, got {}x{}x{}",
                frame.width(),
                frame.height(),
                frame.channels()
            )));
        }
        let WorkBuffers {
            accumulation,
            blended,
            output,
            resized,
        } = self
            .buffers
            .as_mut()
            .ok_or_else(|| FramerError::state("active task has no working buffers"))?;
        let backend = self.backend.as_ref();
        let Layout { screen, frame: rect, .. } = self.layout;

        backend.resize(frame, resized)?;
        backend.convert_to_float(resized, accumulation.region_mut(screen)?)?;
        backend.multiply(
            accumulation.region(rect)?,
            &self.layers.inverse_mask,
            blended.region_mut(rect)?,
        )?;
        backend.add_assign(blended.region_mut(rect)?, &self.layers.background)?;
        backend.convert_to_bytes(blended, output)?;

        self.sink.write_frame(output)?;
        self.frames_written += 1;
        tracing::trace!(frame = self.frames_written, "frame written");
        Ok(())
    }

    /// `true` while the sink accepts frames.
    pub fn is_active(&self) -> bool {
        self.sink.is_open()
    }

    /// Closes the sink. Safe to call in any state, any number of times.
    pub fn finalize(&mut self) -> FramerResult<()> {
        if self.state == TaskState::Finalized {
            return Ok(());
        }
        self.state = TaskState::Finalized;
        self.buffers = None;
        let result = self.sink.close();
        tracing::debug!(frames = self.frames_written, "task finalized");
        result
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn output(&self) -> &OutputDescriptor {
        &self.output
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: VideoSink> Drop for FrameCompositor<S> {
    fn drop(&mut self) {
        if let Err(err) = self.finalize() {
            tracing::warn!(%err, "failed to finalize compositing task on drop");
        }
    }
}

/// A loaded template, ready to stamp out compositing tasks.
#[derive(Clone, Debug)]
pub struct Overlayer {
    descriptor: TemplateDescriptor,
    image: TemplateImage,
}

impl Overlayer {
    /// Validates `descriptor` and decodes its template image.
    pub fn load(descriptor: TemplateDescriptor) -> FramerResult<Self> {
        descriptor.validate()?;
        let image = TemplateImage::load(&descriptor.image_path)?;
        Ok(Self { descriptor, image })
    }

    pub fn from_image(descriptor: TemplateDescriptor, image: TemplateImage) -> Self {
        Self { descriptor, image }
    }

    pub fn descriptor(&self) -> &TemplateDescriptor {
        &self.descriptor
    }

    pub fn image(&self) -> &TemplateImage {
        &self.image
    }

    pub fn task<S: VideoSink>(
        &self,
        output: OutputDescriptor,
        backend: Box<dyn PixelBackend>,
        sink: S,
    ) -> FramerResult<FrameCompositor<S>> {
        FrameCompositor::new(
            self.image.bgr(),
            self.image.mask(),
            &self.descriptor,
            output,
            backend,
            sink,
        )
    }
}
