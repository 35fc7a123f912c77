// SPDX-License-Identifier: GPL-3.0-only

//! On-demand frame reader
//!
//! A small standalone pipeline that pulls BGR frames into memory. It is
//! independent of the preview controller and must not be opened while a
//! preview pipeline holds the same sensor.

use super::description::PipelineDescription;
use crate::constants::pipeline;
use crate::errors::{PipelineError, ReaderError};
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long `open` waits for the pipeline to preroll
const STARTUP_WAIT: Duration = Duration::from_secs(5);

/// How long `read` waits for a sample
const PULL_TIMEOUT: Duration = Duration::from_secs(2);

/// A tightly packed BGR frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// `width * height * 3` bytes, rows without padding
    pub data: Vec<u8>,
}

impl RawFrame {
    /// Convert to an RGB image for saving
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        let mut rgb = self.data.clone();
        for px in rgb.chunks_exact_mut(3) {
            px.swap(0, 2);
        }
        image::RgbImage::from_raw(self.width, self.height, rgb)
    }
}

pub struct FrameReader {
    pipeline: Option<gstreamer::Pipeline>,
    appsink: Option<AppSink>,
}

impl FrameReader {
    /// Build and start a reader pipeline
    ///
    /// `camera_name` is the unescaped hardware identifier; `None` lets the
    /// source pick its default camera.
    pub fn open(camera_name: Option<&str>) -> Result<Self, ReaderError> {
        gstreamer::init()?;

        let description = PipelineDescription::reader(camera_name).to_string();
        info!(pipeline = %description, "Opening frame reader");

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| PipelineError::Launch(e.to_string()))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| PipelineError::Launch("description is not a pipeline".into()))?;

        let appsink = pipeline
            .by_name(pipeline::SINK_NAME)
            .ok_or_else(|| PipelineError::MissingElement(pipeline::SINK_NAME.into()))?
            .downcast::<AppSink>()
            .map_err(|_| PipelineError::MissingElement(pipeline::SINK_NAME.into()))?;

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let detail = pop_bus_error(&pipeline).unwrap_or_else(|| format!("{e:?}"));
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(PipelineError::StateChange {
                target: "PLAYING".into(),
                detail,
            }
            .into());
        }

        if let Err(e) = wait_for_preroll(&pipeline) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(e.into());
        }

        Ok(Self {
            pipeline: Some(pipeline),
            appsink: Some(appsink),
        })
    }

    /// Pull the next frame; `Ok(None)` when none arrived in time
    pub fn read(&self) -> Result<Option<RawFrame>, ReaderError> {
        let appsink = self.appsink.as_ref().ok_or(ReaderError::Released)?;

        let Some(sample) =
            appsink.try_pull_sample(gstreamer::ClockTime::from_mseconds(
                PULL_TIMEOUT.as_millis() as u64,
            ))
        else {
            debug!("No sample within pull timeout");
            return Ok(None);
        };

        let caps = sample.caps().ok_or(ReaderError::MalformedSample("caps"))?;
        let info = gstreamer_video::VideoInfo::from_caps(caps)
            .map_err(|e| ReaderError::Layout(e.to_string()))?;
        let buffer = sample
            .buffer()
            .ok_or(ReaderError::MalformedSample("buffer"))?;
        let map = buffer
            .map_readable()
            .map_err(|_| ReaderError::MalformedSample("readable memory"))?;

        let stride = usize::try_from(info.stride()[0])
            .map_err(|_| ReaderError::Layout("negative stride".into()))?;
        let data = compact_rows(map.as_slice(), info.width(), info.height(), stride)?;

        Ok(Some(RawFrame {
            width: info.width(),
            height: info.height(),
            data,
        }))
    }

    /// Whether the reader pipeline is currently playing
    pub fn grab(&self) -> bool {
        self.pipeline.as_ref().is_some_and(|p| {
            let (result, state, _) = p.state(gstreamer::ClockTime::ZERO);
            result.is_ok() && state == gstreamer::State::Playing
        })
    }

    /// Stop the pipeline and drop it; later reads fail with `Released`
    pub fn release(&mut self) {
        self.appsink.take();
        if let Some(pipeline) = self.pipeline.take() {
            debug!("Releasing frame reader");
            if let Err(e) = pipeline.set_state(gstreamer::State::Null) {
                warn!(error = ?e, "Failed to stop frame reader");
            }
        }
    }
}

impl Drop for FrameReader {
    fn drop(&mut self) {
        self.release();
    }
}

/// Wait for async-done or an error; a timeout only warns
fn wait_for_preroll(pipeline: &gstreamer::Pipeline) -> Result<(), PipelineError> {
    use gstreamer::MessageView;

    let Some(bus) = pipeline.bus() else {
        return Ok(());
    };
    let deadline = Instant::now() + STARTUP_WAIT;

    while Instant::now() < deadline {
        let Some(msg) = bus.timed_pop_filtered(
            gstreamer::ClockTime::from_mseconds(100),
            &[
                gstreamer::MessageType::Error,
                gstreamer::MessageType::AsyncDone,
            ],
        ) else {
            continue;
        };
        match msg.view() {
            MessageView::Error(err) => {
                return Err(PipelineError::Hardware(err.error().to_string()));
            }
            MessageView::AsyncDone(_) => return Ok(()),
            _ => {}
        }
    }

    warn!("Frame reader did not preroll within {:?}", STARTUP_WAIT);
    Ok(())
}

/// First error queued on the pipeline's bus, as `source: message`
fn pop_bus_error(pipeline: &gstreamer::Pipeline) -> Option<String> {
    use gstreamer::MessageView;

    let bus = pipeline.bus()?;
    while let Some(msg) = bus.pop_filtered(&[gstreamer::MessageType::Error]) {
        if let MessageView::Error(err) = msg.view() {
            let source = msg
                .src()
                .map(|s| s.name().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            warn!(source = %source, error = %err.error(), "Frame reader error from bus");
            return Some(format!("{source}: {}", err.error()));
        }
    }
    None
}

/// Copy `height` rows of `width * 3` bytes out of a padded buffer
pub fn compact_rows(
    src: &[u8],
    width: u32,
    height: u32,
    stride: usize,
) -> Result<Vec<u8>, ReaderError> {
    let row = width as usize * 3;
    let height = height as usize;
    if stride < row {
        return Err(ReaderError::Layout(format!(
            "stride {stride} shorter than row {row}"
        )));
    }
    if height > 0 && src.len() < stride * (height - 1) + row {
        return Err(ReaderError::Layout(format!(
            "buffer of {} bytes too small for {height} rows",
            src.len()
        )));
    }

    if stride == row {
        return Ok(src[..row * height].to_vec());
    }

    let mut data = Vec::with_capacity(row * height);
    for y in 0..height {
        let start = y * stride;
        data.extend_from_slice(&src[start..start + row]);
    }
    Ok(data)
}
