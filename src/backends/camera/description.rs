// SPDX-License-Identifier: GPL-3.0-only

//! Textual pipeline descriptions
//!
//! Preview and reader pipelines are assembled from typed stages and rendered
//! to the `a ! b ! c` launch syntax.

use crate::constants::pipeline;
use std::fmt;

/// One element or caps filter in a linear pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Hardware source, optionally pinned to a camera name
    Source { camera_name: Option<String> },
    /// Leaky queue keeping only the newest buffers
    LeakyQueue { max_buffers: u32 },
    /// Raw video caps
    RawCaps {
        width: u32,
        height: u32,
        framerate: Option<u32>,
        format: Option<&'static str>,
    },
    /// Both sensors are mounted upside down
    Rotate180,
    Convert,
    /// Display sink
    DisplaySink { element: String },
    /// Application sink returning only the newest frame
    AppSink,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Source { camera_name } => {
                write!(f, "{}", pipeline::SOURCE_ELEMENT)?;
                if let Some(name) = camera_name {
                    write!(f, " camera-name=\"{}\"", escape_camera_name(name))?;
                }
                Ok(())
            }
            Stage::LeakyQueue { max_buffers } => {
                write!(f, "queue max-size-buffers={max_buffers} leaky=downstream")
            }
            Stage::RawCaps {
                width,
                height,
                framerate,
                format,
            } => {
                write!(f, "video/x-raw")?;
                if let Some(format) = format {
                    write!(f, ",format={format}")?;
                }
                write!(f, ",width={width},height={height}")?;
                if let Some(fps) = framerate {
                    write!(f, ",framerate={fps}/1")?;
                }
                Ok(())
            }
            Stage::Rotate180 => write!(f, "videoflip method=rotate-180"),
            Stage::Convert => write!(f, "videoconvert"),
            Stage::DisplaySink { element } => {
                write!(f, "{element} name={} sync=false", pipeline::SINK_NAME)
            }
            Stage::AppSink => write!(
                f,
                "appsink name={} emit-signals=true sync=false max-buffers=1 drop=true",
                pipeline::SINK_NAME
            ),
        }
    }
}

/// A linear pipeline description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDescription {
    stages: Vec<Stage>,
}

impl PipelineDescription {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Live preview for one sensor into a display sink
    pub fn preview(camera_name: &str, video_sink: &str) -> Self {
        Self::new(vec![
            Stage::Source {
                camera_name: Some(camera_name.to_string()),
            },
            Stage::LeakyQueue {
                max_buffers: pipeline::QUEUE_MAX_BUFFERS,
            },
            Stage::RawCaps {
                width: pipeline::PREVIEW_WIDTH,
                height: pipeline::PREVIEW_HEIGHT,
                framerate: None,
                format: None,
            },
            Stage::Rotate180,
            Stage::Convert,
            Stage::DisplaySink {
                element: video_sink.to_string(),
            },
        ])
    }

    /// BGR frames into an application sink; `None` lets the source pick a camera
    pub fn reader(camera_name: Option<&str>) -> Self {
        Self::new(vec![
            Stage::Source {
                camera_name: camera_name.map(str::to_string),
            },
            Stage::RawCaps {
                width: pipeline::READER_WIDTH,
                height: pipeline::READER_HEIGHT,
                framerate: Some(pipeline::READER_FRAMERATE),
                format: None,
            },
            Stage::Rotate180,
            Stage::Convert,
            Stage::RawCaps {
                width: pipeline::READER_WIDTH,
                height: pipeline::READER_HEIGHT,
                framerate: None,
                format: Some("BGR"),
            },
            Stage::AppSink,
        ])
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

impl fmt::Display for PipelineDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(" ! ")?;
            }
            write!(f, "{stage}")?;
        }
        Ok(())
    }
}

/// Escape a camera name for use inside a quoted launch-syntax property
///
/// The launch parser unescapes once, so `\_SB_` must be written `\\_SB_`.
pub fn escape_camera_name(name: &str) -> String {
    name.replace('\\', r"\\").replace('"', "\\\"")
}
