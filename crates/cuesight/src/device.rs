//! Camera and projector collaborators.
//!
//! The core only needs a frame written to a path and an image shown full
//! screen. Which implementation serves a run is decided once, by
//! [`DeviceConfig::build_camera`] and [`DeviceConfig::build_display`]; call
//! sites only see the traits.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum DeviceError {
    #[error("{device} unavailable: {reason}")]
    Unavailable { device: &'static str, reason: String },
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Failed { program: String, status: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub trait Camera {
    /// Write one frame to `output`, rotated by `rotation` degrees, after
    /// letting exposure settle for `wait`.
    fn capture(&self, output: &Path, rotation: u32, wait: Duration) -> Result<(), DeviceError>;
}

pub trait Display {
    /// Show the image at `image`; `wait_ms == 0` blocks until dismissed.
    fn show(&self, image: &Path, fullscreen: bool, wait_ms: u64) -> Result<(), DeviceError>;
}

/// External program with `{placeholder}` arguments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn command(&self, vars: &[(&str, String)]) -> Command {
        let mut cmd = Command::new(&self.program);
        for arg in &self.args {
            let mut arg = arg.clone();
            for (key, value) in vars {
                arg = arg.replace(&format!("{{{key}}}"), value);
            }
            cmd.arg(arg);
        }
        cmd
    }

    fn run(&self, vars: &[(&str, String)]) -> Result<(), DeviceError> {
        log::debug!("running {} {:?}", self.program, self.args);
        let status = self
            .command(vars)
            .status()
            .map_err(|source| DeviceError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(DeviceError::Failed {
                program: self.program.clone(),
                status: status.to_string(),
            })
        }
    }

    /// Program path given explicitly, or found in one of the `PATH` entries.
    pub fn locate(&self) -> Option<PathBuf> {
        let program = Path::new(&self.program);
        if program.components().count() > 1 {
            return program.is_file().then(|| program.to_path_buf());
        }
        let paths = std::env::var_os("PATH")?;
        std::env::split_paths(&paths)
            .map(|dir| dir.join(program))
            .find(|candidate| candidate.is_file())
    }
}

/// Camera driven by a still-capture program; placeholders `{output}`,
/// `{rotation}` and `{wait_ms}`.
#[derive(Clone, Debug)]
pub struct CommandCamera {
    spec: CommandSpec,
}

impl CommandCamera {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

impl Camera for CommandCamera {
    fn capture(&self, output: &Path, rotation: u32, wait: Duration) -> Result<(), DeviceError> {
        self.spec.run(&[
            ("output", output.display().to_string()),
            ("rotation", rotation.to_string()),
            ("wait_ms", wait.as_millis().max(1).to_string()),
        ])
    }
}

/// Display driven by an image viewer; placeholders `{image}`, `{wait_ms}`.
/// `fullscreen_args` are inserted first when full screen is requested.
#[derive(Clone, Debug)]
pub struct CommandDisplay {
    spec: CommandSpec,
    fullscreen_args: Vec<String>,
}

impl CommandDisplay {
    pub fn new(spec: CommandSpec, fullscreen_args: Vec<String>) -> Self {
        Self {
            spec,
            fullscreen_args,
        }
    }
}

impl Display for CommandDisplay {
    fn show(&self, image: &Path, fullscreen: bool, wait_ms: u64) -> Result<(), DeviceError> {
        let mut spec = self.spec.clone();
        if fullscreen {
            let mut args = self.fullscreen_args.clone();
            args.append(&mut spec.args);
            spec.args = args;
        }
        spec.run(&[
            ("image", image.display().to_string()),
            ("wait_ms", wait_ms.to_string()),
        ])
    }
}

/// Replays a stored frame, for development machines and tests.
#[derive(Clone, Debug)]
pub struct FileCamera {
    frame: PathBuf,
}

impl FileCamera {
    pub fn new(frame: impl Into<PathBuf>) -> Self {
        Self {
            frame: frame.into(),
        }
    }
}

impl Camera for FileCamera {
    fn capture(&self, output: &Path, _rotation: u32, _wait: Duration) -> Result<(), DeviceError> {
        if self.frame.as_path() != output {
            std::fs::copy(&self.frame, output)?;
        }
        Ok(())
    }
}

/// Stand-in when no camera could be set up; every capture says why.
#[derive(Clone, Debug)]
pub struct UnavailableCamera {
    reason: String,
}

impl UnavailableCamera {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Camera for UnavailableCamera {
    fn capture(&self, _output: &Path, _rotation: u32, _wait: Duration) -> Result<(), DeviceError> {
        Err(DeviceError::Unavailable {
            device: "camera",
            reason: self.reason.clone(),
        })
    }
}

#[derive(Clone, Debug)]
pub struct UnavailableDisplay {
    reason: String,
}

impl UnavailableDisplay {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Display for UnavailableDisplay {
    fn show(&self, _image: &Path, _fullscreen: bool, _wait_ms: u64) -> Result<(), DeviceError> {
        Err(DeviceError::Unavailable {
            device: "display",
            reason: self.reason.clone(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub camera: Option<CommandSpec>,
    /// Replay this frame instead of capturing; wins over `camera`.
    pub replay_frame: Option<PathBuf>,
    pub display: Option<CommandSpec>,
    pub display_fullscreen_args: Vec<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            camera: Some(CommandSpec::new(
                "libcamera-still",
                &["-n", "-o", "{output}", "--rotation", "{rotation}", "-t", "{wait_ms}"],
            )),
            replay_frame: None,
            display: Some(CommandSpec::new("feh", &["{image}"])),
            display_fullscreen_args: vec!["--fullscreen".to_string()],
        }
    }
}

impl DeviceConfig {
    pub fn build_camera(&self) -> Box<dyn Camera> {
        if let Some(frame) = &self.replay_frame {
            log::info!("camera: replaying {}", frame.display());
            return Box::new(FileCamera::new(frame.clone()));
        }
        match &self.camera {
            Some(spec) => match spec.locate() {
                Some(path) => {
                    log::info!("camera: {}", path.display());
                    Box::new(CommandCamera::new(spec.clone()))
                }
                None => {
                    log::warn!("camera program {} not found", spec.program);
                    Box::new(UnavailableCamera::new(format!(
                        "{} not found on PATH",
                        spec.program
                    )))
                }
            },
            None => Box::new(UnavailableCamera::new("no camera configured")),
        }
    }

    pub fn build_display(&self) -> Box<dyn Display> {
        match &self.display {
            Some(spec) => match spec.locate() {
                Some(_) => Box::new(CommandDisplay::new(
                    spec.clone(),
                    self.display_fullscreen_args.clone(),
                )),
                None => {
                    log::warn!("display program {} not found", spec.program);
                    Box::new(UnavailableDisplay::new(format!(
                        "{} not found on PATH",
                        spec.program
                    )))
                }
            },
            None => Box::new(UnavailableDisplay::new("no display configured")),
        }
    }
}
