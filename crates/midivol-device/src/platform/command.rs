/// Mixers driven through an external volume command.
///
/// Windows has no in-process mixer binding here, so `nircmd setsysvolume` is
/// spawned for every change. macOS goes through `osascript`. Both tools are
/// plain processes, which keeps this module buildable everywhere.

use std::process::Command;

use tracing::debug;

use midivol_core::{Error, MixerBackend, Result, MAX_VOLUME_LEVEL};

/// Full scale of nircmd's system volume
const NIRCMD_FULL_SCALE: u32 = 65535;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeTool {
    Nircmd,
    Osascript,
}

pub struct CommandMixer {
    tool: VolumeTool,
    program: String,
    /// Last level written; nircmd cannot read the current volume back
    last: u8,
}

impl CommandMixer {
    pub fn nircmd() -> Self {
        Self::new(VolumeTool::Nircmd, "nircmd")
    }

    pub fn osascript() -> Self {
        Self::new(VolumeTool::Osascript, "osascript")
    }

    fn new(tool: VolumeTool, program: &str) -> Self {
        Self {
            tool,
            program: program.to_string(),
            last: 0,
        }
    }

    /// Use a different executable (e.g. a full path to nircmd.exe).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn tool(&self) -> VolumeTool {
        self.tool
    }

    fn run(&self, args: &[String]) -> Result<String> {
        debug!(program = %self.program, ?args, "Running volume command");
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| Error::mixer(format!("Failed to run {}: {}", self.program, e)))?;
        if !output.status.success() {
            return Err(Error::mixer(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl MixerBackend for CommandMixer {
    fn name(&self) -> &str {
        match self.tool {
            VolumeTool::Nircmd => "nircmd",
            VolumeTool::Osascript => "osascript",
        }
    }

    fn get_level(&mut self) -> Result<u8> {
        match self.tool {
            VolumeTool::Nircmd => Ok(self.last),
            VolumeTool::Osascript => {
                let out = self.run(&osascript_args("output volume of (get volume settings)"))?;
                let level = parse_level(&out).ok_or_else(|| {
                    Error::mixer(format!("Unexpected osascript output {:?}", out.trim()))
                })?;
                self.last = level;
                Ok(level)
            }
        }
    }

    fn set_level(&mut self, level: u8) -> Result<()> {
        let args = set_args(self.tool, level);
        self.run(&args)?;
        self.last = level;
        Ok(())
    }
}

/// Level (percent) to nircmd's 0-65535 scale, truncated.
pub fn nircmd_volume(level: u8) -> u32 {
    NIRCMD_FULL_SCALE * u32::from(level) / 100
}

fn set_args(tool: VolumeTool, level: u8) -> Vec<String> {
    match tool {
        VolumeTool::Nircmd => vec![
            "setsysvolume".to_string(),
            nircmd_volume(level).to_string(),
        ],
        VolumeTool::Osascript => osascript_args(&format!("set volume output volume {}", level)),
    }
}

fn osascript_args(script: &str) -> Vec<String> {
    vec!["-e".to_string(), script.to_string()]
}

/// osascript prints "missing value" when no output device has a volume.
fn parse_level(out: &str) -> Option<u8> {
    let value: u32 = out.trim().parse().ok()?;
    Some(value.min(u32::from(MAX_VOLUME_LEVEL)) as u8)
}
