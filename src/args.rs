use crate::config::{PlayerKind, ViewerConfig};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// Full headless session: welcome, PIN, camera, detection
    Session,
    /// Score one image against the template and exit
    MatchOnce(PathBuf),
}

#[derive(Debug, Default)]
pub struct Args {
    pub mode: Option<Mode>,
    pub config_path: Option<PathBuf>,
    pub frames_dir: Option<PathBuf>,
    pub template: Option<PathBuf>,
    pub video: Option<PathBuf>,
    pub pin: Option<String>,
    pub threshold: Option<f32>,
    pub player: Option<PlayerKind>,
    pub muted: bool,
    pub debug_mode: bool,
    pub timeout_secs: Option<u64>,
}

impl Args {
    pub fn parse() -> Option<Self> {
        Self::parse_from(env::args().skip(1))
    }

    /// Parse flags (program name already stripped). Prints help or the error
    /// and returns `None` when the program should exit.
    pub fn parse_from<I: IntoIterator<Item = String>>(args: I) -> Option<Self> {
        let mut parsed = Args::default();

        for arg in args {
            if arg == "--help" || arg == "-h" {
                print_help();
                return None;
            } else if arg == "--version" || arg == "-v" {
                println!("AR Target Viewer v{}", env!("VIEWER_VERSION_DISPLAY"));
                return None;
            } else if arg == "--debug" {
                parsed.debug_mode = true;
            } else if arg == "--muted" {
                parsed.muted = true;
            } else if let Some(val) = arg.strip_prefix("--match=") {
                parsed.mode = Some(Mode::MatchOnce(PathBuf::from(val)));
            } else if let Some(val) = arg.strip_prefix("--config=") {
                parsed.config_path = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--frames=") {
                parsed.frames_dir = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--template=") {
                parsed.template = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--video=") {
                parsed.video = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--pin=") {
                parsed.pin = Some(val.to_string());
            } else if let Some(val) = arg.strip_prefix("--threshold=") {
                match val.parse::<f32>() {
                    Ok(threshold) if (0.0..=1.0).contains(&threshold) => {
                        parsed.threshold = Some(threshold)
                    }
                    _ => {
                        eprintln!("❌ Invalid threshold value: {} (expected 0.0-1.0)", val);
                        return None;
                    }
                }
            } else if let Some(val) = arg.strip_prefix("--player=") {
                parsed.player = match val {
                    "timed" => Some(PlayerKind::Timed),
                    "ffplay" | "command" => Some(PlayerKind::Command),
                    other => {
                        eprintln!("❌ Unknown player '{}', expected 'timed' or 'ffplay'", other);
                        return None;
                    }
                };
            } else if let Some(val) = arg.strip_prefix("--timeout=") {
                match val.parse::<u64>() {
                    Ok(secs) => parsed.timeout_secs = Some(secs),
                    Err(_) => {
                        eprintln!("❌ Invalid timeout value: {}", val);
                        return None;
                    }
                }
            } else {
                eprintln!("❌ Unknown argument: {}", arg);
                print_help();
                return None;
            }
        }

        Some(parsed)
    }

    pub fn mode(&self) -> Mode {
        self.mode.clone().unwrap_or(Mode::Session)
    }

    /// Flags win over the config file
    pub fn apply(&self, config: &mut ViewerConfig) {
        if let Some(dir) = &self.frames_dir {
            config.camera.frames_dir = dir.clone();
        }
        if let Some(template) = &self.template {
            config.detection.template_path = template.clone();
        }
        if let Some(video) = &self.video {
            config.playback.video_path = video.clone();
        }
        if let Some(threshold) = self.threshold {
            config.detection.confidence_threshold = threshold;
        }
        if let Some(player) = &self.player {
            config.playback.player = player.clone();
        }
        if self.muted {
            config.playback.start_muted = true;
        }
    }
}

fn print_help() {
    println!("🎯 AR Target Viewer");
    println!();
    println!("USAGE:");
    println!("    ar-target-viewer [FLAGS]");
    println!();
    println!("FLAGS:");
    println!("    (no flags)            Run a session, PIN is read from stdin");
    println!("    --pin=PIN             Access PIN for the session");
    println!("    --frames=DIR          Directory of frames replayed as the camera");
    println!("                          (DIR/environment and DIR/user for two cameras)");
    println!("    --template=PATH       Reference image to detect");
    println!("    --video=PATH          Overlay clip played on detection");
    println!("    --threshold=F         Detection confidence threshold (default: 0.7)");
    println!("    --player=<timed|ffplay> Overlay player (default: timed)");
    println!("    --muted               Start the overlay muted (see SESSION COMMANDS)");
    println!("    --config=PATH         Load settings from a JSON file");
    println!("    --match=PATH          Score one image against the template and exit");
    println!("    --debug               Enable debug logging");
    println!("    --timeout=N           Auto-exit after N seconds");
    println!("    --help, -h            Show this help message");
    println!("    --version, -v         Show version information");
    println!();
    println!("SESSION COMMANDS (one per line on stdin):");
    println!("    start | stop          Start or stop scanning");
    println!("    close                 Close the overlay");
    println!("    toggle                Switch between front and back camera");
    println!("    mute | unmute         Mute the overlay, restarting an external player in place");
    println!("    threshold F           Change the confidence threshold");
    println!("    logout | quit         End the session");
    println!();
    println!("EXAMPLES:");
    println!("    ar-target-viewer --pin=2126 --frames=assets/frames");
    println!("    ar-target-viewer --match=poster.jpg --template=assets/DetectionImage2.jpeg");
    println!("    ar-target-viewer --player=ffplay --timeout=60 --debug");
}
