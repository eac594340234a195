use ar_target_viewer::args::{Args, Mode};
use ar_target_viewer::config::ViewerConfig;
use ar_target_viewer::screen_flow::{CameraStatus, PinOutcome};
use ar_target_viewer::session;
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

fn init_logging(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if debug {
        builder.filter_module("ar_target_viewer", log::LevelFilter::Debug);
    }
    builder.init();
}

fn read_pin() -> Option<String> {
    print!("🔐 Enter PIN: ");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    match std::io::stdin().read_line(&mut line) {
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        Err(e) => {
            eprintln!("❌ Failed to read PIN: {}", e);
            None
        }
    }
}

fn main() -> ExitCode {
    let Some(args) = Args::parse() else {
        return ExitCode::SUCCESS;
    };
    init_logging(args.debug_mode);

    let mut config = match &args.config_path {
        Some(path) => match ViewerConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("❌ {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => ViewerConfig::default(),
    };
    args.apply(&mut config);
    if let Err(e) = config.validate() {
        log::error!("❌ {}", e);
        return ExitCode::FAILURE;
    }

    match args.mode() {
        Mode::MatchOnce(image_path) => match session::match_once(&config, &image_path) {
            Ok(result) => {
                let verdict = if result.meets(config.detection.confidence_threshold) {
                    "MATCH"
                } else {
                    "no match"
                };
                println!(
                    "{} confidence={:.4} location=({}, {})",
                    verdict, result.confidence, result.location.0, result.location.1
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("❌ {}", e);
                ExitCode::FAILURE
            }
        },
        Mode::Session => {
            let pin = match args.pin.clone().or_else(read_pin) {
                Some(pin) => pin,
                None => return ExitCode::FAILURE,
            };
            let timeout = args.timeout_secs.map(Duration::from_secs);

            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    log::error!("❌ Failed to start runtime: {}", e);
                    return ExitCode::FAILURE;
                }
            };

            println!(
                "🚀 AR Target Viewer v{} (built {})",
                env!("VIEWER_VERSION_DISPLAY"),
                env!("VIEWER_BUILD_YEAR")
            );
            println!("⌨️ Commands: start, stop, close, toggle, mute, unmute, threshold F, logout, quit");
            let outcome = runtime.block_on(session::run_session(&config, &pin, timeout));
            // The stdin reader may still be parked in a blocking read
            runtime.shutdown_background();
            match outcome {
                Ok(report) => {
                    println!(
                        "📊 access={:?} camera={:?} detections={} closed={} logged_out={}",
                        report.access,
                        report.camera,
                        report.detections,
                        report.overlays_closed,
                        report.logged_out
                    );
                    if report.access == PinOutcome::Granted
                        && report.camera == Some(CameraStatus::Active)
                    {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::FAILURE
                    }
                }
                Err(e) => {
                    log::error!("❌ {}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}
