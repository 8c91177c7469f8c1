//! booth-control
//!
//! Live-production desk for a small venue: a MIDI control surface, the
//! keyboard and a web panel drive OBS scenes and streaming, mixer mutes, the
//! YouTube broadcast and backing tracks, with the surface LEDs mirroring the
//! live state.

mod actions;
mod audio;
mod broadcast;
mod config;
mod error;
mod indicators;
mod input;
mod logging;
mod mixer;
mod obs;
mod sync;

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use audio::RodioPlayer;
use broadcast::{BroadcastPlatform, YouTubeClient};
use config::Config;
use indicators::{IndicatorOutput, IndicatorReflector, MidiIndicatorOutput};
use input::http::HttpPanel;
use input::keyboard::KeyboardBackend;
use input::{event_channel, InputBackend, MidiBackend};
use mixer::OscMixer;
use obs::ObsController;
use sync::{create_engine_channels, Desk, DeskClients, EngineCommand, SyncEngine};

/// Command line options
#[derive(Debug, Default)]
struct Options {
    config_path: Option<PathBuf>,
    list_ports: bool,
    no_keyboard: bool,
    no_http: bool,
}

fn parse_args(args: &[String]) -> Result<Option<Options>> {
    let mut options = Options::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "-c" | "--config" => {
                let path = iter.next().context("--config needs a path")?;
                options.config_path = Some(PathBuf::from(path));
            }
            "--list-ports" => options.list_ports = true,
            "--no-keyboard" => options.no_keyboard = true,
            "--no-http" => options.no_http = true,
            other => bail!("Unknown argument: {} (see --help)", other),
        }
    }

    Ok(Some(options))
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let Some(options) = parse_args(&args)? else {
        print_help();
        return Ok(());
    };

    if options.list_ports {
        return print_ports();
    }

    let _log_guard = logging::init_logging()?;
    info!("booth-control starting...");
    if let Ok(dir) = logging::get_log_dir() {
        info!("Writing logs to {:?}", dir);
    }

    let config = Config::load(options.config_path.as_deref())?;
    info!("Configuration loaded from {:?}", config.config_path());
    config
        .validate()
        .context("Invalid configuration, edit the config file and restart")?;

    let runtime = tokio::runtime::Runtime::new()?;

    // The audio output stream is not Send, so the desk runs on this thread
    let result = runtime.block_on(run(config, options));

    runtime.shutdown_timeout(Duration::from_secs(1));
    info!("Shutdown complete");
    result
}

async fn run(config: Config, options: Options) -> Result<()> {
    info!("Connecting to OBS...");
    let obs = ObsController::connect_with_retry(&config.obs).await;
    let obs_rx = match obs.subscribe_events() {
        Ok(rx) => Some(rx),
        Err(e) => {
            warn!("OBS notifications unavailable: {:#}", e);
            None
        }
    };

    let mixer_addr = config.mixer_addr()?;
    let mixer = OscMixer::connect(mixer_addr).await?;
    info!("Mixer commands go to {}", mixer.target());

    let platform: Option<Arc<dyn BroadcastPlatform>> = if config.youtube.has_credentials() {
        Some(Arc::new(YouTubeClient::new(config.youtube.clone())))
    } else {
        info!("YouTube credentials not configured, going live is disabled");
        None
    };

    let indicator_output: Option<Box<dyn IndicatorOutput>> =
        match MidiIndicatorOutput::connect(&config.controller.port_name) {
            Ok(output) => Some(Box::new(output)),
            Err(e) => {
                warn!("Control surface LEDs unavailable: {:#}", e);
                None
            }
        };

    let table = Arc::new(config.action_table());
    let desk = Desk::new(
        table.clone(),
        config.scenes.clone(),
        config.go_live_settings()?,
        DeskClients {
            obs: Arc::new(obs),
            mixer: Arc::new(mixer),
            platform,
            music: Box::new(RodioPlayer::new()),
        },
        IndicatorReflector::new(indicator_output),
    );

    let (cmd_tx, cmd_rx) = create_engine_channels();
    let (input_tx, input_rx) = event_channel();

    let mut backends: Vec<Box<dyn InputBackend>> =
        vec![Box::new(MidiBackend::new(config.controller.port_name.clone()))];
    if !options.no_keyboard {
        backends.push(Box::new(KeyboardBackend::new()));
    }
    if config.http.enabled && !options.no_http {
        backends.push(Box::new(HttpPanel::new(
            config.http_addr()?,
            cmd_tx.clone(),
            table,
            config.http.obs_web_url.clone(),
        )));
    }

    for backend in backends.iter_mut() {
        if let Err(e) = backend.start(input_tx.clone()) {
            warn!("{} input unavailable: {:#}", backend.name(), e);
        }
    }
    drop(input_tx);

    let ctrl_c_tx = cmd_tx.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down...");
        let _ = ctrl_c_tx.try_send(EngineCommand::Shutdown);
    })?;

    let mut engine = SyncEngine::new(desk, cmd_rx, input_rx, obs_rx);
    if let Err(e) = engine.run().await {
        error!("Sync engine error: {}", e);
    }

    drop(backends);
    Ok(())
}

fn print_ports() -> Result<()> {
    let (inputs, outputs) = input::list_ports()?;
    println!("MIDI input ports:");
    for name in inputs {
        println!("    {}", name);
    }
    println!("MIDI output ports:");
    for name in outputs {
        println!("    {}", name);
    }
    Ok(())
}

fn print_help() {
    println!("booth-control - live production desk");
    println!();
    println!("USAGE:");
    println!("    booth-control [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help             Print this help message");
    println!("    -c, --config <PATH>    Use this config file instead of the default");
    println!("        --list-ports       List MIDI ports and exit");
    println!("        --no-keyboard      Do not read commands from stdin");
    println!("        --no-http          Do not start the web panel");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG                  Set log level (e.g., debug, info, warn)");
    println!("    BOOTH_CONTROL_LOG_PATH    Override the log directory");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("booth-control")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_args() {
        let options = parse_args(&args(&["-c", "/etc/desk.toml", "--no-http"]))
            .unwrap()
            .unwrap();
        assert_eq!(options.config_path, Some(PathBuf::from("/etc/desk.toml")));
        assert!(options.no_http);
        assert!(!options.no_keyboard);
        assert!(!options.list_ports);

        assert!(parse_args(&args(&["--help"])).unwrap().is_none());
        assert!(parse_args(&args(&["--config"])).is_err());
        assert!(parse_args(&args(&["--bogus"])).is_err());
    }
}
