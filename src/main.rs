use bagpiper::config::Settings;
use bagpiper::core::BagMessage;
use bagpiper::input::FileLogSource;
use bagpiper::playback::{callback, ControlMessage, PlaybackDriver, PlaybackEngine};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Replay a decoded message log on a virtual clock
#[derive(Parser, Debug)]
#[command(name = "bagpiper", version)]
struct Cli {
    /// Decoded log file (JSON or CSV)
    file: PathBuf,

    /// Topic to print, may be repeated. Defaults to every topic in the log
    #[arg(short, long = "topic")]
    topics: Vec<String>,

    /// Print only this field of each message, e.g. /header/stamp/combined_time
    #[arg(short, long)]
    field: Option<String>,

    /// Start this many seconds into the log
    #[arg(long)]
    seek: Option<u64>,

    /// Replay history up to the seek point
    #[arg(long)]
    historical_seek: bool,

    /// Trace every tick and delivered message
    #[arg(long)]
    debug: bool,

    /// Tick period in milliseconds (below 1000)
    #[arg(long)]
    tick_ms: Option<u64>,

    /// List topics and the field paths of their first message, then exit
    #[arg(long)]
    list: bool,

    /// Store the player flags given here as the new defaults
    #[arg(long)]
    save_settings: bool,
}

fn print_message(topic: &str, field: Option<&str>, message: &BagMessage) {
    let line = match field {
        Some(path) => match message.field(path) {
            Ok(value) => json!({ "topic": topic, "stamp": message.stamp(), "value": value }),
            Err(e) => {
                warn!("{}: {}", topic, e);
                return;
            }
        },
        None => json!({ "topic": topic, "stamp": message.stamp(), "message": message }),
    };
    println!("{}", line);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let mut settings = Settings::load();
    if cli.historical_seek {
        settings.player.historical_seek = true;
    }
    if cli.debug {
        settings.player.debug_mode = true;
    }
    if let Some(ms) = cli.tick_ms {
        settings.tick_ms = ms;
    }
    if cli.save_settings {
        match settings.save() {
            Ok(()) => info!("Saved settings"),
            Err(e) => warn!("Failed to save settings: {:#}", e),
        }
    }

    let mut engine = PlaybackEngine::new(settings.player);
    let mut source = FileLogSource::new(&cli.file);
    let topics = settings.filter_topics(engine.open(&mut source).await?);

    if let Some(start) = engine.start_time().to_datetime() {
        info!("Log recorded at {} ({}s long)", start.to_rfc3339(), engine.duration());
    }

    if cli.list {
        for (topic, type_name) in &topics {
            println!("{} [{}]", topic, type_name);
            if let Ok(message) = engine.first_topic_message(topic) {
                for path in message.body().field_paths() {
                    println!("    {}", path);
                }
            }
        }
        return Ok(());
    }

    if !engine.is_playing() {
        warn!("{} has no messages to play", cli.file.display());
        return Ok(());
    }

    let wanted: Vec<String> = if cli.topics.is_empty() {
        topics.keys().cloned().collect()
    } else {
        cli.topics.clone()
    };
    for topic in wanted {
        if !topics.contains_key(&topic) {
            warn!("Topic {} is not in the log", topic);
        }
        let name = topic.clone();
        let field = cli.field.clone();
        engine.subscribe(
            &topic,
            callback(move |msg| {
                if let Some(message) = msg {
                    print_message(&name, field.as_deref(), message);
                }
            }),
        )?;
    }

    let (control_tx, mut control_rx) = mpsc::unbounded_channel();
    engine.subscribe_control(move |msg| {
        let _ = control_tx.send(msg);
    });

    if let Some(offset) = cli.seek {
        engine.seek(offset);
    }

    let duration = engine.duration();
    let driver = PlaybackDriver::start(engine, settings.tick_period())?;

    loop {
        tokio::select! {
            msg = control_rx.recv() => match msg {
                Some(ControlMessage { is_playing: true, current_time_s }) => {
                    info!("{}s / {}s", current_time_s, duration);
                }
                _ => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                driver.engine().lock().await.stop();
                break;
            }
        }
    }

    driver.shutdown().await;
    Ok(())
}
