use color_eyre::{eyre::eyre, Result};
use nchs_sniffer::credentials::{AesCbcDecryptor, ClientId};
use nchs_sniffer::mqtt::RumqttTransport;
use nchs_sniffer::view;
use nchs_sniffer::{Session, SnifferConfig, SnifferEvent};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = SnifferConfig::default_path();
    let config = SnifferConfig::load_or_create(&config_path)
        .await
        .map_err(|e| eyre!("Failed to load {}: {}", config_path.display(), e))?;
    setup_logging(&config.log_level);
    info!("Using config {}", config_path.display());

    let decryptor = AesCbcDecryptor::from_config(&config.cipher)
        .map_err(|e| eyre!("Invalid cipher settings: {}", e))?;
    let client_id = ClientId::generate();

    let (session, session_task) = Session::spawn(
        RumqttTransport::default(),
        Box::new(decryptor),
        client_id,
        &config,
    );
    let mut events = session.subscribe();

    session.connect(config.endpoint(), config.clone()).await?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(missed)) => warn!("Missed {} notifications", missed),
                Err(RecvError::Closed) => {
                    warn!("Session ended");
                    break;
                }
            },
        }
    }

    session.disconnect().await?;
    session.shutdown().await?;
    session_task.await?;
    Ok(())
}

fn log_event(event: &SnifferEvent) {
    match event {
        SnifferEvent::Connected => info!("Connected"),
        SnifferEvent::Disconnected(reason) => warn!("Disconnected: {}", reason),
        SnifferEvent::Error(reason) => error!("{}", reason),
        SnifferEvent::NewTopic(topic) => info!("Watching {}", topic),
        SnifferEvent::TopicRemoved(topic) => info!("Stopped watching {}", topic),
        SnifferEvent::MessageAdded(message) => info!("{}", view::project(message)),
        SnifferEvent::MessageEvicted(message) => {
            debug!("Evicted #{} from {}", message.id, message.topic)
        }
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    Ok(())
}

fn setup_logging(log_level: &str) {
    let level = log_level.parse::<Level>();

    FmtSubscriber::builder()
        .with_max_level(*level.as_ref().unwrap_or(&Level::INFO))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();

    if let Err(e) = level {
        warn!("Unknown log level {:?} ({}), using info", log_level, e);
    }
}
