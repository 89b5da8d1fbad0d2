use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tower_http::cors::CorsLayer;

use intro_sequencer::config::{IntroConfig, ServerConfig};
use intro_sequencer::intro::{IntroEvent, IntroSite, Key, Phase, StaticMotion};
use intro_sequencer::render::{BootScreen, Redraw};
use intro_sequencer::routes::intro_routes;
use intro_sequencer::store::{MemoryStore, PreferenceStore, open_durable_store};

#[tokio::main]
async fn main() -> intro_sequencer::error::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let server_config = ServerConfig::from_env()?;
    let intro_config = IntroConfig::from_env()?;

    eprintln!("Intro Sequencer v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Store: {}", server_config.db_path.display());
    eprintln!("   HTTP: http://0.0.0.0:{}/api/intro/status", server_config.http_port);
    eprintln!("   Events: ws://0.0.0.0:{}/ws/intro", server_config.http_port);
    eprintln!("   Press Enter to skip.\n");

    // ── Store ───────────────────────────────────────────────────────────
    // Session-scoped flags live as long as this process.
    let durable = open_durable_store(&server_config.db_path).await;
    let store = PreferenceStore::new(durable, MemoryStore::new());

    // ── Intro ───────────────────────────────────────────────────────────
    let motion = Arc::new(StaticMotion(server_config.reduced_motion));
    let site = IntroSite::new(store, motion, intro_config).await;
    let mut events = site.subscribe();

    // ── HTTP / WS ───────────────────────────────────────────────────────
    let app = intro_routes(Arc::clone(&site)).layer(CorsLayer::permissive());
    let port = server_config.http_port;
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(port, "Failed to bind intro server: {}", e);
                return;
            }
        };
        tracing::info!(port, "Intro server started");
        axum::serve(listener, app).await.ok();
    });

    // ── Keyboard ────────────────────────────────────────────────────────
    {
        let site = Arc::clone(&site);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        site.key_pressed(Key::from(line.trim())).await;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });
    }

    // ── Terminal renderer ───────────────────────────────────────────────
    let snapshot = site.snapshot().await;
    if snapshot.phase == Phase::Complete {
        eprintln!("(intro not shown: preference {})", snapshot.preference);
    } else {
        render(&mut events).await;
    }

    eprintln!("\nWelcome. Serving intro state until Ctrl-C.");
    tokio::signal::ctrl_c().await?;
    Ok(())
}

/// Draw events until the overlay is gone.
async fn render(events: &mut tokio::sync::broadcast::Receiver<IntroEvent>) {
    let mut stderr = std::io::stderr();
    let mut screen = BootScreen::new();
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
        };
        let drawn = match screen.apply(&event) {
            Redraw::None => Ok(()),
            Redraw::Boot => screen.draw(&mut stderr),
            Redraw::Append(lines) => screen.append(&mut stderr, &lines),
            Redraw::Done => return,
        };
        if let Err(e) = drawn {
            tracing::warn!("Failed to draw intro: {}", e);
            return;
        }
    }
}
