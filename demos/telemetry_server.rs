//! Telemetry streaming server example
//!
//! Run with: cargo run --example telemetry_server [CONFIG_FILE]
//!
//! Without a config file a built-in sample is used that serves:
//!   /stream/memory    system memory every second
//!   /stream/tcpdump   simulated packet feed every 500ms
//!   /stream/custom    a handler registered below, every 250ms
//!   /stream/missing   handler not registered, emits placeholder payloads
//!
//! Watch a stream with:
//!   curl -N http://127.0.0.1:8080/stream/memory

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sse_telemetry::{HandlerRegistry, StreamingConfig, StreamingServer};

const SAMPLE_CONFIG: &str = r#"{
    "streaming": {
        "enabled": true,
        "server": { "host": "127.0.0.1", "port": 8080, "max_connections": 10 },
        "streams": [
            { "name": "memory", "endpoint": "/stream/memory",
              "handler": "stream_system_memory", "interval_ms": 1000,
              "description": "System memory usage" },
            { "name": "tcpdump", "endpoint": "/stream/tcpdump",
              "handler": "stream_network_tcpdump", "interval_ms": 500,
              "description": "Simulated network packets" },
            { "name": "custom", "endpoint": "/stream/custom",
              "handler": "uptime_counter", "interval_ms": 250,
              "description": "Ticks since start" },
            { "name": "missing", "endpoint": "/stream/missing",
              "handler": "not_implemented", "interval_ms": 2000,
              "description": "Falls back to the placeholder handler" }
        ]
    }
}"#;

/// Host application handle (the server only carries it around)
struct DemoApp {
    name: &'static str,
}

fn print_usage() {
    eprintln!("Usage: telemetry_server [CONFIG_FILE]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  CONFIG_FILE  JSON config with a \"streaming\" section (default: built-in sample)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sse_telemetry=debug".parse()?)
                .add_directive("telemetry_server=debug".parse()?),
        )
        .init();

    let config = match args.get(1) {
        Some(path) => StreamingConfig::load(path)?,
        None => StreamingConfig::from_json_str(SAMPLE_CONFIG)?,
    };
    config.validate()?;

    if !config.enabled {
        println!("Streaming is disabled in the configuration, nothing to do");
        return Ok(());
    }

    let mut handlers = HandlerRegistry::with_builtin();
    let ticks = Arc::new(AtomicU64::new(0));
    handlers.register("uptime_counter", move |stream: &str| {
        let tick = ticks.fetch_add(1, Ordering::Relaxed) + 1;
        serde_json::json!({
            "timestamp": chrono::Utc::now().timestamp(),
            "stream": stream,
            "tick": tick,
        })
        .to_string()
    });

    let app = DemoApp { name: "telemetry-demo" };
    let mut server = StreamingServer::from_streaming_config(&config, &handlers, app)?;
    server.start().await?;

    println!("[{}] Streaming on {}", server.host().name, server.server_url());
    println!();
    for endpoint in server.stream_table().endpoints() {
        println!("  curl -N {}{}", server.server_url(), endpoint);
    }
    println!();

    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");

    server.stop().await;
    let stats = server.stats();
    println!(
        "Served {} connections, {} events, {} bytes",
        stats.total_connections, stats.events_sent, stats.bytes_sent
    );
    server.cleanup()?;

    Ok(())
}
