use std::env;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, Level};

use ad_spacefinder::config::ConfigError;
use ad_spacefinder::logging::{setup_logging, LogFormat, LoggingConfig};
use ad_spacefinder::{
    AdvertQueue, CommercialBootstrap, CommercialConfig, CommercialFeatures, ContentType,
    CustomEvent, Document, EventSystem, NodeId, Viewport,
};

/// Runs the commercial bootstrap against a synthetic page and logs where the
/// slots landed.
#[derive(Debug, Clone)]
struct AppConfig {
    config_path: Option<String>,
    liveblog: bool,
    blocks: usize,
    block_height: f64,
    width: f64,
    updates: usize,
    log: LoggingConfig,
}

impl AppConfig {
    fn from_args() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut config = Self::default();

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1);
            match args[i].as_str() {
                "--config" => {
                    config.config_path = value.cloned();
                    i += 1;
                }
                "--blocks" => {
                    config.blocks = value.and_then(|v| v.parse().ok()).unwrap_or(config.blocks);
                    i += 1;
                }
                "--block-height" => {
                    config.block_height = value.and_then(|v| v.parse().ok()).unwrap_or(config.block_height);
                    i += 1;
                }
                "--width" => {
                    config.width = value.and_then(|v| v.parse().ok()).unwrap_or(config.width);
                    i += 1;
                }
                "--updates" => {
                    config.updates = value.and_then(|v| v.parse().ok()).unwrap_or(config.updates);
                    i += 1;
                }
                "--liveblog" => config.liveblog = true,
                "--json-logs" => config.log.format = LogFormat::Json,
                "--debug" => config.log.level = Level::DEBUG,
                "--trace" => config.log.level = Level::TRACE,
                _ => {}
            }
            i += 1;
        }

        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            liveblog: false,
            blocks: 20,
            block_height: 300.0,
            width: 1300.0,
            updates: 0,
            log: LoggingConfig::default(),
        }
    }
}

fn load_config(app: &AppConfig) -> ad_spacefinder::Result<CommercialConfig> {
    let mut config = match &app.config_path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Parse(format!("{path}: {e}")))?;
            CommercialConfig::from_json(&json)?
        }
        None => CommercialConfig::default(),
    };
    if app.liveblog {
        config.page.content_type = ContentType::LiveBlog;
    }
    Ok(config)
}

fn build_page(doc: &Document, config: &CommercialConfig, app: &AppConfig) -> ad_spacefinder::Result<NodeId> {
    let (class, tag) = match config.page.content_type {
        ContentType::LiveBlog => (config.liveblog.body_selector.trim_start_matches('.'), "article"),
        _ => ("article-body-commercial-selector", "p"),
    };
    let body = doc.create_element("div");
    doc.set_attribute(body, "class", class)?;
    doc.append_child(doc.body(), body)?;
    append_blocks(doc, body, tag, app)?;
    Ok(body)
}

fn append_blocks(doc: &Document, body: NodeId, tag: &str, app: &AppConfig) -> ad_spacefinder::Result<()> {
    for _ in 0..app.blocks {
        let block = doc.create_element(tag);
        doc.set_attribute(block, "class", "block")?;
        doc.set_intrinsic_height(block, app.block_height)?;
        let first = doc.get_children(body).first().copied();
        doc.insert_before(body, block, first)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ad_spacefinder::Result<()> {
    let app = AppConfig::from_args();
    setup_logging(&app.log);

    let start = Instant::now();
    let config = load_config(&app)?;
    config.validate()?;

    let doc = Arc::new(Document::with_viewport(Viewport::new(app.width, 900.0)));
    let body = build_page(&doc, &config, &app)?;
    let update_event = config.liveblog.update_event.clone();

    let events = Arc::new(EventSystem::new());
    let queue = Arc::new(AdvertQueue::new(Arc::clone(&doc)));
    let bootstrap = CommercialBootstrap::new(
        Arc::clone(&doc),
        config,
        Arc::new(CommercialFeatures::default()),
        queue.clone(),
        Arc::clone(&events),
    );
    let report = bootstrap.init().await;

    if let Some(liveblog) = &report.liveblog {
        for update in 0..app.updates {
            append_blocks(&doc, body, "article", &app)?;
            events.dispatch(CustomEvent::new(update_event.as_str())).await;
            let phase = liveblog.settled().await;
            info!(update, ?phase, ads = liveblog.ad_counter(), "liveblog update handled");
        }
    }

    for advert in queue.adverts() {
        info!(id = %advert.id, name = %advert.name, "advert registered");
    }
    info!(
        adverts = queue.len(),
        failed = ?report.failed(),
        elapsed = ?start.elapsed(),
        "commercial run complete"
    );
    Ok(())
}
