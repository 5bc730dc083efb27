//! Layer resolver CLI.
//!
//! Loads the layers configuration for one language and prints resolved 2D
//! and 3D source descriptors, timestamps, metadata or the layer list as
//! JSON on stdout. Logs go to stderr.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use catalog::{CatalogSnapshot, LayerCatalog, ReqwestFetcher};
use layers_common::time::validate_timestamp;
use layers_common::resolve_timestamp;
use layers_protocol::UrlTemplates;
use sources::{
    BuildOptions, ClientCapabilities, Collaborators, DirectAccess, FixedView, Layer2dFactory, LiteralStyles,
    NoTileStore, SceneRef, TimeHandle,
};

use config::CliConfig;

#[derive(Parser, Debug)]
#[command(name = "layers-cli")]
#[command(about = "Resolve catalogue layers into rendering source descriptors")]
struct Args {
    /// YAML configuration file (environment variables otherwise)
    #[arg(short, long, env = "LAYERS_CONFIG")]
    config: Option<String>,

    /// Catalogue language
    #[arg(long, default_value = "de", env = "LAYERS_LANG")]
    lang: String,

    /// Log level
    #[arg(long, default_value = "warn", env = "RUST_LOG")]
    log_level: String,

    /// Client supports HTTP/2
    #[arg(long)]
    http2: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the descriptors of one layer
    Resolve {
        #[arg(long)]
        id: String,

        /// Requested year or timestamp
        #[arg(long)]
        time: Option<String>,

        #[arg(long, value_enum, default_value_t = Target::TwoD)]
        target: Target,
    },

    /// Print the timestamp a request resolves to
    Timestamp {
        #[arg(long)]
        id: String,

        #[arg(long)]
        time: Option<String>,
    },

    /// Print the legend document of a layer
    Metadata {
        #[arg(long)]
        id: String,
    },

    /// List the catalogue
    List {
        /// Only layers of this type
        #[arg(long)]
        kind: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Target {
    #[value(name = "2d")]
    TwoD,
    #[value(name = "3d")]
    ThreeD,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .init();

    run(args).await
}

async fn run(args: Args) -> Result<()> {
    let config = CliConfig::load(args.config.as_deref())?;
    info!(lang = %args.lang, "Loaded configuration");

    let urls = Arc::new(UrlTemplates::new(config.urls.clone()));
    let catalog = LayerCatalog::over_http(urls.clone(), config.catalog.clone())?;

    if let Command::Metadata { id } = &args.command {
        let body = catalog.metadata(id, &args.lang).await?;
        println!("{}", String::from_utf8_lossy(&body));
        return Ok(());
    }

    let snapshot = catalog.load(&args.lang).await?;
    info!(layers = snapshot.len(), generation = snapshot.generation(), "Catalogue loaded");

    let output = match &args.command {
        Command::List { kind } => list(&snapshot, kind.as_deref()),
        Command::Timestamp { id, time } => {
            ensure_known(&snapshot, id)?;
            let layer = snapshot.layer(id);
            let timestamp = resolve_timestamp(layer, time.as_deref());
            if let Some(Err(e)) = timestamp.map(validate_timestamp) {
                warn!(bod_id = %id, error = %e, "Catalogue timestamp is not a calendar date");
            }
            json!({
                "bodId": id,
                "requested": time,
                "timestamp": timestamp,
                "timestamps": layer.timestamps,
            })
        }
        Command::Resolve { id, time, target } => {
            ensure_known(&snapshot, id)?;
            let caps = ClientCapabilities {
                http2: args.http2,
                ..Default::default()
            };
            let view = Arc::new(FixedView::new(args.lang.clone(), time.clone()));
            let collaborators = Collaborators {
                fetcher: Arc::new(ReqwestFetcher::new(Duration::from_secs(
                    config.catalog.request_timeout_secs,
                ))?),
                proxy: Arc::new(DirectAccess),
                styles: Arc::new(LiteralStyles::new(config.tileset_styles.clone())),
                tiles: Arc::new(NoTileStore),
                view,
            };
            let factory = Layer2dFactory::new(
                catalog.watch(),
                urls.clone(),
                Arc::new(config.options.clone()),
                caps,
                collaborators,
            );

            match target {
                Target::TwoD => resolve_2d(&factory, id).await?,
                Target::ThreeD => resolve_3d(&factory, &snapshot, id, time.as_deref()),
            }
        }
        Command::Metadata { .. } => return Ok(()),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn ensure_known(snapshot: &CatalogSnapshot, id: &str) -> Result<()> {
    if !snapshot.contains(id) {
        bail!("Layer '{}' is not in the '{}' catalogue", id, snapshot.lang());
    }
    Ok(())
}

fn list(snapshot: &CatalogSnapshot, kind: Option<&str>) -> Value {
    let mut layers: Vec<_> = snapshot
        .layers()
        .filter(|l| kind.map_or(true, |k| l.kind.as_str() == k))
        .collect();
    layers.sort_by(|a, b| a.id.cmp(&b.id));

    layers
        .into_iter()
        .map(|l| {
            json!({
                "bodId": l.id,
                "type": l.kind,
                "label": l.label,
                "timeEnabled": l.time_enabled,
                "config3d": l.config3d,
                "config2d": l.config2d,
            })
        })
        .collect()
}

async fn resolve_2d(factory: &Layer2dFactory, id: &str) -> Result<Value> {
    let Some(instance) = factory.build_layer(id, &BuildOptions::default()) else {
        return Ok(json!({ "bodId": id, "layer": null }));
    };

    let mut value = serde_json::to_value(&instance)?;

    // Vector layers also report their loaded features
    if let Some(load) = factory.layer_promise(id) {
        match load.await {
            Ok(collection) => {
                if let Value::Object(map) = &mut value {
                    map.insert("features".to_string(), serde_json::to_value(&*collection)?);
                }
            }
            Err(e) => warn!(bod_id = %id, error = %e, "Vector data unavailable"),
        }
    }

    Ok(value)
}

fn resolve_3d(factory: &Layer2dFactory, snapshot: &CatalogSnapshot, id: &str, time: Option<&str>) -> Value {
    let factory3d = factory.factory3d();
    let time = TimeHandle::new(resolve_timestamp(snapshot.layer(id), time).map(str::to_string));
    let scene = SceneRef {
        camera: "default".to_string(),
        canvas: "default".to_string(),
    };

    let imagery = factory3d.imagery_provider(id, &time).map(|providers| {
        providers
            .iter()
            .map(|p| {
                let mut value = serde_json::to_value(p).unwrap_or(Value::Null);
                if let Value::Object(map) = &mut value {
                    map.insert("requestUrl".to_string(), Value::String(p.request_url()));
                }
                value
            })
            .collect::<Vec<_>>()
    });

    json!({
        "bodId": id,
        "type3d": snapshot.try_config3d(snapshot.layer(id)).ok().map(|l| l.kind),
        "imagery": imagery,
        "terrain": factory3d.terrain_provider(id),
        "tileset": factory3d.tileset(id),
        "kml": factory3d.data_source(id, &scene),
    })
}
