//! StudyGraph CLI
//!
//! Serve the HTTP API, export saved mind maps, or call the generation
//! service directly from the command line.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use studygraph::{
    export, Config, FsBlobStore, Gateway, GenerationClient, JsonFileStore, MindMapDoc, Session,
    StaticAuth, SummaryStyle, User,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let config = Config::from_env();

    match args[1].as_str() {
        "serve" | "server" => cmd_serve(&args[2..], config),
        "export" => cmd_export(&args[2..]),
        "summarize" => cmd_summarize(&args[2..], &config),
        "mindmap" => cmd_mindmap(&args[2..], &config),
        "version" | "--version" | "-V" => {
            println!("studygraph {}", VERSION);
            Ok(())
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn cmd_serve(args: &[String], config: Config) -> anyhow::Result<()> {
    let mut host = config.host.clone();
    let mut port = config.port;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                if i + 1 < args.len() {
                    host = args[i + 1].clone();
                    i += 2;
                    continue;
                }
            }
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    port = args[i + 1].parse().unwrap_or(port);
                    i += 2;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    std::fs::create_dir_all(&config.data_dir)?;

    let store = Arc::new(JsonFileStore::new(config.document_dir())?);
    let blobs = Arc::new(FsBlobStore::new(config.blob_dir())?);
    let auth = Arc::new(StaticAuth::new(User {
        uid: config.user.clone(),
        display_name: config.user.clone(),
        email: String::new(),
    }));

    let state = Arc::new(studygraph::server::AppState {
        gateway: Gateway::new(store, blobs),
        session: Session::new(auth),
        generator: GenerationClient::new(&config.api_url),
    });

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(studygraph::server::start_server(&host, port, state))
}

fn cmd_export(args: &[String]) -> anyhow::Result<()> {
    let Some(input) = args.first() else {
        eprintln!("usage: studygraph export <mindmap.json> [--out FILE] [--format png|pdf]");
        return Ok(());
    };

    let mut format = "png".to_string();
    let mut out: Option<PathBuf> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--format" | "-f" => {
                if i + 1 < args.len() {
                    format = args[i + 1].clone();
                    i += 2;
                    continue;
                }
            }
            "--out" | "-o" => {
                if i + 1 < args.len() {
                    out = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    let raw = std::fs::read_to_string(input)?;
    let doc: MindMapDoc = serde_json::from_str(&raw)?;
    let out = out.unwrap_or_else(|| Path::new(input).with_extension(&format));

    match format.as_str() {
        "png" => export::export_png(&doc, &out)?,
        "pdf" => export::export_pdf(&doc, &out)?,
        other => {
            eprintln!("unknown format: {} (expected png or pdf)", other);
            return Ok(());
        }
    }
    println!("exported {} to {}", doc.title, out.display());
    Ok(())
}

fn cmd_summarize(args: &[String], config: &Config) -> anyhow::Result<()> {
    let Some(text) = args.first() else {
        eprintln!("usage: studygraph summarize <text> [--style short|long|bullet]");
        return Ok(());
    };

    let style = match args.iter().position(|a| a == "--style") {
        Some(i) => match args.get(i + 1).map(|s| s.as_str()) {
            Some("long") => SummaryStyle::Long,
            Some("bullet") => SummaryStyle::Bullet,
            _ => SummaryStyle::Short,
        },
        None => SummaryStyle::Short,
    };

    let client = GenerationClient::new(&config.api_url);
    let summary = client.summarize(text, style)?;
    println!("{}", summary);
    Ok(())
}

fn cmd_mindmap(args: &[String], config: &Config) -> anyhow::Result<()> {
    let Some(text) = args.first() else {
        eprintln!("usage: studygraph mindmap <text> [--title TITLE]");
        return Ok(());
    };

    let title = args
        .iter()
        .position(|a| a == "--title")
        .and_then(|i| args.get(i + 1).cloned())
        .unwrap_or_else(|| "Generated Mind Map".to_string());

    let client = GenerationClient::new(&config.api_url);
    let doc = client.generate_mindmap(text)?.into_mindmap(&title);
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

fn print_usage() {
    println!(
        r#"StudyGraph v{} - summaries, mind maps and past-paper practice

USAGE:
    studygraph <COMMAND> [OPTIONS]

COMMANDS:
    serve       Start the HTTP API server
    export      Render a saved mind map to PNG or PDF
    summarize   Summarize text via the generation service
    mindmap     Generate a mind map from text
    version     Print version

OPTIONS:
    serve:     --host HOST (default 127.0.0.1), --port PORT (default 3030)
    export:    --format png|pdf, --out FILE
    summarize: --style short|long|bullet

ENVIRONMENT:
    STUDYGRAPH_DATA_DIR  Data directory (documents and uploads)
    STUDYGRAPH_API_URL   Generation service base URL (default http://localhost:8000)
    STUDYGRAPH_USER      Owner id for single-user mode (default "local")
"#,
        VERSION
    );
}
