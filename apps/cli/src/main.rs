#![deny(warnings)]

//! Command line client: offline quotes and project editing against the service.

use anyhow::{anyhow, bail, Context, Result};
use quote_api::{HttpProjectsApi, ModelUpload, SessionHooks};
use quote_core::{FileStatus, NewProject, ParamField, ParamsPatch, ProductionParameters, ProjectId};
use quote_econ::{calculate, summary};
use quote_runtime::{AppConfig, AppState, Dashboard, ProjectSession};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
usage:
  printquote quote --volume <mm3> [--params <file.yaml>] [--set <field>=<value>]...
  printquote list [--config <file>]
  printquote new [--title <title>] [--config <file>]
  printquote delete <id> [--config <file>]
  printquote project <id> [--config <file>] [--set <field>=<value>]...
                     [--upload <model>] [--wait <secs>] [--generate-ai]
  printquote --version";

#[derive(Debug, PartialEq)]
enum Cmd {
    Quote,
    List,
    New,
    Delete(String),
    Project(String),
    Version,
}

#[derive(Debug, PartialEq)]
struct Args {
    cmd: Cmd,
    config: Option<PathBuf>,
    volume: Option<f64>,
    params: Option<PathBuf>,
    sets: Vec<(ParamField, String)>,
    title: Option<String>,
    upload: Option<PathBuf>,
    wait: Option<u64>,
    generate_ai: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(argv: I) -> Result<Args> {
    let mut it = argv.into_iter();
    let cmd = match it.next().as_deref() {
        Some("quote") => Cmd::Quote,
        Some("list") => Cmd::List,
        Some("new") => Cmd::New,
        Some("delete") => Cmd::Delete(it.next().context("delete needs a project id")?),
        Some("project") => Cmd::Project(it.next().context("project needs a project id")?),
        Some("--version") | Some("-V") => Cmd::Version,
        Some(other) => bail!("unknown command {other:?}\n{USAGE}"),
        None => bail!("{USAGE}"),
    };
    let mut args = Args {
        cmd,
        config: None,
        volume: None,
        params: None,
        sets: Vec::new(),
        title: None,
        upload: None,
        wait: None,
        generate_ai: false,
    };
    while let Some(arg) = it.next() {
        let mut value = |name: &str| it.next().with_context(|| format!("{name} needs a value"));
        match arg.as_str() {
            "--config" => args.config = Some(value("--config")?.into()),
            "--volume" => {
                let raw = value("--volume")?;
                args.volume = Some(raw.parse().with_context(|| format!("bad volume {raw:?}"))?);
            }
            "--params" => args.params = Some(value("--params")?.into()),
            "--set" => {
                let raw = value("--set")?;
                let (field, v) = raw
                    .split_once('=')
                    .with_context(|| format!("expected <field>=<value>, got {raw:?}"))?;
                args.sets.push((field.trim().parse()?, v.to_string()));
            }
            "--title" => args.title = Some(value("--title")?),
            "--upload" => args.upload = Some(value("--upload")?.into()),
            "--wait" => {
                let raw = value("--wait")?;
                args.wait = Some(raw.parse().with_context(|| format!("bad wait {raw:?}"))?);
            }
            "--generate-ai" => args.generate_ai = true,
            other => bail!("unknown option {other:?}\n{USAGE}"),
        }
    }
    Ok(args)
}

fn load_params(args: &Args) -> Result<ProductionParameters> {
    let mut params = match &args.params {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let patch: ParamsPatch = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            ProductionParameters::from_stored(Some(&patch))
        }
        None => ProductionParameters::default(),
    };
    for (field, raw) in &args.sets {
        params.apply_edit(*field, raw)?;
    }
    if let Err(e) = params.validate() {
        warn!(error = %e, "parameters outside nominal range");
    }
    Ok(params)
}

fn offline_quote(args: &Args) -> Result<()> {
    let params = load_params(args)?;
    let results = calculate(&params, args.volume);
    println!("{}", summary::render(&params, results.as_ref()));
    Ok(())
}

async fn wait_for_analysis(session: &ProjectSession, secs: u64) -> Result<()> {
    let status = tokio::time::timeout(Duration::from_secs(secs), session.wait_for_analysis())
        .await
        .map_err(|_| anyhow!("model still processing after {secs}s"))?;
    info!(%status, "model status");
    match status {
        FileStatus::Processing => bail!("status polling stopped before the model was analyzed"),
        FileStatus::Error => bail!("model analysis failed"),
        _ => Ok(()),
    }
}

async fn edit_project(dash: &Dashboard, id: String, args: &Args) -> Result<()> {
    let session = dash.open(ProjectId(id)).await?;
    for (field, raw) in &args.sets {
        session.edit_field(*field, raw)?;
    }
    if let Some(path) = &args.upload {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("bad model path {}", path.display()))?;
        session.upload(ModelUpload::new(name, bytes)).await?;
    }
    if let Some(secs) = args.wait {
        wait_for_analysis(&session, secs).await?;
    }
    if args.generate_ai {
        session.generate_ai().await?;
    } else {
        session.flush().await?;
    }

    let snap = session.snapshot();
    println!("{} [{}]", snap.project.title, snap.project.file_status);
    println!("{}", summary::render(&snap.params, snap.results.as_ref()));
    if let Some(text) = &snap.project.ai_description {
        println!("\n{text}");
    }
    if let Some(text) = &snap.project.ai_commercial_text {
        println!("\n{text}");
    }
    session.close();
    Ok(())
}

async fn online(args: Args) -> Result<()> {
    let cfg = AppConfig::load(args.config.as_deref())?;
    let state = AppState::new();
    let hooks: Arc<dyn SessionHooks> = Arc::new(state.auth());
    let api = Arc::new(HttpProjectsApi::new(&cfg.api(), hooks)?);
    if let Some(token) = &cfg.api_token {
        state.auth().sign_in(token.clone(), None);
        let user = state.auth().load_user(api.as_ref()).await?;
        info!(api_url = %cfg.api_url, email = %user.email, "connected");
    } else {
        info!(api_url = %cfg.api_url, "connected without a token");
    }
    let dash = Dashboard::new(api, state.clone(), cfg.reactor());

    match &args.cmd {
        Cmd::List => {
            for p in dash.refresh().await? {
                let price = p
                    .calculated_results
                    .as_ref()
                    .map(|r| r.total_unit_price)
                    .map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
                println!("{}\t{}\t{}\t{}", p.id, p.file_status, price, p.title);
            }
        }
        Cmd::New => {
            let project = match &args.title {
                Some(title) => dash.create(&NewProject::titled(title.clone())).await?,
                None => {
                    dash.refresh().await?;
                    dash.create_untitled().await?
                }
            };
            println!("{}\t{}", project.id, project.title);
        }
        Cmd::Delete(id) => dash.delete(&ProjectId(id.clone())).await?,
        Cmd::Project(id) => edit_project(&dash, id.clone(), &args).await?,
        Cmd::Quote | Cmd::Version => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    match args.cmd {
        Cmd::Version => {
            println!(
                "printquote {} ({})",
                env!("CARGO_PKG_VERSION"),
                env!("PRINTQUOTE_GIT_SHA")
            );
            Ok(())
        }
        Cmd::Quote => offline_quote(&args),
        _ => online(args).await,
    }
}
