use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use piping_assistant::auth::{ServiceAccountTokenSource, StaticTokenSource, TokenSource};
use piping_assistant::clients::gemini::{resolve_model, GeminiClient};
use piping_assistant::config::{AssistantConfig, ConfigError, DriveCredentials};
use piping_assistant::console::{Console, LibraryAgent};
use piping_assistant::drive::{DriveApi, DriveClient};
use piping_assistant::tool_protocol::ToolRegistry;
use piping_assistant::tool_protocols::PipingToolProtocol;
use piping_assistant::tools::{LibraryTools, WebSearchTool};
use piping_assistant::web_search::DuckDuckGoSearch;
use piping_assistant::{Agent, ChatSession, ClientWrapper, DocumentChat};

#[derive(Parser)]
#[command(name = "piping-assistant", version, about = "Piping engineering document assistant")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this model instead of probing the preferred list
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand)]
enum Mode {
    /// Ask questions about one local PDF (default)
    Chat {
        #[arg(long)]
        project: Option<String>,
        /// PDF to load before the first question
        #[arg(long)]
        pdf: Option<PathBuf>,
    },
    /// Let the agent search the Drive library and the web
    Agent {
        #[arg(long)]
        project: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    piping_assistant::init_logger_with_default(if cli.verbose { "debug" } else { "warn" });

    let config = match AssistantConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            std::process::exit(1);
        }
    };

    let model = match &cli.model {
        Some(model) => model.clone(),
        None => resolve_model(
            &config.gemini_api_key,
            &config.gemini_api_root,
            &config.preferred_models,
        )
        .await
        .context("model selection failed")?,
    };
    log::info!("using model {}", model);

    let client: Arc<dyn ClientWrapper> = Arc::new(GeminiClient::new_with_base_url(
        &config.gemini_api_key,
        &model,
        &config.gemini_base_url,
    ));

    let mut console = Console::stdio(config.projects.clone());
    match cli.mode.unwrap_or(Mode::Chat {
        project: None,
        pdf: None,
    }) {
        Mode::Chat { project, pdf } => {
            let session = ChatSession::new(pick_project(&config, project)?);
            let mut chat = DocumentChat::new(client, session, config.limits.clone());
            if let Some(path) = pdf {
                console.preload(&mut chat, &path).await?;
            }
            console.run(&mut chat).await?;
        }
        Mode::Agent { project } => {
            let session = ChatSession::new(pick_project(&config, project)?);
            let drive = drive_client(&config)?;
            let library = LibraryTools::new(
                drive.clone(),
                session.loaded_documents().clone(),
                &config.limits,
            );
            let web = WebSearchTool::new(
                Arc::new(DuckDuckGoSearch::new()),
                config.limits.web_result_limit,
            );
            let protocol = Arc::new(PipingToolProtocol::new(library, web));
            let registry = ToolRegistry::from_protocol(protocol)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            let agent = Agent::new(client, registry, session, config.limits.max_tool_iterations);
            let mut frontend = LibraryAgent::new(agent, drive);
            console.run(&mut frontend).await?;
        }
    }
    Ok(())
}

fn pick_project(config: &AssistantConfig, requested: Option<String>) -> anyhow::Result<String> {
    match requested {
        None => Ok(config.default_project().to_string()),
        Some(name) => match config.projects.iter().find(|p| p.eq_ignore_ascii_case(&name)) {
            Some(project) => Ok(project.clone()),
            None => bail!(
                "unknown project '{}'; configured: {}",
                name,
                config.projects.join(", ")
            ),
        },
    }
}

fn drive_client(config: &AssistantConfig) -> anyhow::Result<Arc<dyn DriveApi>> {
    let tokens: Arc<dyn TokenSource> = match &config.drive_credentials {
        Some(DriveCredentials::ServiceAccount(path)) => Arc::new(
            ServiceAccountTokenSource::from_file(path)
                .with_context(|| format!("could not load service account {}", path.display()))?,
        ),
        Some(DriveCredentials::AccessToken(token)) => Arc::new(StaticTokenSource::new(token.clone())),
        None => return Err(ConfigError::MissingDriveCredentials.into()),
    };
    Ok(Arc::new(
        DriveClient::new(tokens).with_folder(config.drive_folder_id.clone()),
    ))
}
