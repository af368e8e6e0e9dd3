use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use rmcp::{
    model::{
        CallToolRequestParam, CallToolResult, Content, JsonObject, ListToolsResult,
        PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
    ErrorData as McpError, RoleServer, ServiceExt,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use devtap::{bridge, tools, util, Bridge, Config, DiagnosticTools};

#[derive(Parser)]
#[command(
    name = "devtap",
    version,
    about = "Live state bridge between a running reactive app and a debugging agent"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory for the config file and logs (default: ~/.devtap)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: <data-dir>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the bridge listen host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Override the bridge listen port
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge and serve the diagnostic tools over stdio (default)
    Serve,

    /// Print the tool catalogue as JSON
    Tools,

    /// Write the example config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Hosts the diagnostic tools over MCP. Tool names, descriptions and schemas come from the
/// catalogue so the client sees the same argument shapes `devtap tools` prints.
#[derive(Clone)]
struct DevtapMcpServer {
    tools: Arc<DiagnosticTools>,
    catalogue: Arc<Vec<Tool>>,
}

impl DevtapMcpServer {
    fn new(tools: DiagnosticTools) -> Self {
        let catalogue = tools::definitions()
            .into_iter()
            .map(|def| {
                let schema = match def.input_schema {
                    Value::Object(map) => map,
                    _ => JsonObject::new(),
                };
                Tool::new(def.name, def.description, Arc::new(schema))
            })
            .collect();
        Self {
            tools: Arc::new(tools),
            catalogue: Arc::new(catalogue),
        }
    }
}

impl rmcp::ServerHandler for DevtapMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "devtap exposes the live state of a running reactive application. Start with \
                 bridge_status and get_snapshot; use snapshot_diff save/diff around a \
                 reproduction and diagnose for a health overview."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.catalogue.as_ref().clone()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let args = request.arguments.map(Value::Object).unwrap_or(Value::Null);
        let output = self.tools.dispatch(&request.name, args).await;
        let text = serde_json::to_string_pretty(&output.content)
            .unwrap_or_else(|_| output.content.to_string());
        let structured_content = output.content.is_object().then_some(output.content);
        Ok(CallToolResult {
            content: vec![Content::text(text)],
            structured_content,
            is_error: Some(output.is_error),
            meta: None,
        })
    }
}

fn init_logging(default_level: &str) -> Result<()> {
    // Log to <data-dir>/logs/devtap.log; stdout carries the tool protocol
    fs::create_dir_all(util::logs_dir())?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::log_file_path())?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false)
        .init();
    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    let bridge = Bridge::new(config.bridge.clone());
    let (addr, server_handle) = bridge::spawn_server(bridge.clone(), config.server.clone()).await?;
    tracing::info!(%addr, "Bridge listening at ws://{}/ws", addr);

    let server = DevtapMcpServer::new(DiagnosticTools::new(bridge.clone()));
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;

    tracing::info!("Tool client disconnected; shutting down");
    bridge.close();
    server_handle.await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    util::init_data_dir(cli.data_dir.clone());

    let config_file = cli.config.clone().unwrap_or_else(util::config_path);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let mut config = Config::load_from(&config_file);
            if let Some(host) = cli.host {
                config = config.with_host(host);
            }
            if let Some(port) = cli.port {
                config = config.with_port(port);
            }
            init_logging(&config.log_level)?;
            serve(config).await
        }
        Commands::Tools => {
            println!("{}", serde_json::to_string_pretty(&tools::definitions())?);
            Ok(())
        }
        Commands::InitConfig { force } => {
            if config_file.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    config_file.display()
                );
            }
            Config::write_example(&config_file)?;
            println!("Wrote {}", config_file.display());
            Ok(())
        }
    }
}
