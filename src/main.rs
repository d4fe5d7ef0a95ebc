//! krutrim binary entry point.

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use krutrim::agent::{ConversationController, TurnEvent, TurnEventSink};
use krutrim::cli::{render_catalog, render_event, render_message, Cli, Commands, GlobalArgs};
use krutrim::config::KrutrimConfig;
use krutrim::error::Result;
use krutrim::provider::create_provider;
use krutrim::session::Session;
use krutrim::tools::ToolProvider;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "krutrim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = KrutrimConfig::load()?;
    cli.options.apply(&mut config);
    config.validate()?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Tools => list_tools(&config).await,
        Commands::Ask(args) => {
            let controller = build_controller(&config, &cli.options)?;
            let answer = controller.step(&Session::start(), args.text()).await?;
            println!("{}", render_message(&answer));
            Ok(())
        }
        Commands::Chat => {
            let controller = build_controller(&config, &cli.options)?;
            chat(&controller).await
        }
    }
}

fn build_controller(config: &KrutrimConfig, options: &GlobalArgs) -> Result<ConversationController> {
    let provider = create_provider(&config.language_model()?, config)?;
    let sink: TurnEventSink = Arc::new(|event: TurnEvent| {
        if let Some(line) = render_event(&event) {
            eprintln!("{line}");
        }
    });

    let controller = ConversationController::new(Arc::from(provider), config.controller_options())
        .with_event_sink(sink);

    if options.use_tools(config)? {
        Ok(controller.with_tools(tool_provider(config)?))
    } else {
        Ok(controller)
    }
}

#[cfg(feature = "mcp")]
fn tool_provider(config: &KrutrimConfig) -> Result<Arc<dyn ToolProvider>> {
    Ok(Arc::new(krutrim::mcp::McpToolProvider::from_config(config)))
}

#[cfg(not(feature = "mcp"))]
fn tool_provider(_config: &KrutrimConfig) -> Result<Arc<dyn ToolProvider>> {
    Err(krutrim::error::KrutrimError::Configuration(
        "tool calling needs the `mcp` feature".into(),
    ))
}

async fn list_tools(config: &KrutrimConfig) -> Result<()> {
    let catalog = tool_provider(config)?.list_tools().await?;
    println!("{}", render_catalog(&catalog));
    Ok(())
}

async fn chat(controller: &ConversationController) -> Result<()> {
    let session = Session::start();
    tracing::info!(session_id = %session.id(), "chat session started");
    println!("Type a message, '/history' to replay the conversation, or 'exit' to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("👱🏽 You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "exit" | "quit" => break,
            "/history" => {
                for message in controller.history(&session).await? {
                    println!("{}", render_message(&message));
                }
                continue;
            }
            _ => {}
        }

        match controller.step(&session, input).await {
            Ok(answer) => println!("{}", render_message(&answer)),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => eprintln!("Error: {e}"),
        }
    }
    Ok(())
}
