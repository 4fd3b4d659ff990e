use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;

use supportbot_cli::helpers::session_title;
use supportbot_cli::session::NEW_CHAT_TITLE;
use supportbot_cli::{
    ChatManager, ChatSession, DuckDuckGoSearch, RecommendationEngine, Responder, StoredMessage,
    logging, ui,
};
use supportbot_core::{AppConfig, ProviderKind, RAGEngine, ResponseMode, Role};
use supportbot_llm::LlmClient;
use supportbot_rag::RagPipeline;

#[derive(Parser)]
#[command(name = "supportbot")]
#[command(about = "E-commerce customer support assistant with a searchable knowledge base", long_about = None)]
struct Cli {
    /// LLM provider to use (openai, groq, gemini)
    #[arg(short, long, global = true)]
    provider: Option<ProviderKind>,

    /// Answer style (concise or detailed)
    #[arg(short, long, global = true)]
    mode: Option<String>,

    /// Add web search results to answers
    #[arg(long, global = true)]
    web: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,
    /// Answer a single question and exit
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Build or reload the knowledge base index
    Index {
        /// Rebuild even when a saved index exists
        #[arg(long)]
        rebuild: bool,
        /// Also index this file (repeatable), even from outside the data directory
        #[arg(long = "file", value_name = "PATH")]
        files: Vec<PathBuf>,
    },
    /// Manage saved chat sessions
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// List saved chats, newest first
    List,
    /// Print a saved chat
    Show { id: String },
    /// Export a chat to JSON
    Export { id: String, path: Option<PathBuf> },
    /// Delete one chat
    Delete { id: String },
    /// Delete every saved chat
    Purge {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::from_env()?;
    logging::init(&config.log_level, config.log_file.as_deref())?;

    let mode = cli
        .mode
        .as_deref()
        .map(ResponseMode::parse_lenient)
        .unwrap_or_default();

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(&config, cli.provider, mode, cli.web).await,
        Commands::Ask { question } => {
            let question = question.join(" ");
            let responder = build_responder(&config, cli.provider, true).await?;
            let reply = responder.respond(&question, mode, cli.web, &[]).await;
            ui::print_answer(&reply.text);
            ui::print_sources(&reply.sources);
            Ok(())
        }
        Commands::Index { rebuild, files } => run_index(&config, rebuild, &files).await,
        Commands::Sessions { action } => run_sessions(&config, action).await,
    }
}

/// Pick a provider with a key, or print the setup guide and fail
fn select_llm(config: &AppConfig, requested: Option<ProviderKind>) -> Result<LlmClient> {
    if let Err(e) = config.validate_configuration() {
        ui::print_setup_guide();
        bail!("{}", e);
    }

    let provider = config.resolve_provider(requested)?;
    Ok(LlmClient::new(provider, config)?)
}

/// Load the persisted index or build it; failures leave the bot without a knowledge base
async fn load_knowledge_base(config: &AppConfig, force_rebuild: bool) -> Option<Arc<RagPipeline>> {
    let mut pipeline = match RagPipeline::from_config(config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            println!("⚠️  Knowledge base unavailable: {}", e);
            return None;
        }
    };

    match pipeline.initialize(force_rebuild).await {
        Ok(()) if pipeline.is_ready() => Some(Arc::new(pipeline)),
        Ok(()) => {
            println!(
                "{} No documents found in {}",
                "ℹ️".blue(),
                config.data_dir.display()
            );
            None
        }
        Err(e) => {
            println!("⚠️  Knowledge base initialization failed: {}. Continuing without it.", e);
            None
        }
    }
}

async fn build_responder(
    config: &AppConfig,
    provider: Option<ProviderKind>,
    with_knowledge_base: bool,
) -> Result<Responder> {
    let llm = select_llm(config, provider)?;
    let mut responder = Responder::new(llm).with_web_search(Arc::new(DuckDuckGoSearch::from_config(config)?));

    if with_knowledge_base {
        if let Some(rag) = load_knowledge_base(config, false).await {
            responder.set_rag(Some(rag as Arc<dyn RAGEngine>), config.top_k_retrieval);
        }
    }
    Ok(responder)
}

async fn run_index(config: &AppConfig, rebuild: bool, files: &[PathBuf]) -> Result<()> {
    let mut pipeline = RagPipeline::from_config(config)?;
    println!("{} Indexing {}...", "📚".blue(), config.data_dir.display());
    pipeline.initialize(rebuild).await?;

    if !files.is_empty() {
        let added = pipeline.index_files(files).await?;
        println!(
            "{} Added {} files ({} chunks)",
            "📄".blue(),
            added.documents_indexed,
            added.chunks_indexed
        );
        for error in &added.errors {
            println!("{} {}", "⚠️".yellow(), error);
        }
    }

    let stats = pipeline.stats().await?;
    if pipeline.is_ready() {
        println!("{} Loaded {} document chunks", "✅".green(), pipeline.chunk_count());
    } else {
        println!("{} No documents found to index", "⚠️".yellow());
    }
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn run_sessions(config: &AppConfig, action: SessionAction) -> Result<()> {
    let manager = ChatManager::new(config.chat_storage_dir.clone());

    match action {
        SessionAction::List => ui::print_sessions(&manager.list_sessions().await),
        SessionAction::Show { id } => match manager.load_session(&id).await {
            Some(session) => print_transcript(&session),
            None => bail!("session {} not found", id),
        },
        SessionAction::Export { id, path } => {
            if !manager.export_session(&id, path.as_deref()).await {
                bail!("could not export session {}", id);
            }
            let target = path.unwrap_or_else(|| PathBuf::from(format!("{}_export.json", id)));
            println!("{} Exported to {}", "✅".green(), target.display());
        }
        SessionAction::Delete { id } => {
            if !manager.delete_session(&id).await {
                bail!("session {} not found", id);
            }
            println!("{} Deleted {}", "✅".green(), id);
        }
        SessionAction::Purge { yes } => {
            if !yes {
                println!(
                    "{} This deletes all {} saved chats. Re-run with --yes to confirm.",
                    "⚠️".yellow(),
                    manager.session_count().await
                );
                return Ok(());
            }
            let deleted = manager.delete_all_sessions().await;
            println!("{} Deleted {} chats", "✅".green(), deleted);
        }
    }
    Ok(())
}

fn print_transcript(session: &ChatSession) {
    println!("{} {}", "💬".bold(), session.title.bold());
    if let Some(updated) = &session.updated_at {
        println!("{}", format!("updated {}", updated).dimmed());
    }
    println!();
    for message in &session.messages {
        match message.role {
            Role::User => println!("{} {}", "you>".green().bold(), message.content),
            Role::Assistant => {
                ui::print_answer(&message.content);
                ui::print_sources(&message.sources);
            }
            Role::System => {}
        }
    }
}

/// Everything the REPL keeps between turns
struct ChatState {
    config: AppConfig,
    responder: Responder,
    rag: Option<Arc<RagPipeline>>,
    manager: ChatManager,
    session: ChatSession,
    recommender: RecommendationEngine,
    mode: ResponseMode,
    web_search: bool,
    since_recommendation: usize,
}

impl ChatState {
    async fn save(&mut self) {
        if let Err(e) = self.manager.save_session(&mut self.session).await {
            println!("{} Could not save chat: {}", "⚠️".yellow(), e);
        }
    }

    fn status(&self) {
        ui::print_status(
            self.responder.llm().provider(),
            self.responder.llm().model_id(),
            self.mode,
            self.web_search,
            self.rag.as_ref().map(|rag| rag.chunk_count()),
        );
    }

    async fn ask(&mut self, input: &str) {
        let history = self.session.history();
        println!("{} Thinking...", "🤖".blue());
        let reply = self
            .responder
            .respond(input, self.mode, self.web_search, &history)
            .await;

        ui::print_answer(&reply.text);
        ui::print_sources(&reply.sources);

        self.session.messages.push(StoredMessage::user(input));
        self.session
            .messages
            .push(StoredMessage::assistant(reply.text, reply.sources));
        if self.session.title == NEW_CHAT_TITLE && self.session.user_message_count() == 1 {
            self.session.title = session_title(input);
        }
        self.save().await;

        self.since_recommendation += 1;
        let profile = self.recommender.analyze_user_behavior(&self.session.history());
        if self
            .recommender
            .should_show_recommendations(&profile, self.since_recommendation)
        {
            let recommendations = self.recommender.get_product_recommendations(&profile, None);
            if !recommendations.is_empty() {
                ui::print_recommendations(&recommendations);
                self.since_recommendation = 0;
            }
        }
    }

    /// Handle a `/command`; returns false when the input was not recognised
    async fn command(&mut self, input: &str) -> bool {
        let mut parts = input.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();

        match name {
            "/new" => {
                if self.session.is_empty() {
                    println!("{}", "Already in a new chat.".dimmed());
                } else {
                    self.session = self.manager.create_session();
                    self.since_recommendation = 0;
                    println!("{} Started a new chat", "➕".green());
                }
            }
            "/clear" => {
                self.session.messages.clear();
                self.session.title = NEW_CHAT_TITLE.to_string();
                self.save().await;
                println!("{} Chat cleared", "🗑️".green());
            }
            "/mode" => {
                self.mode = match arg {
                    Some(mode) => ResponseMode::parse_lenient(mode),
                    None if self.mode == ResponseMode::Concise => ResponseMode::Detailed,
                    None => ResponseMode::Concise,
                };
                println!("Response mode: {}", self.mode.to_string().bold());
            }
            "/provider" => match arg.map(|p| p.parse::<ProviderKind>()) {
                Some(Ok(kind)) => match self.config.resolve_provider(Some(kind)) {
                    Ok(kind) => match LlmClient::new(kind, &self.config) {
                        Ok(llm) => {
                            self.responder.set_llm(llm);
                            println!("Provider: {}", kind.display_name().bold());
                        }
                        Err(e) => println!("{} {}", "❌".red(), e),
                    },
                    Err(e) => println!("{} {}", "❌".red(), e),
                },
                Some(Err(e)) => println!("{} {}", "❌".red(), e),
                None => {
                    let available: Vec<&str> = self
                        .config
                        .available_providers()
                        .iter()
                        .map(|p| p.as_str())
                        .collect();
                    println!("Available providers: {}", available.join(", "));
                }
            },
            "/web" => {
                self.web_search = match arg {
                    Some("on") => true,
                    Some("off") => false,
                    _ => !self.web_search,
                };
                println!(
                    "Web search: {}",
                    if self.web_search { "on".green() } else { "off".dimmed() }
                );
            }
            "/sessions" => ui::print_sessions(&self.manager.list_sessions().await),
            "/load" => match arg {
                Some(id) => match self.manager.load_session(id).await {
                    Some(session) => {
                        println!(
                            "{} Loaded \"{}\" ({} messages)",
                            "📂".green(),
                            session.title,
                            session.messages.len()
                        );
                        self.session = session;
                        self.since_recommendation = 0;
                    }
                    None => println!("{} Session {} not found", "❌".red(), id),
                },
                None => println!("Usage: /load <id>"),
            },
            "/export" => {
                if self.session.is_empty() {
                    println!("{}", "Nothing to export yet.".dimmed());
                } else {
                    let path = arg.map(PathBuf::from);
                    if self.manager.export_session(&self.session.id, path.as_deref()).await {
                        let target = path
                            .unwrap_or_else(|| PathBuf::from(format!("{}_export.json", self.session.id)));
                        println!("{} Exported to {}", "✅".green(), target.display());
                    } else {
                        println!("{} Export failed", "❌".red());
                    }
                }
            }
            "/kb" => {
                if arg == Some("reload") {
                    println!("{} Rebuilding knowledge base...", "📚".blue());
                    self.rag = load_knowledge_base(&self.config, true).await;
                } else if self.rag.is_none() {
                    self.rag = load_knowledge_base(&self.config, false).await;
                }
                let rag: Option<Arc<dyn RAGEngine>> = self.rag.clone().map(|rag| rag as Arc<dyn RAGEngine>);
                self.responder.set_rag(rag, self.config.top_k_retrieval);
                match &self.rag {
                    Some(rag) => println!("{} Loaded {} document chunks", "✅".green(), rag.chunk_count()),
                    None => println!("{}", "Knowledge base not loaded".dimmed()),
                }
            }
            "/recommend" => {
                let profile = self.recommender.analyze_user_behavior(&self.session.history());
                let recommendations = self.recommender.get_product_recommendations(&profile, None);
                if recommendations.is_empty() {
                    println!("{}", "No products to suggest.".dimmed());
                } else {
                    ui::print_recommendations(&recommendations);
                    self.since_recommendation = 0;
                }
            }
            "/status" => self.status(),
            _ => return false,
        }
        true
    }
}

async fn run_chat(
    config: &AppConfig,
    provider: Option<ProviderKind>,
    mode: ResponseMode,
    web_search: bool,
) -> Result<()> {
    let llm = select_llm(config, provider)?;
    ui::display_banner(config);

    let rag = load_knowledge_base(config, false).await;
    let mut responder = Responder::new(llm).with_web_search(Arc::new(DuckDuckGoSearch::from_config(config)?));
    if let Some(rag) = &rag {
        println!("{} Loaded {} document chunks", "✅".green(), rag.chunk_count());
        responder.set_rag(Some(rag.clone() as Arc<dyn RAGEngine>), config.top_k_retrieval);
    }

    let manager = ChatManager::new(config.chat_storage_dir.clone());
    let mut state = ChatState {
        config: config.clone(),
        responder,
        rag,
        session: manager.create_session(),
        manager,
        recommender: RecommendationEngine::load(&config.product_catalog_path).await,
        mode,
        web_search,
        since_recommendation: 0,
    };
    state.status();
    println!();

    let mut history = Vec::new();
    loop {
        let Some(input) = ui::handle_input_with_history(&mut history, "you>")? else {
            println!("{}", "👋 Goodbye!".green());
            break;
        };
        if input.is_empty() {
            continue;
        }

        match input.to_lowercase().as_str() {
            "exit" | "quit" => {
                println!("{}", "👋 Goodbye!".green());
                break;
            }
            "help" | "/help" => {
                ui::print_help();
                continue;
            }
            _ => {}
        }

        if input.starts_with('/') {
            if !state.command(&input).await {
                println!("{} Unknown command. Type 'help' for commands.", "❓".yellow());
            }
            continue;
        }

        state.ask(&input).await;
    }

    Ok(())
}
