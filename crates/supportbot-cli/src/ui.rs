//! Terminal widgets for the chat REPL

use colored::*;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, size},
};
use std::io::{self, IsTerminal, Write};

use supportbot_core::{AppConfig, ProviderKind, ResponseMode, Result, Source};

use crate::recommendation::Recommendation;
use crate::session::SessionSummary;

/// Restores cooked mode even when reading a key fails
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

fn boxed_line(text: &str, width: usize) -> String {
    let pad = width.saturating_sub(text.chars().count() + 4);
    format!("│  {}{}│", text, " ".repeat(pad))
}

/// Display startup banner
pub fn display_banner(config: &AppConfig) {
    let terminal_width = size().map(|(w, _)| w as usize).unwrap_or(80);
    let banner_width = std::cmp::min(67, terminal_width.saturating_sub(4)).max(20);

    let top_border = format!("┌{}┐", "─".repeat(banner_width - 2));
    let bottom_border = format!("└{}┘", "─".repeat(banner_width - 2));
    let empty_line = format!("│{}│", " ".repeat(banner_width - 2));

    println!();
    println!("{}", top_border.blue());
    println!("{}", empty_line.blue());

    let title = config.app_title.as_str();
    let pad = banner_width.saturating_sub(title.chars().count() + 4);
    println!("{}{}{}", "│  ".blue(), title.blue().bold(), format!("{}│", " ".repeat(pad)).blue());

    println!("{}", empty_line.blue());

    let version = format!("v{}", env!("CARGO_PKG_VERSION"));
    let feature_lines = [
        config.app_description.as_str(),
        "",
        "• 📚 Answers grounded in the store knowledge base",
        "• 🔍 Optional web search with safe filtering",
        "• 💬 Saved chat sessions you can reload",
        "• 🎁 Product suggestions as you chat",
        "",
        version.as_str(),
    ];

    for line in feature_lines {
        if line.is_empty() {
            println!("{}", empty_line.blue());
        } else if line == version {
            let pad = banner_width.saturating_sub(line.chars().count() + 4);
            println!("{}{}{}", "│  ".blue(), line.dimmed(), format!("{}│", " ".repeat(pad)).blue());
        } else {
            println!("{}", boxed_line(line, banner_width).blue());
        }
    }

    println!("{}", empty_line.blue());
    println!("{}", bottom_border.blue());
    println!();
    println!(
        "{}",
        "💡 Tip: Ask about products, orders, shipping or returns, or type 'help' for commands".dimmed()
    );
    println!();
}

/// Read one line with history navigation
///
/// Returns `None` on Ctrl+C, Ctrl+D or end of piped input.
pub fn handle_input_with_history(history: &mut Vec<String>, prompt: &str) -> Result<Option<String>> {
    if !io::stdin().is_terminal() {
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        let input = input.trim().to_string();
        if !input.is_empty() {
            history.push(input.clone());
        }
        return Ok(Some(input));
    }

    let prompt = prompt.green().bold();
    let guard = RawModeGuard::enable()?;
    let mut input = String::new();
    let mut history_index: Option<usize> = None;

    print!("{} ", prompt);
    io::stdout().flush()?;

    let redraw = |input: &str, previous_len: usize| -> io::Result<()> {
        let blank = " ".repeat(previous_len + 1);
        print!("\r{} {}\r{} {}", prompt, blank, prompt, input);
        io::stdout().flush()
    };

    loop {
        let Event::Key(key_event) = event::read()? else {
            continue;
        };
        if key_event.kind != KeyEventKind::Press {
            continue;
        }

        let ctrl = key_event.modifiers.contains(KeyModifiers::CONTROL);
        match key_event.code {
            KeyCode::Char('c') | KeyCode::Char('d') if ctrl => {
                drop(guard);
                println!();
                return Ok(None);
            }
            KeyCode::Enter => {
                drop(guard);
                println!();
                let input = input.trim().to_string();
                if !input.is_empty() {
                    history.push(input.clone());
                }
                return Ok(Some(input));
            }
            KeyCode::Char(c) => {
                input.push(c);
                print!("{}", c);
                io::stdout().flush()?;
            }
            KeyCode::Backspace => {
                if input.pop().is_some() {
                    redraw(&input, input.chars().count() + 1)?;
                }
            }
            KeyCode::Up => {
                if !history.is_empty() {
                    let new_index = match history_index {
                        None => history.len() - 1,
                        Some(idx) => idx.saturating_sub(1),
                    };
                    let previous_len = input.chars().count();
                    history_index = Some(new_index);
                    input = history[new_index].clone();
                    redraw(&input, previous_len)?;
                }
            }
            KeyCode::Down => {
                if let Some(idx) = history_index {
                    let previous_len = input.chars().count();
                    if idx + 1 < history.len() {
                        history_index = Some(idx + 1);
                        input = history[idx + 1].clone();
                    } else {
                        history_index = None;
                        input.clear();
                    }
                    redraw(&input, previous_len)?;
                }
            }
            KeyCode::Esc => {
                let previous_len = input.chars().count();
                input.clear();
                history_index = None;
                redraw(&input, previous_len)?;
            }
            _ => {}
        }
    }
}

/// Display help message
pub fn print_help() {
    println!("{}", "Available commands:".bold());
    println!("  {} - Ask a question about products, orders or policies", "<question>".green());
    println!("  {} - Start a new chat", "/new".green());
    println!("  {} - Clear the current chat", "/clear".green());
    println!("  {} - Switch between concise and detailed answers", "/mode [concise|detailed]".green());
    println!("  {} - Switch LLM provider", "/provider <openai|groq|gemini>".green());
    println!("  {} - Toggle web search", "/web [on|off]".green());
    println!("  {} - List saved chats", "/sessions".green());
    println!("  {} - Reopen a saved chat", "/load <id>".green());
    println!("  {} - Export the current chat to JSON", "/export [path]".green());
    println!("  {} - Rebuild the knowledge base index", "/kb reload".green());
    println!("  {} - Show product suggestions", "/recommend".green());
    println!("  {} - Show current settings", "/status".green());
    println!("  {} - Show this help message", "help".green());
    println!("  {} - Exit the application", "exit/quit".green());
    println!();
    println!("{}", "Examples:".bold());
    println!("  What is your return policy?");
    println!("  How long does express shipping take?");
    println!("  I'm looking for a laptop under $1000");
}

pub fn print_answer(text: &str) {
    println!();
    println!("{} {}", "🤖".cyan(), text);
    println!();
}

/// Sources in first-seen order with duplicates removed
pub fn unique_sources(sources: &[Source]) -> Vec<&Source> {
    let mut seen: Vec<&Source> = Vec::new();
    for source in sources {
        if !seen.iter().any(|s| s.location() == source.location()) {
            seen.push(source);
        }
    }
    seen
}

pub fn print_sources(sources: &[Source]) {
    let unique = unique_sources(sources);
    if unique.is_empty() {
        return;
    }

    println!("{}", "Sources:".dimmed());
    for source in unique {
        match source {
            Source::KnowledgeBase { source } => println!("  {} {}", "📄".dimmed(), source.dimmed()),
            Source::Web { source, title } => {
                println!("  {} {} ({})", "🌐".dimmed(), title.dimmed(), source.dimmed())
            }
        }
    }
    println!();
}

/// Plain-text product list shown after an answer
pub fn format_recommendations(recommendations: &[Recommendation]) -> String {
    recommendations
        .iter()
        .map(|rec| {
            let product = &rec.product;
            let stock = if product.in_stock() { "in stock" } else { "out of stock" };
            format!(
                "• {} (${:.2}, ★ {:.1}, {})\n  {}",
                product.name, product.price, product.rating, stock, product.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn print_recommendations(recommendations: &[Recommendation]) {
    if recommendations.is_empty() {
        return;
    }
    println!("{}", "🎁 You might like:".magenta().bold());
    println!("{}", format_recommendations(recommendations));
    println!();
}

/// Plain-text listing of saved sessions
pub fn format_sessions(sessions: &[SessionSummary]) -> String {
    sessions
        .iter()
        .map(|s| {
            let updated = s.updated_at.get(..16).unwrap_or(&s.updated_at).replace('T', " ");
            format!("{}  {}  {} ({} messages)", s.id, updated, s.title, s.message_count)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn print_sessions(sessions: &[SessionSummary]) {
    if sessions.is_empty() {
        println!("{}", "No saved chats yet.".dimmed());
        return;
    }
    println!("{}", "💬 Saved chats:".bold());
    println!("{}", format_sessions(sessions));
}

/// Shown when no provider has an API key
pub fn print_setup_guide() {
    eprintln!("{} No API keys configured!", "⚠️".red());
    eprintln!("Please add API keys to your .env file or environment variables:");
    eprintln!();
    for kind in ProviderKind::ALL {
        eprintln!("  {}=your_key_here", kind.api_key_var());
    }
    eprintln!();
}

pub fn print_status(
    provider: ProviderKind,
    model: &str,
    mode: ResponseMode,
    web_search: bool,
    kb_chunks: Option<usize>,
) {
    println!("{} {} ({})", "Provider:".bold(), provider.display_name(), model);
    println!("{} {}", "Mode:".bold(), mode);
    println!(
        "{} {}",
        "Web search:".bold(),
        if web_search { "on".green() } else { "off".dimmed() }
    );
    match kb_chunks {
        Some(chunks) if chunks > 0 => {
            println!("{} ✅ Loaded {} document chunks", "Knowledge base:".bold(), chunks)
        }
        _ => println!("{} not loaded", "Knowledge base:".bold()),
    }
}
