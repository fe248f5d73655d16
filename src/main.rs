use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;

use tiktrend_actions::action::{ActionHistoryEntry, ActionType, NewActionEntry};
use tiktrend_actions::config::AppConfig;
use tiktrend_actions::templates::{NewTemplate, TemplateCategory, TemplatePlatform};

#[derive(Parser)]
#[command(
    name = "tiktrend-actions",
    about = "Action history, favorites and message templates for TikTrend Finder",
    version,
    long_about = None
)]
struct Cli {
    /// Config file (defaults: $TIKTREND_CONFIG, ./tiktrend.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Keep state in memory only; nothing is read from or written to disk
    #[arg(long, global = true)]
    ephemeral: bool,

    /// JSON output for machine parsing
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API daemon
    Serve {
        /// Bind address (overrides [server] bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Record and query the action history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Manage favorite actions and usage counters
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },

    /// Manage message templates
    Templates {
        #[command(subcommand)]
        action: TemplatesAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Record an action invocation (also counts a use of the action)
    Record {
        /// Product ID
        #[arg(long)]
        product: String,

        /// Product title
        #[arg(long, default_value = "")]
        title: String,

        /// Action type, e.g. whatsapp, seller_bot, export
        #[arg(long)]
        action: ActionType,

        /// Mark the invocation as failed with this error message
        #[arg(long)]
        failed: Option<String>,

        /// Metadata as key=value (repeatable)
        #[arg(long = "meta", value_parser = parse_key_value)]
        meta: Vec<(String, String)>,
    },

    /// Show history for one product
    Product {
        /// Product ID
        product_id: String,
    },

    /// Show the most recent entries across all products
    Recent {
        /// Maximum entries ([ledger] recent_limit if omitted)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Delete all history
    Clear,

    /// Success rate and per-action totals
    Stats,
}

#[derive(Subcommand)]
enum FavoritesAction {
    /// Add or remove an action from favorites
    Toggle {
        action: ActionType,
    },

    /// Count one use of an action
    Use {
        action: ActionType,
    },

    /// List every action with favorite flag and usage count
    List,

    /// Favorites ranked by usage
    Top {
        /// Maximum shortcuts ([favorites] top_limit if omitted)
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum TemplatesAction {
    /// Create a template
    Create {
        #[arg(long)]
        name: String,

        /// Caption with {{variable}} placeholders
        #[arg(long)]
        caption: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, default_value = "all", value_parser = parse_enum::<TemplatePlatform>)]
        platform: TemplatePlatform,

        #[arg(long, default_value = "custom", value_parser = parse_enum::<TemplateCategory>)]
        category: TemplateCategory,

        /// Hashtag without '#' (repeatable)
        #[arg(long = "hashtag")]
        hashtags: Vec<String>,
    },

    /// List templates, most used first
    List {
        #[arg(long, value_parser = parse_enum::<TemplatePlatform>)]
        platform: Option<TemplatePlatform>,

        #[arg(long, value_parser = parse_enum::<TemplateCategory>)]
        category: Option<TemplateCategory>,
    },

    /// Render a template and count the use
    Render {
        id: String,

        /// Variable as key=value (repeatable)
        #[arg(long = "var", value_parser = parse_key_value)]
        vars: Vec<(String, String)>,

        /// Leave the hashtags off
        #[arg(long)]
        no_hashtags: bool,
    },

    /// Copy a template under a new name
    Duplicate {
        id: String,

        #[arg(long)]
        name: String,
    },

    /// Delete a template
    Delete {
        id: String,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if k.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((k.to_string(), v.to_string()))
}

/// Parse a snake_case enum value through its serde representation.
fn parse_enum<T: DeserializeOwned>(s: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("invalid value '{s}'"))
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_entries(entries: &[ActionHistoryEntry]) {
    if entries.is_empty() {
        println!("No history found.");
        return;
    }
    println!(
        "{:<25} | {:<12} | {:<14} | {:<6} | Title",
        "Timestamp", "Product", "Action", "Result"
    );
    println!("{:-<25}-|-{:-<12}-|-{:-<14}-|-{:-<6}-|-{:-<20}", "", "", "", "", "");
    for e in entries {
        let result = if e.success() { "OK" } else { "FAIL" };
        println!(
            "{:<25} | {:<12} | {:<14} | {:<6} | {}",
            e.timestamp().format("%Y-%m-%d %H:%M:%S UTC"),
            e.product_id(),
            e.action_type(),
            result,
            e.product_title()
        );
        if let Some(err) = e.error_message() {
            println!("{:<25} | {:<12} | {:<14} | {:<6} |   -> {}", "", "", "", "", err);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::resolve(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(&config);

    let mut store = tiktrend_actions::open_store(&config, cli.ephemeral)?;
    let json = cli.json;

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            tracing::info!(%bind, "Starting tiktrend-actions daemon");
            tiktrend_actions::serve(&bind, store).await?;
        }
        Commands::History { action } => match action {
            HistoryAction::Record {
                product,
                title,
                action,
                failed,
                meta,
            } => {
                let mut entry = match failed {
                    Some(err) => NewActionEntry::failure(product, title, action, err),
                    None => NewActionEntry::success(product, title, action),
                };
                for (k, v) in meta {
                    entry = entry.with_metadata(k, v);
                }
                let added = store.record_action(entry);
                if json {
                    print_json(&added)?;
                } else {
                    println!("Recorded {} for '{}' ({}).", added.action_type(), added.product_id(), added.id());
                }
            }
            HistoryAction::Product { product_id } => {
                let entries = store.history_by_product(&product_id);
                if json {
                    print_json(&entries)?;
                } else {
                    print_entries(&entries);
                }
            }
            HistoryAction::Recent { limit } => {
                let entries = store.recent_history(limit);
                if json {
                    print_json(&entries)?;
                } else {
                    print_entries(&entries);
                }
            }
            HistoryAction::Clear => {
                store.clear_history();
                if !json {
                    println!("History cleared.");
                }
            }
            HistoryAction::Stats => {
                let counts = store.count_by_action();
                if json {
                    let by_action: BTreeMap<String, _> =
                        counts.into_iter().map(|(a, s)| (a.to_string(), s)).collect();
                    print_json(&serde_json::json!({
                        "total": store.history_len(),
                        "successRate": store.success_rate(None),
                        "byAction": by_action,
                    }))?;
                } else {
                    println!("Entries:      {}", store.history_len());
                    match store.success_rate(None) {
                        Some(rate) => println!("Success rate: {:.1}%", rate * 100.0),
                        None => println!("Success rate: n/a"),
                    }
                    if !counts.is_empty() {
                        println!("\n{:<14} | {:>5} | {:>5} | {:>5}", "Action", "Total", "OK", "Fail");
                        println!("{:-<14}-|-{:->5}-|-{:->5}-|-{:->5}", "", "", "", "");
                        for (action, s) in counts {
                            println!(
                                "{:<14} | {:>5} | {:>5} | {:>5}",
                                action.as_str(),
                                s.total,
                                s.succeeded,
                                s.failed
                            );
                        }
                    }
                }
            }
        },
        Commands::Favorites { action } => match action {
            FavoritesAction::Toggle { action } => {
                let now = store.toggle_favorite(action);
                if json {
                    print_json(&serde_json::json!({ "id": action, "favorite": now }))?;
                } else if now {
                    println!("'{}' added to favorites.", action.label());
                } else {
                    println!("'{}' removed from favorites.", action.label());
                }
            }
            FavoritesAction::Use { action } => {
                let count = store.increment_usage(action);
                if json {
                    print_json(&serde_json::json!({ "id": action, "usageCount": count }))?;
                } else {
                    println!("'{}' used {} time(s).", action.label(), count);
                }
            }
            FavoritesAction::List => {
                if json {
                    let rows: Vec<_> = ActionType::ALL
                        .iter()
                        .map(|&a| {
                            serde_json::json!({
                                "id": a,
                                "label": a.label(),
                                "favorite": store.is_favorite(a),
                                "usageCount": store.usage_count(a),
                            })
                        })
                        .collect();
                    print_json(&rows)?;
                } else {
                    println!("{:<14} | {:<14} | {:<8} | Uses", "Action", "Label", "Favorite");
                    println!("{:-<14}-|-{:-<14}-|-{:-<8}-|-{:-<5}", "", "", "", "");
                    for a in ActionType::ALL {
                        let fav = if store.is_favorite(a) { "yes" } else { "" };
                        println!("{:<14} | {:<14} | {:<8} | {}", a.as_str(), a.label(), fav, store.usage_count(a));
                    }
                }
            }
            FavoritesAction::Top { limit } => {
                let top = store.most_used(limit);
                if json {
                    print_json(&top)?;
                } else if top.is_empty() {
                    println!("No favorites yet.");
                } else {
                    for (i, f) in top.iter().enumerate() {
                        println!("{}. {} ({} uses)", i + 1, f.label, f.usage_count);
                    }
                }
            }
        },
        Commands::Templates { action } => match action {
            TemplatesAction::Create {
                name,
                caption,
                description,
                platform,
                category,
                hashtags,
            } => {
                let created = store.create_template(NewTemplate {
                    name,
                    description,
                    platform,
                    category,
                    caption_template: caption,
                    hashtags,
                })?;
                if json {
                    print_json(&created)?;
                } else {
                    println!("Template '{}' created ({}).", created.name, created.id);
                }
            }
            TemplatesAction::List { platform, category } => {
                let templates = store.list_templates(platform, category);
                if json {
                    print_json(&templates)?;
                } else if templates.is_empty() {
                    println!("No templates found.");
                } else {
                    println!("{:<36} | {:<24} | {:<10} | Uses", "ID", "Name", "Platform");
                    println!("{:-<36}-|-{:-<24}-|-{:-<10}-|-{:-<5}", "", "", "", "");
                    for t in templates {
                        let platform = serde_json::to_value(t.platform)?;
                        println!(
                            "{:<36} | {:<24} | {:<10} | {}",
                            t.id,
                            t.name,
                            platform.as_str().unwrap_or_default(),
                            t.usage_count
                        );
                    }
                }
            }
            TemplatesAction::Render { id, vars, no_hashtags } => {
                let vars: BTreeMap<String, String> = vars.into_iter().collect();
                let rendered = store.render_template(&id, &vars, !no_hashtags)?;
                if json {
                    print_json(&rendered)?;
                } else {
                    println!("{}", rendered.caption);
                }
            }
            TemplatesAction::Duplicate { id, name } => {
                let copy = store.duplicate_template(&id, &name)?;
                if json {
                    print_json(&copy)?;
                } else {
                    println!("Template '{}' created ({}).", copy.name, copy.id);
                }
            }
            TemplatesAction::Delete { id } => {
                if !store.delete_template(&id) {
                    anyhow::bail!("Template '{}' not found", id);
                }
                if !json {
                    println!("Template '{}' deleted.", id);
                }
            }
        },
    }

    Ok(())
}
