//! Command-line interface for cognitive-canvas.
//!
//! Provides commands for ingesting URLs, text and code, querying the
//! store, generating quizzes, and calling the tool entry points with a
//! JSON payload.

use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};

use crate::config;
use crate::core::ContentManager;
use crate::domain::{Difficulty, Quiz, QuizType};
use crate::library::{ContentId, ContentRecord};
use crate::tools::{
    self, GenerateQuizRequest, QueryContentRequest, QueryResult, StoreContentRequest,
};

/// canvas - Content ingestion, retrieval and quiz generation
#[derive(Parser, Debug)]
#[command(name = "canvas")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest content from a URL
    Ingest {
        /// URL to ingest
        url: String,

        /// Category to use instead of AI categorization
        #[arg(short, long)]
        category: Option<String>,

        /// Tags to apply (comma-separated)
        #[arg(short, long)]
        tags: Option<String>,
    },

    /// Ingest raw text or code
    IngestText {
        /// Input file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Title (defaults per content type)
        #[arg(long)]
        title: Option<String>,

        /// Treat the input as source code
        #[arg(long)]
        code: bool,

        /// Category to use instead of AI categorization
        #[arg(short, long)]
        category: Option<String>,

        /// Tags to apply (comma-separated)
        #[arg(short, long)]
        tags: Option<String>,
    },

    /// Ingest many URLs (arguments, or one per line from --file)
    Bulk {
        /// URLs to ingest
        urls: Vec<String>,

        /// File with one URL per line
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Category for every URL
        #[arg(short, long)]
        category: Option<String>,

        /// Tags for every URL (comma-separated)
        #[arg(short, long)]
        tags: Option<String>,
    },

    /// List stored content by category or date range
    Query {
        /// Exact category
        #[arg(short, long)]
        category: Option<String>,

        /// Start date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        start: Option<String>,

        /// End date, inclusive (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        end: Option<String>,

        /// Only content stored in the last N days
        #[arg(long, conflicts_with_all = ["start", "end"])]
        days: Option<i64>,

        /// Maximum number of results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Semantic search over stored content
    Search {
        /// Search query
        query: String,

        /// Number of results
        #[arg(short, long, default_value = "5")]
        k: usize,

        /// Restrict to a category
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Generate a quiz from a category or specific records
    Quiz {
        /// Category to draw summaries from
        #[arg(short, long, required_unless_present = "ids")]
        category: Option<String>,

        /// Content IDs to draw summaries from
        #[arg(long = "id", conflicts_with = "category")]
        ids: Vec<String>,

        /// Number of questions
        #[arg(short, long, default_value = "5")]
        num_questions: u32,

        /// easy, medium, hard or mixed
        #[arg(short, long, default_value = "mixed")]
        difficulty: String,

        /// mcq, fill_in_blank or true_false
        #[arg(short = 'y', long = "type", default_value = "mcq")]
        quiz_type: String,

        /// Print the quiz as JSON
        #[arg(long)]
        json: bool,
    },

    /// List every category in use
    Categories,

    /// List every tag in use
    Tags,

    /// Show store statistics
    Stats,

    /// Show resolved configuration (debug)
    Config,

    /// Call a tool entry point with a JSON payload
    Tool {
        /// Tool to call
        #[arg(value_enum)]
        tool: ToolName,

        /// JSON payload (reads from stdin if not provided)
        #[arg(long)]
        json: Option<String>,
    },
}

/// Tool entry points reachable from the CLI
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ToolName {
    /// store_content
    Store,
    /// query_content
    Query,
    /// generate_quiz
    Quiz,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Config => show_config(),
            command => {
                let manager = ContentManager::from_config(config::config()?)?;
                run_command(&manager, command).await
            }
        }
    }
}

async fn run_command(manager: &ContentManager, command: Commands) -> Result<()> {
    match command {
        Commands::Ingest {
            url,
            category,
            tags,
        } => {
            let tags = parse_tags(tags);
            let record = manager
                .store_from_url(&url, category.as_deref(), tags.as_deref())
                .await?;
            print_record(&record);
            Ok(())
        }
        Commands::IngestText {
            input,
            title,
            code,
            category,
            tags,
        } => {
            let body = read_input(input)?;
            let tags = parse_tags(tags);
            let record = if code {
                manager
                    .store_from_code(&body, title.as_deref(), category.as_deref(), tags.as_deref())
                    .await?
            } else {
                manager
                    .store_from_text(&body, title.as_deref(), category.as_deref(), tags.as_deref())
                    .await?
            };
            print_record(&record);
            Ok(())
        }
        Commands::Bulk {
            urls,
            file,
            category,
            tags,
        } => bulk_ingest(manager, urls, file, category, tags).await,
        Commands::Query {
            category,
            start,
            end,
            days,
            limit,
        } => {
            let (start, end) = match days {
                Some(days) => {
                    let now = Utc::now();
                    (
                        Some((now - Duration::days(days)).to_rfc3339()),
                        Some(now.to_rfc3339()),
                    )
                }
                None => (start, end),
            };
            let request = QueryContentRequest {
                query_text: None,
                start_date: start,
                end_date: end,
                category,
                k: limit,
            };
            let response = tools::query_content(manager, request).await?;
            print_results(&response.results);
            Ok(())
        }
        Commands::Search { query, k, category } => {
            let hits = manager
                .similarity_search(&query, k, category.as_deref())
                .await?;
            if hits.is_empty() {
                println!("No results found for: {}", query);
                return Ok(());
            }

            println!("Found {} result(s) for \"{}\":\n", hits.len(), query);
            println!("{:<8} {:<38} {:<16} {:<40}", "SCORE", "ID", "CATEGORY", "TITLE");
            println!("{}", "-".repeat(104));
            for hit in &hits {
                println!(
                    "{:<8.3} {:<38} {:<16} {:<40}",
                    hit.score,
                    hit.record.id.as_str(),
                    truncate(&hit.record.category, 15),
                    truncate(&hit.record.title, 40)
                );
            }
            Ok(())
        }
        Commands::Quiz {
            category,
            ids,
            num_questions,
            difficulty,
            quiz_type,
            json,
        } => {
            let difficulty: Difficulty = difficulty.parse()?;
            let quiz_type: QuizType = quiz_type.parse()?;

            let quiz = match category {
                Some(category) => {
                    manager
                        .generate_quiz_from_category(
                            &category,
                            num_questions,
                            difficulty,
                            quiz_type,
                        )
                        .await?
                }
                None => {
                    let ids: Vec<ContentId> = ids.into_iter().map(ContentId::from_raw).collect();
                    manager
                        .generate_quiz_from_content_ids(&ids, num_questions, difficulty, quiz_type)
                        .await?
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&quiz)?);
            } else {
                print_quiz(&quiz, quiz_type, difficulty);
            }
            Ok(())
        }
        Commands::Categories => {
            let categories = manager.list_categories().await?;
            if categories.is_empty() {
                println!("No categories yet");
            }
            for category in categories {
                println!("{}", category);
            }
            Ok(())
        }
        Commands::Tags => {
            let tags = manager.list_tags().await?;
            if tags.is_empty() {
                println!("No tags yet");
            }
            for tag in tags {
                println!("{}", tag);
            }
            Ok(())
        }
        Commands::Stats => {
            let stats = manager.get_statistics().await?;

            println!("Total content: {}", stats.total_content);
            println!();
            println!("By category:");
            for (category, count) in &stats.categories {
                println!("  {:<30} {}", category, count);
            }
            println!();
            println!("By content type:");
            for (content_type, count) in &stats.content_types {
                println!("  {:<30} {}", content_type, count);
            }
            if let Some((earliest, latest)) = stats.date_range {
                println!();
                println!("Stored between {} and {}", earliest, latest);
            }
            Ok(())
        }
        Commands::Tool { tool, json } => {
            let payload = match json {
                Some(payload) => payload,
                None => read_input(None)?,
            };
            let output = call_tool(manager, tool, &payload).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Commands::Config => show_config(),
    }
}

/// Route a JSON payload through one tool entry point
pub async fn call_tool(
    manager: &ContentManager,
    tool: ToolName,
    payload: &str,
) -> Result<serde_json::Value> {
    let output = match tool {
        ToolName::Store => {
            let request: StoreContentRequest =
                serde_json::from_str(payload).context("Invalid store_content payload")?;
            serde_json::to_value(tools::store_content(manager, request).await?)?
        }
        ToolName::Query => {
            let request: QueryContentRequest =
                serde_json::from_str(payload).context("Invalid query_content payload")?;
            serde_json::to_value(tools::query_content(manager, request).await?)?
        }
        ToolName::Quiz => {
            let request: GenerateQuizRequest =
                serde_json::from_str(payload).context("Invalid generate_quiz payload")?;
            serde_json::to_value(tools::generate_quiz(manager, request).await?)?
        }
    };
    Ok(output)
}

async fn bulk_ingest(
    manager: &ContentManager,
    mut urls: Vec<String>,
    file: Option<PathBuf>,
    category: Option<String>,
    tags: Option<String>,
) -> Result<()> {
    if let Some(path) = file {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read URL file: {}", path.display()))?;
        urls.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string),
        );
    }
    if urls.is_empty() {
        anyhow::bail!("No URLs provided. Pass them as arguments or use --file <path>");
    }

    let tags = parse_tags(tags);
    let result = manager
        .store_bulk_urls(&urls, category.as_deref(), tags.as_deref())
        .await;

    for ok in &result.success {
        println!("✓ {} -> {}", ok.url, ok.content_id);
    }
    for failed in &result.failed {
        println!("✗ {}: {}", failed.url, failed.error);
    }
    println!(
        "\n{} of {} succeeded, {} failed",
        result.success_count, result.total, result.failed_count
    );

    if result.failed_count > 0 && result.success_count == 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    let config_file = cfg
        .config_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none - using defaults)".to_string());
    let api_key = if cfg.provider.api_key.is_some() {
        "(set)"
    } else {
        "(not set)"
    };

    println!("Config file: {}", config_file);
    println!();
    println!("Paths:");
    println!("  Home:   {}", cfg.home.display());
    println!("  Store:  {}", cfg.store_path.display());
    println!();
    println!("Provider:");
    println!("  Base URL:         {}", cfg.provider.base_url);
    println!("  API key:          {}", api_key);
    println!("  Embedding model:  {}", cfg.provider.embed_model);
    println!("  Embed input cap:  {} chars", cfg.provider.max_embed_chars);
    println!("  Generation model: {}", cfg.provider.gen_model);
    println!("  Timeout:          {}s", cfg.provider.timeout_seconds);
    println!();
    println!("Ingestion:");
    println!("  Retry attempts:          {}", cfg.ingest.retry.max_attempts);
    println!(
        "  Provider retry attempts: {}",
        cfg.ingest.provider_retry.max_attempts
    );
    println!("  Bulk concurrency:        {}", cfg.ingest.bulk_concurrency);
    println!(
        "  Fetch timeout:           {}s",
        cfg.ingest.extract_timeout_seconds
    );

    Ok(())
}

fn read_input(input: Option<PathBuf>) -> Result<String> {
    match input {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read from stdin")?;
            Ok(buffer)
        }
    }
}

/// Split a comma-separated tag list
fn parse_tags(tags: Option<String>) -> Option<Vec<String>> {
    tags.map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

fn print_record(record: &ContentRecord) {
    println!("✓ Stored {}", record.id);
    println!("  Title:    {}", record.title);
    println!("  Type:     {}", record.content_type);
    println!("  Category: {}", record.category);
    if !record.tags.is_empty() {
        println!("  Tags:     {}", record.tags.join(", "));
    }
    if let Some(url) = &record.source_url {
        println!("  URL:      {}", url);
    }
    println!("  Summary:  {}", record.summary);
}

fn print_results(results: &[QueryResult]) {
    if results.is_empty() {
        println!("No content found");
        return;
    }

    println!("{:<38} {:<6} {:<16} {:<12} {:<40}", "ID", "TYPE", "CATEGORY", "STORED", "TITLE");
    println!("{}", "-".repeat(114));
    for r in results {
        println!(
            "{:<38} {:<6} {:<16} {:<12} {:<40}",
            r.content_id,
            r.content_type.to_string(),
            truncate(&r.category, 15),
            r.timestamp.format("%Y-%m-%d"),
            truncate(&r.title, 40)
        );
    }
}

fn print_quiz(quiz: &Quiz, quiz_type: QuizType, difficulty: Difficulty) {
    println!(
        "{} ({} quiz, {} questions, difficulty {})\n",
        quiz.title,
        quiz_type.describe(),
        quiz.questions.len(),
        difficulty
    );
    for q in &quiz.questions {
        println!("Q{}: {}", q.number, q.question);
        for (idx, choice) in q.choice.iter().enumerate() {
            println!("   {}. {}", idx + 1, choice);
        }
        println!("   Explanation: {}\n", q.explanation);
    }
}
