//! Command-line automation client for the Pressroom content management API.

mod client;

use std::process;

use clap::{Args, Parser, Subcommand};
use pressroom_api_types::{PageWriteRequest, PublishRequest, ResourceDocument};
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use client::{Client, ClientError};

#[derive(Debug, Parser)]
#[command(name = "pressroom-cli", version, about = "Pressroom API client")]
struct Cli {
    /// Server base url.
    #[arg(
        long,
        env = "PRESSROOM_SERVER",
        default_value = "http://127.0.0.1:3000/"
    )]
    server: String,

    /// Bearer token for authenticated calls.
    #[arg(long, env = "PRESSROOM_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Page operations.
    #[command(subcommand)]
    Page(PageCommand),
    /// Query the site index.
    Search(SearchArgs),
}

#[derive(Debug, Subcommand)]
enum PageCommand {
    /// Fetch a page document.
    Get {
        id: Uuid,
        /// `work` or `live`; defaults to whatever exists, draft first.
        #[arg(long)]
        version: Option<String>,
    },
    /// Create a draft page.
    Create(PageWriteArgs),
    /// Replace a draft page (fetches the current entity tag first).
    Update {
        id: Uuid,
        #[command(flatten)]
        write: PageWriteArgs,
    },
    /// Delete every version of a page.
    Delete { id: Uuid },
    /// Acquire the editing lock.
    Lock { id: Uuid },
    /// Release the editing lock.
    Unlock { id: Uuid },
    /// Promote the draft to LIVE.
    Publish {
        id: Uuid,
        /// Publication window start (RFC 3339); defaults to now.
        #[arg(long)]
        from: Option<String>,
        /// Publication window end (RFC 3339); defaults to open-ended.
        #[arg(long)]
        to: Option<String>,
    },
    /// Take the LIVE version down.
    Unpublish { id: Uuid },
}

#[derive(Debug, Args)]
struct PageWriteArgs {
    /// Mount path of the page, e.g. `/news/launch`.
    #[arg(long)]
    path: String,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    template: Option<String>,

    /// Repeatable subject tag.
    #[arg(long = "subject")]
    subjects: Vec<String>,
}

impl From<PageWriteArgs> for PageWriteRequest {
    fn from(args: PageWriteArgs) -> Self {
        PageWriteRequest {
            path: args.path,
            title: args.title,
            resource_type: None,
            template: args.template,
            subjects: args.subjects,
            composers: Vec::new(),
        }
    }
}

#[derive(Debug, Args)]
struct SearchArgs {
    /// Free-text query.
    #[arg(long)]
    q: Option<String>,

    #[arg(long)]
    path: Option<String>,

    #[arg(long)]
    prefix: Option<String>,

    /// `work` or `live`.
    #[arg(long)]
    version: Option<String>,

    #[arg(long)]
    limit: Option<i64>,

    #[arg(long)]
    offset: Option<i64>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), ClientError> {
    let client = Client::new(&cli.server, cli.token)?;
    match cli.command {
        CliCommand::Page(command) => run_page(&client, command).await,
        CliCommand::Search(args) => run_search(&client, args).await,
    }
}

async fn run_page(client: &Client, command: PageCommand) -> Result<(), ClientError> {
    match command {
        PageCommand::Get { id, version } => {
            let document = client.get_page(id, version.as_deref()).await?;
            print_document(&document);
        }
        PageCommand::Create(write) => {
            let document = client.create_page(&write.into()).await?;
            println!("created {} at {}", document.id, document.path);
        }
        PageCommand::Update { id, write } => {
            let document = client.update_page(id, &write.into()).await?;
            println!("updated {} ({})", document.id, document.etag);
        }
        PageCommand::Delete { id } => {
            client.delete_page(id).await?;
            println!("deleted {id}");
        }
        PageCommand::Lock { id } => {
            let document = client.lock_page(id).await?;
            match document.locked_by {
                Some(owner) => println!("locked {} for {}", document.id, owner.id),
                None => println!("locked {}", document.id),
            }
        }
        PageCommand::Unlock { id } => {
            client.unlock_page(id).await?;
            println!("unlocked {id}");
        }
        PageCommand::Publish { id, from, to } => {
            let window = PublishRequest {
                from: parse_date(from.as_deref())?,
                to: parse_date(to.as_deref())?,
            };
            let document = client.publish_page(id, &window).await?;
            println!("published {} at {}", document.id, document.path);
        }
        PageCommand::Unpublish { id } => {
            let document = client.unpublish_page(id).await?;
            println!("unpublished {}; draft restored at {}", document.id, document.path);
        }
    }
    Ok(())
}

async fn run_search(client: &Client, args: SearchArgs) -> Result<(), ClientError> {
    let mut params: Vec<(&str, String)> = Vec::new();
    if let Some(q) = args.q {
        params.push(("q", q));
    }
    if let Some(path) = args.path {
        params.push(("path", path));
    }
    if let Some(prefix) = args.prefix {
        params.push(("prefix", prefix));
    }
    if let Some(version) = args.version {
        params.push(("version", version));
    }
    if let Some(limit) = args.limit {
        params.push(("limit", limit.to_string()));
    }
    if let Some(offset) = args.offset {
        params.push(("offset", offset.to_string()));
    }

    let result = client.search(&params).await?;
    println!("{} hit(s)", result.hit_count);
    for hit in result.hits {
        println!("  {}  {:?}  {}", hit.id, hit.version, hit.path);
    }
    Ok(())
}

fn print_document(document: &ResourceDocument) {
    println!("id:       {}", document.id);
    println!("path:     {}", document.path);
    println!("version:  {:?}", document.version);
    println!("etag:     {}", document.etag);
    if let Some(title) = &document.title {
        println!("title:    {title}");
    }
    if let Some(published) = &document.published {
        println!("publisher: {}", published.user.id);
    }
    if let Some(owner) = &document.locked_by {
        println!("locked by: {}", owner.id);
    }
}

fn parse_date(value: Option<&str>) -> Result<Option<time::OffsetDateTime>, ClientError> {
    match value {
        None => Ok(None),
        Some(raw) => time::OffsetDateTime::parse(raw, &Rfc3339)
            .map(Some)
            .map_err(|_| ClientError::InvalidDate(raw.to_string())),
    }
}
