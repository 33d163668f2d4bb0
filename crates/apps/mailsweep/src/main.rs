//! mailsweep - Pull a Gmail mailbox into a local database and clean it up by sender
//!
//! This is the command line entry point. All mailbox logic lives in the `mail` crate.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use mail::{
    EmailNotFoundError, EmailStore, GmailAuth, GmailClient, GmailCredentials, MessageId,
    MessageSource, Selection, SortOrder, SqliteEmailStore, SyncOptions, SyncSettings,
    list_sender_groups, sync_emails_with_progress,
};

#[derive(Parser, Debug)]
#[command(
    name = "mailsweep",
    about = "Sync a Gmail mailbox locally and sweep it by sender",
    arg_required_else_help = true
)]
struct Cli {
    #[arg(long, global = true, help = "Database file (overrides settings)")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch messages from Gmail and store them locally
    Sync {
        /// Maximum number of messages to fetch (0 fetches everything)
        #[arg(long)]
        limit: Option<usize>,
        /// Messages resolved at once
        #[arg(long)]
        concurrency: Option<usize>,
        /// Attempts per message before skipping it
        #[arg(long)]
        retries: Option<u32>,
    },
    /// List stored messages
    List {
        /// Only show messages whose sender contains this text
        #[arg(long)]
        sender: Option<String>,
        /// date_newest, date_oldest, sender_asc or sender_desc
        #[arg(long, default_value = "date_newest")]
        sort: String,
        /// Group consecutive messages by sender
        #[arg(long)]
        grouped: bool,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List distinct senders
    Senders,
    /// Show one stored message
    Show { id: String },
    /// Delete stored messages by ID
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Delete every stored message whose sender contains this text
    DeleteSender {
        sender: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Forget the stored Gmail token
    Logout,
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = SyncSettings::load()?;
    let db_path = match cli.db {
        Some(path) => path,
        None => settings.database_path()?,
    };
    let store = || open_store(&db_path);

    match cli.command {
        Commands::Sync {
            limit,
            concurrency,
            retries,
        } => {
            let options = SyncOptions {
                limit: limit.unwrap_or(settings.max_results),
                fetch_concurrency: concurrency.unwrap_or(settings.fetch_concurrency),
            };
            let client = gmail_client(retries.unwrap_or(settings.max_retries))?;
            sync(&client, &store()?, &options)
        }
        Commands::List {
            sender,
            sort,
            grouped,
            json,
        } => list(&store()?, sender.as_deref(), sort_order(&sort), grouped, json),
        Commands::Senders => {
            for sender in store()?.get_all_senders()? {
                println!("{}", sender);
            }
            Ok(())
        }
        Commands::Show { id } => show(&store()?, &MessageId::new(id)),
        Commands::Delete { ids, yes } => delete(&store()?, ids, yes),
        Commands::DeleteSender { sender, yes } => delete_sender(&store()?, &sender, yes),
        Commands::Logout => logout(&GmailAuth::default_token_path()?),
    }
}

fn open_store(path: &Path) -> Result<SqliteEmailStore> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    SqliteEmailStore::new(path)
}

fn gmail_client(max_retries: u32) -> Result<GmailClient> {
    let creds = GmailCredentials::load().context(
        "No Gmail credentials found. Place credentials.json in the config directory \
         or set GMAIL_CLIENT_ID and GMAIL_CLIENT_SECRET",
    )?;
    let auth = GmailAuth::new(creds.client_id, creds.client_secret)?;
    Ok(GmailClient::new(auth).with_max_retries(max_retries))
}

/// Parse `--sort`, warning when the value falls back to insertion order
fn sort_order(value: &str) -> SortOrder {
    let sort = SortOrder::parse(value);
    if !SortOrder::NAMED.contains(&sort) {
        warn!(
            "Unknown sort '{}', expected one of: {}; showing most recently added first",
            value,
            SortOrder::NAMED.map(|s| s.as_str()).join(", ")
        );
    }
    sort
}

fn sync(source: &dyn MessageSource, store: &dyn EmailStore, options: &SyncOptions) -> Result<()> {
    let stats = sync_emails_with_progress(source, store, options, |progress| {
        match progress.total_estimate {
            Some(total) => eprint!("\rFetched {} of ~{} messages", progress.fetched, total),
            None => eprint!("\rFetched {} messages", progress.fetched),
        }
        let _ = io::stderr().flush();
    })?;
    eprintln!();

    println!(
        "Synced {} messages ({} new, {} updated, {} skipped) in {} ms",
        stats.messages_fetched,
        stats.messages_inserted,
        stats.messages_updated,
        stats.messages_skipped,
        stats.duration_ms
    );
    Ok(())
}

fn list(
    store: &dyn EmailStore,
    sender: Option<&str>,
    sort: SortOrder,
    grouped: bool,
    json: bool,
) -> Result<()> {
    if grouped {
        let groups = list_sender_groups(store, sender, sort)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&groups)?);
            return Ok(());
        }
        for group in &groups {
            println!("{} ({})", group.title(), group.len());
            for email in &group.emails {
                println!("  {}  {}  {}", email.id, email.date, email.subject);
            }
        }
        return Ok(());
    }

    let emails = match sender {
        Some(sender) => store.get_emails_by_from(sender, sort)?,
        None => store.get_all_emails(sort)?,
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&emails)?);
        return Ok(());
    }
    if emails.is_empty() {
        println!("No messages found.");
        return Ok(());
    }
    for email in &emails {
        println!("{}  {}  {}  {}", email.id, email.date, email.from, email.subject);
    }
    Ok(())
}

fn show(store: &dyn EmailStore, id: &MessageId) -> Result<()> {
    let stored = store
        .get_email(id)?
        .ok_or_else(|| EmailNotFoundError(id.clone()))?;
    let email = &stored.email;
    println!("ID:      {}", email.id);
    println!("From:    {}", email.from);
    println!("Subject: {}", email.subject);
    println!("Date:    {}", email.date);
    println!("Stored:  {}", stored.created_at.to_rfc3339());
    println!();
    println!("{}", email.body);
    Ok(())
}

fn delete(store: &dyn EmailStore, ids: Vec<String>, yes: bool) -> Result<()> {
    let selection: Selection = ids.into_iter().map(MessageId::from).collect();
    if !yes && !confirm(&format!("Delete {} message(s)?", selection.len()))? {
        println!("Aborted.");
        return Ok(());
    }

    let report = store.delete_emails(&selection.ids())?;
    for id in &report.not_found {
        warn!("Email not found: {}", id);
    }
    for (id, reason) in &report.failed {
        warn!("Failed to delete {}: {}", id, reason);
    }
    println!("Deleted {} message(s)", report.deleted);

    if !report.failed.is_empty() {
        bail!("{} deletion(s) failed", report.failed.len());
    }
    Ok(())
}

fn delete_sender(store: &dyn EmailStore, sender: &str, yes: bool) -> Result<()> {
    // An empty needle would match every record
    if sender.trim().is_empty() {
        bail!("Sender must not be empty");
    }

    let matching = store.get_emails_by_from(sender, SortOrder::default())?.len();
    if matching == 0 {
        println!("No messages from senders matching '{}'", sender);
        return Ok(());
    }
    let prompt = format!(
        "Delete {} message(s) from senders matching '{}'?",
        matching, sender
    );
    if !yes && !confirm(&prompt)? {
        println!("Aborted.");
        return Ok(());
    }

    let deleted = store.delete_emails_by_sender(sender)?;
    info!("Deleted {} messages matching sender '{}'", deleted, sender);
    println!("Deleted {} message(s)", deleted);
    Ok(())
}

fn logout(token_path: &Path) -> Result<()> {
    if GmailAuth::clear_stored_token(token_path)? {
        println!("Logged out.");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_list_defaults() {
        let cli = Cli::try_parse_from(["mailsweep", "list"]).unwrap();
        match cli.command {
            Commands::List { sender, sort, grouped, json } => {
                assert!(sender.is_none());
                assert_eq!(SortOrder::parse(&sort), SortOrder::DateNewest);
                assert!(!grouped);
                assert!(!json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_delete_requires_ids() {
        assert!(Cli::try_parse_from(["mailsweep", "delete"]).is_err());
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("nope"));
    }

    #[test]
    fn test_delete_sender_rejects_empty() {
        let store = mail::InMemoryEmailStore::new();
        assert!(delete_sender(&store, "  ", true).is_err());
    }

    #[test]
    fn test_delete_with_yes() {
        let store = mail::InMemoryEmailStore::new();
        store
            .save_emails(&[mail::Email::builder("a").from("x@y").build()])
            .unwrap();
        delete(&store, vec!["a".into(), "missing".into()], true).unwrap();
        assert_eq!(store.count_emails().unwrap(), 0);
    }

    #[test]
    fn test_sort_order_fallback() {
        assert_eq!(sort_order("sender_desc"), SortOrder::SenderDesc);
        assert_eq!(sort_order("subject"), SortOrder::Inserted);
    }

    #[test]
    fn test_parse_sync_flags() {
        let args = ["mailsweep", "sync", "--limit", "3", "--retries", "5"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Sync {
                limit,
                concurrency,
                retries,
            } => {
                assert_eq!(limit, Some(3));
                assert_eq!(concurrency, None);
                assert_eq!(retries, Some(5));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_logout_without_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        std::fs::write(&token_path, "{}").unwrap();

        logout(&token_path).unwrap();
        assert!(!token_path.exists());
        logout(&token_path).unwrap();
    }
}
