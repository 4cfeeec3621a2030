//! First-Party Sets CLI
//!
//! CLI tool for validating Overrides policies and inspecting resolved sets.

mod sources;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use fps_core::{compute_enterprise_customizations, PolicyCustomization, SetEntry, Site, SiteType};
use fps_parser::{deserialize_first_party_sets, parse_sets_from_bytes, parse_sets_from_enterprise_policy};
use fps_service::FirstPartySetsHandler;

#[derive(Parser)]
#[command(name = "fps-cli")]
#[command(about = "First-Party Sets policy validation and inspection tools")]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an Overrides policy document
    ValidatePolicy {
        /// Policy JSON file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the sets parsed from a public sets file
    Inspect {
        /// Newline-delimited sets file
        #[arg(short, long)]
        input: PathBuf,

        /// Public suffix list file
        #[arg(long)]
        psl: Option<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Look up the owner of a site
    Resolve {
        /// Newline-delimited sets file
        #[arg(short, long)]
        input: PathBuf,

        /// Comma-separated manual set, owner first
        #[arg(long)]
        manual_set: Option<String>,

        /// Overrides policy JSON file
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Public suffix list file
        #[arg(long)]
        psl: Option<PathBuf>,

        /// Origin to look up
        #[arg(long)]
        site: String,
    },

    /// List sites whose owner changed since a persisted snapshot
    Diff {
        /// Persisted sets from the previous run
        #[arg(long)]
        old: PathBuf,

        /// Newline-delimited sets file
        #[arg(short, long)]
        input: PathBuf,

        /// Overrides policy in effect for the previous run
        #[arg(long)]
        old_policy: Option<PathBuf>,

        /// Overrides policy in effect now
        #[arg(long)]
        policy: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Commands::ValidatePolicy { input } => cmd_validate_policy(&input),
        Commands::Inspect { input, psl, json } => cmd_inspect(&input, psl.as_deref(), json),
        Commands::Resolve {
            input,
            manual_set,
            policy,
            psl,
            site,
        } => cmd_resolve(&input, manual_set.as_deref(), policy.as_deref(), psl.as_deref(), &site),
        Commands::Diff {
            old,
            input,
            old_policy,
            policy,
        } => cmd_diff(&old, &input, old_policy.as_deref(), policy.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_validate_policy(input: &Path) -> Result<(), String> {
    let policy = sources::read_json(input)?;
    let parsed = parse_sets_from_enterprise_policy(&policy).map_err(|e| format!("Invalid policy: {}", e))?;

    println!("Policy '{}' is valid", input.display());
    println!("  Replacements: {}", parsed.replacements.len());
    println!("  Additions:    {}", parsed.additions.len());

    Ok(())
}

fn cmd_inspect(input: &Path, psl: Option<&Path>, json: bool) -> Result<(), String> {
    if let Some(psl) = psl {
        sources::load_psl(psl)?;
    }
    let bytes = sources::read_bytes(input)?;
    let sets = parse_sets_from_bytes(&bytes);
    let grouped = sets.owner_to_members();

    if json {
        let output = serde_json::json!({
            "sets": grouped,
            "aliases": sets.aliases,
        });
        let text = serde_json::to_string_pretty(&output).map_err(|e| format!("Failed to encode JSON: {}", e))?;
        println!("{text}");
        return Ok(());
    }

    println!("Sets file: {}", input.display());
    println!("  Sets:        {}", grouped.len());
    println!("  Sites:       {}", sets.sets.len());
    println!("  Aliases:     {}", sets.aliases.len());
    println!();

    for (owner, members) in &grouped {
        println!("{owner}");
        for member in members {
            match sets.aliases.get(member) {
                Some(canonical) => println!("  {member} (alias of {canonical})"),
                None => println!("  {member}"),
            }
        }
    }

    Ok(())
}

fn cmd_resolve(
    input: &Path,
    manual_set: Option<&str>,
    policy: Option<&Path>,
    psl: Option<&Path>,
    origin: &str,
) -> Result<(), String> {
    if let Some(psl) = psl {
        sources::load_psl(psl)?;
    }
    let site = Site::canonicalize(origin, true).map_err(|e| format!("Invalid site '{}': {}", origin, e))?;
    let policy = policy.map(sources::read_json).transpose()?;
    if let Some(policy) = &policy {
        if let Some(e) = FirstPartySetsHandler::validate_enterprise_policy(policy) {
            return Err(format!("Invalid policy: {}", e));
        }
    }

    let handler = sources::build_handler(manual_set, None);
    let runtime = sources::new_runtime()?;
    let customization = runtime.block_on(async {
        sources::load_sets(&handler, input).await?;
        Ok::<_, String>(match &policy {
            Some(policy) => handler.customization_for_policy(policy).await,
            None => PolicyCustomization::new(),
        })
    })?;

    match handler.find_owner(&site, &customization) {
        Some(entry) => println!("{site} -> {}", describe(&entry)),
        None => println!("{site} is not in a First-Party Set"),
    }

    Ok(())
}

fn describe(entry: &SetEntry) -> String {
    match (entry.site_type(), entry.index()) {
        (SiteType::Primary, _) => format!("{} (primary)", entry.owner()),
        (SiteType::Associated, Some(index)) => format!("{} (associated #{})", entry.owner(), index.0),
        (SiteType::Associated, None) => format!("{} (associated)", entry.owner()),
    }
}

fn cmd_diff(old: &Path, input: &Path, old_policy: Option<&Path>, policy: Option<&Path>) -> Result<(), String> {
    let old_policy = old_policy.map(sources::read_json).transpose()?;
    let policy = policy.map(sources::read_json).transpose()?;

    // The previous customization is rebuilt against the previous sets.
    let old_customization = match &old_policy {
        Some(old_policy) => {
            let parsed =
                parse_sets_from_enterprise_policy(old_policy).map_err(|e| format!("Invalid old policy: {}", e))?;
            let old_bytes = sources::read_bytes(old)?;
            let old_sets = deserialize_first_party_sets(&String::from_utf8_lossy(&old_bytes));
            compute_enterprise_customizations(&old_sets, &parsed)
        }
        None => PolicyCustomization::new(),
    };

    let handler = sources::build_handler(None, Some(old));
    let runtime = sources::new_runtime()?;
    let changed = runtime.block_on(async {
        sources::load_sets(&handler, input).await?;
        let customization = match &policy {
            Some(policy) => handler.customization_for_policy(policy).await,
            None => PolicyCustomization::new(),
        };
        Ok::<_, String>(
            handler
                .clear_site_data_on_changed_sets("fps-cli", &old_customization, &customization)
                .await,
        )
    })?;

    if changed.is_empty() {
        println!("No sites changed owner");
        return Ok(());
    }
    println!("{} sites changed owner:", changed.len());
    for site in &changed {
        println!("  {site}");
    }

    Ok(())
}
