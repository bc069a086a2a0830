//! Command dispatch.
//!
//! Each subcommand is a thin caller of one engine operation: it merges the
//! configuration with its flags, runs the operation, prints a result and
//! maps the outcome to an [`ExitCode`].

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytesize::ByteSize;

use crate::actions::{DeleteConfig, DeleteMethod, DeletionExecutor, DeletionReport};
use crate::cli::{
    Cli, Commands, ConfigArgs, DeleteArgs, ListArgs, ListFormat, RescanArgs, ResolveArgs, ScanArgs,
    StatsArgs,
};
use crate::config::{default_config_path, Config};
use crate::duplicates::{
    existing_dir, GroupResolver, PreferenceOrder, ResolveOptions, ResolvedGroup,
};
use crate::error::{ArgumentError, ExitCode};
use crate::index::FileIndex;
use crate::logging::init_logging;
use crate::maintenance::{prune_missing, rescan, RescanTarget};
use crate::output::{CsvOutput, DeletionLog, JsonOutput, LogMode, TextOutput};
use crate::progress::{Progress, ProgressCallback};
use crate::scanner::pipeline::default_workers;
use crate::scanner::{ScanConfig, ScanOutcome, ScanPipeline, WalkerConfig};
use crate::signal::{install_handler, ShutdownHandler};

/// State shared by every command.
struct AppContext {
    config: Config,
    config_file: Option<PathBuf>,
    shutdown: ShutdownHandler,
    progress: Arc<dyn ProgressCallback>,
    quiet: bool,
}

impl AppContext {
    fn open_index(&self) -> Result<FileIndex> {
        let path = self.config.database_path()?;
        log::debug!("Opening index {}", path.display());
        FileIndex::open(&path).with_context(|| format!("cannot open index {}", path.display()))
    }

    fn scan_config(&self, workers: Option<usize>) -> Result<ScanConfig> {
        let workers = workers.or(self.config.workers).unwrap_or_else(default_workers);
        if workers == 0 {
            return Err(ArgumentError::ZeroWorkers.into());
        }
        Ok(ScanConfig::default()
            .with_workers(workers)
            .with_shutdown_flag(self.shutdown.flag())
            .with_progress_callback(Arc::clone(&self.progress)))
    }

    fn say(&self, line: impl std::fmt::Display) {
        if !self.quiet {
            println!("{line}");
        }
    }
}

/// Run the parsed command line.
///
/// # Errors
///
/// Returns an error for invalid arguments, an unusable index, or any failure
/// that stops a command before it finishes; per-file failures are reported
/// through the exit code instead.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = cli.database {
        config.database = Some(db);
    }
    let config_file = cli.config.or_else(default_config_path);

    let ctx = AppContext {
        config,
        config_file,
        shutdown: install_handler()?,
        progress: Arc::new(Progress::new(cli.quiet)),
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Scan(args) => run_scan(&ctx, args),
        Commands::List(args) => run_list(&ctx, &args),
        Commands::Delete(args) => run_delete(&ctx, &args),
        Commands::Prune => run_prune(&ctx),
        Commands::Rescan(args) => run_rescan(&ctx, args),
        Commands::Stats(args) => run_stats(&ctx, &args),
        Commands::Config(args) => run_config(&ctx, &args),
    }
}

fn run_scan(ctx: &AppContext, args: ScanArgs) -> Result<ExitCode> {
    if let (Some(min), Some(max)) = (args.min_size, args.max_size) {
        if min > max {
            return Err(ArgumentError::SizeRange { min, max }.into());
        }
    }

    let mut ignore_patterns = ctx.config.ignore_patterns.clone();
    ignore_patterns.extend(args.ignore_patterns);
    let walker = WalkerConfig::new(
        args.follow_symlinks || ctx.config.follow_symlinks,
        args.skip_hidden || ctx.config.skip_hidden,
        args.min_size,
        args.max_size,
        ignore_patterns,
    );
    let config = ctx
        .scan_config(args.workers)?
        .with_skip_existing(args.skip_existing)
        .with_walker_config(walker);

    let index = Arc::new(ctx.open_index()?);
    if args.clear {
        let removed = index.clear()?;
        log::info!("Cleared {} index entries", removed);
    }

    let outcome = ScanPipeline::new(index, config)
        .scan(&args.path)
        .with_context(|| format!("cannot scan {}", args.path.display()))?;
    ctx.say(format_scan_outcome(&outcome));
    Ok(scan_exit_code(&outcome))
}

fn run_list(ctx: &AppContext, args: &ListArgs) -> Result<ExitCode> {
    let index = ctx.open_index()?;
    let groups = resolve_groups(ctx, &index, &args.resolve)?;
    let code = if groups.is_empty() {
        ExitCode::NoDuplicates
    } else {
        ExitCode::Success
    };

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            write_listing(&groups, args.format, code, BufWriter::new(file))?;
            log::info!("Wrote {} group(s) to {}", groups.len(), path.display());
        }
        None => write_listing(&groups, args.format, code, io::stdout().lock())?,
    }
    Ok(code)
}

fn write_listing<W: Write>(
    groups: &[ResolvedGroup],
    format: ListFormat,
    code: ExitCode,
    mut writer: W,
) -> Result<()> {
    match format {
        ListFormat::Text => TextOutput::new(groups).write_to(&mut writer)?,
        ListFormat::Csv => CsvOutput::new(groups).write_to(&mut writer)?,
        ListFormat::Json => JsonOutput::new(groups, code).write_to(&mut writer)?,
    }
    writer.flush()?;
    Ok(())
}

fn run_delete(ctx: &AppContext, args: &DeleteArgs) -> Result<ExitCode> {
    let index = ctx.open_index()?;
    let groups = resolve_groups(ctx, &index, &args.resolve)?;
    if groups.is_empty() {
        ctx.say("No duplicates to delete.");
        return Ok(ExitCode::NoDuplicates);
    }

    let method = if args.trash {
        DeleteMethod::Trash
    } else {
        DeleteMethod::Permanent
    };
    let executor = DeletionExecutor::new(
        &index,
        DeleteConfig::default()
            .with_method(method)
            .with_verify(!args.no_verify),
    )
    .with_shutdown_flag(ctx.shutdown.flag())
    .with_progress_callback(Arc::clone(&ctx.progress));

    let report = match &args.log {
        Some(path) => {
            let mode = if args.overwrite {
                LogMode::Overwrite
            } else {
                LogMode::Append
            };
            let mut log = DeletionLog::open(path, mode)
                .with_context(|| format!("cannot open deletion log {}", path.display()))?;
            executor.execute_with_sink(&groups, args.simulate, &mut log)
        }
        None => executor.execute(&groups, args.simulate),
    };

    ctx.say(report.summary());
    if let Some(e) = &report.log_error {
        anyhow::bail!("deletion stopped, log could not be written: {e}");
    }
    Ok(delete_exit_code(&report))
}

fn run_prune(ctx: &AppContext) -> Result<ExitCode> {
    let index = ctx.open_index()?;
    let flag = ctx.shutdown.flag();
    let outcome = prune_missing(&index, Some(flag.as_ref()))?;
    ctx.say(format!(
        "Pruned {} of {} entries",
        outcome.removed, outcome.examined
    ));
    Ok(if outcome.interrupted {
        ExitCode::Interrupted
    } else {
        ExitCode::Success
    })
}

fn run_rescan(ctx: &AppContext, args: RescanArgs) -> Result<ExitCode> {
    let target = if args.duplicates {
        RescanTarget::Duplicates
    } else if args.paths.is_empty() {
        RescanTarget::AllFingerprinted
    } else {
        RescanTarget::Paths(args.paths)
    };
    let config = ctx.scan_config(args.workers)?;
    let index = Arc::new(ctx.open_index()?);

    let outcome = rescan(&index, &target, config)?;
    ctx.say(format_scan_outcome(&outcome));
    Ok(scan_exit_code(&outcome))
}

fn run_stats(ctx: &AppContext, args: &StatsArgs) -> Result<ExitCode> {
    let index = ctx.open_index()?;
    let stats = index.stats()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        if let Some(location) = index.location() {
            println!("Index:            {}", location.display());
        }
        println!("Entries:          {}", stats.entries);
        println!("Fingerprinted:    {}", stats.fingerprinted);
        println!("Duplicate groups: {}", stats.duplicate_groups);
        println!("Duplicate files:  {}", stats.duplicate_files);
        println!("Total size:       {}", ByteSize::b(stats.total_bytes));
        println!("Reclaimable:      {}", ByteSize::b(stats.reclaimable_bytes));
    }
    Ok(ExitCode::Success)
}

fn run_config(ctx: &AppContext, args: &ConfigArgs) -> Result<ExitCode> {
    if !args.init {
        print!("{}", toml::to_string_pretty(&ctx.config)?);
        return Ok(ExitCode::Success);
    }

    let path = ctx
        .config_file
        .as_deref()
        .context("no config directory available; pass --config to choose a file")?;
    if path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists; use --force to replace it",
            path.display()
        );
    }
    ctx.config.save(path)?;
    log::info!("Wrote configuration to {}", path.display());
    ctx.say(format!("Wrote {}", path.display()));
    Ok(ExitCode::Success)
}

/// Resolve groups using the flag preferences, or the configured ones when
/// no `--prefer` was given.
fn resolve_groups(
    ctx: &AppContext,
    index: &FileIndex,
    args: &ResolveArgs,
) -> Result<Vec<ResolvedGroup>> {
    let dirs: &[PathBuf] = if args.prefer.is_empty() {
        &ctx.config.preferred
    } else {
        &args.prefer
    };
    let prefs = PreferenceOrder::from_user_dirs(dirs)?;
    let within = args.within.as_deref().map(existing_dir).transpose()?;
    let options = ResolveOptions::default().with_protect_preferred(args.protect_preferred);

    let groups = GroupResolver::new(index)
        .with_options(options)
        .resolve_all(&prefs, within.as_deref())?;
    Ok(groups)
}

fn format_scan_outcome(outcome: &ScanOutcome) -> String {
    let mut line = format!(
        "{} files: {} fingerprinted ({}), {} unchanged, {} failed",
        outcome.walked,
        outcome.scanned,
        ByteSize::b(outcome.bytes_hashed),
        outcome.skipped,
        outcome.failed,
    );
    if outcome.interrupted {
        line.push_str(" (interrupted)");
    }
    line
}

fn scan_exit_code(outcome: &ScanOutcome) -> ExitCode {
    if outcome.interrupted {
        ExitCode::Interrupted
    } else if outcome.is_clean() {
        ExitCode::Success
    } else {
        ExitCode::PartialSuccess
    }
}

fn delete_exit_code(report: &DeletionReport) -> ExitCode {
    if report.interrupted {
        ExitCode::Interrupted
    } else if report.failed_count() > 0 {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    }
}
