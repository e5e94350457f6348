// Declare modules
pub mod cli;
pub mod config;
pub mod context;
pub mod dsl;
pub mod error;
pub mod formatter;
pub mod ignore_map;
pub mod init;
pub mod models;
pub mod pattern;
pub mod resolver;
pub mod safeguard;
pub mod scanner;
pub mod select;
pub mod snippet;
pub mod walker;
pub mod writer;

use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use self::cli::{AnyArgs, Cli, Command, DirArgs, InitArgs, SelectArgs, SnippetArgs, TreeArgs};
use self::config::{load_settings, resolve_config};
use self::formatter::OutputGenerator;
use self::ignore_map::{IgnoreMap, IGNORE_FILE_NAME};
use self::init::InitOptions;
use self::models::RuntimeConfig;
use self::resolver::{ResolveOptions, SelectionResolver};
use self::safeguard::Safeguard;
use self::scanner::{FileScanner, ScanOptions};
use self::select::Selection;
use self::writer::{Concatenator, WriteSummary};

/// Initializes components and orchestrates data flow.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let current_dir = env::current_dir().context("Failed to get current directory")?;

    match cli.command {
        Command::Dir(args) => run_dir(&args, &current_dir),
        Command::Any(args) => run_any(&args, &current_dir),
        Command::Select(args) => run_select(&args, &current_dir),
        Command::Snippets(args) => run_snippets(&args, &current_dir),
        Command::Tree(args) => run_tree(&args, &current_dir),
        Command::Init(args) => run_init(&args, &current_dir),
    }
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Info);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Debug);
        }
    }
    builder
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .init();
}

fn absolute(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn canonical_dir(base: &Path, path: &Path) -> Result<PathBuf> {
    let path = absolute(base, path);
    fs::canonicalize(&path).context(format!("Failed to resolve {:?}", path))
}

/// The directory holding a control file, canonicalized.
fn control_dir(config_path: &Path) -> Result<PathBuf> {
    let parent = config_path.parent().unwrap_or_else(|| Path::new("."));
    fs::canonicalize(parent).context(format!("Failed to resolve {:?}", parent))
}

fn resolve_options(config: &RuntimeConfig) -> ResolveOptions {
    ResolveOptions {
        walk: config.walk.clone(),
        ignore_static_defaults: config.ignore_static_defaults,
        secrets: config.secrets,
        safeguard: Safeguard::new(config.denylist.clone()),
    }
}

/// `--ignore-file` when given, otherwise `<root>/.conignore` if present.
fn load_ignore_map(config: &RuntimeConfig, root: &Path) -> Result<Option<IgnoreMap>> {
    let path = match &config.ignore_file {
        Some(path) => path.clone(),
        None => {
            let default = root.join(IGNORE_FILE_NAME);
            if !default.is_file() {
                return Ok(None);
            }
            default
        }
    };
    let map = IgnoreMap::load(&path)?;
    log::info!(
        "loaded {} ({} file, {} directory, {} obscure rules)",
        path.display(),
        map.ignore_files.len(),
        map.ignore_directories.len(),
        map.obscure.len()
    );
    Ok(Some(map))
}

fn without_output(files: Vec<PathBuf>, output: &Path) -> Vec<PathBuf> {
    let output = fs::canonicalize(output).unwrap_or_else(|_| output.to_path_buf());
    files.into_iter().filter(|f| *f != output).collect()
}

fn report(summary: WriteSummary, output: &Path) {
    println!(
        "{} files, {} lines written to {}",
        summary.files,
        summary.lines,
        output.display()
    );
}

fn write_bundle(
    config: &RuntimeConfig,
    files: &[PathBuf],
    output: &Path,
    label_base: &Path,
    ignore_map: Option<&IgnoreMap>,
    preamble: Option<&str>,
) -> Result<()> {
    let summary = Concatenator::new(&config.output, label_base)
        .with_obscure(ignore_map.map(|m| &m.obscure))
        .write(files, output, preamble)?;
    report(summary, output);
    Ok(())
}

fn scan_with_filters(config: &RuntimeConfig, root: &Path, ignore_map: Option<&IgnoreMap>) -> Result<Vec<PathBuf>> {
    let include = if config.include.is_empty() {
        log::info!("no include patterns given, matching every file");
        vec!["*".to_string()]
    } else {
        config.include.clone()
    };
    let options = ScanOptions {
        walk: config.walk.clone(),
        exclude_files: config.exclude.clone(),
        exclude_dirs: config.exclude_dirs.clone(),
        ignore_static_defaults: config.ignore_static_defaults,
        ..Default::default()
    }
    .with_include(include);
    Ok(FileScanner::new(root, options, ignore_map)?.scan()?)
}

fn run_dir(args: &DirArgs, current_dir: &Path) -> Result<()> {
    let settings = load_settings()?;
    let root = canonical_dir(current_dir, &args.root)?;
    let project_name = root.file_name().and_then(|n| n.to_str());
    let config = resolve_config(&settings, &args.common, Some(&args.filters), project_name);
    let ignore_map = load_ignore_map(&config, &root)?;

    let output = absolute(current_dir, &args.output);
    let files = scan_with_filters(&config, &root, ignore_map.as_ref())?;
    let files = Safeguard::new(config.denylist.clone()).screen(without_output(files, &output), config.secrets)?;

    if files.is_empty() {
        log::warn!("No content found for the specified criteria.");
        return Ok(());
    }
    write_bundle(&config, &files, &output, current_dir, ignore_map.as_ref(), None)
}

fn run_any(args: &AnyArgs, current_dir: &Path) -> Result<()> {
    let settings = load_settings()?;
    let config = resolve_config(&settings, &args.common, None, None);

    let config_path = absolute(current_dir, &args.config);
    let blocks = dsl::parse_file(&config_path).context(format!("Failed to parse {:?}", config_path))?;
    let base_dir = control_dir(&config_path)?;
    let ignore_map = load_ignore_map(&config, &base_dir)?;
    let resolver = SelectionResolver::new(&base_dir, resolve_options(&config)).with_ignore_map(ignore_map.as_ref());

    for name in &args.block {
        if !blocks.iter().any(|b| &b.output == name) {
            log::warn!("no render({}) block in {}", name, config_path.display());
        }
    }

    for block in blocks
        .iter()
        .filter(|b| args.block.is_empty() || args.block.contains(&b.output))
    {
        let files = resolver
            .resolve(block)
            .context(format!("Failed to resolve render({})", block.output))?;
        let output = resolver.output_path(block);
        log::info!("render({}): {} files", block.output, files.len());

        if args.dry_run {
            println!("render({}) -> {}", block.output, output.display());
            for file in &files {
                println!("  {}", file.display());
            }
            continue;
        }
        if files.is_empty() {
            log::warn!("render({}) selected no files", block.output);
        }

        let preamble = block
            .context
            .as_ref()
            .filter(|c| !c.is_empty())
            .map(|c| c.header(&output));
        write_bundle(
            &config,
            &files,
            &output,
            current_dir,
            ignore_map.as_ref(),
            preamble.as_deref(),
        )
        .context(format!("Failed to write render({})", block.output))?;
    }
    Ok(())
}

fn run_select(args: &SelectArgs, current_dir: &Path) -> Result<()> {
    let settings = load_settings()?;
    let config = resolve_config(&settings, &args.common, None, None);

    let config_path = absolute(current_dir, &args.config);
    let selection = Selection::load(&config_path)?;
    if selection.is_empty() {
        log::warn!("{} selects nothing", config_path.display());
    }
    let root = control_dir(&config_path)?;
    let ignore_map = load_ignore_map(&config, &root)?;

    let output = absolute(current_dir, &args.output);
    let files = selection.resolve(&root, &resolve_options(&config), ignore_map.as_ref())?;
    let files = without_output(files, &output);

    if files.is_empty() {
        log::warn!("No content found for the specified criteria.");
        return Ok(());
    }
    write_bundle(&config, &files, &output, current_dir, ignore_map.as_ref(), None)
}

fn run_snippets(args: &SnippetArgs, current_dir: &Path) -> Result<()> {
    let settings = load_settings()?;
    let config = resolve_config(&settings, &args.common, None, None);

    let config_path = absolute(current_dir, &args.config);
    let filters = snippet::parse_file(&config_path).context(format!("Failed to parse {:?}", config_path))?;
    let root = control_dir(&config_path)?;
    let ignore_map = load_ignore_map(&config, &root)?;

    let snippets = snippet::resolve(&filters, &root, &resolve_options(&config), ignore_map.as_ref())?;
    if snippets.is_empty() {
        log::warn!("No snippets matched.");
        return Ok(());
    }

    let output = absolute(current_dir, &args.output);
    let summary = Concatenator::new(&config.output, current_dir).write_snippets(&snippets, &output)?;
    report(summary, &output);
    Ok(())
}

fn run_tree(args: &TreeArgs, current_dir: &Path) -> Result<()> {
    let settings = load_settings()?;
    let root = canonical_dir(current_dir, &args.root)?;
    let project_name = root.file_name().and_then(|n| n.to_str());
    let mut config = resolve_config(&settings, &args.common, Some(&args.filters), project_name);
    config.walk.include_empty = args.empty;
    let ignore_map = load_ignore_map(&config, &root)?;

    let files = scan_with_filters(&config, &root, ignore_map.as_ref())?;
    print!("{}", OutputGenerator::generate_tree(&root, &files, !args.no_trailing_slash));
    Ok(())
}

fn run_init(args: &InitArgs, current_dir: &Path) -> Result<()> {
    let dir = absolute(current_dir, &args.dir);
    let options = InitOptions {
        force: args.force,
        comments: args.comments,
        transfer: args.transfer,
    };
    let path = init::initialize(args.target, &dir, options)?;
    println!("Created {}", path.display());
    Ok(())
}
