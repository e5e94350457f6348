use crate::app::models::DelimiterStyle;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Select files declaratively and bundle them into one context file"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Concatenate every matching file under a directory
    Dir(DirArgs),
    /// Render each render(...) block of a .conany document
    Any(AnyArgs),
    /// Concatenate the files named by a .conselect file
    Select(SelectArgs),
    /// Concatenate anchored snippets described by a .configure file
    Snippets(SnippetArgs),
    /// Print the directory tree of matching files
    Tree(TreeArgs),
    /// Write a starter configuration file
    Init(InitArgs),
}

/// Flags shared by every command that walks and writes.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Maximum directory depth below the root
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Include files and directories starting with '.'
    #[arg(long)]
    pub dotfiles: bool,

    /// Honour the root's .gitignore
    #[arg(long)]
    pub gitignore: bool,

    /// Ignore map to load instead of the root's .conignore
    #[arg(long, value_name = "PATH")]
    pub ignore_file: Option<PathBuf>,

    /// Do not skip control files and default outputs
    #[arg(long)]
    pub no_static_ignores: bool,

    /// Keep files that look like credentials
    #[arg(long, conflicts_with = "fail_on_secret")]
    pub allow_secrets: bool,

    /// Abort when a file looks like a credential
    #[arg(long)]
    pub fail_on_secret: bool,

    /// Also inspect file contents for key material
    #[arg(long)]
    pub deep: bool,

    /// Header/footer style around each file
    #[arg(long, value_enum)]
    pub delimiter: Option<DelimiterStyle>,

    /// Write a closing delimiter after each file
    #[arg(long)]
    pub closure: bool,

    /// Lines kept per file (0 for no limit)
    #[arg(long)]
    pub max_lines: Option<usize>,

    /// Keep leading and trailing blank lines
    #[arg(long)]
    pub no_trim: bool,

    /// Label files by absolute path
    #[arg(long)]
    pub absolute: bool,

    /// Write file contents only, without delimiters or notes
    #[arg(long)]
    pub raw: bool,
}

/// Include/exclude patterns, merged with a preset from the settings file.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Use a named preset from the settings file (defaults to the folder name)
    #[arg(long)]
    pub preset: Option<String>,

    /// Patterns for files to include (e.g. '*.rs')
    #[arg(long, num_args = 1..)]
    pub include: Option<Vec<String>>,

    /// Patterns for files to exclude
    #[arg(long, num_args = 1..)]
    pub exclude: Option<Vec<String>>,

    /// Patterns for directories to prune
    #[arg(long, num_args = 1..)]
    pub exclude_dir: Option<Vec<String>>,
}

#[derive(Args, Debug)]
pub struct DirArgs {
    /// Directory to scan
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Output file
    #[arg(short, long, default_value = "concatenation.txt")]
    pub output: PathBuf,

    #[command(flatten)]
    pub filters: FilterArgs,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct AnyArgs {
    /// Selection document
    #[arg(short, long, default_value = ".conany")]
    pub config: PathBuf,

    /// Only render blocks with these output names
    #[arg(short, long)]
    pub block: Vec<String>,

    /// List resolved files instead of writing outputs
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct SelectArgs {
    /// Named-selection file
    #[arg(short, long, default_value = ".conselect")]
    pub config: PathBuf,

    /// Output file
    #[arg(short, long, default_value = "conselection.txt")]
    pub output: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct SnippetArgs {
    /// Snippet filter file
    #[arg(short, long, default_value = ".configure")]
    pub config: PathBuf,

    /// Output file
    #[arg(short, long, default_value = "configure.txt")]
    pub output: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Directory to render
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Also list directories with no matching children
    #[arg(long)]
    pub empty: bool,

    /// Omit the trailing '/' on directory names
    #[arg(long)]
    pub no_trailing_slash: bool,

    #[command(flatten)]
    pub filters: FilterArgs,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitTarget {
    /// .conany selection document
    Any,
    /// .conignore ignore map
    Ignore,
    /// .conselect named selection
    Select,
    /// .configure snippet filters
    Snippets,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Which file to create
    #[arg(value_enum)]
    pub target: InitTarget,

    /// Directory to create it in
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,

    /// Annotate the ignore template with comments
    #[arg(long)]
    pub comments: bool,

    /// Carry entries of an existing .conignore into the new one
    #[arg(long)]
    pub transfer: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_dir_flags_parse() {
        let cli = Cli::parse_from([
            "concat", "-vv", "dir", "src", "--include", "*.rs", "*.toml", "--delimiter", "classic", "--max-lines", "0",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Dir(args) => {
                assert_eq!(args.root, PathBuf::from("src"));
                assert_eq!(args.filters.include, Some(vec!["*.rs".to_string(), "*.toml".to_string()]));
                assert_eq!(args.common.delimiter, Some(DelimiterStyle::Classic));
                assert_eq!(args.common.max_lines, Some(0));
                assert_eq!(args.output, PathBuf::from("concatenation.txt"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_secret_flags_conflict() {
        let err = Cli::try_parse_from(["concat", "any", "--allow-secrets", "--fail-on-secret"]);
        assert!(err.is_err());
    }
}
