//! Starter configuration files.

use crate::app::cli::InitTarget;
use crate::app::dsl;
use crate::app::error::{ConcatError, Result};
use crate::app::ignore_map::{self, IgnoreMap, IgnoreTemplate};
use crate::app::select;
use crate::app::snippet;
use std::fs;
use std::path::{Path, PathBuf};

const ANY_TEMPLATE: &str = "\
# .conany: bundle files from anywhere on disk
#
#   render(output.txt) {
#       include [
#           /absolute/path/to/file.txt,
#           relative/dir/,               (recursive)
#           ~/project/src/*.rs           (glob)
#       ]
#       exclude [
#           */target/*,
#           *.log
#       ]
#   }

render(any.txt) {
    context {
        title = _

        details {
            _
        }

        dependencies [
            _
        ]
    }

    include [
        # ./src/,
        # ./README.md
    ]

    exclude [
        # *.log
    ]
}
";

#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    pub force: bool,
    pub comments: bool,
    pub transfer: bool,
}

pub fn file_name(target: InitTarget) -> &'static str {
    match target {
        InitTarget::Any => dsl::DOCUMENT_NAME,
        InitTarget::Ignore => ignore_map::IGNORE_FILE_NAME,
        InitTarget::Select => select::SELECT_FILE_NAME,
        InitTarget::Snippets => snippet::FILTER_FILE_NAME,
    }
}

/// Writes the template for `target` into `dir` and returns its path. An
/// existing file is only replaced with `force`; with `transfer` its ignore
/// entries are carried into the new file.
pub fn initialize(target: InitTarget, dir: &Path, options: InitOptions) -> Result<PathBuf> {
    let path = dir.join(file_name(target));
    let exists = path.exists();
    if exists && !options.force {
        return Err(ConcatError::AlreadyExists(path));
    }

    let content = match target {
        InitTarget::Any => ANY_TEMPLATE.to_string(),
        InitTarget::Select => select::default_template().to_string(),
        InitTarget::Snippets => snippet::default_template().to_string(),
        InitTarget::Ignore => {
            let existing = if exists && options.transfer {
                Some(IgnoreMap::load(&path)?)
            } else {
                None
            };
            let template = if options.comments {
                IgnoreTemplate::Comments
            } else {
                IgnoreTemplate::Clean
            };
            ignore_map::render_template(template, existing.as_ref())
        }
    };

    fs::write(&path, content).map_err(|e| ConcatError::write_error(&path, e))?;
    log::info!("wrote {}", path.display());
    Ok(path)
}
