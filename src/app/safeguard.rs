//! Heuristic protection against bundling credential-like files.
//!
//! Name checks are pure string work. The optional deep inspection reads a
//! bounded prefix of the file and never the whole thing.

use crate::app::error::{ConcatError, Result};
use crate::app::models::SecretPolicy;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Static tables driving the classifier. Defaults are the built-in lists;
/// tests and callers may inject their own.
#[derive(Debug, Clone)]
pub struct Denylist {
    pub extensions: HashSet<String>,
    pub exact_names: HashSet<String>,
    pub affixes: Vec<String>,
    pub tokens: HashSet<String>,
    pub key_dirs: Vec<String>,
    pub pem_markers: Vec<String>,
    pub ssh_key_markers: Vec<String>,
    pub json_tokens: Vec<String>,
    pub alnum_min_length: usize,
    pub base64_min_length: usize,
    pub peek_bytes: usize,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for Denylist {
    fn default() -> Self {
        Self {
            extensions: owned(&["pem", "key", "p12", "jks", "crt", "cer", "der", "pkcs8"])
                .into_iter()
                .collect(),
            exact_names: owned(&[
                ".env",
                ".env.local",
                ".env.production",
                ".env.development",
                "authorized_keys",
                "known_hosts",
                "id_rsa",
                "id_dsa",
                "id_ecdsa",
                "id_ed25519",
                "id_rsa.pub",
                "id_dsa.pub",
                "id_ed25519.pub",
                "credentials",
                "aws_credentials",
                "aws-credentials",
            ])
            .into_iter()
            .collect(),
            affixes: owned(&["id_", "ssh_", "public", "secret", "credentials", "aws", "amazon"]),
            tokens: owned(&[
                "public",
                "secret",
                "credentials",
                "passwd",
                "password",
                "key",
                "cert",
                "pem",
                "ssh",
                "aws",
            ])
            .into_iter()
            .collect(),
            key_dirs: owned(&[".ssh", "ssh"]),
            pem_markers: owned(&[
                "-----begin rsa private key",
                "-----begin rsa public key",
                "-----begin openssh private key",
                "-----begin private key",
                "-----begin encrypted",
                "-----begin certificate",
                "-----begin ",
            ]),
            ssh_key_markers: owned(&["ssh-rsa", "ssh-ed25519", "ssh-dss", "ecdsa-sha2-"]),
            json_tokens: owned(&[
                "\"private_key\"",
                "\"private_key_id\"",
                "\"client_email\"",
                "\"type\": \"service_account\"",
            ]),
            alnum_min_length: 40,
            base64_min_length: 80,
            peek_bytes: 2048,
        }
    }
}

impl Denylist {
    /// Adds exact file names and extensions on top of the current tables.
    /// Both are matched case-insensitively; a leading `.` on an extension is
    /// dropped.
    pub fn with_extra(mut self, names: &[String], extensions: &[String]) -> Self {
        self.exact_names.extend(names.iter().map(|n| n.to_lowercase()));
        self.extensions
            .extend(extensions.iter().map(|e| e.trim_start_matches('.').to_lowercase()));
        self
    }
}

/// Outcome of classifying one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Clear,
    Protected(String),
}

impl Verdict {
    pub fn is_protected(&self) -> bool {
        matches!(self, Verdict::Protected(_))
    }

    #[cfg(test)]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Clear => None,
            Verdict::Protected(reason) => Some(reason.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Safeguard {
    denylist: Denylist,
}

impl Safeguard {
    pub fn new(denylist: Denylist) -> Self {
        Self { denylist }
    }

    /// Name-based checks, then content checks when `deep` is set.
    pub fn inspect(&self, path: &Path, deep: bool) -> Verdict {
        let verdict = self.check_name(path);
        if verdict.is_protected() || !deep {
            return verdict;
        }
        self.check_content(path)
    }

    pub fn check_name(&self, path: &Path) -> Verdict {
        let d = &self.denylist;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let lower = name.to_lowercase();

        if d.exact_names.contains(&lower) {
            return Verdict::Protected(format!("file name '{}' is a known credential file", name));
        }

        let ext = extension_of(path);
        if !ext.is_empty() && d.extensions.contains(&ext) {
            return Verdict::Protected(format!("extension '.{}' is protected", ext));
        }

        if let Some(affix) = d
            .affixes
            .iter()
            .find(|a| lower.starts_with(a.as_str()) || lower.ends_with(a.as_str()))
        {
            return Verdict::Protected(format!("file name starts or ends with '{}'", affix));
        }

        if let Some(token) = lower
            .split(['.', '-', '_'])
            .find(|t| d.tokens.contains(*t))
        {
            return Verdict::Protected(format!("file name contains token '{}'", token));
        }

        let in_key_dir = path.components().any(|c| {
            let seg = c.as_os_str().to_string_lossy().to_lowercase();
            d.key_dirs.iter().any(|k| *k == seg)
        });
        if in_key_dir {
            return Verdict::Protected("file lives in a key-management directory".to_string());
        }

        let len = lower.chars().count();
        if len >= d.alnum_min_length && lower.chars().all(|c| c.is_alphanumeric()) {
            return Verdict::Protected(format!(
                "file name is a {}-character alphanumeric run",
                len
            ));
        }

        Verdict::Clear
    }

    /// Reads at most `peek_bytes` and looks for key material. Unreadable
    /// files are reported clear; the writer surfaces read errors itself.
    pub fn check_content(&self, path: &Path) -> Verdict {
        let d = &self.denylist;
        let mut peek = Vec::with_capacity(d.peek_bytes);
        let read = File::open(path).and_then(|f| f.take(d.peek_bytes as u64).read_to_end(&mut peek));
        if let Err(err) = read {
            log::debug!("deep check skipped for {}: {}", path.display(), err);
            return Verdict::Clear;
        }

        if peek.contains(&0) {
            let ext = extension_of(path);
            if d.extensions.contains(&ext) {
                return Verdict::Protected(
                    "binary file contains NUL bytes (likely keystore / PKCS12 / JKS)".to_string(),
                );
            }
            return Verdict::Protected("binary file contains NUL bytes".to_string());
        }

        let text = String::from_utf8_lossy(&peek);
        let lower = text.to_lowercase();

        if let Some(marker) = d.pem_markers.iter().find(|m| lower.contains(m.as_str())) {
            return Verdict::Protected(format!("detected PEM/OpenSSH marker '{}'", marker.trim()));
        }
        if let Some(marker) = d.ssh_key_markers.iter().find(|m| lower.contains(m.as_str())) {
            return Verdict::Protected(format!("detected SSH key marker '{}'", marker));
        }
        if let Some(token) = d.json_tokens.iter().find(|t| lower.contains(t.as_str())) {
            return Verdict::Protected(format!("detected JSON private-key field {}", token));
        }

        let first = text.split_whitespace().next().unwrap_or("");
        if first.len() >= d.base64_min_length
            && first
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
        {
            return Verdict::Protected("detected long base64-like token (possible key material)".to_string());
        }

        Verdict::Clear
    }

    /// Applies `policy` to a resolved list. Flagged files are dropped with a
    /// warning, kept when secrets are allowed, or turned into an error.
    pub fn screen(&self, paths: Vec<PathBuf>, policy: SecretPolicy) -> Result<Vec<PathBuf>> {
        if policy.allow_secrets {
            return Ok(paths);
        }
        let mut kept = Vec::with_capacity(paths.len());
        for path in paths {
            match self.inspect(&path, policy.deep_inspect) {
                Verdict::Clear => kept.push(path),
                Verdict::Protected(reason) if policy.fail_on_secret => {
                    return Err(ConcatError::ProtectedFile { path, reason });
                }
                Verdict::Protected(reason) => {
                    log::warn!("excluding protected file {} ({})", path.display(), reason);
                }
            }
        }
        Ok(kept)
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
