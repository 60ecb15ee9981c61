//! Template acquisition.
//! A template argument is either a local directory or a git repository URL;
//! git templates are cloned into the working directory and loaded from
//! there.

use crate::error::{Error, Result};
use crate::prompt::Prompter;
use log::debug;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Where a template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Local filesystem template path
    FileSystem(PathBuf),
    /// Git repository URL (HTTPS or SSH)
    Git(String),
}

impl fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateSource::FileSystem(path) => {
                write!(f, "local path: '{}'", path.display())
            }
            TemplateSource::Git(repo) => write!(f, "git repository: '{repo}'"),
        }
    }
}

impl TemplateSource {
    /// Classifies a template argument: `https`/`git` scheme URLs and
    /// `git@` SSH forms are git sources, everything else is a local path.
    pub fn from_string(s: &str) -> Self {
        if let Ok(url) = Url::parse(s) {
            if url.scheme() == "https" || url.scheme() == "git" {
                return Self::Git(s.to_string());
            }
        }
        if s.starts_with("git@") {
            return Self::Git(s.to_string());
        }
        Self::FileSystem(PathBuf::from(s))
    }
}

/// Trait for loading templates from different sources.
pub trait TemplateLoader {
    /// Makes the template available locally and returns its directory.
    fn load(&self) -> Result<PathBuf>;
}

/// Loader for templates already on the local filesystem.
pub struct LocalLoader<P: AsRef<Path>> {
    path: P,
}

impl<P: AsRef<Path>> LocalLoader<P> {
    pub fn new(path: P) -> Self {
        Self { path }
    }
}

impl<P: AsRef<Path>> TemplateLoader for LocalLoader<P> {
    fn load(&self) -> Result<PathBuf> {
        let path = self.path.as_ref();
        if !path.exists() {
            return Err(Error::TemplateDoesNotExist {
                template_dir: path.display().to_string(),
            });
        }
        Ok(path.to_path_buf())
    }
}

/// Loader for templates in git repositories.
pub struct GitLoader<'a, S: AsRef<str>> {
    prompt: &'a dyn Prompter,
    repo: S,
    replace_existing: bool,
}

impl<'a, S: AsRef<str>> GitLoader<'a, S> {
    pub fn new(prompt: &'a dyn Prompter, repo: S, replace_existing: bool) -> Self {
        Self {
            prompt,
            repo,
            replace_existing,
        }
    }
}

impl<S: AsRef<str>> TemplateLoader for GitLoader<'_, S> {
    /// Clones the repository into the working directory. An existing clone
    /// is reused unless the user (or `replace_existing`) opts to replace it.
    fn load(&self) -> Result<PathBuf> {
        let repo_url = self.repo.as_ref();
        debug!("cloning repository '{repo_url}'");

        let repo_name = repo_url
            .split('/')
            .last()
            .unwrap_or("template")
            .trim_end_matches(".git");
        let clone_path = PathBuf::from(repo_name);

        if clone_path.exists() {
            let replace = self.replace_existing
                || self.prompt.confirm(
                    format!("Directory '{repo_name}' already exists. Replace it?"),
                    false,
                )?;
            if replace {
                fs::remove_dir_all(&clone_path).map_err(Error::IoError)?;
            } else {
                debug!("using existing directory '{}'", clone_path.display());
                return Ok(clone_path);
            }
        }

        debug!("cloning to '{}'", clone_path.display());

        let mut callbacks = git2::RemoteCallbacks::new();
        callbacks.credentials(|_url, username_from_url, _allowed_types| {
            let home = std::env::var("HOME").unwrap_or_default();
            git2::Cred::ssh_key(
                username_from_url.unwrap_or("git"),
                None,
                Path::new(&format!("{home}/.ssh/id_rsa")),
                None,
            )
        });

        let mut fetch_opts = git2::FetchOptions::new();
        fetch_opts.remote_callbacks(callbacks);

        let mut builder = git2::build::RepoBuilder::new();
        builder.fetch_options(fetch_opts);

        match builder.clone(repo_url, &clone_path) {
            Ok(_) => Ok(clone_path),
            Err(e) => Err(Error::Git2Error(e)),
        }
    }
}

/// Resolves a template argument to a local template directory.
pub fn load_template<S: Into<String>>(
    prompt: &dyn Prompter,
    template: S,
    replace_existing: bool,
) -> Result<PathBuf> {
    let template: String = template.into();
    let source = TemplateSource::from_string(&template);
    println!("Using template from the {source}");

    match source {
        TemplateSource::Git(repo) => GitLoader::new(prompt, repo, replace_existing).load(),
        TemplateSource::FileSystem(path) => LocalLoader::new(path).load(),
    }
}
