//! Git actions on the data repository.
//!
//! Before a run the local branch is brought up to date with its remote;
//! after the count files are saved, the quarter directory is committed and
//! pushed. All of it uses the git2 library.

use git2::build::CheckoutBuilder;
use git2::{
    Cred, CredentialType, FetchOptions, IndexAddOption, PushOptions, RemoteCallbacks, Repository,
    Signature, StatusOptions,
};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Authentication attempts before the credential callback gives up.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("Invalid Git repository at {}", .0.display())]
    InvalidRepository(PathBuf),

    #[error("No such path: {}", .0.display())]
    NoSuchPath(PathBuf),

    #[error("Branch '{branch}' does not exist in remote '{remote}'")]
    MissingRemoteBranch { remote: String, branch: String },

    #[error("Merge of '{0}' has conflicts; resolve them manually")]
    MergeConflict(String),

    #[error("Push of {reference} rejected: {message}")]
    PushRejected { reference: String, message: String },

    #[error("Error during {action}: {source}")]
    Operation {
        action: &'static str,
        #[source]
        source: git2::Error,
    },
}

impl GitError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            GitError::InvalidRepository(_) => 2,
            GitError::NoSuchPath(_) => 3,
            _ => 1,
        }
    }
}

fn during(action: &'static str) -> impl Fn(git2::Error) -> GitError {
    move |source| GitError::Operation { action, source }
}

/// Remote and branch to sync with.
#[derive(Debug, Clone)]
pub struct GitOptions {
    pub remote: String,
    /// Branch to sync; `None` uses the checked-out branch.
    pub branch: Option<String>,
}

impl Default for GitOptions {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            branch: None,
        }
    }
}

impl From<&crate::config::GitConfig> for GitOptions {
    fn from(config: &crate::config::GitConfig) -> Self {
        Self {
            remote: config.remote.clone(),
            branch: config.branch.clone(),
        }
    }
}

/// Handle on the working tree that stores the data files.
pub struct DataRepository {
    repo: Repository,
    options: GitOptions,
}

impl DataRepository {
    /// Open the repository at `path`.
    pub fn open(path: &Path, options: GitOptions) -> Result<Self, GitError> {
        if !path.exists() {
            return Err(GitError::NoSuchPath(path.to_path_buf()));
        }
        let repo =
            Repository::open(path).map_err(|_| GitError::InvalidRepository(path.to_path_buf()))?;
        if repo.is_bare() {
            return Err(GitError::InvalidRepository(path.to_path_buf()));
        }
        debug!("Opened repository at {}", path.display());
        Ok(Self { repo, options })
    }

    /// Branch to work on: configured, else the checked-out one, else `main`.
    pub fn branch(&self) -> String {
        if let Some(ref branch) = self.options.branch {
            return branch.clone();
        }
        self.repo
            .head()
            .ok()
            .and_then(|head| head.shorthand().map(String::from))
            .unwrap_or_else(|| "main".to_string())
    }

    /// Fetch the remote branch and merge it into the local one.
    pub fn fetch_and_merge(&self) -> Result<(), GitError> {
        let branch = self.branch();
        let remote_name = self.options.remote.as_str();

        let mut remote = self.repo.find_remote(remote_name).map_err(during("fetch"))?;
        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(remote_callbacks(self.repo.config().ok()));
        let refspec = format!("+refs/heads/{0}:refs/remotes/{1}/{0}", branch, remote_name);
        remote
            .fetch(&[refspec.as_str()], Some(&mut fetch_opts), None)
            .map_err(during("fetch"))?;

        let remote_ref = format!("refs/remotes/{}/{}", remote_name, branch);
        let reference = self
            .repo
            .find_reference(&remote_ref)
            .map_err(|_| GitError::MissingRemoteBranch {
                remote: remote_name.to_string(),
                branch: branch.clone(),
            })?;
        let incoming = self
            .repo
            .reference_to_annotated_commit(&reference)
            .map_err(during("merge"))?;

        let (analysis, _) = self
            .repo
            .merge_analysis(&[&incoming])
            .map_err(during("merge"))?;

        let local_ref = format!("refs/heads/{}", branch);
        if analysis.is_up_to_date() {
            info!("Branch {} is already up to date", branch);
            return Ok(());
        } else if analysis.is_fast_forward() || analysis.is_unborn() {
            let target = self
                .repo
                .find_object(incoming.id(), None)
                .map_err(during("merge"))?;
            self.repo
                .checkout_tree(&target, Some(CheckoutBuilder::new().safe()))
                .map_err(during("merge"))?;
            match self.repo.find_reference(&local_ref) {
                Ok(mut r) => {
                    r.set_target(incoming.id(), "fast-forward")
                        .map_err(during("merge"))?;
                }
                Err(_) => {
                    self.repo
                        .reference(&local_ref, incoming.id(), true, "fast-forward")
                        .map_err(during("merge"))?;
                }
            }
            self.repo.set_head(&local_ref).map_err(during("merge"))?;
        } else {
            self.merge_commit(&incoming, &remote_ref)?;
        }

        info!("Fetched and merged latest changes from {}", branch);
        Ok(())
    }

    fn merge_commit(&self, incoming: &git2::AnnotatedCommit<'_>, remote_ref: &str) -> Result<(), GitError> {
        self.repo
            .merge(&[incoming], None, None)
            .map_err(during("merge"))?;

        let mut index = self.repo.index().map_err(during("merge"))?;
        if index.has_conflicts() {
            if let Err(e) = self.repo.cleanup_state() {
                warn!("Failed to clean up merge state: {}", e);
            }
            return Err(GitError::MergeConflict(remote_ref.to_string()));
        }

        let tree_id = index.write_tree().map_err(during("merge"))?;
        let tree = self.repo.find_tree(tree_id).map_err(during("merge"))?;
        let head = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(during("merge"))?;
        let theirs = self.repo.find_commit(incoming.id()).map_err(during("merge"))?;
        let signature = self.signature()?;
        let message = format!("Merge {}", remote_ref.trim_start_matches("refs/remotes/"));

        self.repo
            .commit(Some("HEAD"), &signature, &signature, &message, &tree, &[&head, &theirs])
            .map_err(during("merge"))?;
        self.repo.cleanup_state().map_err(during("merge"))?;
        Ok(())
    }

    /// Stage and commit everything under `add_path`.
    ///
    /// Returns `false` (and commits nothing) when the path has no changes.
    pub fn add_and_commit(&self, add_path: &Path, message: &str) -> Result<bool, GitError> {
        let relative = self.relative_to_workdir(add_path)?;
        let pathspec = relative.to_string_lossy().replace('\\', "/");

        let mut status_opts = StatusOptions::new();
        status_opts
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .pathspec(pathspec.as_str());
        let statuses = self
            .repo
            .statuses(Some(&mut status_opts))
            .map_err(during("add and commit"))?;
        if statuses.is_empty() {
            info!("No changes to commit in: {}", pathspec);
            return Ok(false);
        }

        let mut index = self.repo.index().map_err(during("add and commit"))?;
        index
            .add_all([pathspec.as_str()], IndexAddOption::DEFAULT, None)
            .map_err(during("add and commit"))?;
        index.write().map_err(during("add and commit"))?;
        let tree_id = index.write_tree().map_err(during("add and commit"))?;
        let tree = self.repo.find_tree(tree_id).map_err(during("add and commit"))?;

        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let signature = self.signature()?;

        self.repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .map_err(during("add and commit"))?;

        info!("Changes committed: {}", message);
        Ok(true)
    }

    /// Push the branch to the remote.
    pub fn push(&self) -> Result<(), GitError> {
        let branch = self.branch();
        let mut remote = self
            .repo
            .find_remote(&self.options.remote)
            .map_err(during("push changes"))?;

        let rejection: RefCell<Option<(String, String)>> = RefCell::new(None);
        let mut callbacks = remote_callbacks(self.repo.config().ok());
        callbacks.push_update_reference(|reference, status| {
            if let Some(message) = status {
                *rejection.borrow_mut() = Some((reference.to_string(), message.to_string()));
            }
            Ok(())
        });

        let mut push_opts = PushOptions::new();
        push_opts.remote_callbacks(callbacks);

        let refspec = format!("refs/heads/{0}:refs/heads/{0}", branch);
        remote
            .push(&[refspec.as_str()], Some(&mut push_opts))
            .map_err(during("push changes"))?;
        drop(push_opts);

        if let Some((reference, message)) = rejection.into_inner() {
            return Err(GitError::PushRejected { reference, message });
        }

        info!("Changes pushed");
        Ok(())
    }

    fn relative_to_workdir(&self, path: &Path) -> Result<PathBuf, GitError> {
        let workdir = self
            .repo
            .workdir()
            .ok_or_else(|| GitError::InvalidRepository(self.repo.path().to_path_buf()))?;
        let workdir = workdir
            .canonicalize()
            .map_err(|_| GitError::NoSuchPath(workdir.to_path_buf()))?;
        let path = path
            .canonicalize()
            .map_err(|_| GitError::NoSuchPath(path.to_path_buf()))?;

        path.strip_prefix(&workdir)
            .map(Path::to_path_buf)
            .map_err(|_| GitError::NoSuchPath(path.clone()))
    }

    fn signature(&self) -> Result<Signature<'static>, GitError> {
        match self.repo.signature() {
            Ok(signature) => Ok(signature.to_owned()),
            Err(_) => Signature::now("doajtally", "doajtally@localhost")
                .map_err(during("signature")),
        }
    }
}

/// Callbacks shared by fetch and push: ssh-agent, then credential helper.
fn remote_callbacks<'a>(config: Option<git2::Config>) -> RemoteCallbacks<'a> {
    let mut attempts = 0usize;
    let mut callbacks = RemoteCallbacks::new();

    callbacks.credentials(move |url, username_from_url, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str("authentication failed"));
        }
        if allowed.contains(CredentialType::SSH_KEY) {
            if let Some(user) = username_from_url {
                return Cred::ssh_key_from_agent(user);
            }
        }
        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Some(ref config) = config {
                return Cred::credential_helper(config, url, username_from_url);
            }
        }
        Cred::default()
    });

    callbacks.transfer_progress(|progress| {
        debug!(
            "Received {}/{} objects",
            progress.received_objects(),
            progress.total_objects()
        );
        true
    });

    callbacks
}
