// ABOUTME: git2-backed implementation of VcsOps.
// ABOUTME: Runs each operation on the blocking pool against a freshly opened repository.

use async_trait::async_trait;
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    BranchType, Cred, CredentialType, ErrorCode, FetchOptions, Oid, PushOptions, RemoteCallbacks,
    Repository, Signature,
};
use std::path::{Path, PathBuf};

use super::error::VcsError;
use super::traits::VcsOps;
use crate::types::{BranchName, CommitId};

/// Authentication attempts per network operation before giving up.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Git working copies driven through libgit2.
#[derive(Debug, Clone)]
pub struct GitRepository {
    /// Remote that `update_branch` fetches from.
    upstream: String,
    /// Committer identity used when the repository config has none.
    fallback_name: String,
    fallback_email: String,
}

impl Default for GitRepository {
    fn default() -> Self {
        Self {
            upstream: "origin".to_string(),
            fallback_name: "sfpromote".to_string(),
            fallback_email: "sfpromote@localhost".to_string(),
        }
    }
}

impl GitRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch from a remote other than `origin`.
    pub fn with_upstream(mut self, upstream: impl Into<String>) -> Self {
        self.upstream = upstream.into();
        self
    }

    /// Committer identity for merge commits when git config has none.
    pub fn with_identity(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.fallback_name = name.into();
        self.fallback_email = email.into();
        self
    }

    fn signature(&self, repo: &Repository) -> Result<Signature<'static>, VcsError> {
        match repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(_) => Ok(Signature::now(&self.fallback_name, &self.fallback_email)?),
        }
    }

    fn clone_blocking(remote: &str, path: &Path) -> Result<(), VcsError> {
        if Repository::open(path).is_ok() {
            tracing::debug!("Working copy already present at {}", path.display());
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!("Cloning {} into {}", remote, path.display());
        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(remote_callbacks());
        RepoBuilder::new().fetch_options(fetch).clone(remote, path)?;
        Ok(())
    }

    fn create_branch_blocking(path: &Path, name: &BranchName) -> Result<(), VcsError> {
        let repo = open(path)?;
        if repo.find_branch(name.as_str(), BranchType::Local).is_ok() {
            tracing::debug!("Branch {} already exists", name);
            return Ok(());
        }
        let head = repo.head()?.peel_to_commit()?;
        repo.branch(name.as_str(), &head, false)?;
        tracing::debug!("Created branch {} at {}", name, head.id());
        Ok(())
    }

    fn checkout_blocking(path: &Path, name: &BranchName) -> Result<CommitId, VcsError> {
        let repo = open(path)?;
        let refname = name.local_ref();
        let object = repo
            .revparse_single(&refname)
            .map_err(|_| VcsError::RefNotFound(refname.clone()))?;

        let mut opts = CheckoutBuilder::new();
        opts.safe();
        repo.checkout_tree(&object, Some(&mut opts))?;
        repo.set_head(&refname)?;

        let commit = object.peel_to_commit()?;
        Ok(to_commit_id(commit.id()))
    }

    fn update_branch_blocking(&self, path: &Path, name: &BranchName) -> Result<(), VcsError> {
        let repo = open(path)?;
        let mut remote = repo.find_remote(&self.upstream)?;

        let refspec = format!("+refs/heads/{0}:refs/remotes/{1}/{0}", name, self.upstream);
        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(remote_callbacks());
        remote.fetch(&[refspec.as_str()], Some(&mut fetch), None)?;

        let tracking = format!("refs/remotes/{}/{}", self.upstream, name);
        let target = repo
            .refname_to_id(&tracking)
            .map_err(|_| VcsError::RefNotFound(tracking.clone()))?;

        match repo.find_reference(&name.local_ref()) {
            Ok(mut local) => {
                let current = local
                    .target()
                    .ok_or_else(|| VcsError::Git(format!("{} is a symbolic ref", name)))?;
                if current == target {
                    return Ok(());
                }
                // Local commits not yet pushed are kept.
                if repo.graph_descendant_of(current, target)? {
                    tracing::debug!("{} is ahead of {}; leaving it in place", name, tracking);
                    return Ok(());
                }
                if !repo.graph_descendant_of(target, current)? {
                    return Err(VcsError::Diverged {
                        branch: name.to_string(),
                    });
                }
                local.set_target(target, &format!("sfpromote: fast-forward to {}", tracking))?;
                if is_head(&repo, name) {
                    repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
                }
                tracing::debug!("Fast-forwarded {} to {}", name, target);
            }
            Err(e) if e.code() == ErrorCode::NotFound => {
                let commit = repo.find_commit(target)?;
                repo.branch(name.as_str(), &commit, false)?;
                tracing::debug!("Created local {} from {}", name, tracking);
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    fn merge_blocking(&self, path: &Path, from: &BranchName) -> Result<CommitId, VcsError> {
        let repo = open(path)?;
        let their_ref = from.local_ref();
        let their_oid = repo
            .refname_to_id(&their_ref)
            .map_err(|_| VcsError::RefNotFound(their_ref.clone()))?;
        let annotated = repo.find_annotated_commit(their_oid)?;
        let (analysis, _) = repo.merge_analysis(&[&annotated])?;

        let head = repo.head()?;
        let head_name = head
            .name()
            .ok_or_else(|| VcsError::Git("HEAD name is not valid UTF-8".to_string()))?
            .to_string();
        let head_commit = head.peel_to_commit()?;

        if analysis.is_up_to_date() {
            return Ok(to_commit_id(head_commit.id()));
        }

        if analysis.is_fast_forward() {
            let target = repo.find_object(their_oid, None)?;
            let mut opts = CheckoutBuilder::new();
            opts.safe();
            repo.checkout_tree(&target, Some(&mut opts))?;
            repo.reference(
                &head_name,
                their_oid,
                true,
                &format!("sfpromote: fast-forward merge of {}", from),
            )?;
            return Ok(to_commit_id(their_oid));
        }

        let their_commit = repo.find_commit(their_oid)?;
        let mut index = repo.merge_commits(&head_commit, &their_commit, None)?;
        if index.has_conflicts() {
            let paths = index
                .conflicts()?
                .filter_map(Result::ok)
                .filter_map(|c| c.our.or(c.their).or(c.ancestor))
                .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
                .collect();
            return Err(VcsError::Conflict { paths });
        }

        let tree = repo.find_tree(index.write_tree_to(&repo)?)?;
        let signature = self.signature(&repo)?;
        let message = format!(
            "Merge branch '{}' into {}",
            from,
            head_name.trim_start_matches("refs/heads/")
        );
        let oid = repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            &message,
            &tree,
            &[&head_commit, &their_commit],
        )?;
        repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
        Ok(to_commit_id(oid))
    }

    fn push_blocking(path: &Path, remote_name: &str, name: &BranchName) -> Result<(), VcsError> {
        let repo = open(path)?;
        let mut remote = repo.find_remote(remote_name)?;
        let refspec = format!("{0}:{0}", name.local_ref());

        let mut rejection = None;
        {
            let mut callbacks = remote_callbacks();
            callbacks.push_update_reference(|refname, status| {
                if let Some(message) = status {
                    rejection = Some((refname.to_string(), message.to_string()));
                }
                Ok(())
            });
            let mut opts = PushOptions::new();
            opts.remote_callbacks(callbacks);
            remote.push(&[refspec.as_str()], Some(&mut opts))?;
        }

        if let Some((refname, message)) = rejection {
            return Err(VcsError::PushRejected { refname, message });
        }
        Ok(())
    }
}

#[async_trait]
impl VcsOps for GitRepository {
    async fn clone_repo(&self, remote: &str, path: &Path) -> Result<(), VcsError> {
        let remote = remote.to_string();
        let path = path.to_path_buf();
        blocking(move || Self::clone_blocking(&remote, &path)).await
    }

    async fn create_branch(&self, path: &Path, name: &BranchName) -> Result<(), VcsError> {
        let (path, name) = owned(path, name);
        blocking(move || Self::create_branch_blocking(&path, &name)).await
    }

    async fn checkout(&self, path: &Path, name: &BranchName) -> Result<CommitId, VcsError> {
        let (path, name) = owned(path, name);
        blocking(move || Self::checkout_blocking(&path, &name)).await
    }

    async fn update_branch(&self, path: &Path, name: &BranchName) -> Result<(), VcsError> {
        let this = self.clone();
        let (path, name) = owned(path, name);
        blocking(move || this.update_branch_blocking(&path, &name)).await
    }

    async fn merge(&self, path: &Path, from: &BranchName) -> Result<CommitId, VcsError> {
        let this = self.clone();
        let (path, from) = owned(path, from);
        blocking(move || this.merge_blocking(&path, &from)).await
    }

    async fn push(&self, path: &Path, remote: &str, name: &BranchName) -> Result<(), VcsError> {
        let remote = remote.to_string();
        let (path, name) = owned(path, name);
        blocking(move || Self::push_blocking(&path, &remote, &name)).await
    }
}

fn open(path: &Path) -> Result<Repository, VcsError> {
    Repository::open(path).map_err(|_| VcsError::NotARepo(path.to_path_buf()))
}

fn is_head(repo: &Repository, name: &BranchName) -> bool {
    repo.head()
        .ok()
        .and_then(|head| head.name().map(|n| n == name.local_ref()))
        .unwrap_or(false)
}

fn to_commit_id(oid: Oid) -> CommitId {
    CommitId::new(oid.to_string())
}

fn owned(path: &Path, name: &BranchName) -> (PathBuf, BranchName) {
    (path.to_path_buf(), name.clone())
}

async fn blocking<T, F>(f: F) -> Result<T, VcsError>
where
    F: FnOnce() -> Result<T, VcsError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| VcsError::Git(format!("git task failed: {}", e)))?
}

/// ssh-agent for SSH remotes, the configured credential helper for HTTPS.
fn remote_callbacks<'a>() -> RemoteCallbacks<'a> {
    let mut attempts = 0;
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str("no usable credentials for remote"));
        }
        if allowed.contains(CredentialType::SSH_KEY)
            && let Some(user) = username
        {
            return Cred::ssh_key_from_agent(user);
        }
        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            let config = git2::Config::open_default()?;
            return Cred::credential_helper(&config, url, username);
        }
        Cred::default()
    });
    callbacks
}
