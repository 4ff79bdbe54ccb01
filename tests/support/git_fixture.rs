// ABOUTME: Real git repositories for exercising the git2 adapter.
// ABOUTME: A bare "origin" seeded with a main branch, plus helpers to commit files.

use git2::{Repository, Signature};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct GitFixture {
    pub dir: TempDir,
    pub origin: PathBuf,
    pub seed: PathBuf,
}

impl GitFixture {
    /// Bare origin whose `main` holds one commit with `README.md`.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("origin.git");
        let seed = dir.path().join("seed");

        let bare = Repository::init_bare(&origin).unwrap();
        bare.set_head("refs/heads/main").unwrap();

        let repo = Repository::init(&seed).unwrap();
        repo.set_head("refs/heads/main").unwrap();
        commit_file(&repo, "README.md", "metadata\n", "initial");
        repo.remote("origin", origin.to_str().unwrap()).unwrap();
        push(&repo, "main");

        Self { dir, origin, seed }
    }

    pub fn origin_url(&self) -> String {
        self.origin.to_str().unwrap().to_string()
    }

    pub fn working_copy(&self, name: &str) -> PathBuf {
        self.dir.path().join("work").join(name)
    }

    /// Commit `path` on the seed's current branch and push it to origin.
    pub fn publish(&self, branch: &str, path: &str, contents: &str) {
        let repo = Repository::open(&self.seed).unwrap();
        checkout_or_create(&repo, branch);
        commit_file(&repo, path, contents, &format!("update {}", path));
        push(&repo, branch);
    }

    pub fn origin_tip(&self, branch: &str) -> String {
        let bare = Repository::open_bare(&self.origin).unwrap();
        bare.refname_to_id(&format!("refs/heads/{}", branch))
            .unwrap()
            .to_string()
    }
}

fn signature() -> Signature<'static> {
    Signature::now("fixture", "fixture@example.com").unwrap()
}

/// Write `path` in the working tree and commit it on HEAD.
pub fn commit_file(repo: &Repository, path: &str, contents: &str, message: &str) -> git2::Oid {
    let workdir = repo.workdir().unwrap();
    let full = workdir.join(path);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&full, contents).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new(path)).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

    let sig = signature();
    let parents = match repo.head() {
        Ok(head) => vec![head.peel_to_commit().unwrap()],
        Err(_) => vec![],
    };
    let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
        .unwrap()
}

pub fn checkout_or_create(repo: &Repository, branch: &str) {
    let refname = format!("refs/heads/{}", branch);
    if repo.find_reference(&refname).is_err() {
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        repo.branch(branch, &head, false).unwrap();
    }
    let object = repo.revparse_single(&refname).unwrap();
    repo.checkout_tree(&object, Some(git2::build::CheckoutBuilder::new().force()))
        .unwrap();
    repo.set_head(&refname).unwrap();
}

pub fn push(repo: &Repository, branch: &str) {
    let mut remote = repo.find_remote("origin").unwrap();
    let refspec = format!("+refs/heads/{0}:refs/heads/{0}", branch);
    remote.push(&[refspec.as_str()], None).unwrap();
}
