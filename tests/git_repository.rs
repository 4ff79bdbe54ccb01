// ABOUTME: Integration tests for the git2-backed VcsOps implementation.
// ABOUTME: Runs against real repositories: a bare origin and cloned working copies.

mod support;

use git2::Repository;
use sfpromote::types::BranchName;
use sfpromote::vcs::{GitRepository, VcsError, VcsOps};
use support::git_fixture::{GitFixture, commit_file};

fn branch(name: &str) -> BranchName {
    BranchName::new(name).unwrap()
}

async fn cloned(fixture: &GitFixture) -> (GitRepository, std::path::PathBuf) {
    support::init_tracing();
    let vcs = GitRepository::new();
    let wc = fixture.working_copy("uat");
    vcs.clone_repo(&fixture.origin_url(), &wc).await.unwrap();
    (vcs, wc)
}

#[tokio::test]
async fn clone_checks_out_the_default_branch() {
    let fixture = GitFixture::new();
    let (vcs, wc) = cloned(&fixture).await;

    assert!(wc.join("README.md").exists());
    let head = vcs.checkout(&wc, &branch("main")).await.unwrap();
    assert_eq!(head.as_str(), fixture.origin_tip("main"));
}

#[tokio::test]
async fn clone_into_existing_repository_is_a_no_op() {
    let fixture = GitFixture::new();
    let (vcs, wc) = cloned(&fixture).await;
    std::fs::write(wc.join("scratch.txt"), "keep me").unwrap();

    vcs.clone_repo(&fixture.origin_url(), &wc).await.unwrap();
    assert!(wc.join("scratch.txt").exists());
}

#[tokio::test]
async fn operations_on_a_missing_repository_fail() {
    support::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let err = GitRepository::new()
        .checkout(dir.path(), &branch("main"))
        .await
        .unwrap_err();
    assert!(matches!(err, VcsError::NotARepo(_)));
}

#[tokio::test]
async fn created_branch_starts_at_head() {
    let fixture = GitFixture::new();
    let (vcs, wc) = cloned(&fixture).await;

    vcs.create_branch(&wc, &branch("int/uat-1")).await.unwrap();
    // Creating twice is harmless.
    vcs.create_branch(&wc, &branch("int/uat-1")).await.unwrap();

    let at = vcs.checkout(&wc, &branch("int/uat-1")).await.unwrap();
    assert_eq!(at.as_str(), fixture.origin_tip("main"));
}

#[tokio::test]
async fn checkout_of_unknown_branch_is_ref_not_found() {
    let fixture = GitFixture::new();
    let (vcs, wc) = cloned(&fixture).await;

    let err = vcs.checkout(&wc, &branch("nope")).await.unwrap_err();
    assert!(matches!(err, VcsError::RefNotFound(_)));
}

#[tokio::test]
async fn update_branch_fast_forwards_the_checked_out_branch() {
    let fixture = GitFixture::new();
    let (vcs, wc) = cloned(&fixture).await;

    fixture.publish("main", "classes/Foo.cls", "public class Foo {}");
    vcs.update_branch(&wc, &branch("main")).await.unwrap();

    let head = vcs.checkout(&wc, &branch("main")).await.unwrap();
    assert_eq!(head.as_str(), fixture.origin_tip("main"));
    assert!(wc.join("classes/Foo.cls").exists());
}

#[tokio::test]
async fn update_branch_creates_missing_local_branch() {
    let fixture = GitFixture::new();
    let (vcs, wc) = cloned(&fixture).await;

    fixture.publish("qa", "classes/Qa.cls", "public class Qa {}");
    vcs.update_branch(&wc, &branch("qa")).await.unwrap();

    let at = vcs.checkout(&wc, &branch("qa")).await.unwrap();
    assert_eq!(at.as_str(), fixture.origin_tip("qa"));
}

#[tokio::test]
async fn fast_forward_merge_returns_the_merged_tip() {
    let fixture = GitFixture::new();
    let (vcs, wc) = cloned(&fixture).await;
    fixture.publish("qa", "classes/Qa.cls", "public class Qa {}");
    vcs.update_branch(&wc, &branch("qa")).await.unwrap();

    vcs.create_branch(&wc, &branch("int/uat-1")).await.unwrap();
    vcs.checkout(&wc, &branch("int/uat-1")).await.unwrap();
    let merged = vcs.merge(&wc, &branch("qa")).await.unwrap();

    assert_eq!(merged.as_str(), fixture.origin_tip("qa"));
    assert!(wc.join("classes/Qa.cls").exists());
}

#[tokio::test]
async fn divergent_merge_creates_a_merge_commit() {
    let fixture = GitFixture::new();
    let (vcs, wc) = cloned(&fixture).await;
    fixture.publish("qa", "classes/Qa.cls", "public class Qa {}");
    vcs.update_branch(&wc, &branch("qa")).await.unwrap();

    vcs.create_branch(&wc, &branch("int/uat-1")).await.unwrap();
    vcs.checkout(&wc, &branch("int/uat-1")).await.unwrap();
    {
        let repo = Repository::open(&wc).unwrap();
        commit_file(&repo, "classes/Int.cls", "public class Int {}", "int work");
    }

    let merged = vcs.merge(&wc, &branch("qa")).await.unwrap();

    let repo = Repository::open(&wc).unwrap();
    let commit = repo
        .find_commit(git2::Oid::from_str(merged.as_str()).unwrap())
        .unwrap();
    assert_eq!(commit.parent_count(), 2);
    assert!(wc.join("classes/Qa.cls").exists());
    assert!(wc.join("classes/Int.cls").exists());
}

#[tokio::test]
async fn conflicting_merge_reports_paths_and_leaves_worktree_alone() {
    let fixture = GitFixture::new();
    let (vcs, wc) = cloned(&fixture).await;
    fixture.publish("qa", "README.md", "from qa\n");
    vcs.update_branch(&wc, &branch("qa")).await.unwrap();

    vcs.create_branch(&wc, &branch("int/uat-1")).await.unwrap();
    vcs.checkout(&wc, &branch("int/uat-1")).await.unwrap();
    let before = {
        let repo = Repository::open(&wc).unwrap();
        commit_file(&repo, "README.md", "from int\n", "int edit")
    };

    let err = vcs.merge(&wc, &branch("qa")).await.unwrap_err();
    match err {
        VcsError::Conflict { paths } => assert_eq!(paths, vec!["README.md".to_string()]),
        other => panic!("expected Conflict, got {other:?}"),
    }

    let repo = Repository::open(&wc).unwrap();
    assert_eq!(repo.head().unwrap().target().unwrap(), before);
    assert_eq!(
        std::fs::read_to_string(wc.join("README.md")).unwrap(),
        "from int\n"
    );
}

#[tokio::test]
async fn push_publishes_the_local_branch() {
    let fixture = GitFixture::new();
    let (vcs, wc) = cloned(&fixture).await;

    vcs.checkout(&wc, &branch("main")).await.unwrap();
    let local = {
        let repo = Repository::open(&wc).unwrap();
        commit_file(&repo, "classes/Bar.cls", "public class Bar {}", "bar")
    };

    vcs.push(&wc, "origin", &branch("main")).await.unwrap();
    assert_eq!(fixture.origin_tip("main"), local.to_string());
}

#[tokio::test]
async fn update_branch_keeps_unpushed_local_commits() {
    let fixture = GitFixture::new();
    let (vcs, wc) = cloned(&fixture).await;

    vcs.checkout(&wc, &branch("main")).await.unwrap();
    let local = {
        let repo = Repository::open(&wc).unwrap();
        commit_file(&repo, "classes/Local.cls", "public class Local {}", "local")
    };

    vcs.update_branch(&wc, &branch("main")).await.unwrap();

    let head = vcs.checkout(&wc, &branch("main")).await.unwrap();
    assert_eq!(head.as_str(), local.to_string());
    assert!(wc.join("classes/Local.cls").exists());
}

#[tokio::test]
async fn update_branch_rejects_a_diverged_local_branch() {
    let fixture = GitFixture::new();
    let (vcs, wc) = cloned(&fixture).await;

    vcs.checkout(&wc, &branch("main")).await.unwrap();
    {
        let repo = Repository::open(&wc).unwrap();
        commit_file(&repo, "classes/Local.cls", "public class Local {}", "local");
    }
    fixture.publish("main", "classes/Remote.cls", "public class Remote {}");

    let err = vcs.update_branch(&wc, &branch("main")).await.unwrap_err();
    assert!(matches!(err, VcsError::Diverged { .. }));
}
