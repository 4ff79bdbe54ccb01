// ABOUTME: State transition methods for integration branches.
// ABOUTME: Each method consumes self and returns the next state, or the same state plus the error.

use chrono::Utc;
use snafu::{OptionExt, ResultExt};

use super::branch::IntegrationBranch;
use super::context::PipelineContext;
use super::error::{
    BranchExistsSnafu, BranchInFlightSnafu, BranchNotFoundSnafu, DeployFailedSnafu, DeployStage,
    EnvironmentMismatchSnafu, InvalidStateSnafu, PersistenceSnafu, PipelineError, WorkingSetSnafu,
};
use super::state::{BranchState, Created, Deployed, Integrated};
use crate::environment::Environment;
use crate::metadata::{Changeset, Snapshot, diff};
use crate::remote::{DeployKind, DeployRequest};
use crate::store::{IntegrationBranchRecord, Store};
use crate::types::{BranchId, BranchName, CommitId};
use crate::vcs::VcsError;

/// Result type for transitions; on failure the branch comes back in its prior state.
pub type TransitionResult<T, S> =
    Result<IntegrationBranch<T>, (IntegrationBranch<S>, PipelineError)>;

// =============================================================================
// Internal Helpers
// =============================================================================

impl<S> IntegrationBranch<S> {
    fn ensure_destination(&self, destination: &Environment) -> Result<(), PipelineError> {
        if destination.id() != &self.record.dest_env {
            return EnvironmentMismatchSnafu {
                branch: self.record.name.as_str(),
                environment: destination.name().as_str(),
            }
            .fail();
        }
        Ok(())
    }

    fn ensure_source(&self, source: &Environment) -> Result<(), PipelineError> {
        if source.id() != &self.record.source_env {
            return EnvironmentMismatchSnafu {
                branch: self.record.name.as_str(),
                environment: source.name().as_str(),
            }
            .fail();
        }
        Ok(())
    }
}

/// Conflicts become `MergeConflict`; everything else keeps its operation context.
fn vcs_error(operation: &'static str, branch: &BranchName, err: VcsError) -> PipelineError {
    match err {
        VcsError::Conflict { paths } => PipelineError::MergeConflict {
            branch: branch.to_string(),
            paths,
        },
        source => PipelineError::Vcs {
            operation,
            branch: branch.to_string(),
            source,
        },
    }
}

async fn save_branch(
    store: &dyn Store,
    record: &IntegrationBranchRecord,
) -> Result<(), PipelineError> {
    store
        .save_branch(record)
        .await
        .with_context(|_| PersistenceSnafu {
            what: format!("branch {}", record.name),
        })
}

async fn load_branch(
    store: &dyn Store,
    id: &BranchId,
) -> Result<Option<IntegrationBranchRecord>, PipelineError> {
    store.load_branch(id).await.with_context(|_| PersistenceSnafu {
        what: format!("branch {}", id),
    })
}

fn log_changeset(branch: &BranchName, changeset: &Changeset) {
    tracing::info!(
        "Changeset for {}: {} added, {} deleted",
        branch,
        changeset.added.len(),
        changeset.deleted.len()
    );
    for key in &changeset.added {
        tracing::debug!("  added   {}", key);
    }
    for key in &changeset.deleted {
        tracing::debug!("  deleted {}", key);
    }
}

// =============================================================================
// (new) -> Created
// =============================================================================

impl IntegrationBranch<Created> {
    /// Materialize a new integration branch from `source` into `destination`.
    ///
    /// Clones the repository into the destination's working copy if needed,
    /// branches from the destination's refreshed mainline, and checks the
    /// new branch out. Only after all of that succeeds
    /// are the destination's active pointer and the record persisted, so
    /// a failed create leaves no record in the store.
    ///
    /// # Errors
    ///
    /// `BranchInFlight` if the destination already has an undeployed
    /// integration branch, whether or not its pointer names it.
    /// `BranchExists` if the name was used before.
    pub async fn create(
        ctx: &PipelineContext,
        name: BranchName,
        source: &Environment,
        destination: &Environment,
    ) -> Result<Self, PipelineError> {
        if source.id() == destination.id() {
            return EnvironmentMismatchSnafu {
                branch: name.as_str(),
                environment: destination.name().as_str(),
            }
            .fail();
        }

        let store = ctx.store.as_ref();
        let path = destination.branch().local_path;
        let _working_copy = destination.lock_working_copy().await;

        if let Some(active) = destination.active_branch() {
            match load_branch(store, &active).await? {
                Some(record) if !record.is_deployed => {
                    return BranchInFlightSnafu {
                        environment: destination.name().as_str(),
                        active: active.as_str(),
                    }
                    .fail();
                }
                _ => tracing::warn!(
                    "Ignoring stale active branch {} on {}",
                    active,
                    destination.name()
                ),
            }
        }

        // The pointer can lag the records; any undeployed record still counts.
        let undeployed = store
            .list_branches(destination.id())
            .await
            .with_context(|_| PersistenceSnafu {
                what: format!("branches of {}", destination.name()),
            })?
            .into_iter()
            .find(|r| !r.is_deployed);
        if let Some(record) = undeployed {
            return BranchInFlightSnafu {
                environment: destination.name().as_str(),
                active: record.id.as_str(),
            }
            .fail();
        }

        if load_branch(store, &BranchId::new(name.as_str())).await?.is_some() {
            return BranchExistsSnafu {
                branch: name.as_str(),
            }
            .fail();
        }

        tracing::info!(
            "Creating integration branch {} ({} -> {})",
            name,
            source.name(),
            destination.name()
        );
        let mainline = destination.branch().name;
        ctx.vcs
            .clone_repo(&ctx.settings.repository, &path)
            .await
            .map_err(|e| vcs_error("clone", &name, e))?;
        ctx.vcs
            .update_branch(&path, &mainline)
            .await
            .map_err(|e| vcs_error("update", &mainline, e))?;
        let base = ctx
            .vcs
            .checkout(&path, &mainline)
            .await
            .map_err(|e| vcs_error("checkout", &mainline, e))?;
        tracing::debug!("Branching from {} at {}", mainline, base.short());
        ctx.vcs
            .create_branch(&path, &name)
            .await
            .map_err(|e| vcs_error("create branch", &name, e))?;
        let head = ctx
            .vcs
            .checkout(&path, &name)
            .await
            .map_err(|e| vcs_error("checkout", &name, e))?;
        tracing::debug!("Checked out {} at {}", name, head.short());

        let record = IntegrationBranchRecord::new(
            name,
            path,
            source.id().clone(),
            destination.id().clone(),
        );
        // Pointer before record; a pointer to a missing record reads as stale.
        destination
            .set_active_branch(store, Some(record.id.clone()))
            .await
            .with_context(|_| PersistenceSnafu {
                what: format!("environment {}", destination.name()),
            })?;
        if let Err(e) = save_branch(store, &record).await {
            if let Err(clear) = destination.set_active_branch(store, None).await {
                tracing::error!(
                    "Failed to clear active branch on {} after {} was not saved: {}",
                    destination.name(),
                    record.name,
                    clear
                );
            }
            return Err(e);
        }

        Ok(IntegrationBranch {
            record,
            state: Created,
        })
    }
}

// =============================================================================
// Created -> Integrated
// =============================================================================

impl IntegrationBranch<Created> {
    /// Merge the latest state of the source environment's branch into this branch.
    ///
    /// On a merge conflict the checkout commit stays recorded, no merge
    /// commit is recorded, and the branch comes back as `Created`.
    ///
    /// # Errors
    ///
    /// Returns `(self, error)` on failure.
    #[must_use = "integration branch state must be used"]
    pub async fn integrate(
        self,
        ctx: &PipelineContext,
        source: &Environment,
        destination: &Environment,
    ) -> TransitionResult<Integrated, Created> {
        if let Err(e) = self
            .ensure_source(source)
            .and_then(|()| self.ensure_destination(destination))
        {
            return Err((self, e));
        }

        let mut record = self.record;
        match integrate_steps(ctx, &mut record, source, destination).await {
            Ok(post_merge) => {
                tracing::info!("Integrated {} at {}", record.name, post_merge.short());
                Ok(IntegrationBranch {
                    record,
                    state: Integrated { post_merge },
                })
            }
            Err(e) => {
                tracing::error!("Integration of {} failed: {}", record.name, e);
                Err((
                    IntegrationBranch {
                        record,
                        state: Created,
                    },
                    e,
                ))
            }
        }
    }
}

async fn integrate_steps(
    ctx: &PipelineContext,
    record: &mut IntegrationBranchRecord,
    source: &Environment,
    destination: &Environment,
) -> Result<CommitId, PipelineError> {
    let store = ctx.store.as_ref();
    let path = record.local_path.clone();
    let source_branch = source.branch().name;
    let _working_copy = destination.lock_working_copy().await;

    tracing::info!("Refreshing {}", source_branch);
    ctx.vcs
        .update_branch(&path, &source_branch)
        .await
        .map_err(|e| vcs_error("update", &source_branch, e))?;

    let pre_merge = ctx
        .vcs
        .checkout(&path, &record.name)
        .await
        .map_err(|e| vcs_error("checkout", &record.name, e))?;
    let mut updated = record.clone();
    updated.pre_merge_commit_id = Some(pre_merge);
    save_branch(store, &updated).await?;
    *record = updated;

    tracing::info!("Merging {} into {}", source_branch, record.name);
    let post_merge = ctx
        .vcs
        .merge(&path, &source_branch)
        .await
        .map_err(|e| vcs_error("merge", &record.name, e))?;
    let mut updated = record.clone();
    updated.post_merge_commit_id = Some(post_merge.clone());
    save_branch(store, &updated).await?;
    *record = updated;

    // The merge is recorded; a failure here only affects where the working copy sits.
    if let Err(e) = ctx.vcs.checkout(&path, &source_branch).await {
        tracing::warn!(
            "Could not return working copy to {} after integrating {}: {}",
            source_branch,
            record.name,
            e
        );
    }

    Ok(post_merge)
}

// =============================================================================
// Integrated -> Deployed
// =============================================================================

impl IntegrationBranch<Integrated> {
    /// Deploy this branch to its destination and merge it back.
    ///
    /// Holds the destination's lock for the whole operation. Deletions go
    /// out first with validation forced, then additions. Only after both
    /// remote calls succeed is the branch merged into the destination's
    /// mainline and pushed. The lock is released on every path.
    ///
    /// # Errors
    ///
    /// Returns `(self, error)` on failure; the branch stays `Integrated`
    /// and may be deployed again once the cause is fixed.
    #[must_use = "integration branch state must be used"]
    pub async fn deploy(
        self,
        ctx: &PipelineContext,
        destination: &Environment,
    ) -> TransitionResult<Deployed, Integrated> {
        if let Err(e) = self.ensure_destination(destination) {
            return Err((self, e));
        }

        let guard = match destination.lock().try_acquire() {
            Ok(guard) => guard,
            Err(e) => {
                tracing::warn!("Cannot deploy {}: {}", self.record.name, e);
                return Err((self, e.into()));
            }
        };

        tracing::info!("Deploying {} to {}", self.record.name, destination.name());
        let result = deploy_steps(ctx, &self.record, destination).await;
        drop(guard);

        match result {
            Ok(record) => {
                let deployed_at = record.deployed_at.unwrap_or_else(Utc::now);
                tracing::info!("Deployed {} to {}", record.name, destination.name());
                Ok(IntegrationBranch {
                    record,
                    state: Deployed { deployed_at },
                })
            }
            Err(e) => {
                tracing::error!("Deploy of {} failed: {}", self.record.name, e);
                Err((self, e))
            }
        }
    }
}

async fn deploy_steps(
    ctx: &PipelineContext,
    current: &IntegrationBranchRecord,
    destination: &Environment,
) -> Result<IntegrationBranchRecord, PipelineError> {
    let store = ctx.store.as_ref();
    let _working_copy = destination.lock_working_copy().await;

    // Another handle may have deployed this branch since it was loaded.
    let mut record = load_branch(store, &current.id)
        .await?
        .context(BranchNotFoundSnafu {
            branch: current.name.as_str(),
        })?;
    if record.is_deployed || record.post_merge_commit_id.is_none() {
        let actual = if record.is_deployed {
            BranchState::Deployed
        } else {
            BranchState::Created
        };
        return InvalidStateSnafu {
            branch: record.name.as_str(),
            expected: BranchState::Integrated,
            actual,
        }
        .fail();
    }

    let path = record.local_path.clone();
    let name = record.name.clone();

    let head = ctx
        .vcs
        .checkout(&path, &name)
        .await
        .map_err(|e| vcs_error("checkout", &name, e))?;
    tracing::debug!("Checked out {} at {}", name, head.short());
    let working_set = ctx
        .source
        .working_set(&path)
        .await
        .context(WorkingSetSnafu {
            branch: name.as_str(),
        })?;

    let changeset = diff(&destination.current_snapshot(), &working_set);
    log_changeset(&name, &changeset);

    if !changeset.deleted.is_empty() {
        let request = DeployRequest {
            kind: DeployKind::Delete,
            manifest: changeset.deleted_manifest(),
            source_root: path.clone(),
            validate: true,
            api_version: ctx.settings.api_version.clone(),
        };
        deploy_stage(ctx, destination, &name, DeployStage::Deleted, &request).await?;
    }

    if !changeset.added.is_empty() {
        let request = DeployRequest {
            kind: DeployKind::Upsert,
            manifest: changeset.added_manifest(),
            source_root: path.clone(),
            validate: false,
            api_version: ctx.settings.api_version.clone(),
        };
        deploy_stage(ctx, destination, &name, DeployStage::Added, &request).await?;
    }

    if let Err(e) = merge_back(ctx, destination, &record).await {
        tracing::error!(
            "{} is live on {} but was not merged back: {}",
            name,
            destination.name(),
            e
        );
        return Err(e);
    }

    record.is_deployed = true;
    record.deployed_at = Some(Utc::now());
    save_branch(store, &record).await?;

    // The deploy is committed once the record says so; bookkeeping below is best effort.
    if destination.active_branch().as_ref() == Some(&record.id)
        && let Err(e) = destination.set_active_branch(store, None).await
    {
        tracing::error!(
            "Failed to clear active branch on {}: {}",
            destination.name(),
            e
        );
    }
    install_snapshot(store, destination, working_set).await;

    Ok(record)
}

/// One remote deploy call under the configured timeout.
async fn deploy_stage(
    ctx: &PipelineContext,
    destination: &Environment,
    branch: &BranchName,
    stage: DeployStage,
    request: &DeployRequest,
) -> Result<(), PipelineError> {
    let timeout = ctx.settings.deploy_timeout;
    tracing::info!(
        "Deploying {} {} components to {} (validate: {})",
        request.manifest.len(),
        stage,
        destination.name(),
        request.validate
    );

    let (detail, ambiguous) =
        match tokio::time::timeout(timeout, destination.api().deploy(request)).await {
            Ok(Ok(report)) if report.success => return Ok(()),
            Ok(Ok(report)) => (report.detail(), false),
            Ok(Err(e)) => (e.to_string(), e.is_ambiguous()),
            Err(_) => (
                format!("no response within {}s", timeout.as_secs_f64()),
                true,
            ),
        };

    DeployFailedSnafu {
        branch: branch.as_str(),
        stage,
        detail,
        ambiguous,
    }
    .fail()
}

async fn merge_back(
    ctx: &PipelineContext,
    destination: &Environment,
    record: &IntegrationBranchRecord,
) -> Result<(), PipelineError> {
    let path = &record.local_path;
    let mainline = destination.branch().name;

    ctx.vcs
        .update_branch(path, &mainline)
        .await
        .map_err(|e| vcs_error("update", &mainline, e))?;
    let tip = ctx
        .vcs
        .checkout(path, &mainline)
        .await
        .map_err(|e| vcs_error("checkout", &mainline, e))?;
    tracing::debug!("Checked out {} at {}", mainline, tip.short());
    let merged = ctx
        .vcs
        .merge(path, &record.name)
        .await
        .map_err(|e| vcs_error("merge-back", &mainline, e))?;
    tracing::info!("Merged {} into {} at {}", record.name, mainline, merged.short());

    let remote = destination.push_remote();
    ctx.vcs
        .push(path, &remote, &mainline)
        .await
        .map_err(|e| vcs_error("push", &mainline, e))?;
    tracing::info!("Pushed {} to {}", mainline, remote);
    Ok(())
}

async fn install_snapshot(store: &dyn Store, destination: &Environment, working_set: Snapshot) {
    if let Err(e) = destination.snapshot(store, working_set).await {
        tracing::error!(
            "Failed to record new baseline for {}; refresh it before the next deploy: {}",
            destination.name(),
            e
        );
    }
}
