// ABOUTME: Gathers an environment's deployed metadata from the remote API.
// ABOUTME: Also retrieves a snapshot's components into a local directory.

use std::path::Path;

use super::manifest::Manifest;
use super::object::{SfObject, Snapshot};
use crate::diagnostics::{Diagnostics, Warning};
use crate::remote::{ListOutcome, MetadataApi, MetadataRecord, RemoteError};
use crate::types::MetadataType;

/// List every type in `types` and collect the results into a snapshot.
///
/// A type with no components is logged and skipped. A type that fails to
/// list is recorded in `diag` and gathering moves on to the next type.
pub async fn gather_metadata<A>(api: &A, types: &[MetadataType], diag: &mut Diagnostics) -> Snapshot
where
    A: MetadataApi + ?Sized,
{
    let mut snapshot = Snapshot::new();

    for object_type in types {
        tracing::info!("Gathering {}", object_type);
        match api.list_metadata(object_type).await {
            Ok(ListOutcome::Records(records)) => {
                for record in records {
                    if let Some(object) = to_object(object_type, record, diag) {
                        snapshot.insert(object);
                    }
                }
            }
            Ok(ListOutcome::NothingToGather) => {
                tracing::info!("No {} components to gather", object_type);
            }
            Err(e) => {
                tracing::error!("{} failed to gather: {}", object_type, e);
                diag.warn(Warning::gather_failed(format!(
                    "{} failed to gather: {}",
                    object_type, e
                )));
            }
        }
        tracing::info!("{} complete.", object_type);
    }

    snapshot
}

fn to_object(
    object_type: &MetadataType,
    record: MetadataRecord,
    diag: &mut Diagnostics,
) -> Option<SfObject> {
    let (Some(full_name), Some(last_modified)) = (record.full_name, record.last_modified_date)
    else {
        tracing::debug!("Dropping incomplete {} record", object_type);
        return None;
    };

    if is_internal(&full_name) {
        tracing::info!("Skipping item {}", full_name);
        diag.warn(Warning::record_skipped(format!(
            "skipped internal {} {}",
            object_type, full_name
        )));
        return None;
    }

    Some(SfObject::new(object_type.clone(), full_name).with_last_modified(last_modified))
}

/// History-tracking companions (`__hd`) are listed but cannot be retrieved.
/// Custom names never contain a double underscore, so a substring match is safe.
fn is_internal(full_name: &str) -> bool {
    full_name.contains("__hd") || full_name.contains("__c_hd")
}

/// Retrieve every component in `snapshot` and extract it under `destination`.
pub async fn retrieve_environment<A>(
    api: &A,
    snapshot: &Snapshot,
    destination: &Path,
) -> Result<Manifest, RemoteError>
where
    A: MetadataApi + ?Sized,
{
    let manifest = Manifest::from_keys(snapshot.keys());
    tracing::debug!(
        "Retrieving {} to {}",
        manifest
            .types()
            .map(|(t, _)| t.as_str())
            .collect::<Vec<_>>()
            .join(","),
        destination.display()
    );
    api.retrieve(&manifest, destination).await?;
    Ok(manifest)
}
