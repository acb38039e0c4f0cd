//! Archive listing

use crate::error::{Error, Result};
use crate::input::{ArchiveInput, open_archive};
use skeetgen_tar::EntryHeader;
use tokio_util::sync::CancellationToken;

/// Headers of every entry in the archive, in order
///
/// Payloads are skipped, never read.
pub async fn list_entries<I: ArchiveInput + Sync>(
    input: &I,
    cancel: &CancellationToken,
) -> Result<Vec<EntryHeader>> {
    let mut archive = open_archive(input).await?;
    let mut headers = Vec::new();

    while let Some(entry) = archive.next_entry().await? {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        headers.push(entry.header().clone());
    }

    Ok(headers)
}
