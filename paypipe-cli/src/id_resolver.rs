//! ID resolver module
//!
//! Resolves run id prefixes to full UUIDs so users can type short,
//! unambiguous prefixes. Only runs still in the server's history can be
//! found by prefix; a full UUID is always accepted as is.

use anyhow::{Context, Result, anyhow};
use paypipe_client::PipelineClient;
use uuid::Uuid;

use crate::types::IdOrPrefix;

/// How far back prefix resolution looks
const RESOLVE_WINDOW: usize = 50;

/// Resolve a run ID or prefix to a full UUID
///
/// # Errors
/// Returns an error if no run or several runs match the prefix, or the
/// history can't be fetched.
pub async fn resolve_run_id(client: &PipelineClient, id_or_prefix: &IdOrPrefix) -> Result<Uuid> {
    if let Some(uuid) = id_or_prefix.as_uuid() {
        return Ok(uuid);
    }

    let history = client
        .history(Some(RESOLVE_WINDOW))
        .await
        .context("Failed to fetch run history for ID resolution")?;

    let ids: Vec<Uuid> = history.iter().map(|e| e.pipeline_id).collect();
    match_prefix(&ids, &id_or_prefix.to_string())
}

fn match_prefix(ids: &[Uuid], prefix: &str) -> Result<Uuid> {
    let matches: Vec<&Uuid> = ids
        .iter()
        .filter(|id| id.to_string().starts_with(prefix))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No run found with ID starting with '{}'", prefix)),
        [id] => Ok(**id),
        _ => {
            let ids: Vec<String> = matches.iter().map(|id| id.to_string()).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple runs: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_prefix() {
        let a = Uuid::parse_str("3f2a0000-0000-4000-8000-000000000001").unwrap();
        let b = Uuid::parse_str("3f2b0000-0000-4000-8000-000000000002").unwrap();
        let ids = [a, b];

        assert_eq!(match_prefix(&ids, "3f2a").unwrap(), a);
        assert!(match_prefix(&ids, "3f2").unwrap_err().to_string().contains("Ambiguous"));
        assert!(match_prefix(&ids, "ffff").unwrap_err().to_string().contains("No run"));
    }
}
