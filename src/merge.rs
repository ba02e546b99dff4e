use crate::errors::AppError;
use crate::models::{ContactRecord, MergeDecision};
use crate::scoring::score_contact;
use crate::zoho_client::ZohoClient;

/// Pick winner and loser between the subject and its candidates.
///
/// Every candidate is fetched and scored; the best score wins. Ties favor
/// the subject: it stays the target whenever its score is at least the best
/// candidate's. A candidate that cannot be fetched is treated as a stale
/// search hit and skipped.
///
/// Returns `None` when no candidate could be scored; the caller reports
/// "no duplicates" rather than inventing a merge.
pub async fn resolve_merge(
    client: &ZohoClient,
    subject: &ContactRecord,
    candidate_ids: &[String],
) -> Result<Option<MergeDecision>, AppError> {
    let mut best: Option<(ContactRecord, i64)> = None;

    for candidate_id in candidate_ids {
        let candidate = match client.get_contact(candidate_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping candidate {}: {}", candidate_id, e);
                continue;
            }
        };

        let score = score_contact(client, &candidate).await;
        tracing::debug!("Candidate {} scored {}", candidate_id, score.total);

        let beats_current = best
            .as_ref()
            .map(|(_, best_score)| score.total > *best_score)
            .unwrap_or(true);
        if beats_current {
            best = Some((candidate, score.total));
        }
    }

    let Some((best_candidate, best_score)) = best else {
        return Ok(None);
    };

    let incoming_score = score_contact(client, subject).await.total;
    tracing::info!(
        "Merge decision for {}: incoming score {}, best candidate {} scored {}",
        subject.id,
        incoming_score,
        best_candidate.id,
        best_score
    );

    // Tie-break favors the subject record of the run
    let decision = if incoming_score >= best_score {
        MergeDecision {
            target: subject.clone(),
            source: best_candidate,
            target_score: incoming_score,
            source_score: best_score,
        }
    } else {
        MergeDecision {
            target: best_candidate,
            source: subject.clone(),
            target_score: best_score,
            source_score: incoming_score,
        }
    };

    tracing::info!(
        "Merge target {} (score {}), source {} (score {})",
        decision.target.id,
        decision.target_score,
        decision.source.id,
        decision.source_score
    );
    Ok(Some(decision))
}
