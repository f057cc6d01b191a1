use crate::state;
use crate::error;

/// removes sessions that have expired or were signed out
pub async fn cleanup(state: state::ArcShared) -> error::Result<()> {
    let now = chrono::Utc::now();
    let conn = state.pool().get().await?;

    let count = conn.execute(
        "delete from auth_session where expires <= $1 or dropped",
        &[&now]
    ).await?;

    tracing::info!("dropped {count} sessions");

    Ok(())
}
