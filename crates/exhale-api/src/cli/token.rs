//! Access token issuing command.
//!
//! The token table stands in for the external identity provider during
//! local development and integration testing.

use anyhow::Result;
use console::style;
use uuid::Uuid;

use exhale_types::identity::Role;

use crate::http::extractors::auth::issue_token;
use crate::state::AppState;

/// Issue and print a new access token. Only its hash is stored.
pub async fn issue(
    state: &AppState,
    principal_id: Option<Uuid>,
    role: Role,
    name: Option<String>,
    json: bool,
) -> Result<()> {
    let principal_id = principal_id.unwrap_or_else(Uuid::now_v7);
    let token = issue_token(state, principal_id, role, name.as_deref()).await?;

    if json {
        let out = serde_json::json!({
            "token": token,
            "principal_id": principal_id,
            "role": role,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Token issued for {} {} (save this -- it won't be shown again):",
        style("🔑").bold(),
        role,
        style(principal_id).cyan()
    );
    println!();
    println!("  {}", style(&token).yellow().bold());
    println!();

    Ok(())
}
