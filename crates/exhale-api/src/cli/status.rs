//! System status dashboard command.

use anyhow::Result;
use console::style;

use exhale_core::messaging::repository::MessageRepository;
use exhale_core::scheduling::repository::AppointmentRepository;
use exhale_infra::sqlite::appointment::SqliteAppointmentRepository;
use exhale_infra::sqlite::message::SqliteMessageRepository;
use exhale_types::appointment::AppointmentStatus;

use crate::state::AppState;

/// Display system status dashboard.
///
/// Shows appointment counts by status, total messages, and version.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let appointments = SqliteAppointmentRepository::new(state.db_pool.clone());
    let messages = SqliteMessageRepository::new(state.db_pool.clone());

    let counts = appointments
        .count_by_status()
        .await
        .map_err(|e| anyhow::anyhow!("counting appointments: {e}"))?;
    let message_count = messages
        .count_messages()
        .await
        .map_err(|e| anyhow::anyhow!("counting messages: {e}"))?;

    let count_of = |status: AppointmentStatus| {
        counts
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    };
    let total: u64 = counts.iter().map(|(_, n)| *n).sum();
    let pending = count_of(AppointmentStatus::Pending);
    let confirmed = count_of(AppointmentStatus::Confirmed);
    let completed = count_of(AppointmentStatus::Completed);
    let cancelled = count_of(AppointmentStatus::Cancelled);
    let rescheduled = count_of(AppointmentStatus::Rescheduled);

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "appointments": {
                "total": total,
                "pending": pending,
                "confirmed": confirmed,
                "completed": completed,
                "cancelled": cancelled,
                "rescheduled": rescheduled,
            },
            "messages": message_count,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Exhale v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Appointments ──").dim());
    println!("  Total:       {}", style(total).bold());
    println!("  Pending:     {}", style(pending).yellow());
    println!("  Confirmed:   {}", style(confirmed).green());
    println!("  Completed:   {}", completed);
    if cancelled > 0 {
        println!("  Cancelled:   {}", style(cancelled).dim());
    }
    if rescheduled > 0 {
        println!("  Rescheduled: {}", style(rescheduled).dim());
    }
    println!();

    println!("  {}", style("── Messages ──").dim());
    println!("  Stored:      {}", message_count);
    println!();
    println!(
        "  Data dir: {}",
        style(state.data_dir.display()).dim()
    );
    println!();

    Ok(())
}
