//! Display formatting for CLI output

use std::path::Path;

use crate::agent::NodeStatusSnapshot;
use crate::config::Config;

/// Format a simple table with headers and rows
pub fn format_table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return "  (none)\n".to_string();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let mut output = String::new();
    let mut push_row = |cells: Vec<String>| {
        let line: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:width$}", cell, width = widths.get(i).copied().unwrap_or(0)))
            .collect();
        output.push_str("  ");
        output.push_str(line.join("   ").trim_end());
        output.push('\n');
    };

    push_row(headers.iter().map(|h| h.to_uppercase()).collect());
    for row in rows {
        push_row(row);
    }

    output
}

/// Effective settings, without tokens or secret values
pub fn format_config_summary(config: &Config, path: &Path) -> String {
    let mut output = String::new();

    output.push_str(&format!("Config: {}\n\n", path.display()));

    output.push_str("Gateway:\n");
    output.push_str(&format!("  Listen:   {}\n", config.gateway.listen_addr()));
    output.push_str(&format!(
        "  Objects:  {}\n",
        config.gateway.objects_root().display()
    ));
    output.push_str(&format!(
        "  Max concurrent requests: {}\n\n",
        config.gateway.max_concurrent
    ));

    let agent = &config.agent;
    output.push_str("Agent:\n");
    output.push_str(&format!("  Node:     {}\n", agent.effective_node_name()));
    output.push_str(&format!(
        "  Backend:  {}\n",
        agent.backend_url.as_deref().unwrap_or("(none, always ready)")
    ));
    output.push_str(&format!("  Interval: {}s\n", agent.status_interval_secs));
    output.push_str(&format!(
        "  Pressure: memory>={}% disk>={}% processes>={}\n\n",
        agent.memory_pressure_percent, agent.disk_pressure_percent, agent.max_processes
    ));

    output.push_str(&format!("Workspaces ({}):\n", config.workspaces.len()));
    let rows = config
        .workspaces
        .iter()
        .map(|ws| {
            vec![
                ws.name.clone(),
                ws.secrets.len().to_string(),
                ws.secrets_file.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    output.push_str(&format_table(&["name", "inline secrets", "secrets file"], rows));

    output
}

/// Condition table for a node status snapshot
pub fn format_node_status(snapshot: &NodeStatusSnapshot) -> String {
    let rows = snapshot
        .conditions
        .iter()
        .map(|c| {
            vec![
                format!("{:?}", c.condition_type),
                format!("{:?}", c.status),
                c.reason.clone(),
                c.last_transition_time.format("%H:%M:%S").to_string(),
            ]
        })
        .collect();

    format!(
        "Node {}:\n{}",
        snapshot.node_name,
        format_table(&["type", "status", "reason", "since"], rows)
    )
}
