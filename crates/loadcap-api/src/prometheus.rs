//! Prometheus text exposition format.
//!
//! Renders the controller status for scraping by a Prometheus server or
//! compatible agent. Caps are exported as their wire value, so `-1` means
//! unbounded.

use std::fmt::Write;

use loadcap_core::StatusView;

/// Escape a label value per the text exposition format.
fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn header(out: &mut String, name: &str, kind: &str, help: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
}

fn scalar(out: &mut String, name: &str, kind: &str, help: &str, value: u64) {
    header(out, name, kind, help);
    let _ = writeln!(out, "{name} {value}");
}

/// Render the status view into Prometheus text format.
///
/// Per-server series carry a `server` label and are only emitted once a
/// snapshot exists.
pub fn render_prometheus(view: &StatusView) -> String {
    let mut out = String::new();

    scalar(
        &mut out,
        "loadcap_stable_iterations",
        "gauge",
        "Consecutive identical snapshots observed.",
        view.stable_iterations.into(),
    );
    scalar(
        &mut out,
        "loadcap_stability_threshold",
        "gauge",
        "Identical snapshots required before rebalancing.",
        view.stability_threshold.into(),
    );
    scalar(
        &mut out,
        "loadcap_cycles_total",
        "counter",
        "Control cycles run.",
        view.cycles,
    );
    scalar(
        &mut out,
        "loadcap_poll_failures_total",
        "counter",
        "Cycles aborted by a failed poll.",
        view.poll_failures,
    );
    scalar(
        &mut out,
        "loadcap_apply_failures_total",
        "counter",
        "Directives whose application was aborted.",
        view.apply_failures,
    );
    scalar(
        &mut out,
        "loadcap_rebalances_total",
        "counter",
        "Directives applied in full.",
        view.rebalances,
    );

    header(
        &mut out,
        "loadcap_server_active_clients",
        "gauge",
        "Active clients per server at the last successful poll.",
    );
    if let Some(snapshot) = &view.last_snapshot {
        for (server, status) in snapshot.iter() {
            let _ = writeln!(
                out,
                "loadcap_server_active_clients{{server=\"{}\"}} {}",
                escape_label_value(server),
                status.active_clients
            );
        }
    }

    header(
        &mut out,
        "loadcap_server_max_clients",
        "gauge",
        "Client cap per server at the last successful poll (-1 = unbounded).",
    );
    if let Some(snapshot) = &view.last_snapshot {
        for (server, status) in snapshot.iter() {
            let _ = writeln!(
                out,
                "loadcap_server_max_clients{{server=\"{}\"}} {}",
                escape_label_value(server),
                status.max_clients.to_wire()
            );
        }
    }

    out
}
