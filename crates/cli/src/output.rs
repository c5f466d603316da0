//! Output formatting for scan results

use anyhow::Result;
use std::time::Duration;
use vantage_common::{Detection, DetectionStats, DetectionStatus, ScanOutcome};

/// Print scan outcomes in the specified format
pub fn print_outcomes(
    outcomes: &[ScanOutcome],
    stats: &DetectionStats,
    format: &str,
    scan_duration: Duration,
) -> Result<()> {
    // Normalize format string
    let format = format.trim().to_lowercase();
    match format.as_str() {
        "json" | "j" => print_json(outcomes, stats, scan_duration)?,
        "table" | "text" | "t" | "" => print_table(outcomes, stats, scan_duration),
        _ => {
            eprintln!("Warning: Unknown format '{}', using default table format", format);
            print_table(outcomes, stats, scan_duration);
        }
    }
    Ok(())
}

/// Print outcomes as ASCII tables, one block per asset
fn print_table(outcomes: &[ScanOutcome], stats: &DetectionStats, scan_duration: Duration) {
    if outcomes.is_empty() {
        println!("\nNo results to display.\n");
        return;
    }

    for outcome in outcomes {
        println!("\nAsset {} [{:?}] scan {}", outcome.asset_id, outcome.asset_status(), outcome.scan_id);
        println!("{:-<96}", "");
        println!(
            "{:<16} {:<24} {:<10} {:<8} {:<36}",
            "PROBE", "TARGET", "STATE", "RTT", "DETAIL"
        );
        println!("{:-<96}", "");
        for detection in &outcome.detections {
            println!(
                "{:<16} {:<24} {:<10} {:<8} {:<36}",
                detection.kind.as_str(),
                format_target(detection),
                format_state(detection),
                detection
                    .response_time_ms
                    .map(|ms| format_duration(Duration::from_millis(ms)))
                    .unwrap_or_default(),
                detection.detail.as_deref().unwrap_or("")
            );
        }

        if !outcome.fingerprints.is_empty() {
            println!("{:-<96}", "");
            println!(
                "{:<22} {:<28} {:<12} {:<6} {:<14} {:<10}",
                "TYPE", "NAME", "VERSION", "CONF", "METHOD", "PORT"
            );
            for fp in &outcome.fingerprints {
                println!(
                    "{:<22} {:<28} {:<12} {:<6} {:<14} {:<10}",
                    fp.kind.as_str(),
                    fp.name,
                    fp.version.as_deref().unwrap_or("-"),
                    fp.confidence,
                    fp.method.as_str(),
                    format!("{}/{}", fp.port, fp.protocol)
                );
            }
        }
        println!("{:-<96}", "");
    }

    println!("\nSummary:");
    println!("  Assets scanned: {}", outcomes.len());
    println!("  Detections: {}", stats.total);
    println!("  Online: {}", stats.online);
    println!("  Offline: {}", stats.offline);
    println!("  Timed out: {}", stats.timed_out);
    println!("  Failed: {}", stats.failed);
    println!("  Avg response: {:.1}ms", stats.average_response_ms);
    println!("  Scan duration: {}", format_duration(scan_duration));
    println!();
}

/// Print outcomes as JSON
fn print_json(outcomes: &[ScanOutcome], stats: &DetectionStats, scan_duration: Duration) -> Result<()> {
    use serde_json::json;

    let output = json!({
        "scan_info": {
            "duration_seconds": scan_duration.as_secs_f64(),
            "duration_formatted": format_duration(scan_duration),
            "assets": outcomes.len(),
            "stats": stats,
        },
        "results": outcomes
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn format_target(detection: &Detection) -> String {
    match detection.port {
        Some(port) => format!("{}:{}", detection.target, port),
        None => detection.target.clone(),
    }
}

fn format_state(detection: &Detection) -> String {
    match detection.status {
        DetectionStatus::Completed if detection.is_online() => "ONLINE".to_string(),
        DetectionStatus::Completed => "OFFLINE".to_string(),
        other => other.to_string(),
    }
}

/// Format duration in a human-readable way
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs == 0 {
        format!("{}ms", millis)
    } else if total_secs < 60 {
        if millis > 0 {
            format!("{}.{:03}s", total_secs, millis)
        } else {
            format!("{}s", total_secs)
        }
    } else {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_common::{Outcome, ProbeKind};

    fn outcome() -> ScanOutcome {
        let mut outcome = ScanOutcome::new(1);
        let mut d = Detection::new(1, ProbeKind::TcpPort, "127.0.0.1", Some(22));
        d.mark_started();
        d.complete(Outcome::Online, "port 22 open");
        outcome.detections.push(d);
        outcome
    }

    #[test]
    fn test_print_outcomes_json() {
        let outcomes = vec![outcome()];
        let stats = DetectionStats::from_detections(&outcomes[0].detections);
        assert!(print_json(&outcomes, &stats, Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_print_outcomes_table() {
        let outcomes = vec![outcome()];
        let stats = DetectionStats::from_detections(&outcomes[0].detections);
        print_table(&outcomes, &stats, Duration::from_secs(5));
    }

    #[test]
    fn test_format_state() {
        let mut d = Detection::new(1, ProbeKind::Ping, "10.0.0.1", None);
        d.mark_started();
        d.complete(Outcome::Offline, "down");
        assert_eq!(format_state(&d), "OFFLINE");
        assert_eq!(format_target(&d), "10.0.0.1");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_millis(5500)), "5.500s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
    }
}
