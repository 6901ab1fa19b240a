use crate::{
    common::format::{format_bytes, format_count, format_uptime},
    protocol::Stats,
};

/// Renders one node's section of the `/lavalinkstats` reply.
pub fn format_node_stats(name: &str, available: bool, stats: Option<&Stats>) -> String {
    let status = if available { "Online" } else { "Offline" };
    let header = format!("**{}** ({})", name, status);

    let Some(stats) = stats else {
        return format!("{header}\nStatistics are not available yet. Try again shortly.");
    };

    // Nodes that have not sampled a full minute yet omit frame stats.
    let (sent, nulled, deficit) = stats
        .frame_stats
        .as_ref()
        .map(|f| (f.sent, f.nulled, f.deficit))
        .unwrap_or((-1, -1, -1));

    [
        header,
        format!(
            "Players: {}/{} playing",
            stats.playing_players, stats.players
        ),
        format!("Uptime: {}", format_uptime(Some(stats.uptime))),
        format!(
            "CPU: {} cores | system {:.1}% | lavalink {:.1}%",
            stats.cpu.cores,
            stats.cpu.system_load * 100.0,
            stats.cpu.lavalink_load * 100.0
        ),
        format!(
            "Memory: {} used / {} allocated (free {})",
            format_bytes(Some(stats.memory.used)),
            format_bytes(Some(stats.memory.allocated)),
            format_bytes(Some(stats.memory.free))
        ),
        format!(
            "Frames: sent {} | nulled {} | deficit {}",
            format_count(sent),
            format_count(nulled),
            format_count(deficit)
        ),
        format!("Penalty: {:.2}", stats.penalty()),
    ]
    .join("\n")
}
