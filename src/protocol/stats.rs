use serde::{Deserialize, Serialize};

/// Node statistics, from `GET /v4/stats` or the periodic `stats` op.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub players: i32,
    pub playing_players: i32,
    /// Milliseconds since the node started.
    pub uptime: u64,
    pub memory: Memory,
    pub cpu: Cpu,
    #[serde(default)]
    pub frame_stats: Option<FrameStats>,
}

impl Stats {
    /// Load-balancing penalty: playing players, plus exponential terms for
    /// CPU load and for nulled and missing frames. Lower is better.
    pub fn penalty(&self) -> f64 {
        let players = f64::from(self.playing_players);
        let cpu = 1.05f64.powf(100.0 * self.cpu.system_load) * 10.0 - 10.0;

        let (nulled, deficit) = match &self.frame_stats {
            Some(frames) => (
                (frame_curve(frames.nulled) * 300.0 - 300.0) * 2.0,
                frame_curve(frames.deficit) * 600.0 - 600.0,
            ),
            None => (0.0, 0.0),
        };

        players + cpu + nulled + deficit
    }
}

/// Frame stats cover one minute, 3000 frames at 20ms each.
fn frame_curve(frames: i64) -> f64 {
    1.03f64.powf(500.0 * (frames as f64 / 3000.0))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub free: u64,
    pub used: u64,
    pub allocated: u64,
    pub reservable: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cpu {
    pub cores: i32,
    pub system_load: f64,
    pub lavalink_load: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameStats {
    pub sent: i64,
    pub nulled: i64,
    pub deficit: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_without_frames() {
        let raw = r#"{
            "players": 2, "playingPlayers": 1, "uptime": 123456,
            "memory": {"free": 1, "used": 2, "allocated": 3, "reservable": 4},
            "cpu": {"cores": 4, "systemLoad": 0.5, "lavalinkLoad": 0.25}
        }"#;
        let stats: Stats = serde_json::from_str(raw).unwrap();
        assert_eq!(stats.playing_players, 1);
        assert_eq!(stats.cpu.cores, 4);
        assert!(stats.frame_stats.is_none());
        // 1 playing + 1.05^50 * 10 - 10
        assert!((stats.penalty() - 105.67).abs() < 0.01, "{}", stats.penalty());
    }

    #[test]
    fn test_penalty_counts_bad_frames() {
        let raw = r#"{
            "players": 0, "playingPlayers": 0, "uptime": 1,
            "memory": {"free": 1, "used": 2, "allocated": 3, "reservable": 4},
            "cpu": {"cores": 4, "systemLoad": 0.0, "lavalinkLoad": 0.0},
            "frameStats": {"sent": 3000, "nulled": 0, "deficit": 0}
        }"#;
        let mut stats: Stats = serde_json::from_str(raw).unwrap();
        assert!(stats.penalty().abs() < 1e-9);

        stats.frame_stats = Some(FrameStats {
            sent: 2700,
            nulled: 300,
            deficit: 0,
        });
        assert!(stats.penalty() > 0.0);
    }
}
