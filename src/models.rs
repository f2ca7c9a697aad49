use std::collections::BTreeMap;

use chrono::NaiveTime;
use serde::Serialize;

/// Sentinel killer name the server uses for deaths nobody caused
pub const WORLD_KILLER: &str = "<world>";

/// Fallback for missing names and causes
pub const UNKNOWN: &str = "Unknown";

/// One parsed game session (InitGame .. ShutdownGame)
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Match {
    pub id: u32,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    /// Display names in first-seen order
    pub players: Vec<String>,
    /// Every `Kill:` line seen while the match was open, malformed ones included
    pub total_kills: u32,
    pub kill_score: BTreeMap<String, i32>,
    pub events: Vec<String>,
    #[serde(skip)]
    closed: bool,
}

impl Match {
    pub fn new(id: u32, start_time: Option<NaiveTime>) -> Self {
        Self {
            id,
            start_time,
            end_time: None,
            players: Vec::new(),
            total_kills: 0,
            kill_score: BTreeMap::new(),
            events: Vec::new(),
            closed: false,
        }
    }

    /// True once a ShutdownGame line ended this match
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn score_of(&self, name: &str) -> Option<i32> {
        self.kill_score.get(name).copied()
    }

    pub(crate) fn add_player(&mut self, name: &str) {
        if !name.is_empty() && !self.players.iter().any(|p| p == name) {
            self.players.push(name.to_string());
        }
    }

    pub(crate) fn adjust_score(&mut self, name: &str, delta: i32) {
        *self.kill_score.entry(name.to_string()).or_insert(0) += delta;
    }

    /// Record the end time and give every scoreless player a zero entry
    pub(crate) fn close(&mut self, end_time: Option<NaiveTime>) {
        self.end_time = end_time;
        for player in &self.players {
            self.kill_score.entry(player.clone()).or_insert(0);
        }
        self.closed = true;
    }
}

/// Event type of a raw log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    MatchStart,
    MatchEnd,
    IdentityUpdate,
    Kill,
    Ignored,
}

/// Payload of a `ClientUserinfoChanged` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityUpdate {
    /// Raw digits as written, so `02` and `2` stay distinct
    pub id: Option<String>,
    pub name: String,
}

/// Decomposed `Kill:` payload, tokens still unresolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillRecord {
    pub killer: String,
    pub victim: String,
    pub cause: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_backfills_only_missing_scores() {
        let mut m = Match::new(1, None);
        m.add_player("Isgalamido");
        m.add_player("Mocinha");
        m.adjust_score("Isgalamido", 2);
        m.close(NaiveTime::from_hms_opt(10, 0, 0));

        assert!(m.is_closed());
        assert_eq!(m.score_of("Isgalamido"), Some(2));
        assert_eq!(m.score_of("Mocinha"), Some(0));
    }

    #[test]
    fn add_player_skips_duplicates_and_empty_names() {
        let mut m = Match::new(1, None);
        m.add_player("Zeh");
        m.add_player("");
        m.add_player("Zeh");
        assert_eq!(m.players, vec!["Zeh".to_string()]);
    }

    #[test]
    fn serializes_times_and_hides_closed_flag() {
        let mut m = Match::new(3, NaiveTime::from_hms_opt(9, 0, 0));
        m.close(None);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["start_time"], "09:00:00");
        assert!(json["end_time"].is_null());
        assert!(json.get("closed").is_none());
    }
}
