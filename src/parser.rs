use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use nom::bytes::complete::{tag, take_until, take_while_m_n};
use nom::character::complete::{char, digit1, space0, space1};
use nom::combinator::{all_consuming, map_res, recognize};
use nom::sequence::{preceded, separated_pair, tuple};
use nom::IResult;
use tracing::{debug, error, info, trace};

use crate::error::ParseError;
use crate::models::*;

const MATCH_START_MARKER: &str = "InitGame";
const MATCH_END_MARKER: &str = "ShutdownGame";
const IDENTITY_MARKER: &str = "ClientUserinfoChanged";
const KILL_MARKER: &str = "Kill:";

/// Where the raw log lines come from. Direct lines win over the path.
#[derive(Debug, Clone, Default)]
pub struct LogSource {
    pub path: Option<PathBuf>,
    pub lines: Option<Vec<String>>,
}

impl LogSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            lines: None,
        }
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: None,
            lines: Some(lines.into_iter().map(Into::into).collect()),
        }
    }
}

/// Parse a log source into its matches, in the order they were opened
pub fn parse_log(source: &LogSource) -> Result<Vec<Match>, ParseError> {
    let result = match (&source.lines, &source.path) {
        (Some(lines), _) => Ok(parse_lines(lines)),
        (None, Some(path)) => parse_log_file(path),
        (None, None) => Err(ParseError::NoSource),
    };

    if let Err(e) = &result {
        error!("log parse failed: {}", e);
    }
    result
}

/// Parse a log file. Any read error discards everything parsed so far.
pub fn parse_log_file(path: &Path) -> Result<Vec<Match>, ParseError> {
    let io_err = |source: std::io::Error| ParseError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let reader = BufReader::with_capacity(64 * 1024, file);

    let mut parser = MatchLogParser::new();
    for line_result in reader.lines() {
        let line = line_result.map_err(io_err)?;
        parser.consume_line(&line);
    }

    Ok(parser.finish())
}

/// Parse lines that are already in memory
pub fn parse_lines<I, S>(lines: I) -> Vec<Match>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parser = MatchLogParser::new();
    for line in lines {
        parser.consume_line(line.as_ref());
    }
    parser.finish()
}

/// Single-pass state machine over log lines.
///
/// Holds the match being accumulated and its id -> name map. One instance
/// per parse; nothing is shared between instances.
#[derive(Debug)]
pub struct MatchLogParser {
    matches: Vec<Match>,
    current: Option<Match>,
    identities: HashMap<String, String>,
    next_id: u32,
}

impl MatchLogParser {
    pub fn new() -> Self {
        Self {
            matches: Vec::new(),
            current: None,
            identities: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn consume_line(&mut self, line: &str) {
        let kind = classify_line(line);
        if kind == LineKind::Ignored {
            return;
        }

        // A bad clock token still lets the line through, just without a time
        let time = extract_time_token(line).and_then(parse_clock);

        match kind {
            LineKind::MatchStart => self.open_match(time),
            LineKind::MatchEnd => self.close_match(time),
            LineKind::IdentityUpdate | LineKind::Kill => {
                let Some(current) = self.current.as_mut() else {
                    trace!(?kind, "no open match, skipping line");
                    return;
                };
                if kind == LineKind::Kill {
                    record_kill(current, &self.identities, line, time);
                } else {
                    record_identity(current, &mut self.identities, line);
                }
            }
            LineKind::Ignored => {}
        }
    }

    /// End of input. An open match is kept as-is: no end time, no backfill.
    pub fn finish(mut self) -> Vec<Match> {
        if let Some(open) = self.current.take() {
            debug!(match_id = open.id, "input ended with match still open");
            self.matches.push(open);
        }
        self.matches
    }

    fn open_match(&mut self, time: Option<NaiveTime>) {
        if let Some(abandoned) = self.current.take() {
            debug!(match_id = abandoned.id, "match reopened before shutdown, abandoning");
            self.matches.push(abandoned);
        }

        let id = self.next_id;
        self.next_id += 1;
        self.identities.clear();
        self.current = Some(Match::new(id, time));
        debug!(match_id = id, "match opened");
    }

    fn close_match(&mut self, time: Option<NaiveTime>) {
        if let Some(mut finished) = self.current.take() {
            finished.close(time);
            info!(
                match_id = finished.id,
                players = finished.players.len(),
                total_kills = finished.total_kills,
                "match closed"
            );
            self.matches.push(finished);
            self.identities.clear();
        } else {
            trace!("shutdown without an open match, skipping line");
        }
    }
}

impl Default for MatchLogParser {
    fn default() -> Self {
        Self::new()
    }
}

fn record_identity(current: &mut Match, identities: &mut HashMap<String, String>, line: &str) {
    let update = parse_identity_update(line);
    match update.id {
        Some(id) => {
            identities.insert(id, update.name.clone());
        }
        None => debug!(line = %line, "identity update without numeric id"),
    }
    current.add_player(&update.name);
}

fn record_kill(
    current: &mut Match,
    identities: &HashMap<String, String>,
    line: &str,
    time: Option<NaiveTime>,
) {
    current.total_kills += 1;

    let Some(kill) = parse_kill(line) else {
        debug!(line = %line, "kill line could not be decomposed");
        return;
    };

    let killer = resolve_token(identities, &kill.killer);
    let victim = resolve_token(identities, &kill.victim);
    let at = time
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "00:00".to_string());

    if killer == WORLD_KILLER {
        current.adjust_score(&victim, -1);
        current
            .events
            .push(format!("{} died of {} at {}", victim, kill.cause, at));
    } else {
        current.adjust_score(&killer, 1);
        current.events.push(format!(
            "{} killed {} with {} at {}",
            killer, victim, kill.cause, at
        ));
    }
}

/// Classify a line by marker substring. Lines without a time token are ignored.
pub fn classify_line(line: &str) -> LineKind {
    if extract_time_token(line).is_none() {
        return LineKind::Ignored;
    }

    if line.contains(MATCH_START_MARKER) {
        LineKind::MatchStart
    } else if line.contains(MATCH_END_MARKER) {
        LineKind::MatchEnd
    } else if line.contains(IDENTITY_MARKER) {
        LineKind::IdentityUpdate
    } else if line.contains(KILL_MARKER) {
        LineKind::Kill
    } else {
        LineKind::Ignored
    }
}

/// Leading token of a line, only if something follows it
pub fn extract_time_token(line: &str) -> Option<&str> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    tokens.next()?;
    Some(first)
}

fn clock(input: &str) -> IResult<&str, (u32, u32)> {
    separated_pair(
        map_res(take_while_m_n(1, 2, |c: char| c.is_ascii_digit()), str::parse::<u32>),
        char(':'),
        map_res(take_while_m_n(2, 2, |c: char| c.is_ascii_digit()), str::parse::<u32>),
    )(input)
}

/// Parse an `H:mm` clock token (hour 0-23, two-digit minute)
pub fn parse_clock(token: &str) -> Option<NaiveTime> {
    let (_, (hour, minute)) = all_consuming(clock)(token).ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn numeric_id(input: &str) -> IResult<&str, &str> {
    preceded(space0, digit1)(input)
}

/// `<killer> <victim> <mod>:` id prefix of a kill payload
fn kill_id_prefix(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        space0,
        digit1,
        space1,
        digit1,
        space1,
        digit1,
        char(':'),
    )))(input)
}

fn name_field(input: &str) -> IResult<&str, &str> {
    preceded(tag("n\\"), take_until("\\"))(input)
}

/// First `n\<name>\` field whose `n` starts a field
fn find_name(payload: &str) -> Option<&str> {
    payload.match_indices("n\\").find_map(|(pos, _)| {
        let at_field_start = payload[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| c.is_whitespace() || c == '\\');
        if !at_field_start {
            return None;
        }
        name_field(&payload[pos..]).ok().map(|(_, name)| name)
    })
}

/// Pull the id and display name out of a `ClientUserinfoChanged` line
pub fn parse_identity_update(line: &str) -> IdentityUpdate {
    let payload = line
        .split_once(IDENTITY_MARKER)
        .map(|(_, rest)| rest.strip_prefix(':').unwrap_or(rest))
        .unwrap_or("");

    let id = numeric_id(payload).ok().map(|(_, id)| id.to_string());
    let name = find_name(payload).unwrap_or(UNKNOWN).to_string();

    IdentityUpdate { id, name }
}

/// Split a `Kill:` payload into killer, victim and cause.
///
/// Returns `None` unless the description splits on `" killed "` into exactly
/// two parts. A leading numeric `<killer> <victim> <mod>:` prefix is dropped.
pub fn parse_kill(line: &str) -> Option<KillRecord> {
    let (_, payload) = line.split_once(KILL_MARKER)?;
    let payload = match kill_id_prefix(payload) {
        Ok((text, _)) => text,
        Err(_) => payload,
    }
    .trim();

    let (description, cause) = match payload.split_once(" by ") {
        Some((description, cause)) => (description, cause.trim()),
        None => (payload, UNKNOWN),
    };

    let parts: Vec<&str> = description.split(" killed ").collect();
    if parts.len() != 2 {
        return None;
    }

    Some(KillRecord {
        killer: parts[0].trim().to_string(),
        victim: parts[1].trim().to_string(),
        cause: cause.to_string(),
    })
}

/// Mapped name when the token is an id key, otherwise the token itself
fn resolve_token(identities: &HashMap<String, String>, token: &str) -> String {
    identities
        .get(token)
        .cloned()
        .unwrap_or_else(|| token.to_string())
}
