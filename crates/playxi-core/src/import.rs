// CSV seeding: leagues, teams, fixtures, squads and per-player match points.
//
// Every file has a header row. Malformed rows, and rows the database refuses
// (unknown league, duplicate sequence, ...), are skipped with a warning.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{info, warn};

use crate::db::Database;
use crate::lineup::player::PlayerRef;
use crate::model::{League, LeagueId, MatchId, PlayerId, TeamId};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LeagueRow {
    pub league_id: LeagueId,
    pub name: String,
    /// Empty means the configured default.
    pub transfer_limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TeamRow {
    pub team_id: TeamId,
    pub league_id: LeagueId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FixtureRow {
    pub league_id: LeagueId,
    pub sequence: u32,
    /// RFC 3339, e.g. `2026-04-01T14:00:00Z`.
    pub scheduled_start: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SquadRow {
    pub team_id: TeamId,
    pub player_id: PlayerId,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub squad_tag: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PointsRow {
    pub player_id: PlayerId,
    pub match_id: MatchId,
    pub points: f64,
}

/// Which file is being imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Leagues,
    Teams,
    Fixtures,
    Squads,
    Points,
}

impl ImportKind {
    pub fn label(&self) -> &'static str {
        match self {
            ImportKind::Leagues => "league",
            ImportKind::Teams => "team",
            ImportKind::Fixtures => "fixture",
            ImportKind::Squads => "squad",
            ImportKind::Points => "points",
        }
    }
}

/// Row counts of one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub applied: usize,
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Reader-based parsing (enables testing without temp files)
// ---------------------------------------------------------------------------

fn rows_from_reader<T, R>(rdr: R, label: &str) -> Result<(Vec<T>, usize), csv::Error>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(rdr);
    let mut rows = Vec::new();
    let mut skipped = 0;
    for result in reader.deserialize::<T>() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                warn!("skipping malformed {label} row: {e}");
                skipped += 1;
            }
        }
    }
    Ok((rows, skipped))
}

fn league_rows<R: Read>(rdr: R) -> Result<(Vec<LeagueRow>, usize), csv::Error> {
    let (rows, malformed) = rows_from_reader::<LeagueRow, _>(rdr, "league")?;
    let total = rows.len();
    let rows: Vec<_> = rows
        .into_iter()
        .filter(|row| {
            if row.name.is_empty() {
                warn!("skipping league {}: empty name", row.league_id);
                return false;
            }
            true
        })
        .collect();
    let dropped = total - rows.len();
    Ok((rows, malformed + dropped))
}

fn points_rows<R: Read>(rdr: R) -> Result<(Vec<PointsRow>, usize), csv::Error> {
    let (rows, malformed) = rows_from_reader::<PointsRow, _>(rdr, "points")?;
    let total = rows.len();
    let rows: Vec<_> = rows
        .into_iter()
        .filter(|row| {
            if !row.points.is_finite() {
                warn!(
                    "skipping points for player {} in match {}: non-finite value",
                    row.player_id, row.match_id
                );
                return false;
            }
            true
        })
        .collect();
    let dropped = total - rows.len();
    Ok((rows, malformed + dropped))
}

pub fn leagues_from_reader<R: Read>(rdr: R) -> Result<Vec<LeagueRow>, csv::Error> {
    Ok(league_rows(rdr)?.0)
}

pub fn fixtures_from_reader<R: Read>(rdr: R) -> Result<Vec<FixtureRow>, csv::Error> {
    Ok(rows_from_reader(rdr, "fixture")?.0)
}

pub fn points_from_reader<R: Read>(rdr: R) -> Result<Vec<PointsRow>, csv::Error> {
    Ok(points_rows(rdr)?.0)
}

// ---------------------------------------------------------------------------
// Applying rows
// ---------------------------------------------------------------------------

/// Apply `rows` one at a time; a refused row is logged and counted, never
/// fatal. `malformed` rows were already dropped while parsing.
fn apply_rows<T>(
    (rows, malformed): (Vec<T>, usize),
    label: &str,
    mut apply: impl FnMut(&T) -> anyhow::Result<()>,
) -> ImportSummary {
    let mut summary = ImportSummary {
        applied: 0,
        skipped: malformed,
    };
    for row in &rows {
        match apply(row) {
            Ok(()) => summary.applied += 1,
            Err(e) => {
                warn!("skipping {label} row: {e:#}");
                summary.skipped += 1;
            }
        }
    }
    summary
}

/// Parse and apply one CSV stream. `default_transfer_limit` fills empty
/// league limits.
pub fn import_from_reader<R: Read>(
    db: &Database,
    kind: ImportKind,
    rdr: R,
    default_transfer_limit: u32,
) -> Result<ImportSummary, csv::Error> {
    let label = kind.label();
    let summary = match kind {
        ImportKind::Leagues => apply_rows(league_rows(rdr)?, label, |row| {
            db.upsert_league(&League {
                id: row.league_id,
                name: row.name.clone(),
                transfer_limit: row.transfer_limit.unwrap_or(default_transfer_limit),
            })
        }),
        ImportKind::Teams => apply_rows(
            rows_from_reader::<TeamRow, _>(rdr, label)?,
            label,
            |row| db.upsert_team(row.team_id, row.league_id, &row.name),
        ),
        ImportKind::Fixtures => apply_rows(
            rows_from_reader::<FixtureRow, _>(rdr, label)?,
            label,
            |row| {
                db.insert_match(row.league_id, row.sequence, row.scheduled_start)
                    .map(|_| ())
            },
        ),
        ImportKind::Squads => apply_rows(
            rows_from_reader::<SquadRow, _>(rdr, label)?,
            label,
            |row| {
                db.upsert_squad_member(
                    row.team_id,
                    &PlayerRef {
                        player_id: row.player_id,
                        name: row.name.clone(),
                        role: row.role.clone(),
                        squad_tag: row.squad_tag.clone(),
                    },
                )
            },
        ),
        ImportKind::Points => apply_rows(points_rows(rdr)?, label, |row| {
            db.record_player_points(row.player_id, row.match_id, row.points)
        }),
    };

    info!(
        kind = label,
        applied = summary.applied,
        skipped = summary.skipped,
        "import finished"
    );
    Ok(summary)
}

/// Import a CSV file from disk.
pub fn import_file(
    db: &Database,
    kind: ImportKind,
    path: &Path,
    default_transfer_limit: u32,
) -> Result<ImportSummary, ImportError> {
    let file = std::fs::File::open(path).map_err(|e| ImportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    import_from_reader(db, kind, file, default_transfer_limit).map_err(|e| ImportError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
