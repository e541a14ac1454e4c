// SQLite persistence layer for leagues, fixtures, squads and lineups.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use crate::ledger::timeline::{Match, MatchTimeline};
use crate::ledger::transfer::{ChainReplay, TransferItem, TransferKind};
use crate::lineup::player::{PlayerRef, Squad};
use crate::lineup::{Lineup, LineupSource, Selection};
use crate::model::{
    League, LeagueId, MatchId, PlayerId, Team, TeamId, TeamMatchPoints, TransferRecord,
};
use crate::provider::{PointsProvider, SquadProvider};

/// SQLite-backed store for the whole league state: fixtures, teams, squads,
/// lineups with their revision history, the transfer audit trail and scores.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS leagues (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                name           TEXT NOT NULL,
                transfer_limit INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS matches (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                league_id       INTEGER NOT NULL REFERENCES leagues(id) ON DELETE CASCADE,
                sequence        INTEGER NOT NULL,
                scheduled_start TEXT NOT NULL,
                completed       INTEGER NOT NULL DEFAULT 0,
                UNIQUE(league_id, sequence)
            );

            CREATE TABLE IF NOT EXISTS teams (
                id                       INTEGER PRIMARY KEY AUTOINCREMENT,
                league_id                INTEGER NOT NULL REFERENCES leagues(id) ON DELETE CASCADE,
                name                     TEXT NOT NULL,
                transfers_used           INTEGER NOT NULL DEFAULT 0,
                captain_change_used      INTEGER NOT NULL DEFAULT 0,
                vice_captain_change_used INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS squad_members (
                team_id   INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
                player_id INTEGER NOT NULL,
                name      TEXT NOT NULL,
                role      TEXT NOT NULL,
                squad_tag TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (team_id, player_id)
            );

            CREATE TABLE IF NOT EXISTS lineups (
                team_id         INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
                match_id        INTEGER NOT NULL REFERENCES matches(id) ON DELETE CASCADE,
                players         TEXT NOT NULL,
                captain_id      INTEGER NOT NULL,
                vice_captain_id INTEGER NOT NULL,
                source          TEXT NOT NULL,
                revision        INTEGER NOT NULL,
                saved_at        TEXT NOT NULL,
                PRIMARY KEY (team_id, match_id)
            );

            CREATE TABLE IF NOT EXISTS lineup_history (
                team_id         INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
                match_id        INTEGER NOT NULL REFERENCES matches(id) ON DELETE CASCADE,
                revision        INTEGER NOT NULL,
                players         TEXT NOT NULL,
                captain_id      INTEGER NOT NULL,
                vice_captain_id INTEGER NOT NULL,
                source          TEXT NOT NULL,
                saved_at        TEXT NOT NULL,
                PRIMARY KEY (team_id, match_id, revision)
            );

            CREATE TABLE IF NOT EXISTS transfer_records (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                team_id    INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
                match_id   INTEGER NOT NULL REFERENCES matches(id) ON DELETE CASCADE,
                revision   INTEGER NOT NULL,
                kind       TEXT NOT NULL,
                outgoing   INTEGER NOT NULL,
                incoming   INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS team_match_points (
                team_id  INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
                match_id INTEGER NOT NULL REFERENCES matches(id) ON DELETE CASCADE,
                points   REAL NOT NULL,
                PRIMARY KEY (team_id, match_id)
            );

            CREATE TABLE IF NOT EXISTS player_match_points (
                player_id INTEGER NOT NULL,
                match_id  INTEGER NOT NULL REFERENCES matches(id) ON DELETE CASCADE,
                points    REAL NOT NULL,
                PRIMARY KEY (player_id, match_id)
            );

            CREATE INDEX IF NOT EXISTS idx_transfer_records_team
                ON transfer_records(team_id, match_id);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection lock.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock).
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction. The write lock is taken
    /// before `f` reads anything, so concurrent writers are serialized. The
    /// transaction commits when `f` returns `Ok` and rolls back otherwise.
    pub fn with_write_tx<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
        E: From<anyhow::Error>,
    {
        let mut conn = self.conn();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to begin write transaction")?;
        let value = f(&tx)?;
        tx.commit().context("failed to commit write transaction")?;
        Ok(value)
    }

    /// Run read-only queries against the connection.
    pub fn read<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Connection) -> std::result::Result<T, E>,
    {
        let conn = self.conn();
        f(&conn)
    }

    // -----------------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------------

    pub fn insert_league(&self, name: &str, transfer_limit: u32) -> Result<LeagueId> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO leagues (name, transfer_limit) VALUES (?1, ?2)",
            params![name, transfer_limit],
        )
        .context("failed to insert league")?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert or rename a league under a caller-chosen id.
    pub fn upsert_league(&self, league: &League) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO leagues (id, name, transfer_limit) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    transfer_limit = excluded.transfer_limit",
                params![league.id, league.name, league.transfer_limit],
            )
            .context("failed to upsert league")?;
        Ok(())
    }

    pub fn insert_team(&self, league_id: LeagueId, name: &str) -> Result<TeamId> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO teams (league_id, name) VALUES (?1, ?2)",
            params![league_id, name],
        )
        .with_context(|| format!("failed to insert team into league {league_id}"))?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert or rename a team under a caller-chosen id. Cached counters are
    /// left untouched on conflict.
    pub fn upsert_team(&self, team_id: TeamId, league_id: LeagueId, name: &str) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO teams (id, league_id, name) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name",
                params![team_id, league_id, name],
            )
            .with_context(|| format!("failed to upsert team {team_id}"))?;
        Ok(())
    }

    /// Remove a team together with its squad, lineups, audit rows and scores.
    pub fn delete_team(&self, team_id: TeamId) -> Result<bool> {
        let removed = self
            .conn()
            .execute("DELETE FROM teams WHERE id = ?1", params![team_id])
            .context("failed to delete team")?;
        Ok(removed > 0)
    }

    pub fn insert_match(
        &self,
        league_id: LeagueId,
        sequence: u32,
        scheduled_start: DateTime<Utc>,
    ) -> Result<MatchId> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO matches (league_id, sequence, scheduled_start) VALUES (?1, ?2, ?3)",
            params![league_id, sequence, scheduled_start],
        )
        .with_context(|| {
            format!("failed to insert match {sequence} into league {league_id}")
        })?;
        Ok(conn.last_insert_rowid())
    }

    /// Replace a team's whole squad in one transaction.
    pub fn set_squad(&self, team_id: TeamId, players: &[PlayerRef]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin squad transaction")?;
        tx.execute(
            "DELETE FROM squad_members WHERE team_id = ?1",
            params![team_id],
        )
        .context("failed to clear squad")?;
        for player in players {
            insert_squad_member(&tx, team_id, player)?;
        }
        tx.commit().context("failed to commit squad")?;
        Ok(())
    }

    /// Add or update a single squad member.
    pub fn upsert_squad_member(&self, team_id: TeamId, player: &PlayerRef) -> Result<()> {
        insert_squad_member(&self.conn(), team_id, player)
    }

    /// Store a player's base points for a match, overwriting earlier values.
    pub fn record_player_points(
        &self,
        player_id: PlayerId,
        match_id: MatchId,
        points: f64,
    ) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO player_match_points (player_id, match_id, points)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(player_id, match_id) DO UPDATE SET points = excluded.points",
                params![player_id, match_id, points],
            )
            .context("failed to record player points")?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Convenience reads
    // -----------------------------------------------------------------------

    pub fn league(&self, league_id: LeagueId) -> Result<Option<League>> {
        load_league(&self.conn(), league_id)
    }

    pub fn team(&self, team_id: TeamId) -> Result<Option<Team>> {
        load_team(&self.conn(), team_id)
    }

    pub fn timeline(&self, league_id: LeagueId) -> Result<MatchTimeline> {
        load_timeline(&self.conn(), league_id)
    }

    pub fn lineup(&self, team_id: TeamId, match_id: MatchId) -> Result<Option<Lineup>> {
        load_lineup(&self.conn(), team_id, match_id)
    }

    /// Every stored revision of a (team, match) lineup, oldest first.
    pub fn lineup_history(&self, team_id: TeamId, match_id: MatchId) -> Result<Vec<Lineup>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT team_id, match_id, players, captain_id, vice_captain_id, source,
                        revision, saved_at
                 FROM lineup_history WHERE team_id = ?1 AND match_id = ?2 ORDER BY revision",
            )
            .context("failed to prepare lineup_history query")?;
        let rows = stmt
            .query_map(params![team_id, match_id], LineupRow::from_row)
            .context("failed to query lineup history")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map lineup history rows")?;
        rows.into_iter().map(LineupRow::decode).collect()
    }

    pub fn transfer_records(&self, team_id: TeamId) -> Result<Vec<TransferRecord>> {
        load_transfer_records(&self.conn(), team_id)
    }

    pub fn team_match_points(&self, match_id: MatchId) -> Result<Vec<TeamMatchPoints>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT team_id, match_id, points FROM team_match_points
                 WHERE match_id = ?1 ORDER BY team_id",
            )
            .context("failed to prepare team_match_points query")?;
        let points = stmt
            .query_map(params![match_id], |row| {
                Ok(TeamMatchPoints {
                    team_id: row.get(0)?,
                    match_id: row.get(1)?,
                    points: row.get(2)?,
                })
            })
            .context("failed to query team match points")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map team match points rows")?;
        Ok(points)
    }
}

impl SquadProvider for Database {
    fn squad(&self, team_id: TeamId) -> Result<Squad> {
        load_squad(&self.conn(), team_id)
    }
}

impl PointsProvider for Database {
    fn player_points(&self, player_id: PlayerId, match_id: MatchId) -> Result<f64> {
        let points: Option<f64> = self
            .conn()
            .query_row(
                "SELECT points FROM player_match_points WHERE player_id = ?1 AND match_id = ?2",
                params![player_id, match_id],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query player points")?;
        Ok(points.unwrap_or(0.0))
    }
}

// ---------------------------------------------------------------------------
// Row-level helpers. These take a borrowed connection so they can run inside
// a caller's transaction.
// ---------------------------------------------------------------------------

fn insert_squad_member(conn: &Connection, team_id: TeamId, player: &PlayerRef) -> Result<()> {
    conn.execute(
        "INSERT INTO squad_members (team_id, player_id, name, role, squad_tag)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(team_id, player_id) DO UPDATE SET
            name = excluded.name,
            role = excluded.role,
            squad_tag = excluded.squad_tag",
        params![
            team_id,
            player.player_id,
            player.name,
            player.role,
            player.squad_tag
        ],
    )
    .with_context(|| format!("failed to store squad member {}", player.player_id))?;
    Ok(())
}

pub fn load_squad(conn: &Connection, team_id: TeamId) -> Result<Squad> {
    let mut stmt = conn
        .prepare(
            "SELECT player_id, name, role, squad_tag FROM squad_members
             WHERE team_id = ?1 ORDER BY player_id",
        )
        .context("failed to prepare squad query")?;
    let players = stmt
        .query_map(params![team_id], |row| {
            Ok(PlayerRef {
                player_id: row.get(0)?,
                name: row.get(1)?,
                role: row.get(2)?,
                squad_tag: row.get(3)?,
            })
        })
        .context("failed to query squad")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map squad rows")?;
    Ok(Squad::new(players))
}

pub fn load_league(conn: &Connection, league_id: LeagueId) -> Result<Option<League>> {
    conn.query_row(
        "SELECT id, name, transfer_limit FROM leagues WHERE id = ?1",
        params![league_id],
        |row| {
            Ok(League {
                id: row.get(0)?,
                name: row.get(1)?,
                transfer_limit: row.get(2)?,
            })
        },
    )
    .optional()
    .context("failed to load league")
}

pub fn list_leagues(conn: &Connection) -> Result<Vec<League>> {
    let mut stmt = conn
        .prepare("SELECT id, name, transfer_limit FROM leagues ORDER BY id")
        .context("failed to prepare list_leagues query")?;
    let leagues = stmt
        .query_map([], |row| {
            Ok(League {
                id: row.get(0)?,
                name: row.get(1)?,
                transfer_limit: row.get(2)?,
            })
        })
        .context("failed to query leagues")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map league rows")?;
    Ok(leagues)
}

pub fn load_team(conn: &Connection, team_id: TeamId) -> Result<Option<Team>> {
    conn.query_row(
        "SELECT id, league_id, name, transfers_used, captain_change_used, vice_captain_change_used
         FROM teams WHERE id = ?1",
        params![team_id],
        |row| {
            Ok(Team {
                id: row.get(0)?,
                league_id: row.get(1)?,
                name: row.get(2)?,
                transfers_used: row.get(3)?,
                captain_change_used: row.get(4)?,
                vice_captain_change_used: row.get(5)?,
            })
        },
    )
    .optional()
    .context("failed to load team")
}

pub fn list_team_ids(conn: &Connection, league_id: LeagueId) -> Result<Vec<TeamId>> {
    let mut stmt = conn
        .prepare("SELECT id FROM teams WHERE league_id = ?1 ORDER BY id")
        .context("failed to prepare list_team_ids query")?;
    let ids = stmt
        .query_map(params![league_id], |row| row.get(0))
        .context("failed to query team ids")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map team id rows")?;
    Ok(ids)
}

fn match_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Match> {
    Ok(Match {
        id: row.get(0)?,
        league_id: row.get(1)?,
        sequence: row.get(2)?,
        scheduled_start: row.get(3)?,
        completed: row.get(4)?,
    })
}

pub fn load_match(conn: &Connection, match_id: MatchId) -> Result<Option<Match>> {
    conn.query_row(
        "SELECT id, league_id, sequence, scheduled_start, completed FROM matches WHERE id = ?1",
        params![match_id],
        match_from_row,
    )
    .optional()
    .context("failed to load match")
}

pub fn load_timeline(conn: &Connection, league_id: LeagueId) -> Result<MatchTimeline> {
    let mut stmt = conn
        .prepare(
            "SELECT id, league_id, sequence, scheduled_start, completed
             FROM matches WHERE league_id = ?1",
        )
        .context("failed to prepare timeline query")?;
    let matches = stmt
        .query_map(params![league_id], match_from_row)
        .context("failed to query matches")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map match rows")?;
    Ok(MatchTimeline::new(matches))
}

pub fn mark_match_completed(conn: &Connection, match_id: MatchId) -> Result<()> {
    conn.execute(
        "UPDATE matches SET completed = 1 WHERE id = ?1",
        params![match_id],
    )
    .context("failed to mark match completed")?;
    Ok(())
}

/// Raw lineup columns; the JSON player list is decoded outside the row
/// callback so failures carry context.
struct LineupRow {
    team_id: TeamId,
    match_id: MatchId,
    players: String,
    captain_id: PlayerId,
    vice_captain_id: PlayerId,
    source: String,
    revision: u32,
    saved_at: DateTime<Utc>,
}

impl LineupRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(LineupRow {
            team_id: row.get(0)?,
            match_id: row.get(1)?,
            players: row.get(2)?,
            captain_id: row.get(3)?,
            vice_captain_id: row.get(4)?,
            source: row.get(5)?,
            revision: row.get(6)?,
            saved_at: row.get(7)?,
        })
    }

    fn decode(self) -> Result<Lineup> {
        let players: Vec<PlayerRef> = serde_json::from_str(&self.players).with_context(|| {
            format!(
                "corrupt player list for team {} match {}",
                self.team_id, self.match_id
            )
        })?;
        let source = LineupSource::from_str_source(&self.source)
            .with_context(|| format!("unknown lineup source {:?}", self.source))?;
        Ok(Lineup {
            team_id: self.team_id,
            match_id: self.match_id,
            selection: Selection {
                players,
                captain_id: self.captain_id,
                vice_captain_id: self.vice_captain_id,
            },
            source,
            revision: self.revision,
            saved_at: self.saved_at,
        })
    }
}

const LINEUP_COLUMNS: &str =
    "team_id, match_id, players, captain_id, vice_captain_id, source, revision, saved_at";

fn query_lineups(
    conn: &Connection,
    filter: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<Lineup>> {
    let sql = format!("SELECT {LINEUP_COLUMNS} FROM lineups WHERE {filter}");
    let mut stmt = conn
        .prepare(&sql)
        .context("failed to prepare lineup query")?;
    let rows = stmt
        .query_map(args, LineupRow::from_row)
        .context("failed to query lineups")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map lineup rows")?;
    rows.into_iter().map(LineupRow::decode).collect()
}

pub fn load_lineup(
    conn: &Connection,
    team_id: TeamId,
    match_id: MatchId,
) -> Result<Option<Lineup>> {
    Ok(query_lineups(
        conn,
        "team_id = ?1 AND match_id = ?2",
        params![team_id, match_id],
    )?
    .pop())
}

/// All of a team's lineups, unordered. Order them through a timeline.
pub fn load_team_lineups(conn: &Connection, team_id: TeamId) -> Result<Vec<Lineup>> {
    query_lineups(conn, "team_id = ?1", params![team_id])
}

pub fn load_match_lineups(conn: &Connection, match_id: MatchId) -> Result<Vec<Lineup>> {
    query_lineups(conn, "match_id = ?1 ORDER BY team_id", params![match_id])
}

/// Replace the (team, match) lineup with `lineup` (delete-then-insert) and
/// append it to the revision history. The incoming `revision` is ignored;
/// the stored lineup with its assigned revision is returned.
pub fn replace_lineup(conn: &Connection, mut lineup: Lineup) -> Result<Lineup> {
    let revision: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(revision), 0) + 1 FROM lineup_history
             WHERE team_id = ?1 AND match_id = ?2",
            params![lineup.team_id, lineup.match_id],
            |row| row.get(0),
        )
        .context("failed to read lineup revision")?;
    lineup.revision = revision;

    let players = serde_json::to_string(&lineup.selection.players)
        .context("failed to serialize lineup players")?;

    conn.execute(
        "DELETE FROM lineups WHERE team_id = ?1 AND match_id = ?2",
        params![lineup.team_id, lineup.match_id],
    )
    .context("failed to clear previous lineup")?;

    for table in ["lineups", "lineup_history"] {
        conn.execute(
            &format!(
                "INSERT INTO {table} ({LINEUP_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                lineup.team_id,
                lineup.match_id,
                players,
                lineup.selection.captain_id,
                lineup.selection.vice_captain_id,
                lineup.source.as_str(),
                lineup.revision,
                lineup.saved_at,
            ],
        )
        .with_context(|| format!("failed to insert into {table}"))?;
    }

    Ok(lineup)
}

/// Remove the current lineup of a (team, match). History is kept.
pub fn delete_lineup(conn: &Connection, team_id: TeamId, match_id: MatchId) -> Result<bool> {
    let removed = conn
        .execute(
            "DELETE FROM lineups WHERE team_id = ?1 AND match_id = ?2",
            params![team_id, match_id],
        )
        .context("failed to delete lineup")?;
    Ok(removed > 0)
}

pub fn insert_transfer_records(
    conn: &Connection,
    team_id: TeamId,
    match_id: MatchId,
    revision: u32,
    items: &[TransferItem],
    now: DateTime<Utc>,
) -> Result<()> {
    let mut stmt = conn
        .prepare(
            "INSERT INTO transfer_records
                (team_id, match_id, revision, kind, outgoing, incoming, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .context("failed to prepare transfer record insert")?;
    for item in items {
        stmt.execute(params![
            team_id,
            match_id,
            revision,
            item.kind.as_str(),
            item.outgoing,
            item.incoming,
            now,
        ])
        .context("failed to insert transfer record")?;
    }
    Ok(())
}

pub fn load_transfer_records(conn: &Connection, team_id: TeamId) -> Result<Vec<TransferRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT team_id, match_id, revision, kind, outgoing, incoming, created_at
             FROM transfer_records WHERE team_id = ?1 ORDER BY id",
        )
        .context("failed to prepare transfer_records query")?;
    let rows = stmt
        .query_map(params![team_id], |row| {
            let kind: String = row.get(3)?;
            Ok((
                kind,
                TransferRecord {
                    team_id: row.get(0)?,
                    match_id: row.get(1)?,
                    revision: row.get(2)?,
                    kind: TransferKind::Substitution,
                    outgoing: row.get(4)?,
                    incoming: row.get(5)?,
                    created_at: row.get(6)?,
                },
            ))
        })
        .context("failed to query transfer records")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map transfer record rows")?;

    rows.into_iter()
        .map(|(kind, mut record)| {
            record.kind = TransferKind::from_str_kind(&kind)
                .with_context(|| format!("unknown transfer kind {kind:?}"))?;
            Ok(record)
        })
        .collect()
}

/// Overwrite the team's cached counters with the result of a chain replay.
pub fn update_team_counters(
    conn: &Connection,
    team_id: TeamId,
    replay: &ChainReplay,
) -> Result<()> {
    conn.execute(
        "UPDATE teams SET
            transfers_used = ?2,
            captain_change_used = ?3,
            vice_captain_change_used = ?4
         WHERE id = ?1",
        params![
            team_id,
            replay.spent,
            replay.captain_changes > 0,
            replay.vice_captain_changes > 0,
        ],
    )
    .context("failed to update team counters")?;
    Ok(())
}

pub fn upsert_team_points(conn: &Connection, points: &TeamMatchPoints) -> Result<()> {
    conn.execute(
        "INSERT INTO team_match_points (team_id, match_id, points) VALUES (?1, ?2, ?3)
         ON CONFLICT(team_id, match_id) DO UPDATE SET points = excluded.points",
        params![points.team_id, points.match_id, points.points],
    )
    .context("failed to store team match points")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
