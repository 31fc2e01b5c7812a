// 💾 SQLite Taxonomy - read-only snapshot of the taxonomy in a local database
//
// One row per fund/track, keyed by product number. Lists come back in
// insertion (rowid) order so fuzzy tie-breaks stay stable.

use super::{Exposure, ExposureQuery, TaxonomyEntry, TaxonomyRegistry, TaxonomySource};
use crate::error::TaxonomyError;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const ENTRY_COLUMNS: &str = "product_number, category, company, track_name, \
     stocks, bonds, foreign_currency, foreign_investments, israel, illiquid_assets, \
     asset_composition";

/// Create the taxonomy table and its lookup indexes.
pub fn setup_taxonomy_table(conn: &Connection) -> Result<(), TaxonomyError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS taxonomy_entries (
            product_number TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            company TEXT NOT NULL,
            track_name TEXT NOT NULL,
            stocks REAL,
            bonds REAL,
            foreign_currency REAL,
            foreign_investments REAL,
            israel REAL,
            illiquid_assets REAL,
            asset_composition TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_taxonomy_category_company
         ON taxonomy_entries(category, company)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_taxonomy_track ON taxonomy_entries(track_name)",
        [],
    )?;

    Ok(())
}

/// Insert or replace entries in a single transaction.
///
/// Returns the number of rows written.
pub fn insert_entries(conn: &Connection, entries: &[TaxonomyEntry]) -> Result<usize, TaxonomyError> {
    let tx = conn.unchecked_transaction()?;
    let mut written = 0;

    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO taxonomy_entries (
                product_number, category, company, track_name,
                stocks, bonds, foreign_currency, foreign_investments, israel, illiquid_assets,
                asset_composition
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;

        for entry in entries {
            if entry.product_number.trim().is_empty() {
                return Err(TaxonomyError::Malformed(format!(
                    "entry '{}' has no product number",
                    entry.track_name
                )));
            }

            let e = &entry.exposure;
            written += stmt.execute(params![
                entry.product_number.trim(),
                entry.category,
                entry.company,
                entry.track_name,
                e.stocks,
                e.bonds,
                e.foreign_currency,
                e.foreign_investments,
                e.israel,
                e.illiquid_assets,
                entry.asset_composition,
            ])?;
        }
    }

    tx.commit()?;
    Ok(written)
}

pub fn count_entries(conn: &Connection) -> Result<usize, TaxonomyError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM taxonomy_entries", [], |row| row.get(0))?;
    Ok(count as usize)
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<TaxonomyEntry> {
    Ok(TaxonomyEntry {
        product_number: row.get(0)?,
        category: row.get(1)?,
        company: row.get(2)?,
        track_name: row.get(3)?,
        exposure: Exposure::from_fields([
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
            row.get(9)?,
        ]),
        asset_composition: row.get(10)?,
    })
}

pub fn get_all_entries(conn: &Connection) -> Result<Vec<TaxonomyEntry>, TaxonomyError> {
    let sql = format!("SELECT {} FROM taxonomy_entries ORDER BY rowid", ENTRY_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map([], entry_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

fn query_strings<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<String>, TaxonomyError> {
    let mut stmt = conn.prepare(sql)?;
    let values = stmt
        .query_map(params, |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(values)
}

// ============================================================================
// SOURCE
// ============================================================================

/// Taxonomy backed by a SQLite connection.
pub struct SqliteTaxonomy {
    conn: Mutex<Connection>,
}

impl SqliteTaxonomy {
    /// Open (and create if missing) a taxonomy database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TaxonomyError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, TaxonomyError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, TaxonomyError> {
        setup_taxonomy_table(&conn)?;
        Ok(SqliteTaxonomy {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, TaxonomyError> {
        self.conn
            .lock()
            .map_err(|_| TaxonomyError::Unavailable("taxonomy connection lock poisoned".to_string()))
    }

    pub fn insert_entries(&self, entries: &[TaxonomyEntry]) -> Result<usize, TaxonomyError> {
        let conn = self.conn()?;
        insert_entries(&conn, entries)
    }

    pub fn count(&self) -> Result<usize, TaxonomyError> {
        let conn = self.conn()?;
        count_entries(&conn)
    }

    /// Copy the whole table into an in-memory registry.
    pub fn load_registry(&self) -> Result<TaxonomyRegistry, TaxonomyError> {
        let conn = self.conn()?;
        Ok(TaxonomyRegistry::from_entries(get_all_entries(&conn)?))
    }

    fn find_one<P: rusqlite::Params>(&self, filter: &str, params: P) -> Result<Option<TaxonomyEntry>, TaxonomyError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM taxonomy_entries WHERE {} ORDER BY rowid LIMIT 1",
            ENTRY_COLUMNS, filter
        );
        let entry = conn.query_row(&sql, params, entry_from_row).optional()?;
        Ok(entry)
    }
}

impl TaxonomySource for SqliteTaxonomy {
    fn get_all_categories(&self) -> Result<Vec<String>, TaxonomyError> {
        let conn = self.conn()?;
        query_strings(
            &conn,
            "SELECT category FROM taxonomy_entries GROUP BY category ORDER BY MIN(rowid)",
            [],
        )
    }

    fn get_all_companies(&self) -> Result<Vec<String>, TaxonomyError> {
        let conn = self.conn()?;
        query_strings(
            &conn,
            "SELECT company FROM taxonomy_entries GROUP BY company ORDER BY MIN(rowid)",
            [],
        )
    }

    fn get_sub_categories_for_category_and_company(
        &self,
        category: &str,
        company: &str,
    ) -> Result<Vec<String>, TaxonomyError> {
        let conn = self.conn()?;
        query_strings(
            &conn,
            "SELECT track_name FROM taxonomy_entries
             WHERE category = ?1 AND company = ?2
             GROUP BY track_name ORDER BY MIN(rowid)",
            params![category, company],
        )
    }

    fn get_all_sub_categories(&self) -> Result<Vec<String>, TaxonomyError> {
        let conn = self.conn()?;
        query_strings(
            &conn,
            "SELECT track_name FROM taxonomy_entries GROUP BY track_name ORDER BY MIN(rowid)",
            [],
        )
    }

    fn get_exposure_data(&self, query: &ExposureQuery<'_>) -> Result<Option<TaxonomyEntry>, TaxonomyError> {
        if let Some(number) = query.product_number() {
            if let Some(entry) = self.find_one("product_number = ?1", params![number.trim()])? {
                return Ok(Some(entry));
            }
        }

        if let (Some(category), Some(company), Some(track)) =
            (query.category(), query.company(), query.sub_category())
        {
            if let Some(entry) = self.find_one(
                "category = ?1 AND company = ?2 AND track_name = ?3",
                params![category, company, track],
            )? {
                return Ok(Some(entry));
            }
        }

        match query.sub_category() {
            Some(track) => self.find_one("track_name = ?1", params![track]),
            None => Ok(None),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
