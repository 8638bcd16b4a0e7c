//! Schema discovery
//!
//! Maps a set of schema directories onto logical databases:
//! - `NAME.sql` is database `NAME` with a single schema file
//! - `NAME/` is database `NAME` with every `*.sql` inside, in file-name order
//!
//! Anything else (hidden entries, non-SQL files) is skipped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{Error, Result};

/// Namespace schema databases are discovered under by default
pub const DEFAULT_SERVICE_NAME: &str = "admin";

/// One logical database and the schema it is created from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSchema {
    pub service_name: String,
    pub dbname: String,
    /// Schema files in application order
    pub files: Vec<PathBuf>,
}

impl DatabaseSchema {
    /// Database name qualified by the service namespace
    ///
    /// Characters outside `[A-Za-z0-9_]` become `_`.
    pub fn physical_name(&self) -> String {
        format!("{}_{}", self.service_name, self.dbname)
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect()
    }

    /// Statements of all schema files in order, with the file each came from
    pub fn statements(&self) -> Result<Vec<(PathBuf, String)>> {
        let mut statements = Vec::new();
        for file in &self.files {
            let sql = std::fs::read_to_string(file)?;
            let split = split_statements(&sql).map_err(|err| Error::SchemaFile {
                file: file.clone(),
                source: Box::new(err),
            })?;
            statements.extend(split.into_iter().map(|s| (file.clone(), s)));
        }
        Ok(statements)
    }
}

fn is_sql_file(path: &Path) -> bool {
    path.is_file() && path.extension().map_or(false, |ext| ext == "sql")
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(true, |n| n.starts_with('.'))
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

/// Discover the databases defined in `schema_dirs`
pub fn find_schemas<P: AsRef<Path>>(
    service_name: &str,
    schema_dirs: &[P],
) -> Result<BTreeMap<String, DatabaseSchema>> {
    let mut databases: BTreeMap<String, DatabaseSchema> = BTreeMap::new();

    for dir in schema_dirs {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::SchemaDirMissing(dir.to_path_buf()));
        }

        for entry in sorted_entries(dir)? {
            if is_hidden(&entry) {
                continue;
            }

            let (dbname, files) = if is_sql_file(&entry) {
                let stem = entry
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (stem, vec![entry.clone()])
            } else if entry.is_dir() {
                let files: Vec<PathBuf> = sorted_entries(&entry)?
                    .into_iter()
                    .filter(|f| is_sql_file(f) && !is_hidden(f))
                    .collect();
                if files.is_empty() {
                    debug!("Skipping {}: no schema files", entry.display());
                    continue;
                }
                let name = entry
                    .file_name()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (name, files)
            } else {
                continue;
            };

            if let Some(existing) = databases.get(&dbname) {
                return Err(Error::DuplicateDatabase {
                    name: dbname,
                    first: existing.files[0].clone(),
                    second: files[0].clone(),
                });
            }

            debug!("Discovered database '{}' ({} schema file(s))", dbname, files.len());
            databases.insert(
                dbname.clone(),
                DatabaseSchema {
                    service_name: service_name.to_string(),
                    dbname,
                    files,
                },
            );
        }
    }

    Ok(databases)
}

/// Keyword context of the statement being split
#[derive(Default)]
struct StatementScope {
    words: usize,
    create: bool,
    trigger: bool,
    /// Open `BEGIN`/`CASE` blocks of a trigger body
    depth: usize,
}

impl StatementScope {
    fn word(&mut self, word: &str) {
        let first = self.words == 0;
        self.words += 1;
        match word.to_ascii_uppercase().as_str() {
            "CREATE" if first => self.create = true,
            "TRIGGER" if self.create && self.depth == 0 => self.trigger = true,
            "BEGIN" if self.trigger => self.depth += 1,
            "CASE" if self.depth > 0 => self.depth += 1,
            "END" if self.depth > 0 => self.depth -= 1,
            _ => {}
        }
    }
}

/// Split SQL text into statements on `;`
///
/// Semicolons inside quoted strings, quoted identifiers, `--` line comments,
/// `/* */` block comments and `CREATE TRIGGER ... BEGIN ... END` bodies do
/// not split. Empty statements are dropped. Text ending inside a quote, block
/// comment or trigger body is an error.
pub fn split_statements(sql: &str) -> Result<Vec<String>> {
    #[derive(PartialEq)]
    enum State {
        Normal,
        SingleQuote,
        DoubleQuote,
        LineComment,
        BlockComment,
    }

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut word = String::new();
    let mut scope = StatementScope::default();
    let mut state = State::Normal;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Normal => {
                if c.is_ascii_alphanumeric() || c == '_' {
                    word.push(c);
                    current.push(c);
                    continue;
                }
                if !word.is_empty() {
                    scope.word(&word);
                    word.clear();
                }
                match c {
                    ';' if scope.depth == 0 => {
                        let statement = current.trim();
                        if !statement.is_empty() {
                            statements.push(statement.to_string());
                        }
                        current.clear();
                        scope = StatementScope::default();
                        continue;
                    }
                    '\'' => state = State::SingleQuote,
                    '"' => state = State::DoubleQuote,
                    '-' if chars.peek() == Some(&'-') => {
                        state = State::LineComment;
                        continue;
                    }
                    '/' if chars.peek() == Some(&'*') => {
                        chars.next();
                        state = State::BlockComment;
                        continue;
                    }
                    _ => {}
                }
            }
            State::SingleQuote if c == '\'' => state = State::Normal,
            State::DoubleQuote if c == '"' => state = State::Normal,
            State::LineComment => {
                if c == '\n' {
                    state = State::Normal;
                } else {
                    continue;
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Normal;
                }
                continue;
            }
            _ => {}
        }
        current.push(c);
    }

    if !word.is_empty() {
        scope.word(&word);
    }
    match state {
        State::SingleQuote | State::DoubleQuote => return Err(Error::UnterminatedSql("quote")),
        State::BlockComment => return Err(Error::UnterminatedSql("block comment")),
        State::Normal | State::LineComment => {}
    }
    if scope.depth > 0 {
        return Err(Error::UnterminatedSql("trigger body"));
    }

    let tail = current.trim();
    if !tail.is_empty() {
        statements.push(tail.to_string());
    }
    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, text: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_file_becomes_database() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("0_sqlite.sql"), "CREATE TABLE a (x INT);");
        write(&dir.path().join("README.md"), "not a schema");
        write(&dir.path().join(".hidden.sql"), "CREATE TABLE h (x INT);");
        write(&dir.path().join(".git/objects.sql"), "CREATE TABLE g (x INT);");

        let databases = find_schemas(DEFAULT_SERVICE_NAME, &[dir.path()]).unwrap();

        assert_eq!(databases.keys().collect::<Vec<_>>(), vec!["0_sqlite"]);
        let db = &databases["0_sqlite"];
        assert_eq!(db.service_name, "admin");
        assert_eq!(db.files, vec![dir.path().join("0_sqlite.sql")]);
        assert_eq!(db.physical_name(), "admin_0_sqlite");
    }

    #[test]
    fn test_directory_files_in_name_order() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("events/002_index.sql"), "CREATE INDEX i ON e (x);");
        write(&dir.path().join("events/001_table.sql"), "CREATE TABLE e (x INT);");
        write(&dir.path().join("events/notes.txt"), "ignored");

        let databases = find_schemas("svc", &[dir.path()]).unwrap();
        let files = &databases["events"].files;

        assert_eq!(
            files,
            &vec![
                dir.path().join("events/001_table.sql"),
                dir.path().join("events/002_index.sql"),
            ]
        );
    }

    #[test]
    fn test_duplicate_across_directories() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write(&first.path().join("kv.sql"), "CREATE TABLE a (x INT);");
        write(&second.path().join("kv/001.sql"), "CREATE TABLE b (x INT);");

        let err = find_schemas("svc", &[first.path(), second.path()]).unwrap_err();
        assert!(matches!(err, Error::DuplicateDatabase { ref name, .. } if name == "kv"));
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            find_schemas("svc", &[&missing]),
            Err(Error::SchemaDirMissing(_))
        ));
    }

    #[test]
    fn test_empty_directory_yields_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(find_schemas("svc", &[dir.path()]).unwrap().is_empty());
    }

    #[test]
    fn test_physical_name_sanitized() {
        let db = DatabaseSchema {
            service_name: "my-service".to_string(),
            dbname: "key.value".to_string(),
            files: Vec::new(),
        };
        assert_eq!(db.physical_name(), "my_service_key_value");
    }

    #[test]
    fn test_split_plain_statements() {
        let statements = split_statements(
            "CREATE TABLE a (x INT);\n\nCREATE TABLE b (y INT)\n",
        )
        .unwrap();
        assert_eq!(statements, vec!["CREATE TABLE a (x INT)", "CREATE TABLE b (y INT)"]);
    }

    #[test]
    fn test_split_respects_quotes_and_comments() {
        let sql = r#"
-- leading comment; not a split
INSERT INTO t VALUES ('a;b');
/* block; comment */ INSERT INTO "odd;name" VALUES (1);
;;
"#;
        let statements = split_statements(sql).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "INSERT INTO t VALUES ('a;b')");
        assert_eq!(statements[1], r#"INSERT INTO "odd;name" VALUES (1)"#);
    }

    #[test]
    fn test_split_keeps_trigger_body() {
        let sql = "CREATE TABLE t (x INT, n INT);
CREATE TABLE trigger_log (x INT);
CREATE TRIGGER trg AFTER INSERT ON t BEGIN
    INSERT INTO trigger_log VALUES (new.x);
    UPDATE t SET n = CASE WHEN new.x > 0 THEN 1 ELSE 0 END WHERE x = new.x;
END;
INSERT INTO t VALUES (1, 0);";

        let statements = split_statements(sql).unwrap();

        assert_eq!(statements.len(), 4);
        assert!(statements[2].starts_with("CREATE TRIGGER trg"));
        assert!(statements[2].ends_with("END"));
        assert!(statements[2].contains("WHERE x = new.x;"));
        assert_eq!(statements[3], "INSERT INTO t VALUES (1, 0)");
    }

    #[test]
    fn test_split_begin_outside_trigger() {
        let statements = split_statements("BEGIN; CREATE TABLE a (x INT); END;").unwrap();
        assert_eq!(statements, vec!["BEGIN", "CREATE TABLE a (x INT)", "END"]);
    }

    #[test]
    fn test_split_rejects_unterminated_text() {
        for sql in [
            "CREATE TABLE a (x INT); /* never closed",
            "INSERT INTO t VALUES ('open;",
            "CREATE TRIGGER trg AFTER INSERT ON t BEGIN DELETE FROM t;",
        ] {
            assert!(
                matches!(split_statements(sql), Err(Error::UnterminatedSql(_))),
                "accepted {sql:?}"
            );
        }
    }

    #[test]
    fn test_statements_name_malformed_file() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("db/1.sql"), "CREATE TABLE a (x INT); /*");

        let databases = find_schemas("svc", &[dir.path()]).unwrap();
        let err = databases["db"].statements().unwrap_err();

        assert!(matches!(err, Error::SchemaFile { ref file, .. } if file.ends_with("1.sql")));
    }

    #[test]
    fn test_statements_follow_file_order() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("db/1.sql"), "CREATE TABLE a (x INT);");
        write(&dir.path().join("db/2.sql"), "CREATE TABLE b (x INT); CREATE TABLE c (x INT);");

        let databases = find_schemas("svc", &[dir.path()]).unwrap();
        let statements: Vec<String> = databases["db"]
            .statements()
            .unwrap()
            .into_iter()
            .map(|(_, s)| s)
            .collect();

        assert_eq!(
            statements,
            vec!["CREATE TABLE a (x INT)", "CREATE TABLE b (x INT)", "CREATE TABLE c (x INT)"]
        );
    }
}
