use std::path::Path;

use clap::ArgMatches;

use crate::error;
use crate::conn;

/// splits a setup file into individual statements, dropping empty ones
fn statements(file_sql: &str) -> impl Iterator<Item = &str> {
    file_sql.split(';')
        .map(str::trim)
        .filter(|sql| !sql.is_empty())
}

/// path as it appears in logs, relative to where the command was run when
/// possible
fn shown_path(path: &Path, current_dir: &Path) -> String {
    path.strip_prefix(current_dir)
        .unwrap_or(path)
        .display()
        .to_string()
}

pub async fn run(args: &ArgMatches) -> error::Result<()> {
    let mut conn = conn::postgres(args).await?;
    let current_dir = std::env::current_dir()?;

    let setup_dir = match args.get_one::<String>("dir") {
        Some(dir) => current_dir.join(dir),
        None => current_dir.join("db/setup/postgres"),
    };

    let mut files = Vec::new();

    for entry in std::fs::read_dir(&setup_dir)? {
        let path = entry?.path();

        if path.extension().map(|ext| ext == "sql").unwrap_or(false) {
            files.push(path);
        }
    }

    // files are prefixed with their apply order
    files.sort();

    let mut failed = false;
    let transaction = conn.transaction().await?;

    'files: for path in &files {
        let file_sql = std::fs::read_to_string(path)?;
        let shown = shown_path(path, &current_dir);

        tracing::info!("applying {shown}");

        for sql in statements(&file_sql) {
            if let Err(err) = transaction.execute(sql, &[]).await {
                failed = true;

                println!("error running query from {shown}. {err}\n{sql}");

                break 'files;
            }
        }
    }

    if args.get_flag("rollback") || failed {
        transaction.rollback().await?;

        println!("changes rolled back");
    } else {
        transaction.commit().await?;

        println!("applied {} files", files.len());
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn split_statements() {
        let sql = "create table a (id int);\n\n  create index a_id on a (id);\n";
        let list: Vec<&str> = statements(sql).collect();

        assert_eq!(list, vec!["create table a (id int)", "create index a_id on a (id)"]);
    }

    #[test]
    fn logged_paths() {
        let cwd = Path::new("/srv/mfgsite");

        assert_eq!(
            shown_path(Path::new("/srv/mfgsite/db/setup/postgres/00_users.sql"), cwd),
            "db/setup/postgres/00_users.sql"
        );
        assert_eq!(shown_path(Path::new("/tmp/01_auth.sql"), cwd), "/tmp/01_auth.sql");
    }
}
