use heapdb::common::Result;
use heapdb::config::config::DbConfig;
use heapdb::sql::executor::{ExecutionResult, Executor};
use heapdb::storage::resource::ResourceManager;
use itertools::Itertools;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

fn main() -> Result<()> {
    let config = DbConfig::load().unwrap_or_default();
    let rm = ResourceManager::from_config(&config)?;
    let executor = Executor::new(&rm)?;

    let mut editor = DefaultEditor::new().expect("Unable to initialize line editor");
    loop {
        let line = match editor.readline("heapdb> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("oops, {err}");
                continue;
            }
        };
        let statement = line.trim();
        if statement.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(statement);

        match executor.execute_sql(statement) {
            Ok(result) => report(result),
            Err(err) => println!("oops, {err}"),
        }
    }
    Ok(())
}

fn report(result: ExecutionResult) {
    match result {
        ExecutionResult::CreateTable { name } => println!("[console] Created table '{name}'."),
        ExecutionResult::Insert { count } => println!("[console] Inserted {count} tuples."),
        ExecutionResult::Update { count } => println!("[console] Updated {count} tuples."),
        ExecutionResult::Delete { count } => println!("[console] Deleted {count} tuples."),
        ExecutionResult::Select { columns, rows } => {
            println!("  [{}]", columns.iter().join(", "));
            for row in rows {
                println!(
                    "  {}",
                    row.fields.iter().map(|field| field.to_string()).join(", ")
                );
            }
        }
    }
}
