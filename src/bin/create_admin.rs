use std::{
    error::Error,
    io::{self, Write},
    path::Path,
    process::exit,
};

use clap::Parser;
use rusqlite::Connection;

use expense_ledger::{NewUser, PasswordHash, ValidatedPassword, create_user, initialize_db};

/// A utility for creating an administrator that may manage every user's records.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let db_path = Path::new(&args.db_path);
    validate_db_path(db_path);

    let Some(username) = prompt("Username: ")? else {
        return Ok(());
    };
    if username.is_empty() {
        print_error("Username cannot be empty.");
        exit(1);
    }
    let email = prompt("Email address (optional): ")?.unwrap_or_default();

    let Some(password_hash) = get_password_hash(&username, &email) else {
        return Ok(());
    };

    let conn = Connection::open(db_path)?;
    initialize_db(&conn)?;

    match create_user(
        NewUser {
            username,
            email,
            password_hash,
            is_admin: true,
        },
        &conn,
    ) {
        Ok(user) => {
            println!("Created administrator {} with ID {}.", user.username, user.id);
            Ok(())
        }
        Err(error) => {
            print_error(error);
            exit(1);
        }
    }
}

fn validate_db_path(db_path: &Path) {
    match db_path.extension() {
        Some(extension) if !extension.is_empty() => {}
        _ => {
            print_error("Database path must include a file extension (e.g., 'ledger.db').");
            exit(1);
        }
    }
}

/// Read a trimmed line from stdin, `None` at end of input.
fn prompt(message: &str) -> io::Result<Option<String>> {
    print!("{message}");
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }

    Ok(Some(line.trim().to_owned()))
}

fn get_password_hash(username: &str, email: &str) -> Option<PasswordHash> {
    let user_inputs: Vec<&str> = [username, email]
        .into_iter()
        .filter(|input| !input.is_empty())
        .collect();

    loop {
        println!();

        let first_password = read_password("Enter a password: ")?;

        let validated_password = match ValidatedPassword::new(&first_password, &user_inputs) {
            Ok(password) => password,
            Err(error) => {
                print_error(error);
                continue;
            }
        };

        let second_password = read_password("Enter the same password again: ")?;

        if first_password != second_password {
            print_error("Passwords must match, try again.");
            continue;
        }

        match PasswordHash::new(validated_password, PasswordHash::DEFAULT_COST) {
            Ok(password_hash) => return Some(password_hash),
            Err(error) => {
                print_error(format!("Could not hash password: {error}. Try again."));
                continue;
            }
        }
    }
}

fn read_password(message: &str) -> Option<String> {
    match rpassword::prompt_password(message) {
        Ok(string) => Some(string),
        Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => None,
        Err(error) => {
            print_error(format!("Could not read password from stdin: {error}"));
            None
        }
    }
}

fn print_error(error: impl ToString) {
    eprintln!(
        "\x1b[31;1m{}\x1b[0m",
        capitalise_first_char(&error.to_string())
    )
}

fn capitalise_first_char(string: &str) -> String {
    let mut chars = string.chars();
    let Some(first) = chars.next() else {
        return String::with_capacity(0);
    };
    first.to_uppercase().chain(chars).collect()
}
