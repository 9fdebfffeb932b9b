//! Command-line front end over the Perfectial controllers.
//!
//! # Responsibility
//! - Load configuration, start logging and open the database.
//! - Map subcommands to controller calls and print JSON envelopes.
//!
//! Exit status is `0` when the envelope reports `ok`, `1` otherwise and `2`
//! when startup fails.

use clap::{Parser, Subcommand};
use log::error;
use perfectial_core::controller::{
    CreateToDoRequest, RegisterUserRequest, SetCreditScoreRequest, UpdateToDoRequest,
    UpdateUserRequest,
};
use perfectial_core::{
    init_from_config, AppConfig, Database, Services, ToDoController, UserController,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "perfectial", version, about = "Manage Perfectial users and to-dos")]
struct Cli {
    /// Configuration file; created with defaults when missing.
    #[arg(
        short,
        long,
        global = true,
        env = "PERFECTIAL_CONFIG",
        default_value = perfectial_core::config::DEFAULT_CONFIG_FILE,
        value_name = "FILE"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// User administration
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    /// To-do management
    Todo {
        #[command(subcommand)]
        command: ToDoCommand,
    },
    /// Print the core version
    Version,
}

#[derive(Subcommand)]
enum UserCommand {
    Register {
        user_name: String,
        email: String,
        #[arg(long)]
        display_name: Option<String>,
    },
    Get {
        id: i64,
    },
    List {
        #[arg(long)]
        search: Option<String>,
    },
    Update {
        id: i64,
        user_name: String,
        email: String,
        #[arg(long)]
        display_name: Option<String>,
    },
    Delete {
        id: i64,
    },
    CreditScore {
        id: i64,
        score: i32,
    },
    Audit {
        id: i64,
    },
}

#[derive(Subcommand)]
enum ToDoCommand {
    Create {
        user_id: i64,
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Due time in Unix epoch milliseconds
        #[arg(long)]
        due_at: Option<i64>,
    },
    Get {
        id: i64,
    },
    List {
        user_id: i64,
        #[arg(long)]
        include_done: bool,
    },
    Update {
        id: i64,
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        done: bool,
        #[arg(long)]
        due_at: Option<i64>,
    },
    Complete {
        id: i64,
    },
    Delete {
        id: i64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Command::Version = cli.command {
        println!("perfectial_core version={}", perfectial_core::core_version());
        return ExitCode::SUCCESS;
    }

    let services = match start(&cli.config) {
        Ok(services) => services,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };
    let users = UserController::new(services.users.clone(), services.audit.clone());
    let todos = ToDoController::new(services.todos.clone());

    match cli.command {
        Command::User { command } => run_user(&users, command).await,
        Command::Todo { command } => run_todo(&todos, command).await,
        Command::Version => ExitCode::SUCCESS,
    }
}

fn start(config_path: &Path) -> Result<Services, String> {
    let config = AppConfig::load_or_init(config_path).map_err(|err| err.to_string())?;
    init_from_config(&config.logging).map_err(|err| err.to_string())?;

    let base_dir = config_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let database = Database::from_config(&config.database, base_dir).map_err(|err| {
        error!("event=cli_start module=cli status=error error={err}");
        format!("failed to open database: {err}")
    })?;
    Services::new(database).map_err(|err| err.to_string())
}

async fn run_user(controller: &UserController, command: UserCommand) -> ExitCode {
    match command {
        UserCommand::Register {
            user_name,
            email,
            display_name,
        } => {
            let response = controller
                .register(RegisterUserRequest {
                    user_name,
                    email,
                    display_name,
                })
                .await;
            print_envelope(&response, response.ok)
        }
        UserCommand::Get { id } => {
            let response = controller.get(id).await;
            print_envelope(&response, response.ok)
        }
        UserCommand::List { search } => {
            let response = controller.list(search).await;
            print_envelope(&response, response.ok)
        }
        UserCommand::Update {
            id,
            user_name,
            email,
            display_name,
        } => {
            let response = controller
                .update(UpdateUserRequest {
                    id,
                    user_name,
                    email,
                    display_name,
                })
                .await;
            print_envelope(&response, response.ok)
        }
        UserCommand::Delete { id } => {
            let response = controller.delete(id).await;
            print_envelope(&response, response.ok)
        }
        UserCommand::CreditScore { id, score } => {
            let response = controller
                .set_credit_score(SetCreditScoreRequest {
                    id,
                    credit_score: score,
                })
                .await;
            print_envelope(&response, response.ok)
        }
        UserCommand::Audit { id } => {
            let response = controller.audit_trail(id).await;
            print_envelope(&response, response.ok)
        }
    }
}

async fn run_todo(controller: &ToDoController, command: ToDoCommand) -> ExitCode {
    match command {
        ToDoCommand::Create {
            user_id,
            title,
            description,
            due_at,
        } => {
            let response = controller
                .create(CreateToDoRequest {
                    user_id,
                    title,
                    description,
                    due_at,
                })
                .await;
            print_envelope(&response, response.ok)
        }
        ToDoCommand::Get { id } => {
            let response = controller.get(id).await;
            print_envelope(&response, response.ok)
        }
        ToDoCommand::List {
            user_id,
            include_done,
        } => {
            let response = controller.list(user_id, include_done).await;
            print_envelope(&response, response.ok)
        }
        ToDoCommand::Update {
            id,
            title,
            description,
            done,
            due_at,
        } => {
            let response = controller
                .update(UpdateToDoRequest {
                    id,
                    title,
                    description,
                    is_done: done,
                    due_at,
                })
                .await;
            print_envelope(&response, response.ok)
        }
        ToDoCommand::Complete { id } => {
            let response = controller.complete(id).await;
            print_envelope(&response, response.ok)
        }
        ToDoCommand::Delete { id } => {
            let response = controller.delete(id).await;
            print_envelope(&response, response.ok)
        }
    }
}

fn print_envelope<T: Serialize>(envelope: &T, ok: bool) -> ExitCode {
    match serde_json::to_string_pretty(envelope) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("failed to encode response: {err}");
            return ExitCode::from(2);
        }
    }
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
