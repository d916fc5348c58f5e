use clap::{Parser, Subcommand};
use serde::Serialize;

use invest::api::{self, GoalArgs, LoanArgs, SimulateArgs};
use invest::core::InputError;

#[derive(Parser, Debug)]
#[command(
    name = "invest",
    about = "Compound growth, goal planning and loan amortisation calculators"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Simulate a lump sum, DCA, step-up or irregular investment plan.
    Simulate(SimulateArgs),
    /// Solve for the payment or the years needed to reach a target.
    Goal(GoalArgs),
    /// Build a loan repayment schedule.
    Loan(LoanArgs),
}

fn print_json<T: Serialize>(result: Result<T, InputError>) -> Result<(), String> {
    let value = result.map_err(|e| e.to_string())?;
    let json = serde_json::to_string_pretty(&value).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Command::Serve { port } => {
            if let Err(e) = api::run_http_server(port).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
            return;
        }
        Command::Simulate(args) => print_json(api::run_simulation(&args, api::today())),
        Command::Goal(args) => print_json(api::run_goal(&args)),
        Command::Loan(args) => print_json(api::run_loan_schedule(&args, api::today())),
    };

    if let Err(msg) = outcome {
        eprintln!("{msg}");
        std::process::exit(1);
    }
}
