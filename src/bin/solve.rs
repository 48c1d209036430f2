//! Command-line solve driver.
//!
//! Reads a JSON `SolveRequest` from the path given as the first argument
//! (or stdin when absent), runs the solve with a progress bar, and writes
//! the JSON response to stdout.

use std::io::Read;
use std::process::ExitCode;

use indicatif::{ProgressBar, ProgressStyle};

use gto_solver::api::{solve_with, validate_config, SolveRequest};
use gto_solver::SolverError;

fn main() -> ExitCode {
    env_logger::init();

    let request = match read_request() {
        Ok(request) => request,
        Err(msg) => {
            eprintln!("error: {}", msg);
            return ExitCode::FAILURE;
        }
    };

    let report = validate_config(&request);
    for warning in &report.warnings {
        eprintln!("warning: {}", warning);
    }
    eprintln!(
        "estimated {} nodes, recommended {} iterations",
        report.estimated_nodes, report.recommended_iterations
    );

    let bar = ProgressBar::new(request.iterations);
    bar.set_style(
        ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} iters ({per_sec}, eta {eta})",
        )
        .expect("static template is valid"),
    );

    let result = solve_with(&request, None, None, |iteration, _stats| {
        bar.set_position(iteration);
    });
    bar.finish_and_clear();

    match result {
        Ok(response) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&response).expect("response serializes")
            );
            ExitCode::SUCCESS
        }
        Err(SolverError::Cancelled(partial)) => {
            eprintln!("solve cancelled; emitting partial result");
            println!(
                "{}",
                serde_json::to_string_pretty(&*partial).expect("response serializes")
            );
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn read_request() -> Result<SolveRequest, String> {
    let text = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path)
            .map_err(|e| format!("reading {}: {}", path, e))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("reading stdin: {}", e))?;
            buf
        }
    };
    serde_json::from_str(&text).map_err(|e| format!("parsing request: {}", e))
}
