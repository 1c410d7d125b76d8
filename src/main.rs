use std::process::ExitCode;

fn main() -> ExitCode {
    match gstack::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            gstack::ui::output::error(format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}
