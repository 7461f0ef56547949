//! fkeeper - backup tiering, verification, and recovery for a
//! self-hosted forge.

use std::process::ExitCode;

use forgekeeper::FkError;

#[tokio::main]
async fn main() -> ExitCode {
    match forgekeeper_cli::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            let code = e
                .downcast_ref::<FkError>()
                .map_or(1, FkError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
