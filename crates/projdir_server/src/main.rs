use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match projdir_server::start_server().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("projdir_server: {err}");
            ExitCode::FAILURE
        }
    }
}
