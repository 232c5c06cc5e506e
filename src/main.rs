use std::process::ExitCode;

fn main() -> ExitCode {
    lok_stt::run()
}
