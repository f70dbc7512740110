use fruitveg::cli::{ClassifyArgs, parse_known, run_classify};
use std::process::ExitCode;

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));

    let args = std::env::args_os().map(|arg| arg.to_string_lossy().into_owned());
    match parse_known::<ClassifyArgs>(args) {
        Ok((args, _ignored)) => run_classify(args),
        Err(e) => e.exit(),
    }
}
