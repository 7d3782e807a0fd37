use clap::Parser;
use yashd::config::DaemonArgs;
use yashd::status::EXIT_FAILURE;
use yashd::supervisor;

fn main() {
    let args = DaemonArgs::parse();

    if let Err(err) = supervisor::serve(args) {
        eprintln!("yashd: {}", err);
        std::process::exit(EXIT_FAILURE);
    }
}
