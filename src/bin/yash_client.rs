use clap::Parser;
use yashd::client;
use yashd::config::ClientArgs;
use yashd::status::EXIT_FAILURE;

fn main() {
    let args = ClientArgs::parse();

    if let Err(err) = client::run(args) {
        eprintln!("yash-client: {}", err);
        std::process::exit(EXIT_FAILURE);
    }
}
