use std::process;

fn main() {
    if let Err(error) = granary::run() {
        eprintln!("error: {error}");
        process::exit(1);
    }
}
