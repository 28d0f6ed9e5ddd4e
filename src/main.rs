fn main() {
    if let Err(err) = datrep::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
