fn main() {
    if let Err(err) = driftwatch_lib::run() {
        log::error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
