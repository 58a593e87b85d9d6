fn main() {
    match runlimit::cli::run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("runlimit: {:#}", e);
            std::process::exit(1);
        }
    }
}
