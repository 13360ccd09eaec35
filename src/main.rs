fn main() {
    if let Err(e) = valet::cli::main() {
        eprintln!("❌ Error: {e}");
        std::process::exit(1);
    }
}
