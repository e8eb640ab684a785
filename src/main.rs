fn main() {
    #[cfg(feature = "cli")]
    snapkit::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("snapkit: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
