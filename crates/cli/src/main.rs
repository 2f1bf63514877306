fn main() -> std::process::ExitCode {
    shelfbot_cli::run()
}
