fn main() -> Result<(), Box<dyn std::error::Error>> {
    sherpa::cli::main()
}
