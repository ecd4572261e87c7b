fn main() {
    std::process::exit(lockshot_lib::run());
}
