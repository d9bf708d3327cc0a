fn main() {
    tether_cli::run();
}
