fn main() {
    std::process::exit(bulwark_installer::run());
}
